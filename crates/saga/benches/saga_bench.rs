use common::{Money, OrderId, ProductId, PurchaseId, SagaId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use ledger::InMemoryPurchaseLedger;
use saga::{
    CartLine, InMemoryCartService, InMemoryOrderService, InMemoryProductService,
    InMemoryWalletService, OrchestratorConfig, PurchaseOrchestrator, PurchaseSaga, SagaEvent,
    purchase_checkout,
};

type InMemoryOrchestrator = PurchaseOrchestrator<
    InMemoryCartService,
    InMemoryProductService,
    InMemoryWalletService,
    InMemoryOrderService,
    InMemoryPurchaseLedger,
>;

struct Services {
    cart: InMemoryCartService,
    products: InMemoryProductService,
    wallet: InMemoryWalletService,
    orchestrator: InMemoryOrchestrator,
}

fn setup(line_count: i64) -> Services {
    let cart = InMemoryCartService::new();
    let products = InMemoryProductService::new();
    let wallet = InMemoryWalletService::new();
    for id in 1..=line_count {
        products.set_price(ProductId::new(id), Money::from_cents(1000));
    }
    let orchestrator = PurchaseOrchestrator::with_config(
        cart.clone(),
        products.clone(),
        wallet.clone(),
        InMemoryOrderService::new(),
        InMemoryPurchaseLedger::new(),
        OrchestratorConfig::without_backoff(),
    );
    Services {
        cart,
        products,
        wallet,
        orchestrator,
    }
}

fn fill_cart(services: &Services, line_count: i64) -> UserId {
    let user = UserId::new();
    let lines = (1..=line_count)
        .map(|id| CartLine::new(ProductId::new(id), Money::from_cents(1000), 1))
        .collect();
    services.cart.put_cart(user, lines);
    services.wallet.set_balance(user, Money::from_cents(1_000_000));
    user
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let services = setup(3);

    c.bench_function("saga/checkout_three_lines", |b| {
        b.iter(|| {
            let user = fill_cart(&services, 3);
            rt.block_on(async {
                services.orchestrator.create_purchase(user).await.unwrap();
            });
        });
    });
}

fn bench_checkout_wide_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let services = setup(50);

    c.bench_function("saga/checkout_fifty_lines", |b| {
        b.iter(|| {
            let user = fill_cart(&services, 50);
            rt.block_on(async {
                services.orchestrator.create_purchase(user).await.unwrap();
            });
        });
    });
}

fn bench_price_mismatch_abort(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let services = setup(3);
    services
        .products
        .set_price(ProductId::new(2), Money::from_cents(1200));

    c.bench_function("saga/price_mismatch_abort", |b| {
        b.iter(|| {
            let user = fill_cart(&services, 3);
            rt.block_on(async {
                services.orchestrator.create_purchase(user).await.unwrap_err();
            });
        });
    });
}

fn bench_saga_replay(c: &mut Criterion) {
    let user = UserId::new();
    let events = vec![
        SagaEvent::saga_started(SagaId::new(), user, purchase_checkout::SAGA_TYPE),
        SagaEvent::cart_loaded(3),
        SagaEvent::prices_validated(Money::from_cents(3000)),
        SagaEvent::wallet_debited(Money::from_cents(3000)),
        SagaEvent::order_created(OrderId::new(1)),
        SagaEvent::purchase_recorded(PurchaseId::new(1)),
        SagaEvent::cart_cleared(purchase_checkout::STEP_CLEAR_CART),
        SagaEvent::SagaCompleted,
    ];

    c.bench_function("saga/replay_successful_history", |b| {
        b.iter(|| {
            let mut saga = PurchaseSaga::default();
            for event in events.iter().cloned() {
                saga.apply(event);
            }
            saga
        });
    });
}

criterion_group!(
    benches,
    bench_checkout,
    bench_checkout_wide_cart,
    bench_price_mismatch_abort,
    bench_saga_replay,
);
criterion_main!(benches);
