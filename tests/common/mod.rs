use enrollpay::application::orchestrator::{FlowState, Orchestrator};
use enrollpay::application::poller::PollSettings;
use enrollpay::domain::provider::{ProviderId, ProviderRegistry};
use enrollpay::domain::transaction::{OrderId, TransactionKind, TransactionParams};
use enrollpay::infrastructure::in_memory::{InMemoryBackend, InMemoryTransactionCache};
use enrollpay::infrastructure::providers::ManualProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const PROVIDER: &str = "giropay";

/// A fully wired orchestrator with observable doubles on every port.
pub struct Harness {
    pub backend: InMemoryBackend,
    pub cache: InMemoryTransactionCache,
    pub provider: ManualProvider,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn harness(kind: TransactionKind) -> Harness {
    let backend = InMemoryBackend::new();
    let cache = InMemoryTransactionCache::new();
    let provider = ManualProvider::new();
    let registry =
        Arc::new(ProviderRegistry::new().register(PROVIDER, Arc::new(provider.clone())));
    let orchestrator = Orchestrator::new(
        kind,
        Arc::new(backend.clone()),
        registry,
        Arc::new(cache.clone()),
        PollSettings {
            limit: 5,
            interval: Duration::from_millis(10),
        },
    );
    Harness {
        backend,
        cache,
        provider,
        orchestrator: Arc::new(orchestrator),
    }
}

pub fn params() -> TransactionParams {
    TransactionParams {
        order_id: OrderId("order-1".into()),
        provider_id: ProviderId::from(PROVIDER),
        amount: None,
    }
}

/// Waits (bounded) until the observed flow state matches `pred`.
pub async fn wait_until(
    rx: &mut watch::Receiver<FlowState>,
    pred: impl FnMut(&FlowState) -> bool,
) -> FlowState {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for flow state")
        .expect("orchestrator dropped")
        .clone()
}
