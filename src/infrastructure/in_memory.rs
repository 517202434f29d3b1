use crate::domain::ports::{TransactionBackend, TransactionCache};
use crate::domain::transaction::{
    CreatedTransaction, OrderId, OrderRecord, SessionPayload, SignatureInvitation, SignatureState,
    TransactionId, TransactionKind, TransactionParams, TransactionRecord, TransactionState,
};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Scripted in-memory backend used by the simulator and the test suites.
///
/// Records every call so tests can assert, for instance, that a re-entrant
/// commit never creates a second transaction. Confirmation behavior is
/// scripted per instance: a transaction (or signature) flips to its terminal
/// success state after `confirm_after_polls` status reads.
#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    transactions: HashMap<TransactionId, TransactionRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    next_id: u32,
    confirm_after_polls: Option<u32>,
    polls_seen: u32,
    creation_failure: Option<BackendError>,
    creation_delay: Option<Duration>,
    created: u32,
    cancelled: Vec<TransactionId>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                transactions: HashMap::new(),
                orders: HashMap::new(),
                next_id: 1,
                confirm_after_polls: Some(1),
                polls_seen: 0,
                creation_failure: None,
                creation_delay: None,
                created: 0,
                cancelled: Vec::new(),
            })),
        }
    }

    /// Number of status reads before the backend reports terminal success;
    /// `None` never confirms (the poller will exhaust its budget).
    pub async fn confirm_after_polls(&self, polls: Option<u32>) -> &Self {
        self.inner.write().await.confirm_after_polls = polls;
        self
    }

    /// Makes every subsequent creation call fail with `err`.
    pub async fn fail_creation_with(&self, err: BackendError) -> &Self {
        self.inner.write().await.creation_failure = Some(err);
        self
    }

    /// Makes creation calls take `delay` before answering, simulating a slow
    /// gateway round trip.
    pub async fn delay_creation(&self, delay: Duration) -> &Self {
        self.inner.write().await.creation_delay = Some(delay);
        self
    }

    pub async fn created_count(&self) -> u32 {
        self.inner.read().await.created
    }

    pub async fn cancelled_ids(&self) -> Vec<TransactionId> {
        self.inner.read().await.cancelled.clone()
    }

    pub async fn poll_count(&self) -> u32 {
        self.inner.read().await.polls_seen
    }
}

#[async_trait]
impl TransactionBackend for InMemoryBackend {
    async fn create_transaction(
        &self,
        kind: TransactionKind,
        params: &TransactionParams,
    ) -> Result<CreatedTransaction, BackendError> {
        // Counted on entry so an in-flight create is observable; the lock is
        // not held across the scripted delay.
        let (delay, failure) = {
            let mut inner = self.inner.write().await;
            inner.created += 1;
            (inner.creation_delay, inner.creation_failure.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }
        let mut inner = self.inner.write().await;
        let id = TransactionId(format!("tx-{}", inner.next_id));
        inner.next_id += 1;
        inner.transactions.insert(
            id.clone(),
            TransactionRecord {
                id: id.clone(),
                kind,
                state: TransactionState::Pending,
                order_id: params.order_id.clone(),
            },
        );
        Ok(CreatedTransaction {
            id: id.clone(),
            session: SessionPayload(serde_json::json!({
                "formToken": format!("form-{id}"),
                "gatewayUrl": "https://gateway.example/checkout",
            })),
        })
    }

    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionRecord, BackendError> {
        let mut inner = self.inner.write().await;
        inner.polls_seen += 1;
        let confirmed = inner
            .confirm_after_polls
            .is_some_and(|polls| inner.polls_seen >= polls);
        let record = inner
            .transactions
            .get_mut(id)
            .ok_or_else(|| BackendError::Business {
                code: "not-found".into(),
                message: format!("no transaction {id}"),
            })?;
        if confirmed && record.state == TransactionState::Pending {
            record.state = TransactionState::Completed;
        }
        Ok(record.clone())
    }

    async fn cancel_transaction(&self, id: &TransactionId) -> Result<(), BackendError> {
        let mut inner = self.inner.write().await;
        inner.cancelled.push(id.clone());
        if let Some(record) = inner.transactions.get_mut(id) {
            record.state = TransactionState::Cancelled;
        }
        Ok(())
    }

    async fn submit_for_signature(
        &self,
        order_id: &OrderId,
    ) -> Result<SignatureInvitation, BackendError> {
        let (delay, failure) = {
            let mut inner = self.inner.write().await;
            inner.created += 1;
            (inner.creation_delay, inner.creation_failure.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }
        let mut inner = self.inner.write().await;
        inner.orders.insert(
            order_id.clone(),
            OrderRecord {
                id: order_id.clone(),
                signature_state: SignatureState::Invited,
            },
        );
        Ok(SignatureInvitation {
            invitation_link: format!("https://sign.example/invite/{order_id}"),
            contract_ids: vec![format!("contract-{order_id}")],
        })
    }

    async fn get_order(&self, id: &OrderId) -> Result<OrderRecord, BackendError> {
        let mut inner = self.inner.write().await;
        inner.polls_seen += 1;
        let signed = inner
            .confirm_after_polls
            .is_some_and(|polls| inner.polls_seen >= polls);
        let order = inner.orders.get_mut(id).ok_or_else(|| BackendError::Business {
            code: "not-found".into(),
            message: format!("no order {id}"),
        })?;
        if signed && order.signature_state == SignatureState::Invited {
            order.signature_state = SignatureState::Signed;
        }
        Ok(order.clone())
    }
}

/// Client-side cache of confirmed transactions.
#[derive(Default, Clone)]
pub struct InMemoryTransactionCache {
    records: Arc<RwLock<HashMap<TransactionId, TransactionRecord>>>,
}

impl InMemoryTransactionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionCache for InMemoryTransactionCache {
    async fn publish(&self, record: TransactionRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    async fn get(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.records.read().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::ProviderId;

    fn params() -> TransactionParams {
        TransactionParams {
            order_id: OrderId("order-7".into()),
            provider_id: ProviderId::from("giropay"),
            amount: None,
        }
    }

    #[tokio::test]
    async fn test_transaction_confirms_after_scripted_polls() {
        let backend = InMemoryBackend::new();
        backend.confirm_after_polls(Some(3)).await;
        let created = backend
            .create_transaction(TransactionKind::Payment, &params())
            .await
            .unwrap();

        for _ in 0..2 {
            let record = backend.get_transaction(&created.id).await.unwrap();
            assert_eq!(record.state, TransactionState::Pending);
        }
        let record = backend.get_transaction(&created.id).await.unwrap();
        assert_eq!(record.state, TransactionState::Completed);
    }

    #[tokio::test]
    async fn test_cancel_marks_record_and_is_recorded() {
        let backend = InMemoryBackend::new();
        let created = backend
            .create_transaction(TransactionKind::Payment, &params())
            .await
            .unwrap();
        backend.cancel_transaction(&created.id).await.unwrap();

        assert_eq!(backend.cancelled_ids().await, vec![created.id.clone()]);
        let record = backend.get_transaction(&created.id).await.unwrap();
        assert_eq!(record.state, TransactionState::Cancelled);
    }

    #[tokio::test]
    async fn test_scripted_creation_failure() {
        let backend = InMemoryBackend::new();
        backend
            .fail_creation_with(BackendError::Business {
                code: "capacity-exhausted".into(),
                message: "course is full".into(),
            })
            .await;

        let err = backend
            .create_transaction(TransactionKind::Payment, &params())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Business { code, .. } if code == "capacity-exhausted"));
        assert_eq!(backend.created_count().await, 1);
    }

    #[tokio::test]
    async fn test_cache_publish_and_get() {
        let cache = InMemoryTransactionCache::new();
        let id = TransactionId("tx-1".into());
        assert!(cache.get(&id).await.is_none());

        cache
            .publish(TransactionRecord {
                id: id.clone(),
                kind: TransactionKind::Payment,
                state: TransactionState::Completed,
                order_id: OrderId("order-7".into()),
            })
            .await;
        assert_eq!(cache.get(&id).await.unwrap().state, TransactionState::Completed);
    }
}
