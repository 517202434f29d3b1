use super::transaction::{
    CreatedTransaction, OrderId, OrderRecord, SignatureInvitation, TransactionId,
    TransactionKind, TransactionParams, TransactionRecord,
};
use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::Arc;

/// The backend collaborator that owns transaction truth.
///
/// `get_transaction` and `get_order` must be safe to call repeatedly; the
/// bounded poller hits them once per round.
#[async_trait]
pub trait TransactionBackend: Send + Sync {
    async fn create_transaction(
        &self,
        kind: TransactionKind,
        params: &TransactionParams,
    ) -> Result<CreatedTransaction, BackendError>;

    async fn get_transaction(&self, id: &TransactionId)
    -> Result<TransactionRecord, BackendError>;

    /// Releases whatever the backend is holding for an aborted transaction
    /// (e.g. a reserved course slot). Fire-and-forget from the orchestrator's
    /// point of view; failures are logged, never shown mid-abort.
    async fn cancel_transaction(&self, id: &TransactionId) -> Result<(), BackendError>;

    async fn submit_for_signature(
        &self,
        order_id: &OrderId,
    ) -> Result<SignatureInvitation, BackendError>;

    async fn get_order(&self, id: &OrderId) -> Result<OrderRecord, BackendError>;
}

/// Client-side cache of confirmed transactions, so dependent UI ("already
/// purchased") reflects a just-confirmed transaction without a refetch. The
/// orchestrator is the sole writer for its transaction id.
#[async_trait]
pub trait TransactionCache: Send + Sync {
    async fn publish(&self, record: TransactionRecord);
    async fn get(&self, id: &TransactionId) -> Option<TransactionRecord>;
}

pub type BackendArc = Arc<dyn TransactionBackend>;
pub type CacheArc = Arc<dyn TransactionCache>;
