use super::cancel::CancelToken;
use super::poller::{self, PollOutcome, PollSettings};
use super::submit_hooks::SubmitHooks;
use crate::domain::ports::{BackendArc, CacheArc};
use crate::domain::provider::{ProviderRegistry, ProviderSignal};
use crate::domain::transaction::{
    CreatedTransaction, SignatureState, TransactionId, TransactionKind, TransactionParams,
    TransactionRecord, TransactionState,
};
use crate::error::{BackendError, FlowError, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// Observable state of one orchestration instance.
///
/// Strictly sequential: the state field itself is the mutual exclusion, a new
/// commit is accepted only from `Idle`. `Confirmed` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Idle,
    Loading,
    ProviderActive,
    Polling,
    Aborting,
    Confirmed(TransactionId),
    Error(FlowError),
}

/// How a `commit` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Confirmed(TransactionId),
    /// The machine was not `Idle`; nothing happened and no second transaction
    /// was created.
    Ignored,
    /// The owning UI tore the flow down mid-flight. The outcome is abandoned;
    /// nothing was published.
    Cancelled,
}

/// Sequences one delegated transaction: validate forms, create the backend
/// transaction, hand control to the vendor widget, then reconcile truth by
/// polling the backend. Used identically for order payment, installment retry
/// and contract signature; the `kind` picks the backend calls.
pub struct Orchestrator {
    kind: TransactionKind,
    backend: BackendArc,
    providers: Arc<ProviderRegistry>,
    cache: CacheArc,
    hooks: SubmitHooks,
    poll: PollSettings,
    state: watch::Sender<FlowState>,
    cancel: CancelToken,
}

impl Orchestrator {
    pub fn new(
        kind: TransactionKind,
        backend: BackendArc,
        providers: Arc<ProviderRegistry>,
        cache: CacheArc,
        poll: PollSettings,
    ) -> Self {
        let (state, _) = watch::channel(FlowState::Idle);
        Self {
            kind,
            backend,
            providers,
            cache,
            hooks: SubmitHooks::new(),
            poll,
            state,
            cancel: CancelToken::new(),
        }
    }

    pub fn payment(backend: BackendArc, providers: Arc<ProviderRegistry>, cache: CacheArc) -> Self {
        Self::new(
            TransactionKind::Payment,
            backend,
            providers,
            cache,
            PollSettings::PAYMENT,
        )
    }

    pub fn installment_retry(
        backend: BackendArc,
        providers: Arc<ProviderRegistry>,
        cache: CacheArc,
    ) -> Self {
        Self::new(
            TransactionKind::InstallmentRetry,
            backend,
            providers,
            cache,
            PollSettings::PAYMENT,
        )
    }

    pub fn signature(
        backend: BackendArc,
        providers: Arc<ProviderRegistry>,
        cache: CacheArc,
    ) -> Self {
        Self::new(
            TransactionKind::Signature,
            backend,
            providers,
            cache,
            PollSettings::SIGNATURE,
        )
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// The registry sibling form sections register their submit callbacks in.
    pub fn hooks(&self) -> &SubmitHooks {
        &self.hooks
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    pub fn last_error(&self) -> Option<FlowError> {
        match &*self.state.borrow() {
            FlowState::Error(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Token the owning UI cancels on unmount. After cancellation no timer or
    /// stray vendor callback can mutate state.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Explicit user retry: returns a terminal machine to `Idle` so a fresh
    /// commit can start. Never happens automatically.
    pub fn reset(&self) -> bool {
        self.state.send_if_modified(|state| match state {
            FlowState::Confirmed(_) | FlowState::Error(_) => {
                *state = FlowState::Idle;
                true
            }
            _ => false,
        })
    }

    /// Runs one full orchestration. A commit while the machine is not `Idle`
    /// is ignored; no second transaction is ever created by re-entry.
    pub async fn commit(&self, params: TransactionParams) -> Result<CommitOutcome> {
        let begun = self.state.send_if_modified(|state| {
            if *state == FlowState::Idle {
                *state = FlowState::Loading;
                true
            } else {
                false
            }
        });
        if !begun {
            debug!(kind = ?self.kind, "commit ignored, flow already in progress");
            return Ok(CommitOutcome::Ignored);
        }
        info!(kind = ?self.kind, order = %params.order_id, "flow committed");

        // Fail closed: every registered form must accept before anything is
        // created. A rejection returns the machine to Idle, not Error.
        if let Err(err) = self.hooks.run_all().await {
            self.set_state(FlowState::Idle);
            return Err(err);
        }

        // Resolve the adapter before creating anything, so an unknown id
        // cannot leave an orphaned backend transaction behind.
        let provider = match self.providers.resolve(&params.provider_id) {
            Ok(provider) => provider,
            Err(err) => return self.fail(err),
        };

        if self.cancel.is_cancelled() {
            return Ok(CommitOutcome::Cancelled);
        }

        // Creation itself is a suspension point: a cancel arriving mid-create
        // must keep the widget from ever mounting. The call runs on its own
        // task so a cancelled flow can still release whatever the backend
        // ends up creating.
        let mut creating = tokio::spawn({
            let backend = Arc::clone(&self.backend);
            let kind = self.kind;
            let params = params.clone();
            async move { create(kind, backend, params).await }
        });
        let finished = tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = &mut creating => Some(result),
        };
        let Some(result) = finished else {
            let backend = Arc::clone(&self.backend);
            tokio::spawn(async move {
                if let Ok(Ok(created)) = creating.await
                    && let Err(err) = backend.cancel_transaction(&created.id).await
                {
                    warn!(id = %created.id, %err, "failed to release cancelled transaction");
                }
            });
            return Ok(CommitOutcome::Cancelled);
        };
        let created = match result {
            Ok(Ok(created)) => created,
            Ok(Err(err)) => {
                warn!(kind = ?self.kind, %err, "transaction creation failed");
                return self.fail(FlowError::CreationFailed(err));
            }
            Err(err) => {
                warn!(%err, "transaction creation task failed");
                return self.fail(FlowError::CreationFailed(BackendError::Transport(
                    err.to_string(),
                )));
            }
        };
        info!(id = %created.id, "transaction created");

        let mut adapter = match provider.mount(&created.session) {
            Ok(adapter) => adapter,
            Err(err) => {
                self.release_in_background(&created.id);
                return self.fail(err);
            }
        };
        self.set_state(FlowState::ProviderActive);

        // Exactly one vendor signal is consumed; disposing the handle closes
        // the channel so a late stray callback lands nowhere.
        let signal = tokio::select! {
            _ = self.cancel.cancelled() => None,
            signal = adapter.signal() => {
                // A widget that disappears without reporting is a user abort
                // (page unload, vendor teardown).
                Some(signal.unwrap_or(ProviderSignal::Aborted))
            }
        };
        adapter.dispose();
        let Some(signal) = signal else {
            self.release_in_background(&created.id);
            return Ok(CommitOutcome::Cancelled);
        };

        match signal {
            ProviderSignal::Succeeded => self.confirm(&params, created).await,
            ProviderSignal::Aborted => {
                info!(id = %created.id, "user aborted at the provider widget");
                self.set_state(FlowState::Aborting);
                // Release held resources (e.g. a reserved course slot) before
                // settling. Failures are logged, never shown mid-abort.
                if let Err(err) = self.backend.cancel_transaction(&created.id).await {
                    warn!(id = %created.id, %err, "cancel_transaction failed after abort");
                }
                self.fail(FlowError::UserAborted)
            }
            ProviderSignal::Failed { code } => {
                warn!(id = %created.id, %code, "provider reported failure");
                self.fail(FlowError::ProviderError { code })
            }
        }
    }

    /// The vendor's success callback is only a hint: truth is established by
    /// polling the backend record within the bounded budget.
    async fn confirm(
        &self,
        params: &TransactionParams,
        created: CreatedTransaction,
    ) -> Result<CommitOutcome> {
        self.set_state(FlowState::Polling);

        let confirmed_record: Arc<Mutex<Option<TransactionRecord>>> = Arc::new(Mutex::new(None));
        let check = {
            let backend = Arc::clone(&self.backend);
            let slot = Arc::clone(&confirmed_record);
            let kind = self.kind;
            let id = created.id.clone();
            let order_id = params.order_id.clone();
            move || {
                let backend = Arc::clone(&backend);
                let slot = Arc::clone(&slot);
                let id = id.clone();
                let order_id = order_id.clone();
                async move {
                    match kind {
                        TransactionKind::Signature => match backend.get_order(&order_id).await {
                            Ok(order) if order.signature_state == SignatureState::Signed => {
                                *slot.lock().await = Some(TransactionRecord {
                                    id,
                                    kind,
                                    state: TransactionState::Completed,
                                    order_id: order.id,
                                });
                                true
                            }
                            Ok(_) => false,
                            Err(err) => {
                                // Transient errors consume a round.
                                debug!(%err, "order check failed, counting as unconfirmed");
                                false
                            }
                        },
                        _ => match backend.get_transaction(&id).await {
                            Ok(record) if record.state.is_confirmed() => {
                                *slot.lock().await = Some(record);
                                true
                            }
                            Ok(_) => false,
                            Err(err) => {
                                debug!(%err, "transaction check failed, counting as unconfirmed");
                                false
                            }
                        },
                    }
                }
            }
        };

        match poller::confirm(check, self.poll, &self.cancel).await {
            PollOutcome::Confirmed { attempts } => {
                info!(id = %created.id, attempts, "transaction confirmed");
                let record = confirmed_record.lock().await.take().unwrap_or(TransactionRecord {
                    id: created.id.clone(),
                    kind: self.kind,
                    state: TransactionState::Completed,
                    order_id: params.order_id.clone(),
                });
                // Publish so dependent UI sees the purchase without a refetch.
                self.cache.publish(record).await;
                self.set_state(FlowState::Confirmed(created.id.clone()));
                Ok(CommitOutcome::Confirmed(created.id))
            }
            PollOutcome::TimedOut => self.fail(FlowError::ConfirmationTimeout),
            PollOutcome::Cancelled => Ok(CommitOutcome::Cancelled),
        }
    }

    fn fail(&self, err: FlowError) -> Result<CommitOutcome> {
        self.set_state(FlowState::Error(err.clone()));
        Err(err)
    }

    /// Publishes a state transition unless the flow has been cancelled; a
    /// cancelled flow must never mutate observable state again.
    fn set_state(&self, next: FlowState) {
        if self.cancel.is_cancelled() {
            debug!(?next, "state change dropped after cancellation");
            return;
        }
        debug!(state = ?next, "flow state");
        self.state.send_replace(next);
    }

    /// Cancels the backend transaction without blocking teardown.
    fn release_in_background(&self, id: &TransactionId) {
        let backend = Arc::clone(&self.backend);
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.cancel_transaction(&id).await {
                warn!(%id, %err, "failed to release cancelled transaction");
            }
        });
    }
}

async fn create(
    kind: TransactionKind,
    backend: BackendArc,
    params: TransactionParams,
) -> Result<CreatedTransaction, BackendError> {
    match kind {
        TransactionKind::Payment | TransactionKind::InstallmentRetry => {
            backend.create_transaction(kind, &params).await
        }
        TransactionKind::Signature => {
            let invitation = backend.submit_for_signature(&params.order_id).await?;
            // The order is the trackable unit of the signature flow.
            Ok(CreatedTransaction {
                id: TransactionId(params.order_id.0.clone()),
                session: invitation.to_session(),
            })
        }
    }
}
