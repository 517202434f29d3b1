use crate::error::{FlowError, Result};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

type SubmitFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type SubmitFn = Arc<dyn Fn() -> SubmitFuture + Send + Sync>;

/// Collection point where sibling form sections register their validate-and-
/// submit callbacks under distinct keys.
///
/// The orchestrator runs them all before creating a transaction; one rejection
/// blocks creation, but every callback still runs so each form can surface its
/// own field-level errors. Registration order does not matter, and clones share
/// the same registry so mount/unmount effects of arbitrarily many siblings can
/// register and unregister freely.
#[derive(Clone, Default)]
pub struct SubmitHooks {
    inner: Arc<RwLock<HashMap<String, SubmitFn>>>,
}

impl SubmitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` under `key`, replacing any previous registration for
    /// the same key.
    pub async fn register<F, Fut>(&self, key: impl Into<String>, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let hook: SubmitFn = Arc::new(move || Box::pin(hook()) as SubmitFuture);
        self.inner.write().await.insert(key.into(), hook);
    }

    pub async fn unregister(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Runs every registered callback and collects every rejection. Fails
    /// closed: any rejection yields `ValidationFailed` and the caller must not
    /// create a transaction.
    pub async fn run_all(&self) -> Result<()> {
        let hooks: Vec<(String, SubmitFn)> = {
            let guard = self.inner.read().await;
            let mut entries: Vec<_> = guard
                .iter()
                .map(|(key, hook)| (key.clone(), hook.clone()))
                .collect();
            // Deterministic run and report order.
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        };

        let mut failures = Vec::new();
        for (key, hook) in hooks {
            if let Err(message) = hook().await {
                tracing::debug!(key = %key, %message, "submit callback rejected");
                failures.push((key, message));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FlowError::ValidationFailed { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_run_all_empty_registry_passes() {
        let hooks = SubmitHooks::new();
        assert!(hooks.run_all().await.is_ok());
    }

    #[tokio::test]
    async fn test_one_rejection_fails_overall_but_all_hooks_run() {
        let hooks = SubmitHooks::new();
        let ran = Arc::new(AtomicU32::new(0));

        let seen = ran.clone();
        hooks
            .register("full-name", move || {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        hooks
            .register("withdrawal-right", || async {
                Err("checkbox must be ticked".to_string())
            })
            .await;
        let seen = ran.clone();
        hooks
            .register("address", move || {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        let err = hooks.run_all().await.unwrap_err();
        assert_eq!(
            err,
            FlowError::ValidationFailed {
                failures: vec![(
                    "withdrawal-right".to_string(),
                    "checkbox must be ticked".to_string()
                )],
            }
        );
        // Both accepting hooks still ran despite the rejection.
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unregister_removes_hook() {
        let hooks = SubmitHooks::new();
        hooks
            .register("doomed", || async { Err("always rejects".to_string()) })
            .await;
        hooks.unregister("doomed").await;
        assert!(hooks.run_all().await.is_ok());
        assert!(hooks.is_empty().await);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_previous_hook() {
        let hooks = SubmitHooks::new();
        hooks
            .register("form", || async { Err("old".to_string()) })
            .await;
        hooks.register("form", || async { Ok(()) }).await;
        assert_eq!(hooks.len().await, 1);
        assert!(hooks.run_all().await.is_ok());
    }
}
