use crate::application::orchestrator::Orchestrator;
use crate::application::poller::PollSettings;
use crate::domain::provider::{ProviderId, ProviderRegistry};
use crate::domain::steps::StepManifest;
use crate::domain::transaction::{Amount, OrderId, TransactionKind, TransactionParams};
use crate::error::BackendError;
use crate::infrastructure::in_memory::{InMemoryBackend, InMemoryTransactionCache};
use crate::infrastructure::providers::ScriptedProvider;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("cannot read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed scenario file: {0}")]
    Json(#[from] serde_json::Error),
}

/// How the simulated vendor widget behaves once mounted.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum WidgetOutcome {
    Succeed,
    Abort,
    Fail { code: String },
    /// Widget never reports; the flow only ends via cancellation.
    Silent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetSpec {
    #[serde(flatten)]
    pub outcome: WidgetOutcome,
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSpec {
    /// Status reads before the backend reports terminal success; `null` means
    /// it never does.
    #[serde(default = "default_confirm_after")]
    pub confirm_after_polls: Option<u32>,
    #[serde(default)]
    pub fail_creation: Option<CreationFailure>,
}

impl Default for BackendSpec {
    fn default() -> Self {
        Self {
            confirm_after_polls: default_confirm_after(),
            fail_creation: None,
        }
    }
}

fn default_confirm_after() -> Option<u32> {
    Some(1)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreationFailure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollSpec {
    pub limit: u32,
    pub interval_ms: u64,
}

/// One simulator run: which flow, how the backend and widget behave, and an
/// optional wizard manifest advanced on confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub flow: TransactionKind,
    pub order_id: String,
    pub provider: String,
    #[serde(default)]
    pub amount: Option<Amount>,
    pub widget: WidgetSpec,
    #[serde(default)]
    pub backend: BackendSpec,
    #[serde(default)]
    pub poll: Option<PollSpec>,
    /// Simulated page unmount: fire the orchestrator's cancel token after this
    /// many milliseconds. The only way a `silent` widget scenario terminates.
    #[serde(default)]
    pub unmount_after_ms: Option<u64>,
    #[serde(default)]
    pub wizard: Option<StepManifest>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn params(&self) -> TransactionParams {
        TransactionParams {
            order_id: OrderId(self.order_id.clone()),
            provider_id: ProviderId::from(self.provider.clone()),
            amount: self.amount,
        }
    }

    fn scripted_widget(&self) -> ScriptedProvider {
        let delay = Duration::from_millis(self.widget.delay_ms);
        match &self.widget.outcome {
            WidgetOutcome::Succeed => ScriptedProvider::succeeding_after(delay),
            WidgetOutcome::Abort => ScriptedProvider::aborting_after(delay),
            WidgetOutcome::Fail { code } => ScriptedProvider::failing_with(code.clone(), delay),
            WidgetOutcome::Silent => ScriptedProvider::silent(),
        }
    }

    /// Assembles backend, cache and orchestrator exactly as the scenario
    /// scripts them.
    pub async fn build(&self) -> (Orchestrator, InMemoryBackend, InMemoryTransactionCache) {
        let backend = InMemoryBackend::new();
        backend.confirm_after_polls(self.backend.confirm_after_polls).await;
        if let Some(failure) = &self.backend.fail_creation {
            backend
                .fail_creation_with(BackendError::Business {
                    code: failure.code.clone(),
                    message: failure.message.clone(),
                })
                .await;
        }

        let cache = InMemoryTransactionCache::new();
        let registry = Arc::new(
            ProviderRegistry::new().register(self.provider.clone(), Arc::new(self.scripted_widget())),
        );

        let mut orchestrator = match self.flow {
            TransactionKind::Payment => {
                Orchestrator::payment(Arc::new(backend.clone()), registry, Arc::new(cache.clone()))
            }
            TransactionKind::InstallmentRetry => Orchestrator::installment_retry(
                Arc::new(backend.clone()),
                registry,
                Arc::new(cache.clone()),
            ),
            TransactionKind::Signature => Orchestrator::signature(
                Arc::new(backend.clone()),
                registry,
                Arc::new(cache.clone()),
            ),
        };
        if let Some(poll) = &self.poll {
            orchestrator = orchestrator.with_poll_settings(PollSettings {
                limit: poll.limit,
                interval: Duration::from_millis(poll.interval_ms),
            });
        }
        (orchestrator, backend, cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_parses_with_defaults() {
        let json = r#"{
            "flow": "payment",
            "order_id": "order-1",
            "provider": "giropay",
            "amount": "149.90",
            "widget": { "outcome": "succeed", "delay_ms": 5 }
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert_eq!(scenario.flow, TransactionKind::Payment);
        assert_eq!(scenario.backend.confirm_after_polls, Some(1));
        assert!(scenario.poll.is_none());
        assert!(scenario.unmount_after_ms.is_none());
        assert!(scenario.wizard.is_none());
    }

    #[test]
    fn test_scenario_parses_silent_widget_with_unmount() {
        let json = r#"{
            "flow": "payment",
            "order_id": "order-3",
            "provider": "giropay",
            "widget": { "outcome": "silent" },
            "unmount_after_ms": 50
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert!(matches!(scenario.widget.outcome, WidgetOutcome::Silent));
        assert_eq!(scenario.unmount_after_ms, Some(50));
    }

    #[test]
    fn test_scenario_parses_failure_widget_and_wizard() {
        let json = r#"{
            "flow": "signature",
            "order_id": "order-2",
            "provider": "esign",
            "widget": { "outcome": "fail", "code": "session-expired" },
            "poll": { "limit": 3, "interval_ms": 50 },
            "wizard": {
                "start": "contract",
                "steps": {
                    "contract": { "next": "sign" },
                    "sign": { "next": null }
                }
            }
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert!(matches!(
            scenario.widget.outcome,
            WidgetOutcome::Fail { ref code } if code == "session-expired"
        ));
        assert_eq!(scenario.wizard.unwrap().ordered(), vec!["contract", "sign"]);
    }
}
