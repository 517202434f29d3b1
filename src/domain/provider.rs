use crate::domain::transaction::SessionPayload;
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Selects which concrete provider adapter handles a transaction. The set of
/// valid ids is closed and known at wiring time; resolving an unknown id is a
/// hard error, never a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The three signal shapes every vendor widget is normalized to. A vendor
/// `Succeeded` is a hint to start confirmation polling, not ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "lowercase")]
pub enum ProviderSignal {
    Succeeded,
    Failed { code: String },
    Aborted,
}

/// A mounted vendor widget.
///
/// Owns the widget's external resources (the signal-bridging task and any
/// teardown actions registered at mount). `dispose` is idempotent; dropping an
/// undisposed handle disposes it, so exactly one teardown runs no matter which
/// of success / error / abort / unmount comes first.
pub struct AdapterHandle {
    signals: mpsc::Receiver<ProviderSignal>,
    teardown: Vec<Box<dyn FnOnce() + Send>>,
    disposed: bool,
}

impl AdapterHandle {
    pub fn new(signals: mpsc::Receiver<ProviderSignal>) -> Self {
        Self {
            signals,
            teardown: Vec::new(),
            disposed: false,
        }
    }

    /// Registers a teardown action (abort a bridge task, remove an injected
    /// resource). Runs exactly once, on the first `dispose`.
    pub fn on_dispose(mut self, action: impl FnOnce() + Send + 'static) -> Self {
        self.teardown.push(Box::new(action));
        self
    }

    /// Waits for the next vendor signal. `None` means the widget went away
    /// without reporting an outcome (torn down, page unloading); callers treat
    /// that as an abort.
    pub async fn signal(&mut self) -> Option<ProviderSignal> {
        self.signals.recv().await
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.signals.close();
        for action in self.teardown.drain(..) {
            action();
        }
        tracing::debug!("provider adapter disposed");
    }
}

impl Drop for AdapterHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// One external payment brand or signature vendor, normalized to the
/// mount/signal/dispose surface. At most one handle may be mounted per
/// transaction; the orchestrator enforces that by construction.
pub trait Provider: Send + Sync {
    fn mount(&self, session: &SessionPayload) -> Result<AdapterHandle, FlowError>;
}

/// Closed map from provider id to adapter, fixed at wiring time.
///
/// A user who cannot pay must see an actionable message, so resolving an id
/// nobody registered fails fast instead of rendering nothing.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: std::collections::HashMap<ProviderId, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, id: impl Into<ProviderId>, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    pub fn resolve(&self, id: &ProviderId) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| FlowError::UnknownProvider(id.0.clone()))
    }
}
