use crate::domain::provider::{AdapterHandle, Provider, ProviderSignal};
use crate::domain::transaction::SessionPayload;
use crate::error::{FlowError, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Provider double that plays back a fixed script of vendor signals, each
/// after its own delay. Stands in for a real widget in the simulator and in
/// timing tests; disposing the handle aborts the playback task, which is the
/// "remove injected vendor resources" part of a real adapter.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Vec<(Duration, ProviderSignal)>,
}

impl ScriptedProvider {
    pub fn scripted(script: Vec<(Duration, ProviderSignal)>) -> Self {
        Self { script }
    }

    pub fn succeeding_after(delay: Duration) -> Self {
        Self::scripted(vec![(delay, ProviderSignal::Succeeded)])
    }

    pub fn aborting_after(delay: Duration) -> Self {
        Self::scripted(vec![(delay, ProviderSignal::Aborted)])
    }

    pub fn failing_with(code: impl Into<String>, delay: Duration) -> Self {
        Self::scripted(vec![(delay, ProviderSignal::Failed { code: code.into() })])
    }

    /// A widget that never reports anything.
    pub fn silent() -> Self {
        Self::scripted(Vec::new())
    }
}

impl Provider for ScriptedProvider {
    fn mount(&self, _session: &SessionPayload) -> Result<AdapterHandle, FlowError> {
        let (tx, rx) = mpsc::channel(4);
        let script = self.script.clone();
        let playback = tokio::spawn(async move {
            for (delay, signal) in script {
                tokio::time::sleep(delay).await;
                if tx.send(signal).await.is_err() {
                    return;
                }
            }
            // Keep the channel open: a real widget stays mounted (silently)
            // until it is disposed, it does not vanish after its last signal.
            let _keep_alive = tx;
            std::future::pending::<()>().await;
        });
        Ok(AdapterHandle::new(rx).on_dispose(move || playback.abort()))
    }
}

/// Provider double whose signals are pushed by the test itself, so races like
/// "stray success arriving after an abort" can be staged deterministically.
/// Also counts mounts, making the one-adapter-per-transaction invariant
/// assertable.
#[derive(Default, Clone)]
pub struct ManualProvider {
    handle: Arc<Mutex<Option<mpsc::Sender<ProviderSignal>>>>,
    mounts: Arc<Mutex<u32>>,
}

impl ManualProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender for the most recently mounted widget.
    pub fn signals(&self) -> Option<mpsc::Sender<ProviderSignal>> {
        self.handle.lock().expect("provider lock poisoned").clone()
    }

    pub fn mounts(&self) -> u32 {
        *self.mounts.lock().expect("provider lock poisoned")
    }

    /// Simulates the widget vanishing without reporting an outcome (page
    /// unload, vendor-side teardown): the signal channel closes.
    pub fn drop_widget(&self) {
        *self.handle.lock().expect("provider lock poisoned") = None;
    }
}

impl Provider for ManualProvider {
    fn mount(&self, _session: &SessionPayload) -> Result<AdapterHandle, FlowError> {
        let (tx, rx) = mpsc::channel(4);
        *self.handle.lock().expect("provider lock poisoned") = Some(tx);
        *self.mounts.lock().expect("provider lock poisoned") += 1;
        Ok(AdapterHandle::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_plays_signal() {
        let provider = ScriptedProvider::failing_with("card-declined", Duration::from_millis(5));
        let mut handle = provider.mount(&SessionPayload::empty()).unwrap();

        assert_eq!(
            handle.signal().await,
            Some(ProviderSignal::Failed {
                code: "card-declined".into()
            })
        );
    }

    #[tokio::test]
    async fn test_dispose_stops_playback() {
        let provider = ScriptedProvider::succeeding_after(Duration::from_secs(3600));
        let mut handle = provider.mount(&SessionPayload::empty()).unwrap();
        handle.dispose();
        // Closed on dispose: no signal can ever arrive.
        assert_eq!(handle.signal().await, None);
    }

    #[tokio::test]
    async fn test_manual_provider_counts_mounts_and_forwards() {
        let provider = ManualProvider::new();
        assert!(provider.signals().is_none());

        let mut handle = provider.mount(&SessionPayload::empty()).unwrap();
        assert_eq!(provider.mounts(), 1);

        provider
            .signals()
            .unwrap()
            .send(ProviderSignal::Succeeded)
            .await
            .unwrap();
        assert_eq!(handle.signal().await, Some(ProviderSignal::Succeeded));
    }
}
