use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("start step `{0}` is not defined in the manifest")]
    MissingStart(String),
    #[error("step `{step}` points to undefined step `{next}`")]
    DanglingNext { step: String, next: String },
    #[error("step chain revisits `{0}`")]
    Cycle(String),
}

/// One wizard step: its successor and optional presentation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Validated step graph: a `next`-pointer chain reachable from `start` that
/// terminates without revisiting a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawManifest")]
pub struct StepManifest {
    start: String,
    steps: HashMap<String, StepSpec>,
}

#[derive(Deserialize)]
struct RawManifest {
    start: String,
    steps: HashMap<String, StepSpec>,
}

impl TryFrom<RawManifest> for StepManifest {
    type Error = StepError;

    fn try_from(raw: RawManifest) -> Result<Self, Self::Error> {
        StepManifest::new(raw.start, raw.steps)
    }
}

impl StepManifest {
    pub fn new(start: String, steps: HashMap<String, StepSpec>) -> Result<Self, StepError> {
        if !steps.contains_key(&start) {
            return Err(StepError::MissingStart(start));
        }
        for (name, spec) in &steps {
            if let Some(next) = &spec.next
                && !steps.contains_key(next)
            {
                return Err(StepError::DanglingNext {
                    step: name.clone(),
                    next: next.clone(),
                });
            }
        }
        // Walk the chain from start; a revisit means a cycle.
        let mut visited = Vec::new();
        let mut cursor = Some(&start);
        while let Some(name) = cursor {
            if visited.contains(name) {
                return Err(StepError::Cycle(name.clone()));
            }
            visited.push(name.clone());
            cursor = steps[name].next.as_ref();
        }
        Ok(Self { start, steps })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn spec(&self, name: &str) -> Option<&StepSpec> {
        self.steps.get(name)
    }

    /// Display order, derived by walking `next` pointers from `start`. Map
    /// iteration order is never used; it does not preserve declaration order.
    pub fn ordered(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut cursor = Some(self.start.as_str());
        while let Some(name) = cursor {
            out.push(name);
            cursor = self.steps[name].next.as_deref();
        }
        out
    }
}

/// Sequences the wizard's visible steps. Pure presentation state: no side
/// effects, no validation, fully decoupled from the transaction machine.
#[derive(Debug, Clone)]
pub struct StepManager {
    manifest: StepManifest,
    current: Option<String>,
}

impl StepManager {
    pub fn new(manifest: StepManifest) -> Self {
        let current = Some(manifest.start().to_string());
        Self { manifest, current }
    }

    /// The active step name, or `None` once the final step has been advanced
    /// past (the wizard is done).
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Advances past the current step. Advancing the final step terminates the
    /// wizard; advancing a terminated wizard stays terminated.
    pub fn next(&mut self) {
        self.current = self
            .current
            .take()
            .and_then(|name| self.manifest.spec(&name))
            .and_then(|spec| spec.next.clone());
    }

    pub fn reset(&mut self) {
        self.current = Some(self.manifest.start().to_string());
    }

    pub fn manifest(&self) -> &StepManifest {
        &self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(chain: &[(&str, Option<&str>)]) -> Result<StepManifest, StepError> {
        let steps = chain
            .iter()
            .map(|(name, next)| {
                (
                    name.to_string(),
                    StepSpec {
                        next: next.map(str::to_string),
                        label: None,
                        icon: None,
                    },
                )
            })
            .collect();
        StepManifest::new(chain[0].0.to_string(), steps)
    }

    #[test]
    fn test_next_walks_chain_to_termination() {
        let m = manifest(&[
            ("cart", Some("address")),
            ("address", Some("payment")),
            ("payment", None),
        ])
        .unwrap();
        let mut mgr = StepManager::new(m);

        assert_eq!(mgr.current(), Some("cart"));
        mgr.next();
        assert_eq!(mgr.current(), Some("address"));
        mgr.next();
        assert_eq!(mgr.current(), Some("payment"));
        mgr.next();
        assert_eq!(mgr.current(), None);
        // Terminated stays terminated.
        mgr.next();
        assert_eq!(mgr.current(), None);
    }

    #[test]
    fn test_reset_returns_to_start_from_anywhere() {
        let m = manifest(&[("a", Some("b")), ("b", None)]).unwrap();
        let mut mgr = StepManager::new(m);
        mgr.next();
        mgr.next();
        assert_eq!(mgr.current(), None);
        mgr.reset();
        assert_eq!(mgr.current(), Some("a"));
    }

    #[test]
    fn test_ordered_ignores_map_order() {
        // Declared out of order on purpose; the walk must still be a→b→c.
        let m = manifest(&[("a", Some("b")), ("c", None), ("b", Some("c"))]).unwrap();
        assert_eq!(m.ordered(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rejects_cycle() {
        let err = manifest(&[("a", Some("b")), ("b", Some("a"))]).unwrap_err();
        assert_eq!(err, StepError::Cycle("a".to_string()));
    }

    #[test]
    fn test_rejects_dangling_next_and_missing_start() {
        assert!(matches!(
            manifest(&[("a", Some("ghost"))]),
            Err(StepError::DanglingNext { .. })
        ));
        assert!(matches!(
            StepManifest::new("nope".into(), HashMap::new()),
            Err(StepError::MissingStart(_))
        ));
    }

    #[test]
    fn test_manifest_deserializes_and_validates() {
        let json = r#"{
            "start": "cart",
            "steps": {
                "cart": { "next": "payment", "label": "Your cart" },
                "payment": { "next": null }
            }
        }"#;
        let m: StepManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.ordered(), vec!["cart", "payment"]);

        let bad = r#"{ "start": "cart", "steps": { "cart": { "next": "cart" } } }"#;
        assert!(serde_json::from_str::<StepManifest>(bad).is_err());
    }
}
