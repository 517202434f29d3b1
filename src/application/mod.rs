//! Application layer: the transaction orchestration state machine and its
//! supporting pieces (bounded confirmation poller, cancellation token, submit
//! callback registry).

pub mod cancel;
pub mod orchestrator;
pub mod poller;
pub mod submit_hooks;
