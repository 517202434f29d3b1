use thiserror::Error;

/// Errors returned by the backend collaborator through the
/// [`TransactionBackend`](crate::domain::ports::TransactionBackend) port.
///
/// A `Business` error carries the backend's own rejection code (e.g. a course
/// with no remaining capacity); `Transport` covers everything that prevented an
/// answer from arriving at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("backend rejected the request: {code}: {message}")]
    Business { code: String, message: String },

    #[error("backend unreachable: {0}")]
    Transport(String),
}

/// Terminal error taxonomy of one orchestration attempt.
///
/// `ValidationFailed` is the only non-terminal kind: the machine returns to
/// `Idle` and the failing forms surface their own field-level messages. All
/// other kinds settle the orchestrator in its `Error` state; retrying is always
/// an explicit user action, never automatic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("transaction creation failed: {0}")]
    CreationFailed(#[source] BackendError),

    #[error("payment provider reported a failure: {code}")]
    ProviderError { code: String },

    #[error("no provider adapter registered for id `{0}`")]
    UnknownProvider(String),

    #[error("the transaction was cancelled by the user")]
    UserAborted,

    /// The poll budget ran out before the backend showed a terminal success.
    /// The underlying vendor operation may still complete later, so user-facing
    /// wording must say "check back", not "failed".
    #[error("the transaction could not be confirmed in time; it may still complete")]
    ConfirmationTimeout,

    #[error("{} submit callback(s) rejected: {}", failures.len(), summarize(failures))]
    ValidationFailed { failures: Vec<(String, String)> },
}

fn summarize(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(key, msg)| format!("{key}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl FlowError {
    /// Whether the failure was caused by the user closing the vendor widget.
    /// Abort messaging ("you cancelled") must differ from failure messaging.
    pub fn is_user_abort(&self) -> bool {
        matches!(self, FlowError::UserAborted)
    }
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
