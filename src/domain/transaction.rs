use crate::error::FlowError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Backend-assigned transaction identifier. Absent before creation; the
/// orchestrator only ever holds one once the backend has answered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the order a transaction pays for or signs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The three flows that share the confirmation machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Payment,
    InstallmentRetry,
    Signature,
}

/// Backend-side state of a transaction. Only `Completed` counts as confirmed;
/// everything else keeps the poller asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionState {
    pub fn is_confirmed(self) -> bool {
        self == TransactionState::Completed
    }
}

/// Signature progress of an order, polled for the e-signature flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureState {
    Unsigned,
    Invited,
    Signed,
}

/// A positive monetary amount.
///
/// Wrapper around `rust_decimal::Decimal` so a zero or negative charge can
/// never reach the backend port.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, FlowError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(FlowError::ValidationFailed {
                failures: vec![("amount".into(), "amount must be positive".into())],
            })
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = FlowError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Opaque provider session returned by the backend on creation (form token +
/// gateway URL, invitation link, ...). Never inspected by the orchestrator,
/// only handed to the provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload(pub serde_json::Value);

impl SessionPayload {
    pub fn empty() -> Self {
        Self(serde_json::Value::Null)
    }
}

/// What the user is committing to pay or sign, plus the payment brand (or
/// signature vendor) they picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionParams {
    pub order_id: OrderId,
    pub provider_id: super::provider::ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
}

/// Result of transaction creation: the id and the session needed to mount the
/// provider widget.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTransaction {
    pub id: TransactionId,
    pub session: SessionPayload,
}

/// Authoritative backend record, as read by the poller and published to the
/// client-side cache on confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub state: TransactionState,
    pub order_id: OrderId,
}

/// Signature invitation returned by `submit_for_signature`; its link is the
/// session payload of the signature flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInvitation {
    pub invitation_link: String,
    pub contract_ids: Vec<String>,
}

impl SignatureInvitation {
    pub fn to_session(&self) -> SessionPayload {
        SessionPayload(serde_json::json!({
            "invitationLink": self.invitation_link,
            "contractIds": self.contract_ids,
        }))
    }
}

/// Order view used by the signature flow's confirmation poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub signature_state: SignatureState,
}
