//! Responses returned by the Klarna api.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a payment session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Complete,
    Incomplete,
}

/// Status of a hosted payment page session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HppStatus {
    Waiting,
    Back,
    InProgress,
    ManualIdCheck,
    Completed,
    Cancelled,
    Failed,
    Disabled,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaymentMethodCategory {
    pub identifier: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Payment session as returned on creation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaymentSession {
    pub session_id: String,
    pub client_token: String,
    #[serde(default)]
    pub payment_method_categories: Vec<PaymentMethodCategory>,
}

/// Subset of a read payment session needed to check it is still usable.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaymentSessionDetails {
    pub status: Status,
    pub expires_at: DateTime<Utc>,
}

/// Hosted payment page session as returned on creation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostedPaymentPageSession {
    pub session_id: String,
    pub session_url: String,
    pub redirect_url: String,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub distribution_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Subset of a read hosted payment page session needed to check it is still
/// usable, or to confirm the order Klarna placed through it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostedPaymentPageSessionDetails {
    pub status: HppStatus,
    pub expires_at: DateTime<Utc>,
    /// Only set once the session completed in place order mode.
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Order created from an authorized payment session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub fraud_status: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub authorized_payment_method: Option<serde_json::Value>,
}

impl OrderResponse {
    pub fn is_accepted(&self) -> bool {
        self.fraud_status.eq_ignore_ascii_case("ACCEPTED")
    }
}
