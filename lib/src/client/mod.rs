//! Klarna api client.
//!
//! The [`Client`] trait is the seam between the checkout flow and Klarna.
//! [`HttpClient`] talks to the real api; tests plug in scripted clients.

pub mod hpp;
pub mod http;
pub mod request;
pub mod response;

pub use self::http::HttpClient;
pub use hpp::HostedPaymentPage;
pub use request::{Amount, Payment, PaymentCountry};
pub use response::{
    HostedPaymentPageSession, HostedPaymentPageSessionDetails, HppStatus, OrderResponse,
    PaymentSession, PaymentSessionDetails, Status,
};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Klarna data center the merchant account lives in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerRegion {
    #[default]
    Europe,
    NorthAmerica,
    Oceania,
}

impl ServerRegion {
    /// Api base url for the region.
    pub fn base_url(&self, playground: bool) -> &'static str {
        match (self, playground) {
            (Self::Europe, false) => "https://api.klarna.com",
            (Self::Europe, true) => "https://api.playground.klarna.com",
            (Self::NorthAmerica, false) => "https://api-na.klarna.com",
            (Self::NorthAmerica, true) => "https://api-na.playground.klarna.com",
            (Self::Oceania, false) => "https://api-oc.klarna.com",
            (Self::Oceania, true) => "https://api-oc.playground.klarna.com",
        }
    }
}

/// Basic auth credentials of a merchant.
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization {
    pub username: String,
    pub password: String,
}

impl Authorization {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorization")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Everything needed to address the api on behalf of a merchant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiContext {
    pub authorization: Authorization,
    pub region: ServerRegion,
    pub playground: bool,
}

impl ApiContext {
    pub fn new(authorization: Authorization, region: ServerRegion, playground: bool) -> Self {
        Self {
            authorization,
            region,
            playground,
        }
    }
}

/// Remote operations the checkout flow relies on.
///
/// Implementations report api failures as
/// [`ErrorKind::ProviderError`](crate::ErrorKind::ProviderError) and
/// transport failures as [`ErrorKind::ReqwestError`](crate::ErrorKind::ReqwestError).
/// Retrying, if desired, is up to the implementation.
#[async_trait::async_trait]
pub trait Client: Send + Sync {
    async fn create_payment_session(
        &self,
        context: &ApiContext,
        payment: &Payment,
    ) -> Result<PaymentSession>;

    async fn create_hosted_payment_page_session(
        &self,
        context: &ApiContext,
        page: &HostedPaymentPage,
    ) -> Result<HostedPaymentPageSession>;

    async fn read_payment_session(
        &self,
        context: &ApiContext,
        session_id: &str,
    ) -> Result<PaymentSessionDetails>;

    async fn read_hosted_payment_page_session(
        &self,
        context: &ApiContext,
        session_id: &str,
    ) -> Result<HostedPaymentPageSessionDetails>;

    /// Places an order for an authorized payment session.
    async fn create_order(
        &self,
        context: &ApiContext,
        payment: &Payment,
        authorization_token: &str,
    ) -> Result<OrderResponse>;

    /// Url identifying the payment session, as referenced by hosted payment
    /// page sessions.
    fn payment_session_url(&self, context: &ApiContext, session_id: &str) -> Result<String>;
}
