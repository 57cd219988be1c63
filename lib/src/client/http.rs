use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::{ErrorKind, Result};

use super::{
    ApiContext, Client, HostedPaymentPage, HostedPaymentPageSession,
    HostedPaymentPageSessionDetails, OrderResponse, Payment, PaymentSession,
    PaymentSessionDetails,
};

const PAYMENT_SESSIONS_PATH: &[&str] = &["payments", "v1", "sessions"];
const HPP_SESSIONS_PATH: &[&str] = &["hpp", "v1", "sessions"];
const AUTHORIZATIONS_PATH: &[&str] = &["payments", "v1", "authorizations"];

/// [`Client`] implementation talking json over https to the Klarna api.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    /// Replaces the region derived base url, mostly useful for testing.
    base_url: Option<String>,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            inner,
            base_url: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Builds the endpoint url below the api base. Every segment is percent
    /// encoded on its own, so ids handed in by callers cannot leave their
    /// path segment.
    fn endpoint(&self, context: &ApiContext, path: &[&str], ids: &[&str]) -> Result<Url> {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| context.region.base_url(context.playground));
        let mut url = Url::parse(base)?;
        url.path_segments_mut()
            .map_err(|_| ErrorKind::Other(format!("not a base url: {}", base)))?
            .pop_if_empty()
            .extend(path)
            .extend(ids);
        Ok(url)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        context: &ApiContext,
        url: Url,
        body: &B,
    ) -> Result<T> {
        debug!("POST {}", url);
        let response = self
            .inner
            .post(url)
            .basic_auth(
                &context.authorization.username,
                Some(&context.authorization.password),
            )
            .json(body)
            .send()
            .await?;
        parse(response).await
    }

    async fn get<T: DeserializeOwned>(&self, context: &ApiContext, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .inner
            .get(url)
            .basic_auth(
                &context.authorization.username,
                Some(&context.authorization.password),
            )
            .send()
            .await?;
        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ErrorKind::ProviderError { status, body }.into());
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait::async_trait]
impl Client for HttpClient {
    async fn create_payment_session(
        &self,
        context: &ApiContext,
        payment: &Payment,
    ) -> Result<PaymentSession> {
        let url = self.endpoint(context, PAYMENT_SESSIONS_PATH, &[])?;
        self.post(context, url, payment).await
    }

    async fn create_hosted_payment_page_session(
        &self,
        context: &ApiContext,
        page: &HostedPaymentPage,
    ) -> Result<HostedPaymentPageSession> {
        let url = self.endpoint(context, HPP_SESSIONS_PATH, &[])?;
        self.post(context, url, page).await
    }

    async fn read_payment_session(
        &self,
        context: &ApiContext,
        session_id: &str,
    ) -> Result<PaymentSessionDetails> {
        let url = self.endpoint(context, PAYMENT_SESSIONS_PATH, &[session_id])?;
        self.get(context, url).await
    }

    async fn read_hosted_payment_page_session(
        &self,
        context: &ApiContext,
        session_id: &str,
    ) -> Result<HostedPaymentPageSessionDetails> {
        let url = self.endpoint(context, HPP_SESSIONS_PATH, &[session_id])?;
        self.get(context, url).await
    }

    async fn create_order(
        &self,
        context: &ApiContext,
        payment: &Payment,
        authorization_token: &str,
    ) -> Result<OrderResponse> {
        let url = self.endpoint(context, AUTHORIZATIONS_PATH, &[authorization_token, "order"])?;
        self.post(context, url, payment).await
    }

    fn payment_session_url(&self, context: &ApiContext, session_id: &str) -> Result<String> {
        Ok(self
            .endpoint(context, PAYMENT_SESSIONS_PATH, &[session_id])?
            .into())
    }
}
