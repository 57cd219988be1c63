//! Checkout session orchestration.
//!
//! [`Checkout::proceed`] walks a payment through the Klarna session stages:
//!
//! ```text
//! NoSession ──create──▶ SessionCreated ──create──▶ HostedPageCreated ──▶ redirect
//! ```
//!
//! Every artifact is persisted on the payment as soon as Klarna returns it,
//! so a run that fails halfway resumes from the last completed stage. An
//! artifact loaded from the store was minted on an earlier request and is
//! checked against Klarna before it is reused; artifacts minted within the
//! same run are trusted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::client::{
    ApiContext, Client, HppStatus, HttpClient, OrderResponse, PaymentSessionDetails, Status,
};
use crate::config::Config;
use crate::converter::{
    CallbackUrls, DefaultHostedPaymentPageConverter, HostedPaymentPageConverter, LineBuilder,
    OrderPaymentConverter, PaymentConverter,
};
use crate::db::{Store, StoreExt};
use crate::payment::{PaymentDetails, PaymentId, Stage, Status as PaymentStatus};
use crate::resolver::DefaultPaymentCountryResolver;
use crate::token::{Token, TokenIssuer, UrlTokenIssuer};
use crate::{ErrorKind, Order, Payment, Result};

/// Source of the current time, swappable so that expiry can be tested.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Url the customer's browser should be sent to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectTarget(pub String);

impl RedirectTarget {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per payment async locks, so that two requests for the same payment never
/// interleave their session creation.
///
/// Only covers runs within one process.
#[derive(Default)]
pub struct PaymentLocks {
    inner: std::sync::Mutex<FnvHashMap<PaymentId, Arc<Mutex<()>>>>,
}

impl PaymentLocks {
    pub async fn lock(&self, payment: PaymentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // drop locks nobody holds or waits for anymore
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(payment).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Orchestrates Klarna payment and hosted payment page sessions for
/// storefront payments.
pub struct Checkout {
    client: Arc<dyn Client>,
    store: Arc<dyn Store>,
    payment_converter: Arc<dyn PaymentConverter>,
    page_converter: Arc<dyn HostedPaymentPageConverter>,
    issuer: Arc<dyn TokenIssuer>,
    context: ApiContext,
    clock: Clock,
    locks: PaymentLocks,
}

impl Checkout {
    pub fn new(
        client: Arc<dyn Client>,
        store: Arc<dyn Store>,
        payment_converter: Arc<dyn PaymentConverter>,
        page_converter: Arc<dyn HostedPaymentPageConverter>,
        issuer: Arc<dyn TokenIssuer>,
        context: ApiContext,
    ) -> Self {
        Self {
            client,
            store,
            payment_converter,
            page_converter,
            issuer,
            context,
            clock: Arc::new(Utc::now),
            locks: PaymentLocks::default(),
        }
    }

    /// Wires up the default collaborators from application config.
    pub fn from_config(config: &Config, store: impl Store + 'static) -> Result<Self> {
        let mut client = HttpClient::new()?;
        if let Some(api_url) = &config.klarna.api_url {
            client = client.with_base_url(api_url.as_str());
        }

        let base_url = config.base_url();
        let payment_converter = OrderPaymentConverter::new(
            Arc::new(DefaultPaymentCountryResolver::default()),
            LineBuilder::new(base_url.as_str(), config.product_images.clone()),
        );
        let page_converter = DefaultHostedPaymentPageConverter::new(
            config.hpp.options.clone(),
            config.hpp.profile_id.clone(),
        );
        let mut issuer = UrlTokenIssuer::new(&base_url)?;
        if let Some(after_url) = &config.after_url {
            issuer = issuer.with_after_url(after_url.as_str());
        }

        Ok(Self::new(
            Arc::new(client),
            Arc::new(store),
            Arc::new(payment_converter),
            Arc::new(page_converter),
            Arc::new(issuer),
            config.klarna.api_context(),
        ))
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn issuer(&self) -> &dyn TokenIssuer {
        self.issuer.as_ref()
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn client(&self) -> &dyn Client {
        self.client.as_ref()
    }

    pub fn context(&self) -> &ApiContext {
        &self.context
    }

    /// Issues and stores the token the customer starts the checkout with.
    pub fn capture_token(&self, payment: PaymentId) -> Result<Token> {
        // make sure the payment exists before handing out urls for it
        self.store.get::<Payment>(payment)?;
        let token = self.issuer.capture_token(payment)?;
        self.store.set(&token)?;
        Ok(token)
    }

    /// Looks up a previously issued token by its hash.
    pub fn find_token(&self, hash: uuid::Uuid) -> Result<Token> {
        self.store.get::<Token>(hash)
    }

    /// Creates or resumes the Klarna sessions for the payment and returns
    /// the hosted payment page url to send the customer to.
    ///
    /// Fails with [`ErrorKind::SessionExpired`] or
    /// [`ErrorKind::SessionAlreadyConsumed`] when previously created sessions
    /// can no longer be used, in which case the caller is expected to
    /// [`cancel`](Self::cancel) and start over. Stored details that do not
    /// make sense fail with [`ErrorKind::InvalidStoredState`] before any call
    /// to Klarna is made.
    pub async fn proceed(&self, payment_id: PaymentId, capture: &Token) -> Result<RedirectTarget> {
        let _guard = self.locks.lock(payment_id).await;
        self.proceed_locked(payment_id, capture)
            .await
            .map_err(|e| e.with_payment(payment_id))
    }

    async fn proceed_locked(
        &self,
        payment_id: PaymentId,
        capture: &Token,
    ) -> Result<RedirectTarget> {
        if capture.payment != payment_id {
            return Err(ErrorKind::BadInput(format!(
                "token {} was not issued for this payment",
                capture.hash
            ))
            .into());
        }

        let mut payment = self.store.get::<Payment>(payment_id)?;
        let mut details = PaymentDetails::from_stored(&payment.details)?;
        let loaded = details.stage();
        info!(payment = %payment.id, stage = ?loaded, "proceeding with checkout");

        if loaded == Stage::OrderPlaced {
            return Err(ErrorKind::SessionAlreadyConsumed.into());
        }

        if loaded == Stage::NoSession {
            let order = self.store.get::<Order>(payment.order)?;
            let request = self.payment_converter.convert(&order, &payment, None)?;
            let session = self
                .client
                .create_payment_session(&self.context, &request)
                .await?;
            details.set_payment_session(&session)?;
            self.save(&mut payment, &details)?;
            info!(payment = %payment.id, session = %session.session_id, "created payment session");
        } else if loaded == Stage::SessionCreated {
            let session_id = stored(details.payment_session_id())?;
            let remote = self
                .client
                .read_payment_session(&self.context, session_id)
                .await?;
            self.check_payment_session(&remote)?;
            details.set_payment_session_details(&remote)?;
            self.save(&mut payment, &details)?;
        }

        if details.stage() == Stage::SessionCreated {
            let session_id = stored(details.payment_session_id())?.to_string();
            let notify = self.issuer.notify_token(capture)?;
            let cancel = self.issuer.cancel_token(capture)?;
            let urls = CallbackUrls {
                confirmation: capture.target_url.clone(),
                notification: notify.target_url.clone(),
                back: cancel.target_url.clone(),
                cancel: cancel.target_url.clone(),
                error: cancel.target_url.clone(),
                failure: cancel.target_url.clone(),
            };
            let page = self.page_converter.convert(
                urls,
                self.client.payment_session_url(&self.context, &session_id)?,
            )?;
            self.store.set(&notify)?;
            self.store.set(&cancel)?;
            let session = self
                .client
                .create_hosted_payment_page_session(&self.context, &page)
                .await?;
            details.set_hosted_payment_page(&session)?;
            payment.status = PaymentStatus::Pending;
            self.save(&mut payment, &details)?;
            info!(
                payment = %payment.id,
                hosted_payment_page = %session.session_id,
                "created hosted payment page session"
            );
            return Ok(RedirectTarget(session.redirect_url));
        }

        // hosted page was created on an earlier request
        let page_id = stored(details.hosted_payment_page_id())?;
        let remote = self
            .client
            .read_hosted_payment_page_session(&self.context, page_id)
            .await?;
        if remote.status == HppStatus::Completed {
            return Err(ErrorKind::SessionAlreadyConsumed.into());
        }
        if self.now() >= remote.expires_at {
            return Err(ErrorKind::SessionExpired.into());
        }
        info!(payment = %payment.id, hosted_payment_page = %page_id, "reusing hosted payment page session");
        Ok(RedirectTarget(
            stored(details.hosted_payment_page_redirect_url())?.to_string(),
        ))
    }

    /// Places the Klarna order once the customer returns from the hosted
    /// payment page with an authorization token.
    ///
    /// `page_session` is the hosted payment page session id Klarna passes
    /// back along with the token. When given it has to match the stored one.
    pub async fn complete(
        &self,
        payment_id: PaymentId,
        authorization_token: &str,
        page_session: Option<&str>,
    ) -> Result<OrderResponse> {
        let _guard = self.locks.lock(payment_id).await;
        self.complete_locked(payment_id, authorization_token, page_session)
            .await
            .map_err(|e| e.with_payment(payment_id))
    }

    async fn complete_locked(
        &self,
        payment_id: PaymentId,
        authorization_token: &str,
        page_session: Option<&str>,
    ) -> Result<OrderResponse> {
        check_authorization_token(authorization_token)?;

        let mut payment = self.store.get::<Payment>(payment_id)?;
        let mut details = PaymentDetails::from_stored(&payment.details)?;
        check_order_stage(&details)?;
        check_page_session(&details, page_session)?;

        let order = self.store.get::<Order>(payment.order)?;
        let request = self.payment_converter.convert(&order, &payment, None)?;
        let response = self
            .client
            .create_order(&self.context, &request, authorization_token)
            .await?;

        details.set_order_id(response.order_id.clone())?;
        payment.status = if response.is_accepted() {
            PaymentStatus::Successful { time: self.now() }
        } else {
            PaymentStatus::Pending
        };
        self.save(&mut payment, &details)?;
        info!(
            payment = %payment.id,
            order = %response.order_id,
            fraud_status = %response.fraud_status,
            "placed klarna order"
        );

        Ok(response)
    }

    /// Records the order Klarna placed itself when the hosted payment page
    /// runs in place order or capture order mode, and marks the payment
    /// successful.
    ///
    /// The hosted payment page session is read back first: it has to be
    /// completed, and the order id it reports, if any, has to be the one the
    /// customer returned with. Confirming the same order again is a no-op.
    pub async fn confirm_order(
        &self,
        payment_id: PaymentId,
        order_id: &str,
        page_session: Option<&str>,
    ) -> Result<Payment> {
        let _guard = self.locks.lock(payment_id).await;
        self.confirm_order_locked(payment_id, order_id, page_session)
            .await
            .map_err(|e| e.with_payment(payment_id))
    }

    async fn confirm_order_locked(
        &self,
        payment_id: PaymentId,
        order_id: &str,
        page_session: Option<&str>,
    ) -> Result<Payment> {
        if order_id.is_empty() {
            return Err(ErrorKind::BadInput("empty order id".to_string()).into());
        }

        let mut payment = self.store.get::<Payment>(payment_id)?;
        let mut details = PaymentDetails::from_stored(&payment.details)?;
        if details.order_id() == Some(order_id)
            && matches!(payment.status, PaymentStatus::Successful { .. })
        {
            return Ok(payment);
        }
        check_order_stage(&details)?;
        check_page_session(&details, page_session)?;

        let page_id = stored(details.hosted_payment_page_id())?;
        let remote = self
            .client
            .read_hosted_payment_page_session(&self.context, page_id)
            .await?;
        if remote.status != HppStatus::Completed {
            return Err(ErrorKind::BadInput(format!(
                "hosted payment page session is {}",
                remote.status
            ))
            .into());
        }
        if let Some(remote_order) = remote.order_id.as_deref() {
            if remote_order != order_id {
                return Err(ErrorKind::BadInput(format!(
                    "order {} does not belong to hosted payment page session {}",
                    order_id, page_id
                ))
                .into());
            }
        }

        details.set_order_id(order_id.to_string())?;
        payment.status = PaymentStatus::Successful { time: self.now() };
        self.save(&mut payment, &details)?;
        info!(payment = %payment.id, order = %order_id, "confirmed klarna order");
        Ok(payment)
    }

    /// Drops all Klarna state of the payment and marks it canceled. A later
    /// [`proceed`](Self::proceed) starts with fresh sessions.
    pub async fn cancel(&self, payment_id: PaymentId) -> Result<Payment> {
        let _guard = self.locks.lock(payment_id).await;
        let mut payment = self
            .store
            .get::<Payment>(payment_id)
            .map_err(|e| e.with_payment(payment_id))?;
        if matches!(payment.status, PaymentStatus::Successful { .. }) {
            return Err(ErrorKind::BadInput("payment already succeeded".to_string()).into());
        }
        payment.reset();
        payment.status = PaymentStatus::Canceled;
        self.store.set(&payment)?;
        info!(payment = %payment.id, "canceled checkout");
        Ok(payment)
    }

    /// Applies a hosted payment page status update reported by Klarna.
    ///
    /// Updates for any other session than the stored hosted payment page
    /// session, e.g. one dropped by [`cancel`](Self::cancel), are ignored.
    pub async fn notify(
        &self,
        payment_id: PaymentId,
        page_session: &str,
        status: HppStatus,
    ) -> Result<Payment> {
        let _guard = self.locks.lock(payment_id).await;
        let mut payment = self
            .store
            .get::<Payment>(payment_id)
            .map_err(|e| e.with_payment(payment_id))?;
        if matches!(payment.status, PaymentStatus::Successful { .. }) {
            return Ok(payment);
        }
        let details = PaymentDetails::from_stored(&payment.details)
            .map_err(|e| e.with_payment(payment_id))?;
        if details.hosted_payment_page_id() != Some(page_session) {
            warn!(
                payment = %payment.id,
                hosted_payment_page = %page_session,
                %status,
                "ignoring status of unknown hosted payment page session"
            );
            return Ok(payment);
        }

        let next = match status {
            HppStatus::Cancelled => Some(PaymentStatus::Canceled),
            HppStatus::Failed | HppStatus::Error | HppStatus::Disabled => Some(
                PaymentStatus::Error(format!("hosted payment page reported {}", status)),
            ),
            HppStatus::Completed | HppStatus::InProgress | HppStatus::ManualIdCheck => {
                Some(PaymentStatus::Pending)
            }
            HppStatus::Waiting | HppStatus::Back => None,
        };
        match next {
            Some(next) if next != payment.status => {
                info!(payment = %payment.id, %status, "hosted payment page status changed");
                payment.status = next;
                self.store.set(&payment)?;
            }
            Some(_) => (),
            None => warn!(payment = %payment.id, %status, "ignoring hosted payment page status"),
        }
        Ok(payment)
    }

    fn check_payment_session(&self, remote: &PaymentSessionDetails) -> Result<()> {
        if remote.status != Status::Incomplete {
            return Err(ErrorKind::SessionAlreadyConsumed.into());
        }
        if self.now() >= remote.expires_at {
            return Err(ErrorKind::SessionExpired.into());
        }
        Ok(())
    }

    fn save(&self, payment: &mut Payment, details: &PaymentDetails) -> Result<()> {
        payment.details = details.to_stored();
        self.store.set(&*payment)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

/// Klarna authorization tokens are uuid like. Anything else never came from
/// Klarna and must not end up in an api url.
fn check_authorization_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(ErrorKind::BadInput("empty authorization token".to_string()).into());
    }
    if !token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(ErrorKind::BadInput("malformed authorization token".to_string()).into());
    }
    Ok(())
}

fn check_order_stage(details: &PaymentDetails) -> Result<()> {
    match details.stage() {
        Stage::HostedPageCreated => Ok(()),
        Stage::OrderPlaced => Err(ErrorKind::SessionAlreadyConsumed.into()),
        stage => Err(ErrorKind::InvalidStoredState(format!(
            "cannot place an order at stage {:?}",
            stage
        ))
        .into()),
    }
}

fn check_page_session(details: &PaymentDetails, page_session: Option<&str>) -> Result<()> {
    match page_session {
        Some(id) if details.hosted_payment_page_id() != Some(id) => Err(ErrorKind::BadInput(
            format!("unknown hosted payment page session {}", id),
        )
        .into()),
        _ => Ok(()),
    }
}

fn stored(value: Option<&str>) -> Result<&str> {
    value.ok_or_else(|| ErrorKind::InvalidStoredState("missing session identifier".to_string()).into())
}
