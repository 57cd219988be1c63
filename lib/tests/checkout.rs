//! Checkout flow against a scripted Klarna client.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use klarna_checkout::client::{
    ApiContext, Authorization, Client, HostedPaymentPage, HostedPaymentPageSession,
    HostedPaymentPageSessionDetails, HppStatus, OrderResponse, Payment as KlarnaPayment,
    PaymentSession, PaymentSessionDetails, ServerRegion, Status,
};
use klarna_checkout::config::ProductImages;
use klarna_checkout::converter::{
    DefaultHostedPaymentPageConverter, LineBuilder, OrderPaymentConverter,
};
use klarna_checkout::db::StoreExt;
use klarna_checkout::payment::{keys, Stage, Status as PaymentStatus};
use klarna_checkout::resolver::DefaultPaymentCountryResolver;
use klarna_checkout::token::{Token, UrlTokenIssuer};
use klarna_checkout::{
    mock, Checkout, ErrorKind, MemoryDb, Payment, PaymentDetails, Result,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
}

#[derive(Default)]
struct Calls {
    create_session: AtomicUsize,
    create_page: AtomicUsize,
    read_session: AtomicUsize,
    read_page: AtomicUsize,
    create_order: AtomicUsize,
}

impl Calls {
    fn creates(&self) -> usize {
        self.create_session.load(Ordering::SeqCst) + self.create_page.load(Ordering::SeqCst)
    }

    fn reads(&self) -> usize {
        self.read_session.load(Ordering::SeqCst) + self.read_page.load(Ordering::SeqCst)
    }
}

/// Klarna stand-in answering with whatever the test scripted.
struct FakeClient {
    calls: Calls,
    session: Mutex<PaymentSessionDetails>,
    page: Mutex<HostedPaymentPageSessionDetails>,
    fraud_status: Mutex<String>,
    fail_create_page: AtomicBool,
    pages: Mutex<Vec<HostedPaymentPage>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            calls: Calls::default(),
            session: Mutex::new(PaymentSessionDetails {
                status: Status::Incomplete,
                expires_at: now() + Duration::hours(48),
            }),
            page: Mutex::new(HostedPaymentPageSessionDetails {
                status: HppStatus::Waiting,
                expires_at: now() + Duration::hours(1),
                order_id: None,
            }),
            fraud_status: Mutex::new("ACCEPTED".to_string()),
            fail_create_page: AtomicBool::new(false),
            pages: Mutex::new(vec![]),
        }
    }
}

#[async_trait::async_trait]
impl Client for FakeClient {
    async fn create_payment_session(
        &self,
        _context: &ApiContext,
        _payment: &KlarnaPayment,
    ) -> Result<PaymentSession> {
        let n = self.calls.create_session.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        Ok(PaymentSession {
            session_id: format!("ps_{}", n),
            client_token: "client_token".to_string(),
            payment_method_categories: vec![],
        })
    }

    async fn create_hosted_payment_page_session(
        &self,
        _context: &ApiContext,
        page: &HostedPaymentPage,
    ) -> Result<HostedPaymentPageSession> {
        let n = self.calls.create_page.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create_page.load(Ordering::SeqCst) {
            return Err(ErrorKind::ProviderError {
                status: http::StatusCode::SERVICE_UNAVAILABLE,
                body: "{}".to_string(),
            }
            .into());
        }
        self.pages.lock().unwrap().push(page.clone());
        Ok(HostedPaymentPageSession {
            session_id: format!("hpp_{}", n),
            session_url: format!("https://api.test/hpp/v1/sessions/hpp_{}", n),
            redirect_url: format!("https://pay.test/hpp_{}", n),
            qr_code_url: None,
            distribution_url: None,
            expires_at: None,
        })
    }

    async fn read_payment_session(
        &self,
        _context: &ApiContext,
        _session_id: &str,
    ) -> Result<PaymentSessionDetails> {
        self.calls.read_session.fetch_add(1, Ordering::SeqCst);
        Ok(self.session.lock().unwrap().clone())
    }

    async fn read_hosted_payment_page_session(
        &self,
        _context: &ApiContext,
        _session_id: &str,
    ) -> Result<HostedPaymentPageSessionDetails> {
        self.calls.read_page.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.lock().unwrap().clone())
    }

    async fn create_order(
        &self,
        _context: &ApiContext,
        _payment: &KlarnaPayment,
        authorization_token: &str,
    ) -> Result<OrderResponse> {
        self.calls.create_order.fetch_add(1, Ordering::SeqCst);
        Ok(OrderResponse {
            order_id: format!("order_for_{}", authorization_token),
            fraud_status: self.fraud_status.lock().unwrap().clone(),
            redirect_url: None,
            authorized_payment_method: None,
        })
    }

    fn payment_session_url(&self, _context: &ApiContext, session_id: &str) -> Result<String> {
        Ok(format!("https://api.test/payments/v1/sessions/{}", session_id))
    }
}

struct Harness {
    client: Arc<FakeClient>,
    store: Arc<MemoryDb>,
    checkout: Arc<Checkout>,
    payment: Payment,
    token: Token,
}

impl Harness {
    fn new() -> Self {
        let client = Arc::new(FakeClient::default());
        let store = Arc::new(MemoryDb::new());
        let checkout = Checkout::new(
            client.clone(),
            store.clone(),
            Arc::new(OrderPaymentConverter::new(
                Arc::new(DefaultPaymentCountryResolver::default()),
                LineBuilder::new("https://shop.test", ProductImages::default()),
            )),
            Arc::new(DefaultHostedPaymentPageConverter::default()),
            Arc::new(
                UrlTokenIssuer::new("https://shop.test")
                    .unwrap()
                    .with_after_url("https://shop.test/thank-you"),
            ),
            ApiContext::new(
                Authorization::new("PK1_test".to_string(), "secret".to_string()),
                ServerRegion::Europe,
                true,
            ),
        )
        .with_clock(now);

        let (_, payment) = mock::generate(store.as_ref()).unwrap();
        let token = checkout.capture_token(payment.id).unwrap();

        Self {
            client,
            store,
            checkout: Arc::new(checkout),
            payment,
            token,
        }
    }

    /// Overwrites the stored details as if an earlier request had left them.
    fn persist(&self, entries: &[(&str, &str)]) {
        let mut payment = self.stored_payment();
        payment.details = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.store.set(&payment).unwrap();
    }

    fn stored_payment(&self) -> Payment {
        self.store.get::<Payment>(self.payment.id).unwrap()
    }

    fn stored_details(&self) -> PaymentDetails {
        PaymentDetails::from_stored(&self.stored_payment().details).unwrap()
    }

    async fn proceed(&self) -> Result<String> {
        self.checkout
            .proceed(self.payment.id, &self.token)
            .await
            .map(|t| t.0)
    }
}

#[tokio::test]
async fn fresh_payment_creates_both_sessions_without_reads() {
    let h = Harness::new();

    let redirect = h.proceed().await.unwrap();

    assert_eq!(redirect, "https://pay.test/hpp_1");
    assert_eq!(h.client.calls.create_session.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.calls.create_page.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.calls.reads(), 0);

    let details = h.stored_details();
    assert_eq!(details.stage(), Stage::HostedPageCreated);
    assert_eq!(details.payment_session_id(), Some("ps_1"));
    assert_eq!(details.hosted_payment_page_id(), Some("hpp_1"));
    assert_eq!(
        details.hosted_payment_page_redirect_url(),
        Some("https://pay.test/hpp_1")
    );
    assert_eq!(h.stored_payment().status, PaymentStatus::Pending);
}

#[tokio::test]
async fn hosted_page_gets_callback_urls() {
    let h = Harness::new();
    h.proceed().await.unwrap();

    let pages = h.client.pages.lock().unwrap();
    let urls = pages[0].merchant_urls();
    assert!(urls.success.starts_with(&h.token.target_url));
    assert!(urls.success.contains("authorization_token={{authorization_token}}"));
    assert!(urls.status_update.contains("/payment/notify/"));
    assert!(urls.cancel.contains("/payment/cancel/"));
    assert_eq!(urls.back, urls.cancel);
    assert_eq!(urls.error, urls.cancel);
    assert_eq!(urls.failure, urls.cancel);
    assert_eq!(
        pages[0].payment_session_url(),
        "https://api.test/payments/v1/sessions/ps_1"
    );

    // the issued callback tokens can be redeemed
    let hash = urls.cancel.rsplit('/').next().unwrap();
    let cancel = h.checkout.find_token(hash.parse().unwrap()).unwrap();
    assert_eq!(cancel.payment, h.payment.id);
}

#[tokio::test]
async fn stored_valid_hosted_page_is_reused() {
    let h = Harness::new();
    h.persist(&[
        (keys::PAYMENT_SESSION_ID, "ps_old"),
        (keys::HOSTED_PAYMENT_PAGE_ID, "hpp_old"),
        (keys::HOSTED_PAYMENT_PAGE_REDIRECT_URL, "https://pay.test/hpp_old"),
    ]);

    let redirect = h.proceed().await.unwrap();

    assert_eq!(redirect, "https://pay.test/hpp_old");
    assert_eq!(h.client.calls.read_page.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.calls.read_session.load(Ordering::SeqCst), 0);
    assert_eq!(h.client.calls.creates(), 0);
}

#[tokio::test]
async fn expired_stored_payment_session_fails_without_creating() {
    let h = Harness::new();
    h.persist(&[(keys::PAYMENT_SESSION_ID, "ps_old")]);
    h.client.session.lock().unwrap().expires_at = now() - Duration::minutes(1);

    let err = h.proceed().await.unwrap_err();

    assert!(matches!(err.kind, ErrorKind::SessionExpired), "{}", err);
    assert!(err.requires_restart());
    assert_eq!(err.payment, Some(h.payment.id));
    assert_eq!(h.client.calls.creates(), 0);
}

#[tokio::test]
async fn session_expiring_right_now_counts_as_expired() {
    let h = Harness::new();
    h.persist(&[(keys::PAYMENT_SESSION_ID, "ps_old")]);
    h.client.session.lock().unwrap().expires_at = now();

    let err = h.proceed().await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SessionExpired));
}

#[tokio::test]
async fn expired_stored_hosted_page_fails() {
    let h = Harness::new();
    h.persist(&[
        (keys::PAYMENT_SESSION_ID, "ps_old"),
        (keys::HOSTED_PAYMENT_PAGE_ID, "hpp_old"),
        (keys::HOSTED_PAYMENT_PAGE_REDIRECT_URL, "https://pay.test/hpp_old"),
    ]);
    h.client.page.lock().unwrap().expires_at = now() - Duration::seconds(1);

    let err = h.proceed().await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SessionExpired));
    assert_eq!(h.client.calls.creates(), 0);
}

#[tokio::test]
async fn broken_nesting_fails_before_any_remote_call() {
    let h = Harness::new();
    h.persist(&[
        (keys::HOSTED_PAYMENT_PAGE_ID, "hpp_old"),
        (keys::HOSTED_PAYMENT_PAGE_REDIRECT_URL, "https://pay.test/hpp_old"),
    ]);

    let err = h.proceed().await.unwrap_err();

    assert!(matches!(err.kind, ErrorKind::InvalidStoredState(_)), "{}", err);
    assert_eq!(h.client.calls.creates() + h.client.calls.reads(), 0);
}

#[tokio::test]
async fn foreign_details_fail_before_any_remote_call() {
    let h = Harness::new();
    h.persist(&[("stripe_session_id", "cs_test_123")]);

    let err = h.proceed().await.unwrap_err();

    assert!(matches!(err.kind, ErrorKind::InvalidStoredState(_)));
    assert_eq!(h.client.calls.creates() + h.client.calls.reads(), 0);
}

#[tokio::test]
async fn repeated_proceed_returns_same_redirect() {
    let h = Harness::new();

    let first = h.proceed().await.unwrap();
    let second = h.proceed().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.client.calls.create_session.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.calls.create_page.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.calls.read_page.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_proceed_creates_sessions_once() {
    let h = Harness::new();

    let (a, b) = tokio::join!(
        h.checkout.proceed(h.payment.id, &h.token),
        h.checkout.proceed(h.payment.id, &h.token)
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(h.client.calls.create_session.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.calls.create_page.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn complete_payment_session_is_consumed() {
    let h = Harness::new();
    h.persist(&[(keys::PAYMENT_SESSION_ID, "ps_old")]);
    h.client.session.lock().unwrap().status = Status::Complete;

    let err = h.proceed().await.unwrap_err();

    assert!(matches!(err.kind, ErrorKind::SessionAlreadyConsumed));
    assert_eq!(h.client.calls.creates(), 0);
}

#[tokio::test]
async fn completed_hosted_page_is_consumed() {
    let h = Harness::new();
    h.proceed().await.unwrap();
    h.client.page.lock().unwrap().status = HppStatus::Completed;

    let err = h.proceed().await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SessionAlreadyConsumed));
}

#[tokio::test]
async fn resumes_after_failed_hosted_page_creation() {
    let h = Harness::new();
    h.client.fail_create_page.store(true, Ordering::SeqCst);

    let err = h.proceed().await.unwrap_err();
    assert!(err.is_provider_error());

    // the payment session survived the failure
    let details = h.stored_details();
    assert_eq!(details.stage(), Stage::SessionCreated);
    assert_eq!(details.payment_session_id(), Some("ps_1"));

    h.client.fail_create_page.store(false, Ordering::SeqCst);
    let redirect = h.proceed().await.unwrap();

    assert_eq!(redirect, "https://pay.test/hpp_2");
    assert_eq!(h.client.calls.create_session.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.calls.read_session.load(Ordering::SeqCst), 1);
    let details = h.stored_details();
    assert_eq!(details.payment_session_status(), Some(Status::Incomplete));
    assert!(details.payment_session_expires_at().is_some());
}

#[tokio::test]
async fn token_for_other_payment_is_rejected() {
    let h = Harness::new();
    let (_, other) = mock::generate(h.store.as_ref()).unwrap();
    let other_token = h.checkout.capture_token(other.id).unwrap();

    let err = h
        .checkout
        .proceed(h.payment.id, &other_token)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadInput(_)));
    assert_eq!(h.client.calls.creates(), 0);
}

#[tokio::test]
async fn complete_places_order_once() {
    let h = Harness::new();
    h.proceed().await.unwrap();

    let order = h
        .checkout
        .complete(h.payment.id, "auth_1", Some("hpp_1"))
        .await
        .unwrap();

    assert_eq!(order.order_id, "order_for_auth_1");
    let payment = h.stored_payment();
    assert!(matches!(payment.status, PaymentStatus::Successful { time } if time == now()));
    assert_eq!(
        h.stored_details().order_id(),
        Some("order_for_auth_1")
    );

    let err = h.checkout.complete(h.payment.id, "auth_1", None).await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SessionAlreadyConsumed));
    let err = h.proceed().await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SessionAlreadyConsumed));
    assert_eq!(h.client.calls.create_order.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn complete_keeps_pending_until_fraud_check_passes() {
    let h = Harness::new();
    h.proceed().await.unwrap();
    *h.client.fraud_status.lock().unwrap() = "PENDING".to_string();

    h.checkout.complete(h.payment.id, "auth_1", None).await.unwrap();
    assert_eq!(h.stored_payment().status, PaymentStatus::Pending);
}

#[tokio::test]
async fn complete_requires_hosted_page() {
    let h = Harness::new();

    let err = h.checkout.complete(h.payment.id, "auth_1", None).await.unwrap_err();

    assert!(matches!(err.kind, ErrorKind::InvalidStoredState(_)));
    assert_eq!(h.client.calls.create_order.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_allows_starting_over() {
    let h = Harness::new();
    h.proceed().await.unwrap();

    let payment = h.checkout.cancel(h.payment.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Canceled);
    assert!(h.stored_details().is_empty());

    let redirect = h.proceed().await.unwrap();
    assert_eq!(redirect, "https://pay.test/hpp_2");
    assert_eq!(h.client.calls.create_session.load(Ordering::SeqCst), 2);
    assert_eq!(h.stored_details().payment_session_id(), Some("ps_2"));
}

#[tokio::test]
async fn notify_updates_payment_status() {
    let h = Harness::new();
    h.proceed().await.unwrap();

    let payment = h
        .checkout
        .notify(h.payment.id, "hpp_1", HppStatus::Failed)
        .await
        .unwrap();
    assert!(matches!(payment.status, PaymentStatus::Error(_)));

    let payment = h
        .checkout
        .notify(h.payment.id, "hpp_1", HppStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Canceled);

    // waiting does not move the payment anywhere
    let payment = h
        .checkout
        .notify(h.payment.id, "hpp_1", HppStatus::Waiting)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Canceled);
}

#[tokio::test]
async fn complete_rejects_malformed_authorization_token() {
    let h = Harness::new();
    h.proceed().await.unwrap();

    let err = h
        .checkout
        .complete(h.payment.id, "x/../../../../hpp/v1/sessions#", None)
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::BadInput(_)));
    assert_eq!(h.client.calls.create_order.load(Ordering::SeqCst), 0);
    assert_eq!(h.stored_details().stage(), Stage::HostedPageCreated);
}

#[tokio::test]
async fn complete_rejects_other_hosted_page_session() {
    let h = Harness::new();
    h.proceed().await.unwrap();

    let err = h
        .checkout
        .complete(h.payment.id, "auth_1", Some("hpp_9"))
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::BadInput(_)));
    assert_eq!(h.client.calls.create_order.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn confirm_order_records_order_placed_by_klarna() {
    let h = Harness::new();
    h.proceed().await.unwrap();
    {
        let mut page = h.client.page.lock().unwrap();
        page.status = HppStatus::Completed;
        page.order_id = Some("order_7".to_string());
    }

    let payment = h
        .checkout
        .confirm_order(h.payment.id, "order_7", Some("hpp_1"))
        .await
        .unwrap();

    assert!(matches!(payment.status, PaymentStatus::Successful { time } if time == now()));
    assert!(matches!(h.stored_payment().status, PaymentStatus::Successful { .. }));
    let details = h.stored_details();
    assert_eq!(details.stage(), Stage::OrderPlaced);
    assert_eq!(details.order_id(), Some("order_7"));
    assert_eq!(h.client.calls.create_order.load(Ordering::SeqCst), 0);

    // the customer reloading the return url changes nothing
    h.checkout
        .confirm_order(h.payment.id, "order_7", Some("hpp_1"))
        .await
        .unwrap();
    assert_eq!(h.client.calls.read_page.load(Ordering::SeqCst), 1);

    let err = h.proceed().await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SessionAlreadyConsumed));
}

#[tokio::test]
async fn confirm_order_requires_completed_hosted_page() {
    let h = Harness::new();
    h.proceed().await.unwrap();
    h.client.page.lock().unwrap().status = HppStatus::InProgress;

    let err = h
        .checkout
        .confirm_order(h.payment.id, "order_7", None)
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::BadInput(_)));
    assert_eq!(h.stored_payment().status, PaymentStatus::Pending);
    assert_eq!(h.stored_details().order_id(), None);
}

#[tokio::test]
async fn confirm_order_rejects_foreign_order_id() {
    let h = Harness::new();
    h.proceed().await.unwrap();
    {
        let mut page = h.client.page.lock().unwrap();
        page.status = HppStatus::Completed;
        page.order_id = Some("order_7".to_string());
    }

    let err = h
        .checkout
        .confirm_order(h.payment.id, "order_8", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadInput(_)));

    let err = h
        .checkout
        .confirm_order(h.payment.id, "order_7", Some("hpp_9"))
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadInput(_)));

    assert_eq!(h.stored_details().order_id(), None);
}

#[tokio::test]
async fn notify_ignores_other_hosted_page_sessions() {
    let h = Harness::new();
    h.proceed().await.unwrap();

    let payment = h
        .checkout
        .notify(h.payment.id, "hpp_9", HppStatus::Cancelled)
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(h.stored_payment().status, PaymentStatus::Pending);
}

#[tokio::test]
async fn callback_tokens_are_stored_before_hosted_page_creation() {
    let h = Harness::new();
    h.client.fail_create_page.store(true, Ordering::SeqCst);

    h.proceed().await.unwrap_err();

    // the failed attempt already issued and stored its callback tokens
    let tokens = h.store.get_collection::<Token>().unwrap();
    let paths: Vec<&str> = tokens
        .iter()
        .filter(|t| t.payment == h.payment.id)
        .map(|t| t.target_url.as_str())
        .collect();
    assert!(paths.iter().any(|p| p.contains("/notify/")), "{:?}", paths);
    assert!(paths.iter().any(|p| p.contains("/cancel/")), "{:?}", paths);
}

#[tokio::test]
async fn unknown_payment_is_not_found() {
    let h = Harness::new();
    let err = h.checkout.capture_token(uuid::Uuid::new_v4()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NotFound(_)));
}
