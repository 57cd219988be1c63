//! Callback urls handed to Klarna.
//!
//! Every url the customer or Klarna calls back on carries an unguessable
//! hash, so that a payment cannot be driven by anyone knowing its id alone.
//! Issued tokens are stored by the checkout and looked up by hash when
//! redeemed.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::db::{Collectable, Identifiable};
use crate::payment::PaymentId;
use crate::Result;

pub const CAPTURE_PATH: &str = "payment/capture";
pub const NOTIFY_PATH: &str = "payment/notify";
pub const CANCEL_PATH: &str = "payment/cancel";

/// Security token bound to a single payment.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Token {
    pub hash: Uuid,
    pub payment: PaymentId,
    /// Url the token is redeemed at.
    pub target_url: String,
    /// Url the customer lands on once the checkout is over.
    pub after_url: Option<String>,
}

impl Collectable for Token {
    fn get_collection_name() -> &'static str {
        "token"
    }
}

impl Identifiable for Token {
    fn get_id(&self) -> Uuid {
        self.hash
    }
}

pub trait TokenIssuer: Send + Sync {
    /// Issues the token starting (or resuming) the checkout of a payment.
    fn capture_token(&self, payment: PaymentId) -> Result<Token>;
    /// Token for the url Klarna reports hosted payment page status changes
    /// to.
    fn notify_token(&self, capture: &Token) -> Result<Token>;
    /// Token for the url the customer is sent to when leaving the hosted
    /// payment page without paying.
    fn cancel_token(&self, capture: &Token) -> Result<Token>;
}

/// Issues tokens as paths below the storefront base url, e.g.
/// `https://shop.example.com/payment/capture/{hash}`.
#[derive(Clone, Debug)]
pub struct UrlTokenIssuer {
    base: Url,
    after_url: Option<String>,
}

impl UrlTokenIssuer {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            after_url: None,
        })
    }

    /// Sets the page customers are taken to after finishing the checkout.
    pub fn with_after_url(mut self, after_url: impl Into<String>) -> Self {
        self.after_url = Some(after_url.into());
        self
    }

    fn token(&self, path: &str, payment: PaymentId, after_url: Option<String>) -> Result<Token> {
        let hash = Uuid::new_v4();
        let target_url = self.base.join(&format!("{}/{}", path, hash.simple()))?;
        Ok(Token {
            hash,
            payment,
            target_url: target_url.to_string(),
            after_url,
        })
    }
}

impl TokenIssuer for UrlTokenIssuer {
    fn capture_token(&self, payment: PaymentId) -> Result<Token> {
        self.token(CAPTURE_PATH, payment, self.after_url.clone())
    }

    fn notify_token(&self, capture: &Token) -> Result<Token> {
        self.token(NOTIFY_PATH, capture.payment, None)
    }

    fn cancel_token(&self, capture: &Token) -> Result<Token> {
        self.token(CANCEL_PATH, capture.payment, capture.after_url.clone())
    }
}
