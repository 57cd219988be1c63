use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::client::{HostedPaymentPageSession, PaymentSession, PaymentSessionDetails, Status};
use crate::{ErrorKind, Result};

/// Raw key/value details stored on a payment record.
pub type Details = BTreeMap<String, String>;

/// Keys under which session state is stored in [`Details`].
pub mod keys {
    pub const PAYMENT_SESSION_ID: &str = "payment_session_id";
    pub const PAYMENT_SESSION_CLIENT_TOKEN: &str = "payment_session_client_token";
    pub const PAYMENT_SESSION_STATUS: &str = "payment_session_status";
    pub const PAYMENT_SESSION_EXPIRES_AT: &str = "payment_session_expires_at";
    pub const HOSTED_PAYMENT_PAGE_ID: &str = "hosted_payment_page_id";
    pub const HOSTED_PAYMENT_PAGE_REDIRECT_URL: &str = "hosted_payment_page_redirect_url";
    pub const ORDER_ID: &str = "order_id";

    pub const ALL: [&str; 7] = [
        PAYMENT_SESSION_ID,
        PAYMENT_SESSION_CLIENT_TOKEN,
        PAYMENT_SESSION_STATUS,
        PAYMENT_SESSION_EXPIRES_AT,
        HOSTED_PAYMENT_PAGE_ID,
        HOSTED_PAYMENT_PAGE_REDIRECT_URL,
        ORDER_ID,
    ];
}

/// How far the checkout got, derived from which artifacts are present.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    NoSession,
    SessionCreated,
    HostedPageCreated,
    OrderPlaced,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct HostedPage {
    id: String,
    redirect_url: String,
}

/// Typed view over the Klarna state stored on a payment.
///
/// Later stage artifacts can only exist together with the earlier ones:
/// an order id requires a hosted payment page, which requires a payment
/// session. Setters refuse to break that nesting and
/// [`from_stored`](Self::from_stored) refuses to load data that breaks it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentDetails {
    payment_session_id: Option<String>,
    client_token: Option<String>,
    payment_session_status: Option<Status>,
    payment_session_expires_at: Option<DateTime<Utc>>,
    hosted_page: Option<HostedPage>,
    order_id: Option<String>,
}

impl PaymentDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates details stored on a payment record.
    pub fn from_stored(stored: &Details) -> Result<Self> {
        if let Some(unknown) = stored.keys().find(|k| !keys::ALL.contains(&k.as_str())) {
            return Err(invalid(format!(
                "details already populated with unrelated data (key `{}`)",
                unknown
            )));
        }

        let get = |key: &str| -> Result<Option<String>> {
            match stored.get(key) {
                Some(value) if value.is_empty() => Err(invalid(format!("empty value for `{}`", key))),
                Some(value) => Ok(Some(value.clone())),
                None => Ok(None),
            }
        };

        let payment_session_id = get(keys::PAYMENT_SESSION_ID)?;
        let client_token = get(keys::PAYMENT_SESSION_CLIENT_TOKEN)?;
        let payment_session_status = get(keys::PAYMENT_SESSION_STATUS)?
            .map(|s| {
                s.parse::<Status>()
                    .map_err(|_| invalid(format!("unknown payment session status `{}`", s)))
            })
            .transpose()?;
        let payment_session_expires_at = get(keys::PAYMENT_SESSION_EXPIRES_AT)?
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|_| invalid(format!("malformed expiry timestamp `{}`", s)))
            })
            .transpose()?;
        let hosted_page_id = get(keys::HOSTED_PAYMENT_PAGE_ID)?;
        let redirect_url = get(keys::HOSTED_PAYMENT_PAGE_REDIRECT_URL)?;
        let order_id = get(keys::ORDER_ID)?;

        if payment_session_id.is_none()
            && (client_token.is_some()
                || payment_session_status.is_some()
                || payment_session_expires_at.is_some())
        {
            return Err(invalid("payment session data without a payment session id"));
        }

        let hosted_page = match (hosted_page_id, redirect_url) {
            (Some(id), Some(redirect_url)) => Some(HostedPage { id, redirect_url }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(invalid("hosted payment page id without a redirect url"));
            }
            (None, Some(_)) => {
                return Err(invalid("hosted payment page redirect url without an id"));
            }
        };
        if hosted_page.is_some() && payment_session_id.is_none() {
            return Err(invalid("hosted payment page without a payment session"));
        }
        if order_id.is_some() && hosted_page.is_none() {
            return Err(invalid("order without a hosted payment page"));
        }

        Ok(Self {
            payment_session_id,
            client_token,
            payment_session_status,
            payment_session_expires_at,
            hosted_page,
            order_id,
        })
    }

    pub fn to_stored(&self) -> Details {
        let mut stored = Details::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                stored.insert(key.to_string(), value);
            }
        };
        put(keys::PAYMENT_SESSION_ID, self.payment_session_id.clone());
        put(keys::PAYMENT_SESSION_CLIENT_TOKEN, self.client_token.clone());
        put(
            keys::PAYMENT_SESSION_STATUS,
            self.payment_session_status.map(|s| s.to_string()),
        );
        put(
            keys::PAYMENT_SESSION_EXPIRES_AT,
            self.payment_session_expires_at.map(|t| t.to_rfc3339()),
        );
        put(
            keys::HOSTED_PAYMENT_PAGE_ID,
            self.hosted_page.as_ref().map(|h| h.id.clone()),
        );
        put(
            keys::HOSTED_PAYMENT_PAGE_REDIRECT_URL,
            self.hosted_page.as_ref().map(|h| h.redirect_url.clone()),
        );
        put(keys::ORDER_ID, self.order_id.clone());
        stored
    }

    pub fn stage(&self) -> Stage {
        if self.order_id.is_some() {
            Stage::OrderPlaced
        } else if self.hosted_page.is_some() {
            Stage::HostedPageCreated
        } else if self.payment_session_id.is_some() {
            Stage::SessionCreated
        } else {
            Stage::NoSession
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stage() == Stage::NoSession
    }

    pub fn payment_session_id(&self) -> Option<&str> {
        self.payment_session_id.as_deref()
    }

    pub fn client_token(&self) -> Option<&str> {
        self.client_token.as_deref()
    }

    pub fn payment_session_status(&self) -> Option<Status> {
        self.payment_session_status
    }

    pub fn payment_session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.payment_session_expires_at
    }

    pub fn hosted_payment_page_id(&self) -> Option<&str> {
        self.hosted_page.as_ref().map(|h| h.id.as_str())
    }

    pub fn hosted_payment_page_redirect_url(&self) -> Option<&str> {
        self.hosted_page.as_ref().map(|h| h.redirect_url.as_str())
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    /// Records a freshly created payment session. Only allowed on empty
    /// details.
    pub fn set_payment_session(&mut self, session: &PaymentSession) -> Result<()> {
        if !self.is_empty() {
            return Err(invalid("payment session already recorded"));
        }
        self.payment_session_id = Some(session.session_id.clone());
        self.client_token = Some(session.client_token.clone()).filter(|t| !t.is_empty());
        Ok(())
    }

    /// Records the last known status of the payment session.
    pub fn set_payment_session_details(&mut self, details: &PaymentSessionDetails) -> Result<()> {
        if self.payment_session_id.is_none() {
            return Err(invalid("no payment session to update"));
        }
        self.payment_session_status = Some(details.status);
        self.payment_session_expires_at = Some(details.expires_at);
        Ok(())
    }

    /// Records a freshly created hosted payment page session.
    pub fn set_hosted_payment_page(&mut self, session: &HostedPaymentPageSession) -> Result<()> {
        if self.payment_session_id.is_none() {
            return Err(invalid("hosted payment page requires a payment session"));
        }
        if self.hosted_page.is_some() {
            return Err(invalid("hosted payment page already recorded"));
        }
        self.hosted_page = Some(HostedPage {
            id: session.session_id.clone(),
            redirect_url: session.redirect_url.clone(),
        });
        Ok(())
    }

    pub fn set_order_id(&mut self, order_id: String) -> Result<()> {
        if self.hosted_page.is_none() {
            return Err(invalid("order requires a hosted payment page"));
        }
        self.order_id = Some(order_id);
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> crate::Error {
    ErrorKind::InvalidStoredState(msg.into()).into()
}
