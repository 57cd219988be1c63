//! Translation of storefront orders into Klarna requests.

mod hpp;
mod lines;
mod payment;

pub use hpp::DefaultHostedPaymentPageConverter;
pub use lines::{LineBuilder, DISCOUNT_LINE_NAME, SHIPPING_LINE_NAME};
pub use payment::OrderPaymentConverter;

use crate::client::request::MerchantUrls;
use crate::client::{HostedPaymentPage, Payment as KlarnaPayment};
use crate::{Order, Payment, Result};

/// Builds the payment session request for an order.
pub trait PaymentConverter: Send + Sync {
    fn convert(
        &self,
        order: &Order,
        payment: &Payment,
        merchant_urls: Option<MerchantUrls>,
    ) -> Result<KlarnaPayment>;
}

/// Callback urls of a hosted payment page session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackUrls {
    /// Where the customer is sent after a successful payment. Receives the
    /// session id and authorization token placeholders.
    pub confirmation: String,
    pub notification: String,
    pub back: String,
    pub cancel: String,
    pub error: String,
    pub failure: String,
}

/// Builds the hosted payment page request for a payment session.
pub trait HostedPaymentPageConverter: Send + Sync {
    fn convert(&self, urls: CallbackUrls, payment_session_url: String)
        -> Result<HostedPaymentPage>;
}
