//! Hosted payment page request payloads.

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, Result};

pub const HOSTED_PAYMENT_PAGE_SESSION_ID_KEY: &str = "sid";
pub const AUTHORIZATION_TOKEN_KEY: &str = "authorization_token";
pub const ORDER_ID_KEY: &str = "order_id";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    DirectBankTransfer,
    DirectDebit,
    PayLater,
    PayNow,
    PayOverTime,
    Klarna,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaceOrderMode {
    PlaceOrder,
    CaptureOrder,
    None,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseType {
    Buy,
    Rent,
    Book,
    Subscribe,
    Download,
    Order,
    Continue,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackgroundImage {
    pub url: String,
    pub width: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HppOptions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub background_images: Vec<BackgroundImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_categories: Option<Vec<PaymentMethod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_category: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_order_mode: Option<PlaceOrderMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_type: Option<PurchaseType>,
    /// Only `HIDE` is accepted by Klarna.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_subtotal_detail: Option<String>,
}

/// Merchant urls of a hosted payment page session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct MerchantUrls {
    pub back: String,
    pub cancel: String,
    pub error: String,
    pub failure: String,
    pub status_update: String,
    pub success: String,
}

/// Hosted payment page session request, bound to an existing payment session
/// through its url.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostedPaymentPage {
    merchant_urls: MerchantUrls,
    payment_session_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HppOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_id: Option<String>,
}

impl HostedPaymentPage {
    /// Builds the request, making sure the success url carries the
    /// placeholders Klarna substitutes on redirect.
    ///
    /// A success url that already references one of the placeholders is
    /// kept untouched. Otherwise the session id is appended together with
    /// the order id when Klarna places the order itself, or with the
    /// authorization token when the order is placed by the storefront.
    pub fn new(
        mut merchant_urls: MerchantUrls,
        payment_session_url: String,
        options: Option<HppOptions>,
        profile_id: Option<String>,
    ) -> Result<Self> {
        if let Some(options) = &options {
            if options.payment_method_categories.is_some()
                && options.payment_method_category.is_some()
            {
                return Err(ErrorKind::BadInput(
                    "options `payment_method_categories` and `payment_method_category` are mutually exclusive"
                        .to_string(),
                )
                .into());
            }
        }

        let success = &merchant_urls.success;
        let has_placeholders = success
            .contains(&format!("{HOSTED_PAYMENT_PAGE_SESSION_ID_KEY}={{{{session_id}}}}"))
            || success.contains(&format!("{AUTHORIZATION_TOKEN_KEY}={{{{authorization_token}}}}"))
            || success.contains(&format!("{ORDER_ID_KEY}={{{{order_id}}}}"));

        if !has_placeholders {
            let places_order = options.as_ref().is_some_and(|o| {
                matches!(
                    o.place_order_mode,
                    Some(PlaceOrderMode::PlaceOrder) | Some(PlaceOrderMode::CaptureOrder)
                )
            });
            let separator = if success.contains('?') { '&' } else { '?' };
            let second = if places_order {
                format!("{ORDER_ID_KEY}={{{{order_id}}}}")
            } else {
                format!("{AUTHORIZATION_TOKEN_KEY}={{{{authorization_token}}}}")
            };
            merchant_urls.success = format!(
                "{success}{separator}{HOSTED_PAYMENT_PAGE_SESSION_ID_KEY}={{{{session_id}}}}&{second}"
            );
        }

        Ok(Self {
            merchant_urls,
            payment_session_url,
            options,
            profile_id,
        })
    }

    pub fn merchant_urls(&self) -> &MerchantUrls {
        &self.merchant_urls
    }

    pub fn payment_session_url(&self) -> &str {
        &self.payment_session_url
    }

    pub fn options(&self) -> Option<&HppOptions> {
        self.options.as_ref()
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(success: &str) -> MerchantUrls {
        MerchantUrls {
            back: "https://shop.test/cancel".to_string(),
            cancel: "https://shop.test/cancel".to_string(),
            error: "https://shop.test/cancel".to_string(),
            failure: "https://shop.test/cancel".to_string(),
            status_update: "https://shop.test/notify".to_string(),
            success: success.to_string(),
        }
    }

    #[test]
    fn appends_authorization_token_placeholder_by_default() {
        let hpp = HostedPaymentPage::new(
            urls("https://shop.test/capture/abc"),
            "https://api/sessions/1".to_string(),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            hpp.merchant_urls().success,
            "https://shop.test/capture/abc?sid={{session_id}}&authorization_token={{authorization_token}}"
        );
    }

    #[test]
    fn appends_order_id_placeholder_when_klarna_places_the_order() {
        let options = HppOptions {
            place_order_mode: Some(PlaceOrderMode::CaptureOrder),
            ..Default::default()
        };
        let hpp = HostedPaymentPage::new(
            urls("https://shop.test/capture?token=abc"),
            "https://api/sessions/1".to_string(),
            Some(options),
            None,
        )
        .unwrap();
        assert_eq!(
            hpp.merchant_urls().success,
            "https://shop.test/capture?token=abc&sid={{session_id}}&order_id={{order_id}}"
        );
    }

    #[test]
    fn keeps_success_url_with_placeholders() {
        let success = "https://shop.test/capture?sid={{session_id}}";
        let hpp =
            HostedPaymentPage::new(urls(success), "https://api/sessions/1".to_string(), None, None)
                .unwrap();
        assert_eq!(hpp.merchant_urls().success, success);
    }

    #[test]
    fn rejects_both_payment_method_options() {
        let options = HppOptions {
            payment_method_categories: Some(vec![PaymentMethod::PayLater]),
            payment_method_category: Some(PaymentMethod::PayNow),
            ..Default::default()
        };
        let err = HostedPaymentPage::new(
            urls("https://shop.test/capture"),
            "https://api/sessions/1".to_string(),
            Some(options),
            None,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadInput(_)));
    }

    #[test]
    fn serializes_options_in_klarna_format() {
        let options = HppOptions {
            payment_method_categories: Some(vec![PaymentMethod::PayOverTime]),
            place_order_mode: Some(PlaceOrderMode::None),
            ..Default::default()
        };
        let hpp = HostedPaymentPage::new(
            urls("https://shop.test/capture"),
            "https://api/sessions/1".to_string(),
            Some(options),
            None,
        )
        .unwrap();
        let json = serde_json::to_value(&hpp).unwrap();
        assert_eq!(json["options"]["payment_method_categories"][0], "pay_over_time");
        assert_eq!(json["options"]["place_order_mode"], "NONE");
        assert_eq!(json["payment_session_url"], "https://api/sessions/1");
        assert!(json.get("profile_id").is_none());
        assert!(json["options"].get("background_images").is_none());
    }
}
