//! Request payloads for the Klarna payments api.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, Result};

/// Monetary amount expressed in the minor units of the purchase currency,
/// the way Klarna expects it (e.g. `1050` for 10.50 EUR).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Amount(pub i64);

impl Amount {
    /// Converts a decimal amount into minor units using the ISO 4217 exponent
    /// of the currency. Fractions below the minor unit are rounded half away
    /// from zero.
    pub fn from_decimal(value: Decimal, currency: &str) -> Result<Self> {
        let currency = rusty_money::iso::find(currency)
            .ok_or_else(|| ErrorKind::BadInput(format!("unknown currency: {}", currency)))?;
        let scaled = (value * Decimal::from(10i64.pow(currency.exponent))).round_dp_with_strategy(
            0,
            rust_decimal::RoundingStrategy::MidpointAwayFromZero,
        );
        let minor = scaled
            .to_i64()
            .ok_or_else(|| ErrorKind::BadInput(format!("amount out of range: {}", value)))?;
        Ok(Self(minor))
    }

    pub fn minor(&self) -> i64 {
        self.0
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::default(), |acc, a| acc + a)
    }
}

/// Purchase country together with the currency Klarna accepts there and the
/// locales it supports, first one being the default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaymentCountry {
    /// ISO 3166-1 alpha-2 code.
    pub country: String,
    /// ISO 4217 code.
    pub currency: String,
    pub locales: Vec<String>,
}

impl PaymentCountry {
    pub fn new(country: &str, currency: &str, locales: &[&str]) -> Self {
        Self {
            country: country.to_string(),
            currency: currency.to_string(),
            locales: locales.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Finds the supported locale matching the storefront locale, e.g.
    /// `de_AT` or `de-AT` for Austria. A bare language code (`de`) matches the
    /// first supported locale with that language. Falls back to the default
    /// locale of the country.
    pub fn match_user_locale(&self, locale: Option<&str>) -> String {
        let default = self
            .locales
            .first()
            .cloned()
            .unwrap_or_else(|| "en-US".to_string());
        let Some(locale) = locale else {
            return default;
        };
        let wanted = locale.replace('_', "-");

        if let Some(exact) = self
            .locales
            .iter()
            .find(|l| l.eq_ignore_ascii_case(&wanted))
        {
            return exact.clone();
        }

        let language = wanted.split('-').next().unwrap_or_default();
        self.locales
            .iter()
            .find(|l| {
                l.split('-')
                    .next()
                    .is_some_and(|lang| lang.eq_ignore_ascii_case(language))
            })
            .cloned()
            .unwrap_or(default)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Buy,
    Tokenize,
    BuyAndTokenize,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquiringChannel {
    #[default]
    Ecommerce,
    InStore,
    Telesales,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderLineType {
    Physical,
    Discount,
    ShippingFee,
    SalesTax,
    Digital,
    GiftCard,
    StoreCredit,
    Surcharge,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subscription {
    pub name: String,
    pub interval: String,
    pub interval_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderLine {
    pub r#type: OrderLineType,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Amount,
    /// Tax rate in hundredths of a percent, `2500` for 25%.
    pub tax_rate: i64,
    pub total_amount: Amount,
    pub total_discount_amount: Amount,
    pub total_tax_amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Customer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// Merchant urls of a payment session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MerchantUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

impl MerchantUrls {
    pub fn is_empty(&self) -> bool {
        self.confirmation.is_none()
            && self.notification.is_none()
            && self.push.is_none()
            && self.authorization.is_none()
    }
}

/// Payment session request. Also used as the order body when placing an
/// order after authorization.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Payment {
    pub purchase_country: String,
    pub purchase_currency: String,
    pub locale: String,
    pub order_amount: Amount,
    pub order_lines: Vec<OrderLine>,
    pub intent: Intent,
    pub acquiring_channel: AcquiringChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_tax_amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_urls: Option<MerchantUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_reference1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_reference2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_payment_method_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<std::collections::BTreeMap<String, String>>,
}
