//! Resolution of the Klarna purchase country for an order.

use fnv::FnvHashMap;

use crate::client::PaymentCountry;
use crate::{ErrorKind, Order, Result};

pub trait PaymentCountryResolver: Send + Sync {
    /// Mapping of ISO country codes to what Klarna supports there.
    fn mapping(&self) -> &FnvHashMap<String, PaymentCountry>;

    /// Resolves the payment country from the order billing address.
    fn resolve(&self, order: &Order) -> Result<PaymentCountry> {
        let country = order
            .billing_address
            .as_ref()
            .and_then(|a| a.country_code.as_deref())
            .ok_or_else(|| {
                ErrorKind::BadInput(
                    "purchase country is required to create a payment on Klarna".to_string(),
                )
            })?;
        self.mapping()
            .get(&country.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| {
                ErrorKind::BadInput(format!("country {} is not supported by Klarna", country))
                    .into()
            })
    }
}

/// Resolver backed by the purchase country, currency and locale table
/// published by Klarna for Klarna Payments.
#[derive(Clone, Debug)]
pub struct DefaultPaymentCountryResolver {
    mapping: FnvHashMap<String, PaymentCountry>,
}

impl Default for DefaultPaymentCountryResolver {
    fn default() -> Self {
        Self::new(default_mapping())
    }
}

impl DefaultPaymentCountryResolver {
    pub fn new(mapping: FnvHashMap<String, PaymentCountry>) -> Self {
        Self { mapping }
    }
}

impl PaymentCountryResolver for DefaultPaymentCountryResolver {
    fn mapping(&self) -> &FnvHashMap<String, PaymentCountry> {
        &self.mapping
    }
}

pub fn default_mapping() -> FnvHashMap<String, PaymentCountry> {
    [
        PaymentCountry::new("AT", "EUR", &["de-AT", "en-AT"]),
        PaymentCountry::new("AU", "AUD", &["en-AU"]),
        PaymentCountry::new("BE", "EUR", &["nl-BE", "fr-BE", "en-BE"]),
        PaymentCountry::new("CA", "CAD", &["en-CA", "fr-CA"]),
        PaymentCountry::new("CH", "CHF", &["de-CH", "fr-CH", "it-CH", "en-CH"]),
        PaymentCountry::new("CZ", "CZK", &["cs-CZ", "en-CZ"]),
        PaymentCountry::new("DE", "EUR", &["de-DE", "en-DE"]),
        PaymentCountry::new("DK", "DKK", &["da-DK", "en-DK"]),
        PaymentCountry::new("ES", "EUR", &["es-ES", "en-ES"]),
        PaymentCountry::new("FI", "EUR", &["fi-FI", "sv-FI", "en-FI"]),
        PaymentCountry::new("FR", "EUR", &["fr-FR", "en-FR"]),
        PaymentCountry::new("GB", "GBP", &["en-GB"]),
        PaymentCountry::new("GR", "EUR", &["el-GR", "en-GR"]),
        PaymentCountry::new("HU", "HUF", &["hu-HU", "en-HU"]),
        PaymentCountry::new("IE", "EUR", &["en-IE"]),
        PaymentCountry::new("IT", "EUR", &["it-IT", "en-IT"]),
        PaymentCountry::new("MX", "MXN", &["es-MX", "en-MX"]),
        PaymentCountry::new("NL", "EUR", &["nl-NL", "en-NL"]),
        PaymentCountry::new("NO", "NOK", &["nb-NO", "en-NO"]),
        PaymentCountry::new("NZ", "NZD", &["en-NZ"]),
        PaymentCountry::new("PL", "PLN", &["pl-PL", "en-PL"]),
        PaymentCountry::new("PT", "EUR", &["pt-PT", "en-PT"]),
        PaymentCountry::new("RO", "RON", &["ro-RO", "en-RO"]),
        PaymentCountry::new("SE", "SEK", &["sv-SE", "en-SE"]),
        PaymentCountry::new("SK", "EUR", &["sk-SK", "en-SK"]),
        PaymentCountry::new("US", "USD", &["en-US", "es-US"]),
    ]
    .into_iter()
    .map(|c| (c.country.clone(), c))
    .collect()
}

#[cfg(test)]
mod tests {
    use crate::order::Address;

    use super::*;

    fn order_in(country: Option<&str>) -> Order {
        Order {
            billing_address: Some(Address {
                country_code: country.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_from_billing_country() {
        let resolver = DefaultPaymentCountryResolver::default();
        let country = resolver.resolve(&order_in(Some("it"))).unwrap();
        assert_eq!(country.currency, "EUR");
        assert_eq!(country.locales[0], "it-IT");
    }

    #[test]
    fn fails_without_supported_country() {
        let resolver = DefaultPaymentCountryResolver::default();
        assert!(resolver.resolve(&order_in(None)).is_err());
        assert!(resolver.resolve(&order_in(Some("JP"))).is_err());
        assert!(resolver.resolve(&Order::default()).is_err());
    }
}
