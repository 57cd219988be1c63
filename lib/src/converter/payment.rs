use std::sync::Arc;

use crate::client::request::{
    AcquiringChannel, Address, Amount, Customer, Intent, MerchantUrls, Payment as KlarnaPayment,
};
use crate::order::{self, Order};
use crate::resolver::PaymentCountryResolver;
use crate::{ErrorKind, Payment, Result};

use super::{LineBuilder, PaymentConverter};

/// Default [`PaymentConverter`], building the payment session request from
/// the order snapshot.
#[derive(Clone)]
pub struct OrderPaymentConverter {
    resolver: Arc<dyn PaymentCountryResolver>,
    lines: LineBuilder,
}

impl OrderPaymentConverter {
    pub fn new(resolver: Arc<dyn PaymentCountryResolver>, lines: LineBuilder) -> Self {
        Self { resolver, lines }
    }
}

impl PaymentConverter for OrderPaymentConverter {
    fn convert(
        &self,
        order: &Order,
        payment: &Payment,
        merchant_urls: Option<MerchantUrls>,
    ) -> Result<KlarnaPayment> {
        let currency = order.currency.as_deref().ok_or_else(|| {
            ErrorKind::BadInput(
                "purchase currency is required to create a payment on Klarna".to_string(),
            )
        })?;
        let country = self.resolver.resolve(order)?;
        if !country.currency.eq_ignore_ascii_case(currency) {
            return Err(ErrorKind::BadInput(format!(
                "the order currency is {}, but for the country {} Klarna only supports {}",
                currency, country.country, country.currency
            ))
            .into());
        }

        let order_lines = self.lines.lines(order, &country.currency)?;
        let order_amount = order_lines.iter().map(|l| l.total_amount).sum();
        let order_tax_amount: Amount = order_lines.iter().map(|l| l.total_tax_amount).sum();

        let email = order.customer.as_ref().map(|c| c.email.clone());

        Ok(KlarnaPayment {
            locale: country.match_user_locale(order.locale.as_deref()),
            purchase_country: country.country,
            purchase_currency: country.currency,
            order_amount,
            order_lines,
            intent: Intent::Buy,
            acquiring_channel: AcquiringChannel::Ecommerce,
            order_tax_amount: Some(order_tax_amount),
            merchant_urls: merchant_urls.filter(|u| !u.is_empty()),
            customer: order.customer.as_ref().map(customer),
            billing_address: order
                .billing_address
                .as_ref()
                .map(|a| address(a, email.clone())),
            shipping_address: order
                .shipping_address
                .as_ref()
                .map(|a| address(a, email.clone())),
            merchant_reference1: Some(format!("#{}", order.number)),
            merchant_reference2: None,
            merchant_data: Some(format!("#{}@{}", order.id, payment.id)),
            custom_payment_method_ids: None,
            design: None,
            options: None,
        })
    }
}

fn customer(customer: &order::Customer) -> Customer {
    Customer {
        date_of_birth: customer.birthday.map(|d| d.format("%Y-%m-%d").to_string()),
        gender: customer.gender.clone(),
        r#type: None,
    }
}

fn address(address: &order::Address, email: Option<String>) -> Address {
    Address {
        given_name: Some(address.first_name.clone()),
        family_name: Some(address.last_name.clone()),
        email,
        phone: address.phone_number.clone(),
        organization_name: address.company.clone(),
        street_address: Some(address.street.clone()),
        postal_code: Some(address.postcode.clone()),
        city: Some(address.city.clone()),
        region: address.province.clone(),
        country: address.country_code.clone(),
    }
}
