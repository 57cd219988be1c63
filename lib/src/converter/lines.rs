use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::client::request::{Amount, OrderLine, OrderLineType};
use crate::config::ProductImages;
use crate::order::{Order, OrderItem};
use crate::{ErrorKind, Result};

pub const SHIPPING_LINE_NAME: &str = "Shipping";
pub const DISCOUNT_LINE_NAME: &str = "Discount";

/// Turns order contents into Klarna order lines.
///
/// Line totals are computed from the converted unit price, quantity and
/// discount so that Klarna's `quantity * unit_price - total_discount_amount
/// == total_amount` check holds regardless of rounding.
#[derive(Clone, Debug)]
pub struct LineBuilder {
    /// Storefront base url without trailing slash.
    pub base_url: String,
    pub images: ProductImages,
}

impl LineBuilder {
    pub fn new(base_url: impl Into<String>, images: ProductImages) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            images,
        }
    }

    pub fn lines(&self, order: &Order, currency: &str) -> Result<Vec<OrderLine>> {
        let mut lines = order
            .items
            .iter()
            .map(|item| self.item_line(order, item, currency))
            .collect::<Result<Vec<_>>>()?;

        if !order.shipping_total.is_zero() {
            let amount = Amount::from_decimal(order.shipping_total, currency)?;
            lines.push(flat_line(OrderLineType::ShippingFee, SHIPPING_LINE_NAME, amount));
        }
        if !order.order_promotion_total.is_zero() {
            let amount = Amount::from_decimal(order.order_promotion_total, currency)?;
            lines.push(flat_line(OrderLineType::Discount, DISCOUNT_LINE_NAME, amount));
        }

        Ok(lines)
    }

    fn item_line(&self, order: &Order, item: &OrderItem, currency: &str) -> Result<OrderLine> {
        let unit_price = Amount::from_decimal(item.unit_price, currency)?;
        let discount = Amount::from_decimal(item.discount, currency)?;
        let total = Amount(unit_price.minor() * i64::from(item.quantity)) - discount;

        Ok(OrderLine {
            r#type: OrderLineType::Physical,
            name: item.name.clone(),
            quantity: item.quantity,
            unit_price,
            tax_rate: tax_rate(item.tax_rate)?,
            total_amount: total,
            total_discount_amount: discount,
            total_tax_amount: Amount::from_decimal(item.tax_total, currency)?,
            reference: Some(item.product_code.clone()).filter(|c| !c.is_empty()),
            quantity_unit: None,
            image_url: self.image_url(item),
            product_url: self.product_url(order, item),
            merchant_data: None,
            subscription: None,
        })
    }

    /// Picks the image of the configured type, falling back to the first
    /// one, and points at its cached variant when a filter is configured.
    fn image_url(&self, item: &OrderItem) -> Option<String> {
        let image = item
            .images
            .iter()
            .find(|i| i.r#type == self.images.r#type)
            .or_else(|| item.images.first())?;
        let path = image.path.trim_start_matches('/');
        if self.images.filter.is_empty() {
            Some(format!("{}/media/image/{}", self.base_url, path))
        } else {
            Some(format!(
                "{}/media/cache/{}/{}",
                self.base_url, self.images.filter, path
            ))
        }
    }

    fn product_url(&self, order: &Order, item: &OrderItem) -> Option<String> {
        let slug = item.slug.as_deref()?;
        match order.locale.as_deref() {
            Some(locale) => Some(format!("{}/{}/products/{}", self.base_url, locale, slug)),
            None => Some(format!("{}/products/{}", self.base_url, slug)),
        }
    }
}

fn flat_line(r#type: OrderLineType, name: &str, amount: Amount) -> OrderLine {
    OrderLine {
        r#type,
        name: name.to_string(),
        quantity: 1,
        unit_price: amount,
        tax_rate: 0,
        total_amount: amount,
        total_discount_amount: Amount::default(),
        total_tax_amount: Amount::default(),
        reference: None,
        quantity_unit: None,
        image_url: None,
        product_url: None,
        merchant_data: None,
        subscription: None,
    }
}

/// Converts a fractional tax rate into Klarna's hundredths of a percent.
fn tax_rate(rate: Decimal) -> Result<i64> {
    (rate * Decimal::from(10_000))
        .round()
        .to_i64()
        .ok_or_else(|| ErrorKind::BadInput(format!("tax rate out of range: {}", rate)).into())
}
