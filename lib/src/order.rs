use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Collectable, Identifiable};

pub type OrderId = Uuid;

/// Snapshot of a storefront order as needed for paying it with Klarna.
///
/// Amounts are expressed in the order currency as decimals and include tax.
/// Item totals already include item level promotions, `order_promotion_total`
/// holds the (negative) sum of order level promotions.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Order {
    /// Unique identifier for the order
    pub id: OrderId,
    /// Human facing order number, e.g. `000000042`
    pub number: String,
    /// Storefront locale the order was placed with, e.g. `en_US`
    pub locale: Option<String>,
    /// ISO 4217 currency code
    pub currency: Option<String>,
    /// List of items included in the order
    pub items: Vec<OrderItem>,

    pub shipping_total: Decimal,
    pub order_promotion_total: Decimal,

    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
    pub customer: Option<Customer>,
}

impl Collectable for Order {
    fn get_collection_name() -> &'static str {
        "order"
    }
}

impl Identifiable for Order {
    fn get_id(&self) -> uuid::Uuid {
        self.id
    }
}

impl Order {
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(OrderItem::total).sum()
    }

    /// Calculates the grand total of the order.
    pub fn total(&self) -> Decimal {
        self.items_total() + self.shipping_total + self.order_promotion_total
    }

    /// Sums up tax included in the item totals.
    pub fn tax_total(&self) -> Decimal {
        self.items.iter().map(|i| i.tax_total).sum()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OrderItem {
    pub product_code: String,
    pub name: String,
    pub slug: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Item level promotions, as a positive amount
    pub discount: Decimal,
    /// Tax rate as a fraction, `0.22` for 22%
    pub tax_rate: Decimal,
    /// Tax included in the item total
    pub tax_total: Decimal,
    pub images: Vec<ProductImage>,
}

impl OrderItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() - self.discount
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProductImage {
    pub r#type: String,
    /// Path relative to the media root
    pub path: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub street: String,
    pub postcode: String,
    pub city: String,
    pub province: Option<String>,
    /// ISO 3166-1 alpha-2 code
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Customer {
    pub email: String,
    pub birthday: Option<chrono::NaiveDate>,
    pub gender: Option<String>,
}
