//! Module tasked with generating mock data to try out the checkout against
//! the Klarna playground.

use rust_decimal_macros::dec;

use crate::db::{Store, StoreExt};
use crate::order::{Address, Customer, OrderItem, ProductImage};
use crate::{Order, OrderId, Payment, Result};

/// Generates and saves a mock order together with a new payment for it.
pub fn generate(store: &dyn Store) -> Result<(Order, Payment)> {
    let order = order();
    let payment = Payment::new(order.id, order.total());

    store.set(&order)?;
    store.set(&payment)?;

    Ok((order, payment))
}

/// Swedish order matching one of the Klarna playground sample customers.
pub fn order() -> Order {
    let address = Address {
        first_name: "Testperson-se".to_string(),
        last_name: "Approved".to_string(),
        company: None,
        street: "Stårgatan 1".to_string(),
        postcode: "12345".to_string(),
        city: "Ankeborg".to_string(),
        province: None,
        country_code: Some("SE".to_string()),
        phone_number: Some("+46765260000".to_string()),
    };

    Order {
        id: OrderId::new_v4(),
        number: format!("{:09}", rand_number()),
        locale: Some("sv_SE".to_string()),
        currency: Some("SEK".to_string()),
        items: vec![
            OrderItem {
                product_code: "MUG-BLUE".to_string(),
                name: "Blue mug".to_string(),
                slug: Some("blue-mug".to_string()),
                quantity: 2,
                unit_price: dec!(129.00),
                discount: dec!(0),
                tax_rate: dec!(0.25),
                tax_total: dec!(51.60),
                images: vec![ProductImage {
                    r#type: "main".to_string(),
                    path: "9f/2c/blue-mug.jpg".to_string(),
                }],
            },
            OrderItem {
                product_code: "BOOK-PIPPI".to_string(),
                name: "Pippi Longstocking".to_string(),
                slug: Some("pippi-longstocking".to_string()),
                quantity: 1,
                unit_price: dec!(199.00),
                discount: dec!(20.00),
                tax_rate: dec!(0.06),
                tax_total: dec!(10.13),
                images: vec![],
            },
        ],
        shipping_total: dec!(49.00),
        order_promotion_total: dec!(-10.00),
        billing_address: Some(address.clone()),
        shipping_address: Some(address),
        customer: Some(Customer {
            email: "customer@email.se".to_string(),
            birthday: chrono::NaiveDate::from_ymd_opt(1941, 3, 21),
            gender: None,
        }),
    }
}

/// Order numbers only need to look different between mock runs.
fn rand_number() -> u64 {
    u64::from(uuid::Uuid::new_v4().as_fields().0) % 1_000_000_000
}
