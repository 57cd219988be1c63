mod details;

pub use details::{keys, Details, PaymentDetails, Stage};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::{Collectable, Identifiable};
use crate::order::OrderId;

pub type PaymentId = uuid::Uuid;

/// Payment instance object.
///
/// Payment is attached to an order and tracks whether the customer has paid
/// for it.
///
///
/// # Klarna details
///
/// Provider side state lives in `details`, a flat string map that survives
/// between requests. Its content is owned by the checkout flow and is only
/// ever read through [`PaymentDetails`], which validates it on load.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Payment {
    pub id: PaymentId,

    pub status: Status,

    pub order: OrderId,
    /// Amount to be paid, in the order currency.
    pub amount: Decimal,

    #[serde(default)]
    pub details: Details,
}

impl Collectable for Payment {
    fn get_collection_name() -> &'static str {
        "payment"
    }
}

impl Identifiable for Payment {
    fn get_id(&self) -> uuid::Uuid {
        self.id
    }
}

impl Payment {
    pub fn new(order: OrderId, amount: Decimal) -> Self {
        Self {
            id: PaymentId::new_v4(),
            status: Status::New,
            order,
            amount,
            details: Details::new(),
        }
    }

    /// Clears all provider state, allowing the checkout to start over with
    /// fresh sessions.
    pub fn reset(&mut self) {
        self.details.clear();
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Status {
    /// Payment was not started yet
    New,
    /// Waiting for payment
    Pending,
    /// Payment was canceled
    Canceled,
    /// An unrecoverable problem occured during payment processing
    Error(String),
    /// Payment was confirmed to be successful
    Successful { time: DateTime<Utc> },
}
