//! Klarna checkout for storefronts.
//!
//! Drives a storefront payment through Klarna's payment session and hosted
//! payment page APIs. The entry point is [`Checkout`], which given a payment
//! record works out which provider sessions still need creating, validates
//! the ones that were created on earlier requests and hands back the url the
//! customer's browser should be sent to.
//!
//! ```ignore
//! let config: Config = config::load()?;
//! let checkout = Checkout::from_config(&config, Database::new()?)?;
//!
//! let token = checkout.capture_token(payment_id)?;
//! let redirect = checkout.proceed(payment_id, &token).await?;
//! ```

pub mod capture;
pub mod client;
pub mod config;
pub mod converter;
pub mod db;
pub mod error;
pub mod mock;
pub mod order;
pub mod payment;
pub mod resolver;
pub mod token;
pub mod tracing;

#[cfg(feature = "axum")]
pub mod axum;

pub use capture::{Checkout, RedirectTarget};
pub use config::Config;
pub use db::{MemoryDb, Store};
pub use error::{Error, ErrorKind, Result};
pub use order::{Order, OrderId};
pub use payment::{Payment, PaymentDetails, PaymentId};

#[cfg(feature = "sled")]
pub use db::Database;
