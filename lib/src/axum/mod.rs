//! Storefront routes driving the checkout.
//!
//! All routes are keyed by token hash, never by payment id:
//!
//! - `GET /payment/capture/:hash` starts or resumes the checkout and
//!   redirects to the hosted payment page. When Klarna sends the customer
//!   back with an `authorization_token` the same route places the order.
//! - `GET /payment/cancel/:hash` abandons the checkout.
//! - `POST /payment/notify/:hash` receives hosted payment page status
//!   updates from Klarna.

pub mod error;
pub mod payment;

use std::sync::Arc;

use axum::Extension;

use crate::{Checkout, Config, Result};

pub type Router = axum::Router;

pub type CheckoutExt = Extension<Arc<Checkout>>;

/// Returns the checkout routes. Expects a [`CheckoutExt`] layer.
pub fn router() -> Router {
    payment::router()
}

/// Opens the configured database, sets up the checkout and starts serving
/// the checkout routes.
#[cfg(feature = "sled")]
pub async fn start(config: Config) -> Result<()> {
    let db = crate::Database::open(&config.db_path)?;
    start_with(db, config).await
}

pub async fn start_with(store: impl crate::Store + 'static, config: Config) -> Result<()> {
    crate::tracing::init(&config).unwrap_or_else(|e| {
        log::warn!("failed to initialize tracing (perhaps it was already initialized?): {e}")
    });

    let checkout = Checkout::from_config(&config, store)?;

    // Seed a payment that can be checked out right away.
    if config.dev.enabled && config.dev.mock {
        let (_, payment) = crate::mock::generate(checkout.store())?;
        let token = checkout.capture_token(payment.id)?;
        tracing::info!("mock payment {} can be captured at {}", payment.id, token.target_url);
    }

    let router = router()
        .layer(Extension(Arc::new(checkout)))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = config.address;
    tracing::info!("starting server at {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
