use axum::extract::{Path, Query};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Extension, Json};
use http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::client::HppStatus;
use crate::token::{Token, CANCEL_PATH, CAPTURE_PATH, NOTIFY_PATH};
use crate::{ErrorKind, Result};

use super::error::{restart_url, RESTART_URL};
use super::{CheckoutExt, Router};

pub fn router() -> Router {
    Router::new()
        .route(&format!("/{}/:hash", CAPTURE_PATH), get(capture))
        .route(&format!("/{}/:hash", CANCEL_PATH), get(cancel))
        .route(&format!("/{}/:hash", NOTIFY_PATH), post(notify))
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureQuery {
    /// Set by Klarna when the customer returns from the hosted payment page.
    pub authorization_token: Option<String>,
    /// Set instead when Klarna placed the order itself.
    pub order_id: Option<String>,
    /// Hosted payment page session the customer returns from.
    pub sid: Option<String>,
}

async fn capture(
    Extension(checkout): CheckoutExt,
    Path(hash): Path<Uuid>,
    Query(query): Query<CaptureQuery>,
) -> Result<Redirect> {
    let token = find(&checkout, hash, CAPTURE_PATH)?;
    let sid = query.sid.as_deref();

    if let Some(authorization_token) = &query.authorization_token {
        let order = checkout
            .complete(token.payment, authorization_token, sid)
            .await?;
        tracing::debug!("klarna order {} placed for payment {}", order.order_id, token.payment);
        return Ok(Redirect::to(after_url(&token)));
    }
    if let Some(order_id) = &query.order_id {
        checkout.confirm_order(token.payment, order_id, sid).await?;
        tracing::debug!("klarna placed order {} for payment {}", order_id, token.payment);
        return Ok(Redirect::to(after_url(&token)));
    }

    match checkout.proceed(token.payment, &token).await {
        Ok(target) => Ok(Redirect::to(target.as_str())),
        Err(e) if e.requires_restart() => {
            tracing::info!("{}", e);
            Ok(Redirect::to(&restart_url(after_url(&token), &e.kind)))
        }
        Err(e) => Err(e),
    }
}

async fn cancel(Extension(checkout): CheckoutExt, Path(hash): Path<Uuid>) -> Result<Redirect> {
    let token = find(&checkout, hash, CANCEL_PATH)?;
    checkout.cancel(token.payment).await?;
    Ok(Redirect::to(after_url(&token)))
}

/// Status update pushed by Klarna for a hosted payment page session.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub session: StatusUpdateSession,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateSession {
    pub session_id: String,
    pub status: HppStatus,
}

async fn notify(
    Extension(checkout): CheckoutExt,
    Path(hash): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<StatusCode> {
    let token = find(&checkout, hash, NOTIFY_PATH)?;
    checkout
        .notify(token.payment, &update.session.session_id, update.session.status)
        .await?;
    Ok(StatusCode::OK)
}

/// Finds the token and makes sure it was issued for the route it is
/// redeemed at.
fn find(checkout: &crate::Checkout, hash: Uuid, path: &str) -> Result<Token> {
    let token = checkout.find_token(hash)?;
    if !token.target_url.contains(path) {
        return Err(ErrorKind::NotFound(format!("token {} not valid for {}", hash, path)).into());
    }
    Ok(token)
}

fn after_url(token: &Token) -> &str {
    token.after_url.as_deref().unwrap_or(RESTART_URL)
}
