use axum::response::{Html, IntoResponse, Redirect, Response};
use http::StatusCode;

use crate::{Error, ErrorKind};

/// Page customers are sent to when the checkout has to be started over.
pub const RESTART_URL: &str = "/";

/// Builds the url taking the customer back to `target` with a message
/// explaining why the checkout could not continue.
pub fn restart_url(target: &str, kind: &ErrorKind) -> String {
    let msg = match kind {
        ErrorKind::SessionExpired => "Your payment session has expired, please try again",
        ErrorKind::SessionAlreadyConsumed => "This payment session was already used",
        _ => "Payment could not be processed, please try again",
    };
    let separator = if target.contains('?') { '&' } else { '?' };
    format!(
        "{}{}msg={}",
        target,
        separator,
        url::form_urlencoded::byte_serialize(msg.as_bytes()).collect::<String>()
    )
}

/// Implements conversion into html response for all possible error variants.
///
/// # Error message stripping in production
///
/// When compiled with optimizations ("release mode"), provider responses are
/// not passed on to the customer.
///
/// Backtrace and payment context are never part of the response and always
/// only available through the application logs.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self.kind {
            ErrorKind::SessionExpired | ErrorKind::SessionAlreadyConsumed => {
                tracing::debug!("{}", self.to_string());
                Redirect::to(&restart_url(RESTART_URL, &self.kind)).into_response()
            }
            ErrorKind::ProviderError { .. } | ErrorKind::ReqwestError(_) => {
                tracing::warn!("{}", self.to_string());
                let msg = if cfg!(debug_assertions) {
                    self.kind.to_string()
                } else {
                    "Payment provider unavailable".to_string()
                };
                (StatusCode::BAD_GATEWAY, Html(msg)).into_response()
            }
            ErrorKind::InvalidStoredState(_) => {
                tracing::error!("{}", self.to_string());
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            ErrorKind::NotFound(_) => {
                tracing::debug!("{}", self.to_string());
                StatusCode::NOT_FOUND.into_response()
            }
            ErrorKind::BadInput(_) => {
                tracing::trace!("{}", self.to_string());
                (StatusCode::BAD_REQUEST, Html(self.kind.to_string())).into_response()
            }
            _ => {
                tracing::error!("{}", self.to_string());
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
