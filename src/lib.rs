//! Pocketbook is a web service for tracking personal income and expenses.
//!
//! Users record transactions (one-off or generated from recurring templates),
//! group them into budgets with per-category expense lines, and query monthly
//! and yearly summaries. The library exposes a JSON REST API built on axum
//! with a SQLite database as the single source of truth.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod app_state;
mod auth;
mod budget;
mod database_id;
mod date_range;
mod db;
mod endpoints;
mod logging;
mod money;
mod reconcile;
mod routing;
mod summary;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppState, AppConfig};
pub use database_id::{BudgetExpenseId, BudgetId, RecurringTemplateId, TransactionId};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use money::Money;
pub use routing::build_router;
pub use user::{User, UserID, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The resource exists but is owned by a different user.
    #[error("you do not have access to the requested resource")]
    Forbidden,

    /// The request contained malformed input, e.g. an unparseable amount,
    /// an invalid date or an unknown transaction type.
    ///
    /// The message is shown to the client so it can correct the request.
    #[error("{0}")]
    Validation(String),

    /// A transaction generated from a recurring template was edited or deleted
    /// directly.
    ///
    /// The caller should update or delete the recurring transaction with the
    /// given ID instead.
    #[error(
        "the transaction was generated by recurring transaction {0}, \
        update or delete the recurring transaction instead"
    )]
    RecurringOwnershipViolation(RecurringTemplateId),

    /// The request contradicts the current state, e.g. linking a transaction
    /// that is already linked to another budget expense.
    #[error("{0}")]
    Conflict(String),

    /// The session cookie is missing from the cookie jar in the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// The session cookie could not be read or has expired.
    #[error("the session is invalid or has expired")]
    Unauthorized,

    /// An error occurred while serializing or deserializing a session token.
    #[error("could not (de)serialize the session token: {0}")]
    TokenSerializationError(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

/// The JSON body sent to the client when a request fails.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recurring_template_id: Option<RecurringTemplateId>,
}

impl Error {
    /// The HTTP status code that best describes the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::RecurringOwnershipViolation(_) | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::CookieMissing | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::TokenSerializationError(_)
            | Error::InvalidTimezoneError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        let body = match self {
            Error::RecurringOwnershipViolation(template_id) => ErrorBody {
                error: message,
                recurring_template_id: Some(template_id),
            },
            Error::NotFound
            | Error::Forbidden
            | Error::Validation(_)
            | Error::Conflict(_)
            | Error::CookieMissing
            | Error::Unauthorized => ErrorBody {
                error: message,
                recurring_template_id: None,
            },
            // Any errors that are not handled above are not intended to be shown to the client.
            _ => {
                tracing::error!("An unexpected error occurred: {}", message);
                ErrorBody {
                    error: "Something went wrong".to_owned(),
                    recurring_template_id: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use serde_json::{Value, json};

    use crate::Error;

    async fn body_json(error: Error) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Could not read response body");

        (status, serde_json::from_slice(&bytes).expect("Body is not JSON"))
    }

    #[tokio::test]
    async fn validation_error_is_bad_request_with_message() {
        let (status, body) = body_json(Error::Validation("amount is not a number".to_owned())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "amount is not a number" }));
    }

    #[tokio::test]
    async fn recurring_violation_includes_template_id() {
        let (status, body) = body_json(Error::RecurringOwnershipViolation(7)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["recurring_template_id"], json!(7));
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_json(Error::SqlError(rusqlite::Error::InvalidQuery)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Something went wrong" }));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
