//! Error responses of the sign-in actions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failure of a sign-in action, rendered as a status code and JSON body
#[derive(Error, Debug)]
pub enum ActionError {
    /// A required form field was empty
    #[error("Missing required field")]
    Missing { email: String },

    /// No fresh pin matched the submitted code and email
    #[error("Invalid credentials")]
    InvalidCredentials { email: String },

    /// The Google credential was malformed or failed verification
    #[error("Invalid credential")]
    InvalidCredential,

    /// Storage or another dependency failed
    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ActionError::Missing { email } => (
                StatusCode::BAD_REQUEST,
                json!({ "missing": true, "email": email }),
            ),
            ActionError::InvalidCredentials { email } => (
                StatusCode::BAD_REQUEST,
                json!({ "credentials": true, "email": email }),
            ),
            ActionError::InvalidCredential => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid credential" }),
            ),
            ActionError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for action results
pub type ActionResult<T> = Result<T, ActionError>;
