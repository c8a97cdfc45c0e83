//! Error taxonomy for session operations.

use thiserror::Error;

use crate::storage::StorageError;
use crate::transport::{ApiResponse, TransportError};

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum AuthError {
    /// The server rejected the credentials or the request (401, 419, 422, ...).
    #[error("Authentication failed ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Authentication {
        status: u16,
        message: Option<String>,
    },

    /// The "who am I" check or an authorized call came back 401.
    #[error("Session expired")]
    SessionExpired,

    /// The request never completed.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rejected locally before anything was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Build the error for a non-2xx response, pulling the server's message
    /// out of the body when there is one.
    pub fn from_response(response: &ApiResponse) -> Self {
        let message = response.server_message();
        match response.status {
            status if (400..500).contains(&status) => AuthError::Authentication { status, message },
            status => AuthError::Server { status, message },
        }
    }

    /// Text a view should show: the raw server message when available.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Authentication {
                message: Some(m), ..
            }
            | AuthError::Server {
                message: Some(m), ..
            } => m.clone(),
            AuthError::Authentication { status: 419, .. } => {
                "Your session token is missing or stale. Please reload and try again.".to_string()
            }
            AuthError::Authentication { .. } => "Invalid email or password.".to_string(),
            AuthError::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            AuthError::Network(_) => {
                "Unable to reach the server. Check your connection.".to_string()
            }
            AuthError::InvalidInput(m) => m.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    /// Whether the failure is worth retrying later without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::Server { .. })
    }
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        AuthError::Network(e.to_string())
    }
}
