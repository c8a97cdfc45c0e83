//! Wire types shared by the auth strategies and the session manager.
//!
//! The API is inconsistent about optional fields, so every record keeps
//! unknown keys in an `extra` map. Re-persisting a user therefore writes back
//! exactly what the server sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User identifier. The API uses numeric ids, some fixtures use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{n}"),
            UserId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// The authenticated user as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    pub email: String,

    #[serde(default)]
    pub name: String,

    /// "admin", "cashier", "customer", ...
    #[serde(default)]
    pub role: Option<String>,

    /// Fields we don't model (timestamps, avatar, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// Login input. Validation is owned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Registration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub email: String,

    pub password: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_confirmation: Option<String>,

    /// Any additional fields the registration form collects (phone, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a successful login or register call.
///
/// Canonical shape is `{ "user": {...}, "token": "..." }`. A `success` flag
/// may be present; `false` is treated as a rejection even on a 2xx.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
