//! # boxoffice-core
//!
//! Client-side session management for the Boxoffice cinema booking API.
//!
//! This crate is UI-agnostic and can be used by:
//! - The `boxoffice` command-line client
//! - Any desktop or web shell that renders the booking screens
//!
//! ## Key Concepts
//!
//! - **SessionManager**: The single owner of the authenticated user
//! - **AuthStrategy**: The credential handshake (CSRF cookie or bearer token)
//! - **Transport**: The HTTP seam; `ureq` in production, scripted in tests
//! - **SessionStorage**: Where the user and token survive restarts

pub mod catalog;
pub mod config;
pub mod cookies;
pub mod error;
pub mod event_bus;
pub mod logging;
pub mod models;
pub mod paths;
pub mod probe;
pub mod session;
pub mod storage;
pub mod strategy;
pub mod transport;

mod test_support;

// Re-export commonly used types
pub use config::{AuthMode, ClientConfig};
pub use error::AuthError;
pub use models::{AuthResponse, Credentials, RegisterData, User};
pub use session::{SessionManager, SessionStatus};
