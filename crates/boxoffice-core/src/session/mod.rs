//! Session management for the booking client.
//!
//! One [`SessionManager`] per client context owns the authenticated user;
//! views read from it and subscribe to its events instead of poking at
//! storage or cookies themselves.

mod manager;
mod state;

pub use manager::SessionManager;
pub use state::{Session, SessionSnapshot, SessionStatus};
