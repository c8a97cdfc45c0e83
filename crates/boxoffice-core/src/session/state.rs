//! Session status and the in-memory session record.

use serde::{Deserialize, Serialize};

use crate::models::User;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    /// A restore is in flight and there was no persisted user to show meanwhile.
    Checking,
    Authenticated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Unauthenticated => "unauthenticated",
            SessionStatus::Checking => "checking",
            SessionStatus::Authenticated => "authenticated",
        };
        f.write_str(s)
    }
}

/// The authenticated identity for this client context.
///
/// Only constructed through the transition methods, which keep
/// `status == Authenticated` implying a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    status: SessionStatus,
    user: Option<User>,
    credential: Option<String>,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn authenticate(&mut self, user: User, credential: Option<String>) {
        self.status = SessionStatus::Authenticated;
        self.user = Some(user);
        self.credential = credential;
    }

    /// Start a restore. A persisted user lets us show the session right away.
    pub fn begin_check(&mut self, user: Option<User>, credential: Option<String>) {
        self.status = if user.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Checking
        };
        self.user = user;
        self.credential = credential;
    }

    pub fn clear(&mut self) {
        *self = Session::default();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            user: self.user.clone(),
        }
    }
}

/// What views get to see. The credential is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user: Option<User>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}
