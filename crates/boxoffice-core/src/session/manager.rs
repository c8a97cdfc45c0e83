//! SessionManager - the single owner of the authenticated user.
//!
//! Every view gets the same instance (usually behind an `Arc`) and goes
//! through it for login, logout, registration, restore on startup and any
//! authenticated API call. Nothing else reads or writes the session keys in
//! storage.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::state::{Session, SessionSnapshot, SessionStatus};
use crate::config::{AuthMode, ClientConfig};
use crate::error::AuthError;
use crate::event_bus::{EventBus, SessionEvent};
use crate::logging::open_log_file;
use crate::models::{AuthResponse, Credentials, RegisterData, User};
use crate::storage::{
    clear_session, load_session, save_session, FileStorage, SessionStorage, COOKIE_FILE, TOKEN_KEY,
};
use crate::strategy::{strategy_for, AuthOutcome, AuthStrategy};
use crate::transport::{ApiRequest, ApiResponse, Transport, UreqTransport};

/// Owns session state and drives the configured [`AuthStrategy`].
///
/// Operations block until the network exchange finishes. They are not
/// serialized against each other: two overlapping logins both apply their
/// result and the last one to finish wins. Views are expected to disable
/// their controls while [`SessionManager::is_loading`] is true.
pub struct SessionManager {
    strategy: Box<dyn AuthStrategy>,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn SessionStorage>,
    session: Mutex<Session>,
    in_flight: AtomicUsize,
    events: Arc<EventBus>,
}

/// Marks an operation as in flight until dropped.
struct LoadingGuard<'a> {
    manager: &'a SessionManager,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.manager.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.manager.events.emit(SessionEvent::LoadingChanged(false));
        }
    }
}

impl SessionManager {
    pub fn new(
        strategy: Box<dyn AuthStrategy>,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            strategy,
            transport,
            storage,
            session: Mutex::new(Session::default()),
            in_flight: AtomicUsize::new(0),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Wire a manager whose session lives in `dir`: `storage.json` for the
    /// user and token, `cookies.json` for the cookie jar. Strategy by mode,
    /// wire log when `log_dir` is set.
    pub fn open(config: &ClientConfig, dir: &Path) -> Result<Self, AuthError> {
        let storage = Arc::new(FileStorage::open(dir)?);
        let wire_log = open_log_file(config.log_dir.as_deref(), "wire");
        let transport =
            UreqTransport::with_cookie_file(config.base_url.clone(), dir.join(COOKIE_FILE))
                .with_wire_log(wire_log);
        Ok(Self::new(strategy_for(config), Arc::new(transport), storage))
    }

    /// Share an existing bus (e.g. one a UI shell already listens on).
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.strategy.mode()
    }

    pub fn status(&self) -> SessionStatus {
        self.session.lock().unwrap().status()
    }

    pub fn user(&self) -> Option<User> {
        self.session.lock().unwrap().user().cloned()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().unwrap().snapshot()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Restore the session from storage and confirm it with the server.
    ///
    /// Never fails. A 401 logs the session out locally; any other failure
    /// keeps the optimistic state so a flaky network doesn't sign people out.
    pub fn check_auth(&self) -> SessionStatus {
        let _loading = self.begin_loading();
        let persisted = load_session(self.storage.as_ref());

        if !self.strategy.can_restore(&persisted) {
            log::debug!("No persisted session");
            self.transition(Session::clear);
            return SessionStatus::Unauthenticated;
        }

        let token = persisted.token.clone();
        self.transition(|s| s.begin_check(persisted.user, token.clone()));

        match self
            .strategy
            .restore(self.transport.as_ref(), token.as_deref())
        {
            Ok(user) => {
                if let Err(e) = save_session(self.storage.as_ref(), &user, None) {
                    log::warn!("Failed to persist refreshed user: {}", e);
                }
                log::debug!("Session restored for {}", user.email);
                self.transition(|s| s.authenticate(user, token));
            }
            Err(AuthError::SessionExpired) => {
                log::info!("Persisted session rejected by server");
                self.expire();
            }
            Err(e) => {
                log::warn!("Session check failed, keeping current state: {}", e);
                self.transition(|s| {
                    if s.status() == SessionStatus::Checking {
                        s.clear();
                    }
                });
            }
        }

        self.status()
    }

    pub fn login(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        let _loading = self.begin_loading();
        let outcome = self
            .strategy
            .login(self.transport.as_ref(), credentials)?;
        self.establish(outcome)
    }

    /// Register and, on success, treat the response exactly like a login.
    pub fn register(&self, data: &RegisterData) -> Result<AuthResponse, AuthError> {
        let _loading = self.begin_loading();
        let outcome = self.strategy.register(self.transport.as_ref(), data)?;
        self.establish(outcome)
    }

    /// Invalidate the session on the server, then clear it locally no matter
    /// how that went. The server call's error (if any) is still returned.
    pub fn logout(&self) -> Result<(), AuthError> {
        let _loading = self.begin_loading();
        let credential = self.credential();

        let remote = self
            .strategy
            .logout(self.transport.as_ref(), credential.as_deref());
        if let Err(e) = &remote {
            log::warn!("Logout request failed, clearing local session anyway: {}", e);
        }

        let local = self.clear_local();
        remote.and(local)
    }

    /// Send `request` with the active credential attached.
    ///
    /// A 401 means the server no longer accepts the session: it is cleared
    /// locally and [`AuthError::SessionExpired`] is returned.
    pub fn authorized_request(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let credential = self.credential();
        let request = self
            .strategy
            .authorize(self.transport.as_ref(), credential.as_deref(), request);

        let response = self.transport.send(&request)?;
        match response.status {
            401 => {
                log::info!("{} answered 401, ending session", request.path);
                self.expire();
                Err(AuthError::SessionExpired)
            }
            _ if response.is_success() => Ok(response),
            _ => Err(AuthError::from_response(&response)),
        }
    }

    fn establish(&self, outcome: AuthOutcome) -> Result<AuthResponse, AuthError> {
        let AuthOutcome {
            response,
            user,
            token,
        } = outcome;

        if let Err(e) = self.persist(&user, token.as_deref()) {
            if let Err(rollback) = clear_session(self.storage.as_ref()) {
                log::error!("Failed to roll back partial session write: {}", rollback);
            }
            return Err(e.into());
        }

        log::debug!("Authenticated as {}", user.email);
        self.transition(|s| s.authenticate(user, token));
        Ok(response)
    }

    fn persist(&self, user: &User, token: Option<&str>) -> Result<(), crate::storage::StorageError> {
        save_session(self.storage.as_ref(), user, token)?;
        if token.is_none() {
            // A cookie session must not inherit a token from an older login.
            self.storage.remove_item(TOKEN_KEY)?;
        }
        Ok(())
    }

    fn credential(&self) -> Option<String> {
        let in_memory = self.session.lock().unwrap().credential().map(str::to_string);
        in_memory.or_else(|| load_session(self.storage.as_ref()).token)
    }

    fn expire(&self) {
        if let Err(e) = self.clear_local() {
            log::error!("Failed to clear expired session: {}", e);
        }
    }

    fn clear_local(&self) -> Result<(), AuthError> {
        let result = clear_session(self.storage.as_ref());
        self.transition(Session::clear);
        result.map_err(AuthError::from)
    }

    /// Apply `f` and broadcast the new snapshot if anything visible changed.
    fn transition(&self, f: impl FnOnce(&mut Session)) {
        let changed = {
            let mut session = self.session.lock().unwrap();
            let before = session.snapshot();
            f(&mut *session);
            let after = session.snapshot();
            (before != after).then_some(after)
        };

        if let Some(snapshot) = changed {
            log::debug!("Session status: {}", snapshot.status);
            self.events.emit(SessionEvent::StatusChanged(snapshot));
        }
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.events.emit(SessionEvent::LoadingChanged(true));
        }
        LoadingGuard { manager: self }
    }
}
