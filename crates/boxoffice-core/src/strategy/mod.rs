//! Credential-exchange handshakes.
//!
//! The API can run with cookie sessions guarded by a CSRF token, or with
//! bearer tokens. Both are expressed as an [`AuthStrategy`] so the session
//! manager never needs to know which one is in use.

mod bearer;
mod csrf_cookie;

pub use bearer::BearerStrategy;
pub use csrf_cookie::CsrfCookieStrategy;

use crate::config::{AuthMode, ClientConfig};
use crate::error::AuthError;
use crate::models::{AuthResponse, Credentials, RegisterData, User};
use crate::storage::PersistedSession;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Result of a successful login or registration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    /// The payload exactly as the server sent it.
    pub response: AuthResponse,
    /// The user to store: from the response, or fetched when it had none.
    pub user: User,
    pub token: Option<String>,
}

pub trait AuthStrategy: Send + Sync {
    fn mode(&self) -> AuthMode;

    fn login(
        &self,
        transport: &dyn Transport,
        credentials: &Credentials,
    ) -> Result<AuthOutcome, AuthError>;

    fn register(
        &self,
        transport: &dyn Transport,
        data: &RegisterData,
    ) -> Result<AuthOutcome, AuthError>;

    /// Invalidate the server-side session or token.
    fn logout(&self, transport: &dyn Transport, credential: Option<&str>) -> Result<(), AuthError>;

    /// Ask the server who we are. 401 comes back as [`AuthError::SessionExpired`].
    fn restore(&self, transport: &dyn Transport, credential: Option<&str>)
        -> Result<User, AuthError>;

    /// Add whatever headers authenticate `request`.
    fn authorize(
        &self,
        transport: &dyn Transport,
        credential: Option<&str>,
        request: ApiRequest,
    ) -> ApiRequest;

    /// Whether persisted state is enough to attempt a restore.
    fn can_restore(&self, persisted: &PersistedSession) -> bool;
}

/// Build the strategy `config` asks for.
pub fn strategy_for(config: &ClientConfig) -> Box<dyn AuthStrategy> {
    match config.mode {
        AuthMode::CsrfCookie => Box::new(CsrfCookieStrategy::new(
            config.endpoints.clone(),
            config.csrf_cookie_name.clone(),
            config.csrf_header_name.clone(),
        )),
        AuthMode::Bearer => Box::new(BearerStrategy::new(config.endpoints.clone())),
    }
}

pub(crate) fn accept_json(request: ApiRequest) -> ApiRequest {
    request.header("Accept", "application/json")
}

pub(crate) fn bearer(request: ApiRequest, token: Option<&str>) -> ApiRequest {
    match token {
        Some(token) => request.header("Authorization", format!("Bearer {token}")),
        None => request,
    }
}

/// Turn a login/register response into an [`AuthResponse`] or an error.
pub(crate) fn parse_auth_response(response: &ApiResponse) -> Result<AuthResponse, AuthError> {
    if !response.is_success() {
        return Err(AuthError::from_response(response));
    }

    let parsed: Option<AuthResponse> = response
        .json()
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
    let parsed = parsed.unwrap_or_default();

    if parsed.success == Some(false) {
        return Err(AuthError::Authentication {
            status: response.status,
            message: parsed.message,
        });
    }

    Ok(parsed)
}

/// Send a "who am I" request and read the bare user record.
pub(crate) fn fetch_user(transport: &dyn Transport, request: &ApiRequest) -> Result<User, AuthError> {
    let response = transport.send(request)?;
    match response.status {
        401 => Err(AuthError::SessionExpired),
        _ if response.is_success() => response
            .json::<User>()
            .map_err(|e| AuthError::InvalidResponse(format!("user record: {e}"))),
        _ => Err(AuthError::from_response(&response)),
    }
}

/// Send a best-effort logout call.
pub(crate) fn send_logout(transport: &dyn Transport, request: &ApiRequest) -> Result<(), AuthError> {
    let response = transport.send(request)?;
    if response.is_success() {
        Ok(())
    } else {
        Err(AuthError::from_response(&response))
    }
}
