//! Cookie-session handshake guarded by a CSRF token.
//!
//! ```text
//! GET  /sanctum/csrf-cookie     -> Set-Cookie: XSRF-TOKEN=...
//! POST /api/login               X-XSRF-TOKEN: <decoded cookie>
//! GET  /api/user                (only when the login body has no user)
//! ```
//!
//! The server keeps the session in its own cookie; the client never sees a
//! credential unless the login response volunteers a token.

use serde_json::Value;

use super::{
    accept_json, bearer, fetch_user, parse_auth_response, send_logout, AuthOutcome, AuthStrategy,
};
use crate::config::{AuthMode, Endpoints};
use crate::cookies::extract_cookie;
use crate::error::AuthError;
use crate::models::{Credentials, RegisterData, User};
use crate::storage::PersistedSession;
use crate::transport::{ApiRequest, Transport};

pub struct CsrfCookieStrategy {
    endpoints: Endpoints,
    cookie_name: String,
    header_name: String,
}

impl CsrfCookieStrategy {
    pub fn new(endpoints: Endpoints, cookie_name: String, header_name: String) -> Self {
        Self {
            endpoints,
            cookie_name,
            header_name,
        }
    }

    /// The CSRF token currently in the jar, decoded.
    pub fn current_token(&self, transport: &dyn Transport) -> Option<String> {
        extract_cookie(&transport.cookie_string(), &self.cookie_name)
    }

    /// Ask the server for a fresh CSRF cookie and read it back.
    ///
    /// Only an unreachable server is an error. A non-2xx answer or a missing
    /// cookie just means the next request goes out without the header.
    fn prime(&self, transport: &dyn Transport) -> Result<Option<String>, AuthError> {
        let response = transport.send(&accept_json(ApiRequest::get(&self.endpoints.csrf)))?;
        if !response.is_success() {
            log::warn!(
                "CSRF endpoint {} answered {}",
                self.endpoints.csrf,
                response.status
            );
        }

        let token = self.current_token(transport);
        if token.is_none() {
            log::warn!("No {} cookie after CSRF request", self.cookie_name);
        }
        Ok(token)
    }

    fn with_csrf(&self, request: ApiRequest, token: Option<String>) -> ApiRequest {
        match token {
            Some(token) => request.header(&self.header_name, token),
            None => request,
        }
    }

    /// The full handshake: prime, post, fetch the user if the body lacks one.
    fn exchange(
        &self,
        transport: &dyn Transport,
        path: &str,
        body: Value,
    ) -> Result<AuthOutcome, AuthError> {
        let token = self.prime(transport)?;
        let request = self.with_csrf(accept_json(ApiRequest::post(path, body)), token);

        let response = parse_auth_response(&transport.send(&request)?)?;
        let user = match response.user.clone() {
            Some(user) => user,
            None => self.restore(transport, response.token.as_deref())?,
        };

        Ok(AuthOutcome {
            token: response.token.clone(),
            user,
            response,
        })
    }
}

impl AuthStrategy for CsrfCookieStrategy {
    fn mode(&self) -> AuthMode {
        AuthMode::CsrfCookie
    }

    fn login(
        &self,
        transport: &dyn Transport,
        credentials: &Credentials,
    ) -> Result<AuthOutcome, AuthError> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        self.exchange(transport, &self.endpoints.login, body)
    }

    fn register(
        &self,
        transport: &dyn Transport,
        data: &RegisterData,
    ) -> Result<AuthOutcome, AuthError> {
        let body = serde_json::to_value(data).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        self.exchange(transport, &self.endpoints.register, body)
    }

    fn logout(&self, transport: &dyn Transport, credential: Option<&str>) -> Result<(), AuthError> {
        let request = self.authorize(
            transport,
            credential,
            ApiRequest::post(&self.endpoints.logout, Value::Object(Default::default())),
        );
        send_logout(transport, &request)
    }

    fn restore(
        &self,
        transport: &dyn Transport,
        credential: Option<&str>,
    ) -> Result<User, AuthError> {
        let request = self.authorize(transport, credential, ApiRequest::get(&self.endpoints.user));
        fetch_user(transport, &request)
    }

    fn authorize(
        &self,
        transport: &dyn Transport,
        credential: Option<&str>,
        request: ApiRequest,
    ) -> ApiRequest {
        let request = self.with_csrf(accept_json(request), self.current_token(transport));
        bearer(request, credential)
    }

    fn can_restore(&self, persisted: &PersistedSession) -> bool {
        persisted.user.is_some() || persisted.token.is_some()
    }
}
