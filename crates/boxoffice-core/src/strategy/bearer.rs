//! Token handshake: one POST, then `Authorization: Bearer` on everything.

use serde_json::Value;

use super::{accept_json, bearer, fetch_user, parse_auth_response, send_logout, AuthOutcome, AuthStrategy};
use crate::config::{AuthMode, Endpoints};
use crate::error::AuthError;
use crate::models::{Credentials, RegisterData, User};
use crate::storage::PersistedSession;
use crate::transport::{ApiRequest, Transport};

pub struct BearerStrategy {
    endpoints: Endpoints,
}

impl BearerStrategy {
    pub fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }

    fn exchange(
        &self,
        transport: &dyn Transport,
        path: &str,
        body: Value,
    ) -> Result<AuthOutcome, AuthError> {
        let request = accept_json(ApiRequest::post(path, body));
        let response = parse_auth_response(&transport.send(&request)?)?;

        let token = response
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("response carried no token".to_string()))?;

        let user = match response.user.clone() {
            Some(user) => user,
            None => self.restore(transport, Some(&token))?,
        };

        Ok(AuthOutcome {
            response,
            user,
            token: Some(token),
        })
    }
}

impl AuthStrategy for BearerStrategy {
    fn mode(&self) -> AuthMode {
        AuthMode::Bearer
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

    /// Nothing to invalidate without a token, so no request is sent.
    fn logout(&self, transport: &dyn Transport, credential: Option<&str>) -> Result<(), AuthError> {
        if credential.is_none() {
            return Ok(());
        }
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
        if credential.is_none() {
            return Err(AuthError::SessionExpired);
        }
        let request = self.authorize(transport, credential, ApiRequest::get(&self.endpoints.user));
        fetch_user(transport, &request)
    }

    fn authorize(
        &self,
        _transport: &dyn Transport,
        credential: Option<&str>,
        request: ApiRequest,
    ) -> ApiRequest {
        bearer(accept_json(request), credential)
    }

    fn can_restore(&self, persisted: &PersistedSession) -> bool {
        persisted.token.is_some()
    }
}
