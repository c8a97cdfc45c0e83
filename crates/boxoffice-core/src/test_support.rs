//! Test fixtures shared by the unit tests.
//!
//! Only compiled when running tests.

#![cfg(test)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Map, Value};

use crate::models::{User, UserId};
use crate::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};

type Reply = Result<ApiResponse, TransportError>;

/// A [`Transport`] that answers from a script and records every request.
///
/// Each route holds a queue of replies. The last reply in a queue repeats, so
/// a single `respond` covers any number of calls. Unscripted routes get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
    cookies: Mutex<String>,
    /// Cookie string to install when a given path is hit (like Set-Cookie).
    cookies_on: Mutex<HashMap<String, String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        let body = if body.is_null() {
            String::new()
        } else {
            body.to_string()
        };
        self.push(method, path, Ok(ApiResponse { status, body }));
        self
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(
            method,
            path,
            Err(TransportError::Unreachable(message.to_string())),
        );
        self
    }

    /// Make a hit on `path` set the jar to `cookies`.
    pub fn set_cookies_on(&self, path: &str, cookies: &str) -> &Self {
        self.cookies_on
            .lock()
            .unwrap()
            .insert(path.to_string(), cookies.to_string());
        self
    }

    pub fn set_cookies(&self, cookies: &str) {
        *self.cookies.lock().unwrap() = cookies.to_string();
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(cookies) = self.cookies_on.lock().unwrap().get(&request.path) {
            *self.cookies.lock().unwrap() = cookies.clone();
        }

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(request.method, request.path.clone())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Ok(ApiResponse {
                status: 404,
                body: json!({"message": "Not Found"}).to_string(),
            }),
        }
    }

    fn cookie_string(&self) -> String {
        self.cookies.lock().unwrap().clone()
    }
}

pub fn make_user(id: u64, email: &str, role: &str) -> User {
    User {
        id: UserId::Number(id),
        email: email.to_string(),
        name: email.split('@').next().unwrap_or_default().to_string(),
        role: Some(role.to_string()),
        extra: Map::new(),
    }
}

pub fn user_json(user: &User) -> Value {
    serde_json::to_value(user).unwrap()
}
