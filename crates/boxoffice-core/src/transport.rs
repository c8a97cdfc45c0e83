//! HTTP transport.
//!
//! Everything that talks to the API goes through [`Transport`], so the auth
//! strategies can be exercised against a scripted fake in tests and against
//! [`UreqTransport`] in production. Non-2xx statuses are ordinary responses;
//! only an exchange that never completes is a [`TransportError`].

use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use cookie_store::CookieStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::cookies::render_cookie_string;
use crate::logging::{disabled_log, log_line, redact_body, redact_header, redact_json, LogHandle};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Unreachable(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// An outgoing API call. `path` is joined onto the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).json(body)
    }

    /// Attach a JSON body and the matching content type.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self.header("Content-Type", "application/json")
    }

    /// Set a header, replacing any existing value (names compare case-insensitively).
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A completed exchange, whatever the status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body. An empty body is read as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.body.trim().is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_str(&self.body)
        }
    }

    /// The human-readable message a server put in an error body, if any.
    ///
    /// Checks `message`, then `error`, then the first validation error under
    /// `errors`.
    pub fn server_message(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.body).ok()?;
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            if !message.is_empty() {
                return Some(message.to_string());
            }
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Some(error.to_string());
        }
        value
            .get("errors")
            .and_then(Value::as_object)
            .and_then(|errors| errors.values().next())
            .and_then(|field| match field {
                Value::Array(items) => items.first().and_then(Value::as_str),
                Value::String(s) => Some(s.as_str()),
                _ => None,
            })
            .map(str::to_string)
    }
}

/// The seam between session logic and the network.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;

    /// Script-visible cookies for the API origin, as `name=value; ...`.
    fn cookie_string(&self) -> String;
}

/// [`Transport`] over a cookie-enabled `ureq` agent.
///
/// The agent's jar plays the part of the browser cookie store: cookies set by
/// the CSRF endpoint are sent back automatically and are visible through
/// [`Transport::cookie_string`]. With a cookie file the jar outlives the
/// process, so a cookie session restores the way a reopened browser tab does.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
    origin: Option<Url>,
    cookie_file: Option<PathBuf>,
    wire_log: LogHandle,
}

impl UreqTransport {
    /// Transport with an in-memory jar.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_cookie_store(base_url, CookieStore::default())
    }

    /// Transport whose jar is loaded from `path` and written back after
    /// every exchange. A missing or unreadable file starts an empty jar.
    pub fn with_cookie_file(base_url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut transport = Self::with_cookie_store(base_url, load_cookie_jar(&path));
        transport.cookie_file = Some(path);
        transport
    }

    fn with_cookie_store(base_url: impl Into<String>, store: CookieStore) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let origin = match Url::parse(&base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Base URL {} does not parse, cookies stay hidden: {}", base_url, e);
                None
            }
        };
        Self {
            agent: ureq::AgentBuilder::new().cookie_store(store).build(),
            base_url,
            origin,
            cookie_file: None,
            wire_log: disabled_log(),
        }
    }

    /// Record every exchange in `log`.
    pub fn with_wire_log(mut self, log: LogHandle) -> Self {
        self.wire_log = log;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn save_cookies(&self) {
        let Some(path) = &self.cookie_file else {
            return;
        };
        if let Err(e) = save_cookie_jar(&self.agent.cookie_store(), path) {
            log::warn!("Failed to save cookies to {}: {}", path.display(), e);
        }
    }

    fn describe(request: &ApiRequest, url: &str) -> String {
        let headers = request
            .headers
            .iter()
            .map(|(n, v)| format!("{}={}", n, redact_header(n, v)))
            .collect::<Vec<_>>()
            .join(", ");
        let body = request
            .body
            .as_ref()
            .map(|b| redact_json(b).to_string())
            .unwrap_or_default();
        format!("{} {} [{}] {}", request.method.as_str(), url, headers, body)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        log_line(&self.wire_log, "REQUEST", &Self::describe(request, &url));

        let mut call = self.agent.request(request.method.as_str(), &url);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        if let Some(timeout) = request.timeout {
            call = call.timeout(timeout);
        }

        let result = match &request.body {
            Some(body) => call.send_json(body),
            None => call.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(e)) => {
                log::debug!("{} {} failed: {}", request.method.as_str(), url, e);
                log_line(&self.wire_log, "ERROR", &e.to_string());
                return Err(TransportError::Unreachable(e.to_string()));
            }
        };

        // The jar has taken in any Set-Cookie headers by now.
        self.save_cookies();

        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| TransportError::Body(e.to_string()))?;

        log_line(
            &self.wire_log,
            "RESPONSE",
            &format!("{} {} {}", status, url, redact_body(&body)),
        );

        Ok(ApiResponse { status, body })
    }

    fn cookie_string(&self) -> String {
        let Some(origin) = &self.origin else {
            return String::new();
        };
        let store = self.agent.cookie_store();
        let pairs: Vec<(String, String)> = store
            .matches(origin)
            .into_iter()
            .filter(|cookie| cookie.http_only() != Some(true))
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        render_cookie_string(pairs.iter().map(|(n, v)| (n.as_str(), v.as_str())))
    }
}

fn load_cookie_jar(path: &Path) -> CookieStore {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return CookieStore::default(),
        Err(e) => {
            log::warn!("Ignoring unreadable cookie file {}: {}", path.display(), e);
            return CookieStore::default();
        }
    };
    cookie_store::serde::json::load(BufReader::new(file)).unwrap_or_else(|e| {
        log::warn!("Ignoring corrupt cookie file {}: {}", path.display(), e);
        CookieStore::default()
    })
}

/// Write the jar with write-then-rename. Session cookies (no expiry) are kept:
/// they are what holds a cookie login.
fn save_cookie_jar(
    store: &CookieStore,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("json.tmp");
    let mut file = File::create(&temp_path)?;
    cookie_store::serde::json::save_incl_expired_and_nonpersistent(store, &mut file)?;
    file.flush()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod api_request {
        use super::*;

        #[test]
        fn post_sets_body_and_content_type() {
            let req = ApiRequest::post("/api/login", json!({"email": "a@b.c"}));
            assert_eq!(req.method, Method::Post);
            assert_eq!(req.body, Some(json!({"email": "a@b.c"})));
            assert_eq!(req.header_value("content-type"), Some("application/json"));
        }

        #[test]
        fn header_replaces_case_insensitively() {
            let req = ApiRequest::get("/api/user")
                .header("Accept", "text/html")
                .header("accept", "application/json");
            assert_eq!(req.headers.len(), 1);
            assert_eq!(req.header_value("ACCEPT"), Some("application/json"));
        }

        #[test]
        fn timeout_is_recorded() {
            let req = ApiRequest::get("/api/ping").timeout(Duration::from_secs(5));
            assert_eq!(req.timeout, Some(Duration::from_secs(5)));
        }
    }

    mod api_response {
        use super::*;

        fn response(status: u16, body: &str) -> ApiResponse {
            ApiResponse {
                status,
                body: body.to_string(),
            }
        }

        #[test]
        fn success_range() {
            assert!(response(200, "").is_success());
            assert!(response(204, "").is_success());
            assert!(!response(302, "").is_success());
            assert!(!response(401, "").is_success());
        }

        #[test]
        fn empty_body_reads_as_null() {
            let value: Option<Value> = response(204, "").json().unwrap();
            assert!(value.is_none());
        }

        #[test]
        fn message_field_preferred() {
            let r = response(401, r#"{"message":"Unauthenticated.","error":"x"}"#);
            assert_eq!(r.server_message().as_deref(), Some("Unauthenticated."));
        }

        #[test]
        fn falls_back_to_error_field() {
            let r = response(400, r#"{"error":"Bad request"}"#);
            assert_eq!(r.server_message().as_deref(), Some("Bad request"));
        }

        #[test]
        fn falls_back_to_first_validation_error() {
            let r = response(422, r#"{"message":"","errors":{"email":["The email has already been taken."]}}"#);
            assert_eq!(
                r.server_message().as_deref(),
                Some("The email has already been taken.")
            );
        }

        #[test]
        fn non_json_body_has_no_message() {
            assert!(response(500, "<html>").server_message().is_none());
        }
    }

    mod ureq_transport {
        use super::*;

        #[test]
        fn joins_paths_onto_base_url() {
            let transport = UreqTransport::new("http://localhost:8000/");
            assert_eq!(transport.base_url(), "http://localhost:8000");
            assert_eq!(transport.url("/api/user"), "http://localhost:8000/api/user");
            assert_eq!(transport.url("api/user"), "http://localhost:8000/api/user");
            assert_eq!(
                transport.url("https://other.test/ping"),
                "https://other.test/ping"
            );
        }

        #[test]
        fn fresh_agent_has_no_cookies() {
            let transport = UreqTransport::new("http://localhost:8000");
            assert_eq!(transport.cookie_string(), "");
        }

        #[test]
        fn describe_redacts_secrets() {
            let req = ApiRequest::post(
                "/api/login",
                json!({"email": "a@b.c", "password": "hunter2"}),
            )
            .header("X-XSRF-TOKEN", "abc");
            let line = UreqTransport::describe(&req, "http://x/api/login");
            assert!(line.starts_with("POST http://x/api/login"));
            assert!(!line.contains("hunter2"));
            assert!(!line.contains("abc"));
            assert!(line.contains("a@b.c"));
        }

        #[test]
        fn unreachable_host_is_transport_error() {
            // Port 9 (discard) on loopback is closed on any sane test box.
            let transport = UreqTransport::new("http://127.0.0.1:9");
            let err = transport
                .send(&ApiRequest::get("/api/ping").timeout(Duration::from_secs(2)))
                .unwrap_err();
            assert!(matches!(err, TransportError::Unreachable(_)));
        }
    }

    mod cookie_jar {
        use super::*;
        use crate::storage::COOKIE_FILE;

        const API: &str = "http://api.bioskop.test";

        fn jar_with(entries: &[(&str, &str)]) -> CookieStore {
            let mut store = CookieStore::default();
            for (url, header) in entries {
                store.parse(header, &Url::parse(url).unwrap()).unwrap();
            }
            store
        }

        #[test]
        fn cookie_string_is_scoped_to_api_origin() {
            let store = jar_with(&[
                ("http://api.bioskop.test/", "XSRF-TOKEN=mine; Path=/"),
                ("http://elsewhere.test/", "XSRF-TOKEN=theirs; Path=/"),
                ("http://api.bioskop.test/", "laravel_session=s1; Path=/; HttpOnly"),
            ]);
            let transport = UreqTransport::with_cookie_store(API, store);

            assert_eq!(transport.cookie_string(), "XSRF-TOKEN=mine");
        }

        #[test]
        fn saved_jar_is_loaded_including_session_cookies() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(COOKIE_FILE);
            let store = jar_with(&[
                ("http://api.bioskop.test/", "XSRF-TOKEN=abc%20def; Path=/"),
                ("http://api.bioskop.test/", "laravel_session=s1; Path=/; HttpOnly"),
            ]);
            save_cookie_jar(&store, &path).unwrap();

            let transport = UreqTransport::with_cookie_file(API, path.clone());
            assert_eq!(transport.cookie_string(), "XSRF-TOKEN=abc%20def");
            let names: Vec<String> = transport
                .agent
                .cookie_store()
                .iter_unexpired()
                .map(|c| c.name().to_string())
                .collect();
            assert!(names.contains(&"laravel_session".to_string()));
        }

        #[test]
        fn missing_cookie_file_starts_empty() {
            let dir = tempfile::tempdir().unwrap();
            let transport = UreqTransport::with_cookie_file(API, dir.path().join(COOKIE_FILE));
            assert_eq!(transport.cookie_string(), "");
        }

        #[test]
        fn corrupt_cookie_file_starts_empty() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(COOKIE_FILE);
            fs::write(&path, "not json at all").unwrap();

            let transport = UreqTransport::with_cookie_file(API, path);
            assert_eq!(transport.cookie_string(), "");
        }

        #[test]
        fn unparseable_base_url_shows_no_cookies() {
            let store = jar_with(&[("http://api.bioskop.test/", "XSRF-TOKEN=mine; Path=/")]);
            let transport = UreqTransport::with_cookie_store("not a url", store);
            assert_eq!(transport.cookie_string(), "");
        }
    }
}
