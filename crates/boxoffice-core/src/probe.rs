//! Connectivity probe.
//!
//! An unauthenticated GET with a hard timeout, for telling "the API is down"
//! apart from "my credentials are wrong" before attempting a login. It never
//! touches session state.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::transport::{ApiRequest, Transport};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub path: String,
    /// Whether any HTTP response came back, whatever the status.
    pub reachable: bool,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    /// Names of the cookies the client currently holds (values omitted).
    pub cookie_names: Vec<String>,
}

impl ProbeReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }
}

pub fn probe(transport: &dyn Transport, path: &str) -> ProbeReport {
    let request = ApiRequest::get(path)
        .header("Accept", "application/json")
        .timeout(PROBE_TIMEOUT);

    let started = Instant::now();
    let result = transport.send(&request);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let cookie_names = transport
        .cookie_string()
        .split(';')
        .filter_map(|entry| entry.trim().split_once('=').map(|(name, _)| name.to_string()))
        .collect();

    match result {
        Ok(response) => ProbeReport {
            path: path.to_string(),
            reachable: true,
            status: Some(response.status),
            elapsed_ms,
            error: None,
            cookie_names,
        },
        Err(e) => {
            log::debug!("Probe of {} failed: {}", path, e);
            ProbeReport {
                path: path.to_string(),
                reachable: false,
                status: None,
                elapsed_ms,
                error: Some(e.to_string()),
                cookie_names,
            }
        }
    }
}
