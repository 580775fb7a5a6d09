//! Per-request access logging

use std::time::{Duration, Instant};

use http::{Method, StatusCode};

/// One finished request, as written to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub latency: Duration,
    pub bytes: Option<u64>,
}

/// Started when a request passes the access gate, finished with its status
#[derive(Debug)]
pub struct RequestLog {
    method: Method,
    path: String,
    start_time: Instant,
}

impl RequestLog {
    /// Start timing a request
    pub fn start(method: &Method, path: &str) -> Self {
        Self {
            method: method.clone(),
            path: path.to_string(),
            start_time: Instant::now(),
        }
    }

    /// Emit the access log event
    pub fn finish(self, status: StatusCode, bytes: Option<u64>) -> RequestRecord {
        let record = RequestRecord {
            method: self.method,
            path: self.path,
            status,
            latency: self.start_time.elapsed(),
            bytes,
        };

        tracing::info!(
            method = %record.method,
            path = %record.path,
            status = record.status.as_u16(),
            latency_ms = record.latency.as_millis() as u64,
            bytes = ?record.bytes,
            "request"
        );

        record
    }
}
