//! In-memory [`Transport`] serving canned documents by URL. Used by the
//! unit and integration test suites in place of the live CI service.

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::{Client, StatusCode};

use super::{FetchError, Transport};

enum Route {
    Body(String),
    Status(StatusCode),
    Unreachable,
}

/// Serves fixed bodies by URL. Unknown URLs answer HTTP 404.
#[derive(Default)]
pub struct MemoryTransport {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.routes.insert(url.into(), Route::Body(body.into()));
        self
    }

    /// Answer `url` with an error status.
    pub fn with_status(mut self, url: impl Into<String>, status: StatusCode) -> Self {
        self.routes.insert(url.into(), Route::Status(status));
        self
    }

    /// Fail requests to `url` at the transport level, as if the host were down.
    pub fn with_unreachable(mut self, url: impl Into<String>) -> Self {
        self.routes.insert(url.into(), Route::Unreachable);
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        match self.routes.get(url) {
            Some(Route::Body(body)) => Ok(body.trim().to_string()),
            Some(Route::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(Route::Unreachable) => Err(request_error(url)),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
            }),
        }
    }
}

/// A genuine `reqwest` request error, produced without touching the network
/// by building a request for a URL with no host.
fn request_error(url: &str) -> FetchError {
    match Client::new().get("http://").build() {
        Err(source) => FetchError::Request {
            url: url.to_string(),
            source,
        },
        Ok(_) => FetchError::Status {
            url: url.to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        },
    }
}
