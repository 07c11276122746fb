//! Connection and concurrency settings shared by the HTTP client and the
//! bulk task runner.

use std::time::Duration;

use crate::error::{MigrationError, Result};

/// Worker count used when none is configured.
pub const DEFAULT_THREAD_COUNT: usize = 10;

/// Page size for listings drained by the paginated collector.
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Layer names that mark a legacy test case as a shared step definition.
pub const DEFAULT_SHARED_LAYERS: &[&str] = &["Shared Steps", "Shared", "Шаги", "Шаг"];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
    /// Bound for both concurrent workers and pooled HTTP connections.
    pub thread_count: usize,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
            insecure: false,
            thread_count: DEFAULT_THREAD_COUNT,
            request_timeout: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(MigrationError::config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.thread_count == 0 {
            return Err(MigrationError::config("thread count must be at least 1"));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(MigrationError::config(
                "username and password must be given together",
            ));
        }
        Ok(())
    }

    /// Endpoint without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}
