//! Run context management.
//!
//! One `RunContext` exists per command invocation. It owns the worker pool
//! and the log context every phase logs under.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{ClientConfig, DEFAULT_PAGE_SIZE};
use crate::error::Result;
use crate::logging::LogContext;

use super::runner::BulkTaskRunner;

/// Context for one command invocation.
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub page_size: i32,
    pub runner: BulkTaskRunner,
}

impl RunContext {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_threads(config.thread_count)
    }

    pub fn with_threads(thread_count: usize) -> Result<Self> {
        let run_id = format!("run-{}", &Uuid::new_v4().simple().to_string()[..8]);
        Ok(Self {
            run_id,
            started_at: Utc::now(),
            page_size: DEFAULT_PAGE_SIZE,
            runner: BulkTaskRunner::new(thread_count)?,
        })
    }

    pub fn log(&self) -> LogContext {
        LogContext::new(&self.run_id)
    }

    /// Log context narrowed to a project.
    pub fn project_log(&self, project_id: i64) -> LogContext {
        self.log().with_project(project_id)
    }
}
