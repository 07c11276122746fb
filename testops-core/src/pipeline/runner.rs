//! Bulk Task Runner.
//!
//! Runs one independent unit of work per id on a bounded rayon pool. A
//! failing or panicking unit is counted and logged; it never aborts the
//! batch. No retries, no per-task timeout.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{MigrationError, Result};
use crate::logging::LogContext;

/// Outcome of one phase.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub phase: String,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub total: usize,
    pub errors: usize,
}

impl TaskReport {
    pub fn succeeded(&self) -> usize {
        self.total - self.errors
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct BulkTaskRunner {
    pool: ThreadPool,
    threads: usize,
}

impl BulkTaskRunner {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("testops-worker-{}", index))
            .build()?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `task` once per id and block until every task has finished.
    pub fn run<I, F>(&self, ctx: &LogContext, phase: &str, ids: I, task: F) -> TaskReport
    where
        I: IntoIterator<Item = i64>,
        F: Fn(i64) -> Result<()> + Sync,
    {
        let ids: Vec<i64> = ids.into_iter().collect();
        log::info!("{} TASK_START phase='{}' ids={}", ctx, phase, ids.len());

        let started = Utc::now();
        let clock = Instant::now();
        let errors = AtomicUsize::new(0);

        self.pool.install(|| {
            ids.par_iter().for_each(|id| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(*id)))
                    .unwrap_or_else(|payload| {
                        Err(MigrationError::Panic {
                            message: panic_message(payload),
                        })
                    });
                if let Err(e) = outcome {
                    errors.fetch_add(1, Ordering::Relaxed);
                    log::warn!("{} TASK_FAILED phase='{}' id={} error={}", ctx, phase, id, e);
                }
            })
        });

        let errors = errors.into_inner();
        log::info!(
            "{} finished '{}' in {:?} with {} errors",
            ctx,
            phase,
            clock.elapsed(),
            errors
        );

        TaskReport {
            phase: phase.to_string(),
            started,
            finished: Utc::now(),
            total: ids.len(),
            errors,
        }
    }
}
