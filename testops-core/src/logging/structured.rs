//! Structured logging utilities.
//!
//! Provides context-aware logging with run_id, project and entity included
//! in every log message.

use std::fmt;

/// Logging context for one command invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub project_id: Option<i64>,
    pub entity: Option<String>,
}

impl LogContext {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            project_id: None,
            entity: None,
        }
    }

    pub fn with_project(&self, project_id: i64) -> Self {
        Self {
            run_id: self.run_id.clone(),
            project_id: Some(project_id),
            entity: self.entity.clone(),
        }
    }

    /// Narrow the context to a single entity, e.g. `tc-42` or `ss-7`.
    pub fn with_entity(&self, entity: impl fmt::Display) -> Self {
        Self {
            run_id: self.run_id.clone(),
            project_id: self.project_id,
            entity: Some(entity.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[run={}]", self.run_id)?;
        if let Some(project_id) = self.project_id {
            write!(f, " [project={}]", project_id)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " [entity={}]", entity)?;
        }
        Ok(())
    }
}

/// Initialise the process-wide logger.
///
/// Defaults to `info`; `RUST_LOG` overrides. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("run-123");
        assert_eq!(format!("{}", ctx), "[run=run-123]");

        let ctx_with_entity = ctx.with_project(7).with_entity("tc-456");
        assert_eq!(
            format!("{}", ctx_with_entity),
            "[run=run-123] [project=7] [entity=tc-456]"
        );
    }

    #[test]
    fn test_entity_without_project() {
        let ctx = LogContext::new("run-1").with_entity("ss-9");
        assert_eq!(format!("{}", ctx), "[run=run-1] [entity=ss-9]");
    }
}
