//! Command-line interface.
//!
//! Every option falls back to an environment variable so the tool can be
//! driven entirely from a CI job's environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::audit::{parse_audit_after, rollback_project};
use crate::backup::{backup_entities, restore_entities};
use crate::client::{EntityKind, TestOpsApi};
use crate::config::{ClientConfig, DEFAULT_SHARED_LAYERS, DEFAULT_THREAD_COUNT};
use crate::error::{MigrationError, Result};
use crate::meta::MetaStore;
use crate::normalizer::convert_project;
use crate::pipeline::{collect_shared_steps, collect_test_cases, RunContext, TaskReport};
use crate::promotion::{PromotionEngine, SharedStepRegistry};

/// Scenario migration, backup and rollback for Allure TestOps
#[derive(Parser, Debug)]
#[command(name = "testops-migrate")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Allure TestOps endpoint
    #[arg(long = "allure.endpoint", env = "ALLURE_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Allure TestOps username
    #[arg(long = "allure.username", env = "ALLURE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Allure TestOps password
    #[arg(long = "allure.password", env = "ALLURE_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long = "allure.insecure", env = "ALLURE_INSECURE", global = true)]
    pub insecure: bool,

    /// Worker threads and pooled connections
    #[arg(long = "thread.count", env = "THREAD_COUNT", global = true, default_value_t = DEFAULT_THREAD_COUNT)]
    pub thread_count: usize,

    /// Per-request timeout in seconds; waits indefinitely when unset
    #[arg(long = "request.timeout", env = "REQUEST_TIMEOUT", global = true)]
    pub request_timeout: Option<u64>,
}

impl ConnectionArgs {
    pub fn to_config(&self) -> Result<ClientConfig> {
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| MigrationError::config("--allure.endpoint is required"))?;
        let config = ClientConfig {
            endpoint,
            username: self.username.clone(),
            password: self.password.clone(),
            insecure: self.insecure,
            thread_count: self.thread_count,
            request_timeout: self.request_timeout.map(Duration::from_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Promote legacy shared-step test cases and rewire their users
    MigrateTestcases(MigrateArgs),

    /// Turn single sub-steps into expected results
    MigrateExpectedResults(ExpectedResultsArgs),

    /// Back up test cases or shared steps of a project
    BackupTestcases(BackupArgs),

    /// Restore test cases or shared steps from a backup
    RestoreTestcases(RestoreArgs),

    /// Roll back test case changes recorded in the audit log
    RollbackTestcases(RollbackArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityArg {
    Testcase,
    Sharedstep,
}

impl From<EntityArg> for EntityKind {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Testcase => EntityKind::TestCase,
            EntityArg::Sharedstep => EntityKind::SharedStep,
        }
    }
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Project ids, comma separated; all projects when empty
    #[arg(long = "allure.project.id", env = "ALLURE_PROJECT_ID", value_delimiter = ',')]
    pub project_ids: Vec<i64>,

    /// Directory for run metadata (registry and completed projects)
    #[arg(long = "meta.path", env = "META_PATH")]
    pub meta_path: Option<PathBuf>,

    /// Layers marking legacy shared-step test cases
    #[arg(long = "shared.layer", default_values_t = DEFAULT_SHARED_LAYERS.iter().map(|l| l.to_string()))]
    pub shared_layers: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ExpectedResultsArgs {
    /// Project ids, comma separated
    #[arg(long = "allure.project.id", env = "ALLURE_PROJECT_ID", value_delimiter = ',', required = true)]
    pub project_ids: Vec<i64>,

    /// Test case filter expression
    #[arg(long = "allure.testcase.filter", env = "ALLURE_TESTCASE_FILTER")]
    pub filter: String,

    /// Where the original scenarios are saved
    #[arg(long = "backup.path", visible_alias = "backup-dir", env = "BACKUP_PATH", default_value = "./backup")]
    pub backup_path: PathBuf,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Project ids, comma separated
    #[arg(long = "allure.project.id", env = "ALLURE_PROJECT_ID", value_delimiter = ',', required = true)]
    pub project_ids: Vec<i64>,

    /// Test case filter expression
    #[arg(long = "allure.testcase.filter", env = "ALLURE_TESTCASE_FILTER", default_value = "true")]
    pub filter: String,

    /// Backup directory
    #[arg(long = "backup.path", env = "BACKUP_PATH")]
    pub backup_path: PathBuf,

    #[arg(long, value_enum, default_value = "testcase")]
    pub entity: EntityArg,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Backup directory
    #[arg(long = "backup.path", env = "BACKUP_PATH")]
    pub backup_path: PathBuf,

    #[arg(long, value_enum, default_value = "testcase")]
    pub entity: EntityArg,

    /// Entity ids to restore, comma separated; everything backed up when empty
    #[arg(long = "id", value_delimiter = ',')]
    pub ids: Vec<i64>,
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Project ids, comma separated
    #[arg(long = "allure.project.id", env = "ALLURE_PROJECT_ID", value_delimiter = ',', required = true)]
    pub project_ids: Vec<i64>,

    /// Test case filter expression
    #[arg(long = "allure.testcase.filter", env = "ALLURE_TESTCASE_FILTER")]
    pub filter: String,

    /// Roll back every change after this time (yyyy-MM-dd HH:mm:ss)
    #[arg(long = "allure.audit.after", env = "ALLURE_AUDIT_AFTER")]
    pub audit_after: String,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::MigrateTestcases(_) => "migrate-testcases",
            Commands::MigrateExpectedResults(_) => "migrate-expected-results",
            Commands::BackupTestcases(_) => "backup-testcases",
            Commands::RestoreTestcases(_) => "restore-testcases",
            Commands::RollbackTestcases(_) => "rollback-testcases",
        }
    }

    /// Run the command. Returns the report of every bulk phase.
    pub fn execute(&self, api: &dyn TestOpsApi, run: &RunContext) -> Result<Vec<TaskReport>> {
        match self {
            Commands::MigrateTestcases(args) => {
                let meta = args.meta_path.as_ref().map(|path| MetaStore::open(path)).transpose()?;
                let registry = match &meta {
                    Some(store) => store.load_registry()?,
                    None => SharedStepRegistry::new(),
                };
                let engine = PromotionEngine::new(api, run, &registry, args.shared_layers.clone());
                let reports = engine.migrate_projects(&args.project_ids, meta.as_ref())?;
                Ok(reports.into_iter().flat_map(|r| r.phases).collect())
            }
            Commands::MigrateExpectedResults(args) => args
                .project_ids
                .iter()
                .map(|id| convert_project(api, run, *id, &args.filter, &args.backup_path))
                .collect(),
            Commands::BackupTestcases(args) => {
                let kind = EntityKind::from(args.entity);
                let mut reports = Vec::new();
                for project_id in &args.project_ids {
                    let ids: Vec<i64> = match kind {
                        EntityKind::TestCase => {
                            collect_test_cases(api, *project_id, &args.filter, false, run.page_size)?
                        }
                        EntityKind::SharedStep => {
                            collect_shared_steps(api, *project_id, run.page_size)?
                        }
                    }
                    .into_keys()
                    .collect();
                    reports.push(backup_entities(api, run, &args.backup_path, kind, &ids)?);
                }
                Ok(reports)
            }
            Commands::RestoreTestcases(args) => Ok(vec![restore_entities(
                api,
                run,
                &args.backup_path,
                args.entity.into(),
                &args.ids,
            )?]),
            Commands::RollbackTestcases(args) => {
                let after = parse_audit_after(&args.audit_after)?;
                args.project_ids
                    .iter()
                    .map(|id| rollback_project(api, run, *id, &args.filter, after))
                    .collect()
            }
        }
    }
}
