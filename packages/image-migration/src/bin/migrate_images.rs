//! CLI for migrating inline inspection images into blob storage
//!
//! Outputs JSON lines on stdout for machine consumption; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image_migration::{
    all_plans, find_plan, Config, FsBlobStore, MigrationError, MigrationPlan, MigrationProgress,
    MigrationResult, MigrationRunner, PostgresDocumentStore, RunOutcome, VerifyResult,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "migrate_images")]
#[command(about = "Move inline inspection images into blob storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all migration plans
    List,

    /// Estimate progress of a plan
    Estimate { plan: String },

    /// Run a plan until the collection is exhausted or Ctrl-C
    Run {
        plan: String,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that no record still carries inline images
    Verify { plan: String },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plans: Option<Vec<PlanInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<MigrationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<u64>,
}

impl Response {
    fn ok() -> Self {
        Self {
            success: true,
            message: None,
            plans: None,
            progress: None,
            remaining: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::ok()
        }
    }
}

#[derive(Serialize)]
struct PlanInfo {
    name: String,
    description: Option<String>,
    collection: String,
    fields: Vec<String>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RunUpdate<'a> {
    Init {
        plan: &'a str,
        dry_run: bool,
        progress: &'a MigrationProgress,
    },
    Progress {
        progress: &'a MigrationProgress,
    },
    Batch {
        result: &'a MigrationResult,
    },
    Complete {
        stopped: bool,
        migrated: u64,
        errors: u64,
        message: String,
    },
    Error {
        message: String,
    },
}

fn output<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!(error = %e, "Failed to serialize output"),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,image_migration=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cmd_list(),
        Commands::Estimate { plan } => cmd_estimate(&plan).await,
        Commands::Run {
            plan,
            batch_size,
            dry_run,
        } => cmd_run(&plan, batch_size, dry_run).await,
        Commands::Verify { plan } => cmd_verify(&plan).await,
    }
}

type Runner = MigrationRunner<PostgresDocumentStore, FsBlobStore>;

async fn build_runner(plan: MigrationPlan, dry_run: bool) -> Result<Runner> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let documents = PostgresDocumentStore::new(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let blobs = FsBlobStore::new(&config.blob_storage_root, &config.blob_public_base_url);

    let mut runner_config = config.runner;
    runner_config.dry_run = dry_run;

    Ok(MigrationRunner::with_config(documents, blobs, plan, runner_config))
}

/// Resolve a plan, reporting an unknown name on stdout before failing.
fn lookup_plan(name: &str) -> Result<MigrationPlan> {
    find_plan(name).map_err(|e| {
        output(&Response::failed(e.to_string()));
        anyhow::Error::new(e)
    })
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_list() -> Result<()> {
    let plans = all_plans()
        .into_iter()
        .map(|plan| PlanInfo {
            description: (!plan.description.is_empty()).then(|| plan.description.clone()),
            fields: plan.fields.iter().map(|f| f.name.clone()).collect(),
            collection: plan.collection,
            name: plan.name,
        })
        .collect();

    output(&Response {
        plans: Some(plans),
        ..Response::ok()
    });

    Ok(())
}

async fn cmd_estimate(name: &str) -> Result<()> {
    let plan = lookup_plan(name)?;
    let runner = build_runner(plan, false).await?;

    let progress = runner.estimate_progress().await?;
    output(&Response {
        progress: Some(progress),
        ..Response::ok()
    });

    Ok(())
}

async fn cmd_run(name: &str, batch_size: Option<usize>, dry_run: bool) -> Result<()> {
    let plan = lookup_plan(name)?;
    let runner = build_runner(plan, dry_run).await?;

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, stopping after the current batch");
                token.cancel();
            }
        }
    });

    let mut initialized = false;
    let result = runner
        .start_with_token(
            batch_size.unwrap_or(0),
            token,
            |progress| {
                if initialized {
                    output(&RunUpdate::Progress { progress });
                } else {
                    initialized = true;
                    output(&RunUpdate::Init {
                        plan: name,
                        dry_run,
                        progress,
                    });
                }
            },
            |result| output(&RunUpdate::Batch { result }),
        )
        .await;

    match result {
        Ok(summary) => {
            let stopped = summary.outcome == RunOutcome::Stopped;
            output(&RunUpdate::Complete {
                stopped,
                migrated: summary.migrated,
                errors: summary.errors,
                message: format!(
                    "{}: {} batches, {} migrated, {} errors",
                    if stopped { "Stopped" } else { "Completed" },
                    summary.batches,
                    summary.migrated,
                    summary.errors
                ),
            });
            Ok(())
        }
        Err(e @ MigrationError::ErrorCeilingExceeded { .. }) => {
            output(&RunUpdate::Error {
                message: e.to_string(),
            });
            Ok(())
        }
        Err(e) => Err(e).context("Migration run failed"),
    }
}

async fn cmd_verify(name: &str) -> Result<()> {
    let plan = lookup_plan(name)?;
    let runner = build_runner(plan, false).await?;

    let response = match runner.verify().await? {
        VerifyResult::Passed => Response {
            message: Some("No inline images remain".to_string()),
            remaining: Some(0),
            ..Response::ok()
        },
        VerifyResult::Incomplete { remaining } => Response {
            success: false,
            message: Some(format!("{} records still carry inline images", remaining)),
            remaining: Some(remaining),
            ..Response::ok()
        },
    };
    output(&response);

    Ok(())
}
