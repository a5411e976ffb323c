//! gitsplit - CLI entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use gitsplit::change::load_changes;
use gitsplit::plan::{io::plan_to_json, read_plan, write_plan};
use gitsplit::{
    CommitPlan, Config, ConflictResolver, FeatureCache, GitCli, GroupingEngine, Orchestrator,
    ResolutionStrategy,
};

/// Split working-tree changes into focused commits.
#[derive(Parser, Debug)]
#[command(name = "gitsplit")]
#[command(about = "Split working-tree changes into focused commits")]
#[command(version)]
struct Cli {
    /// Repository to operate on
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Show debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Group change records into a commit plan and print it
    Plan {
        #[command(flatten)]
        planning: PlanningArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Also write the plan as JSON to this path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Plan (or load a plan) and create the commits
    Apply {
        #[command(flatten)]
        planning: PlanningArgs,

        /// Execute a previously written plan instead of planning again
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Print the plan without touching the repository
        #[arg(long)]
        dry_run: bool,

        /// Keep going after a group fails
        #[arg(long)]
        continue_on_error: bool,

        /// Leave earlier commits in place when a run stops
        #[arg(long)]
        no_rollback: bool,
    },
}

#[derive(Args, Debug)]
struct PlanningArgs {
    /// JSON file of analyzed change records
    #[arg(long, default_value = "changes.json")]
    changes: PathBuf,

    /// Maximum files per commit
    #[arg(long)]
    max_files: Option<usize>,

    /// Conflict resolution strategy (conservative, aggressive, balanced)
    #[arg(long)]
    resolution: Option<ResolutionStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(&cli.repo).context("Failed to load configuration")?;

    match cli.command {
        Command::Plan {
            planning,
            json,
            output,
        } => {
            planning.apply_to(&mut config);
            let plan = build_plan(&planning.changes, &config)?;

            if json {
                println!("{}", plan_to_json(&plan).context("Failed to serialize plan")?);
            } else {
                print!("{}", plan.summary());
            }

            if let Some(path) = output {
                write_plan(&path, &plan).context("Failed to write plan")?;
                println!("Plan written to {}", path.display());
            }
        }
        Command::Apply {
            planning,
            plan,
            yes,
            dry_run,
            continue_on_error,
            no_rollback,
        } => {
            planning.apply_to(&mut config);
            let plan = match plan {
                Some(path) => read_plan(&path).context("Failed to read plan")?,
                None => build_plan(&planning.changes, &config)?,
            };

            print!("{}", plan.summary());

            if dry_run {
                println!("\nDry run - no commits created.");
                return Ok(());
            }

            check_git_installed()?;

            if !yes {
                println!();
                let confirmed = Confirm::new()
                    .with_prompt(format!("Create {} commits?", plan.len()))
                    .default(true)
                    .interact()
                    .context("Confirmation prompt failed")?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let mut options = config.execution_options();
            options.continue_on_error = continue_on_error;
            options.rollback_on_failure = !no_rollback;

            let git = GitCli::new(&cli.repo).with_timeout(config.git_timeout());
            let mut orchestrator = Orchestrator::new(Arc::new(git), options);

            let cancel = orchestrator.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Interrupted, stopping after the current commit...");
                    cancel.store(true, Ordering::SeqCst);
                }
            });

            println!();
            let report = orchestrator
                .execute_plan(&plan)
                .await
                .context("Failed to execute plan")?;

            print!("{}", report.summary());

            if !report.success {
                bail!("{} of {} groups failed", report.failures().count(), report.results.len());
            }
        }
    }

    Ok(())
}

impl PlanningArgs {
    fn apply_to(&self, config: &mut Config) {
        if let Some(max) = self.max_files.filter(|m| *m > 0) {
            config.max_files_per_commit = max;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "gitsplit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn check_git_installed() -> Result<()> {
    if which::which("git").is_err() {
        bail!("git not found in PATH. Install git to apply a plan.");
    }
    Ok(())
}

/// Load change records, group them and resolve conflicts.
fn build_plan(changes: &Path, config: &Config) -> Result<CommitPlan> {
    let records = load_changes(changes)
        .with_context(|| format!("Failed to load change records from {}", changes.display()))?;

    let engine = GroupingEngine::new(config.grouping_options(), config.grouping_strategy());
    let mut cache = FeatureCache::new();
    let plan = engine.group(&records, &mut cache);

    let outcome = ConflictResolver::new(config.resolution).resolve(plan);
    if !outcome.success {
        for conflict in &outcome.remaining {
            eprintln!("Unresolved: {}", conflict);
        }
        bail!(
            "{} conflicts could not be resolved with the {} strategy",
            outcome.remaining.len(),
            config.resolution
        );
    }

    if outcome.conflicts_found > 0 {
        eprintln!(
            "Resolved {} of {} conflicts ({} strategy)",
            outcome.resolved, outcome.conflicts_found, config.resolution
        );
    }

    Ok(outcome.plan)
}
