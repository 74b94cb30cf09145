//! Gatekeeper CLI - run a repository's QA gates from the terminal.
//!
//! `gatekeeper check` runs the configured gate sequence once (or with the
//! configured retry budget) against a repository and prints a per-gate
//! summary; `gatekeeper config` prints the resolved configuration.

use clap::{Parser, Subcommand};
use colored::Colorize;
use gatekeeper::command::ShellCommandRunner;
use gatekeeper::config::ConfigResolver;
use gatekeeper::error::Result as GkResult;
use gatekeeper::gate::{all_passed, GateExecutor, GateSequencer};
use gatekeeper::retry::{RetryCoordinator, TaskReinvoker};
use gatekeeper::sandbox::PathTranslator;
use gatekeeper::store::MemoryStore;
use gatekeeper::task::Task;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(version = "0.1.0")]
#[command(about = "Quality-gate execution for automated coding tasks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Repository directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured gate sequence against the repository
    Check {
        /// Retry with the configured budget instead of a single pass
        #[arg(long)]
        retry: bool,
    },

    /// Print the resolved gate configuration as JSON
    Config,
}

/// Reinvocation channel for interactive runs: print the feedback so the
/// operator can act on it before the next attempt.
struct StdoutReinvoker;

#[async_trait::async_trait]
impl TaskReinvoker for StdoutReinvoker {
    async fn reinvoke(&self, _task_id: &str, feedback: &str) -> GkResult<()> {
        println!("\n{}\n{feedback}", "Retry feedback:".yellow().bold());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "gatekeeper=debug,info"
    } else {
        "gatekeeper=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let repo_path = cli.repo.canonicalize().unwrap_or(cli.repo.clone());
    if !repo_path.exists() {
        eprintln!(
            "{} Repository directory does not exist: {}",
            "Error:".red().bold(),
            repo_path.display()
        );
        std::process::exit(1);
    }

    let translator = PathTranslator::from_env();
    let resolver = ConfigResolver::new(translator.clone());

    match cli.command {
        Commands::Check { retry } => {
            let store = Arc::new(MemoryStore::new());
            let task_id = "local";
            store.insert_task(Task::new(task_id, &repo_path)).await;

            let executor = GateExecutor::new(
                Arc::new(ShellCommandRunner::new()),
                Arc::clone(&store) as _,
                translator,
            );
            let sequencer = Arc::new(GateSequencer::new(executor, resolver.clone()));

            let passed = if retry {
                let coordinator = RetryCoordinator::new(
                    Arc::clone(&sequencer),
                    resolver,
                    Arc::clone(&store) as _,
                    Arc::new(StdoutReinvoker),
                );
                let outcome = coordinator.run_with_retry(task_id, &repo_path).await?;
                println!(
                    "\nFinished after attempt {} of the retry budget",
                    outcome.attempt
                );
                print_records(&store, task_id).await?;
                outcome.passed
            } else {
                let results = sequencer.run_all(task_id, &repo_path).await?;
                for result in &results {
                    println!("{}", result.summary());
                }
                all_passed(&results)
            };

            if passed {
                println!("\n{}", "All gates passed".green().bold());
            } else {
                println!("\n{}", "Gate run failed".red().bold());
                std::process::exit(1);
            }
        }
        Commands::Config => {
            let config = resolver.resolve(&repo_path).await;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn print_records(store: &MemoryStore, task_id: &str) -> anyhow::Result<()> {
    use gatekeeper::store::ExecutionStore;
    for record in store.executions_for_task(task_id).await? {
        let line = format!(
            "{} [{}] {} ({}ms)",
            record.gate_name, record.status, record.command, record.duration_ms
        );
        match record.status {
            gatekeeper::gate::GateStatus::Failed => println!("{}", line.red()),
            gatekeeper::gate::GateStatus::Passed => println!("{}", line.green()),
            _ => println!("{}", line.dimmed()),
        }
    }
    Ok(())
}
