use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use octap::config::{self, AppConfig};
use octap::display::ConsoleDisplay;
use octap::error::AppError;
use octap::hooks;
use octap::monitor::{Monitor, MonitorConfig, MonitorOutcome};
use octap::notifier::{HookNotifier, Notifier, SilentNotifier};
use octap::platform::github::GitHubProvider;
use octap::shutdown::{cancel_on_shutdown, drain_pending_actions};
use octap::workspace::git;

#[derive(Parser)]
#[command(name = "octap", version, about = "Watch GitHub Actions runs for a commit and notify when they finish")]
struct Cli {
    /// Commit SHA to monitor (defaults to HEAD, which must be pushed)
    #[arg(short, long)]
    commit: Option<String>,

    /// Polling interval
    #[arg(short, long, default_value = "5s", value_parser = parse_interval)]
    interval: Duration,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable all notifications
    #[arg(long)]
    silent: bool,

    /// Log at info level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Humantime duration that is strictly positive.
fn parse_interval(value: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

#[derive(Subcommand)]
enum Command {
    /// Manage octap configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a configuration template
    Init {
        /// Output path (defaults to ~/.config/octap/config.yml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the configuration file and list invalid actions
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so they never mix with the display
    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match &cli.command {
        Some(Command::Config { action }) => run_config_command(action, cli.config.as_deref()),
        None => run_monitor(&cli).await,
    }
}

fn run_config_command(action: &ConfigCommand, config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    match action {
        ConfigCommand::Init { output, force } => {
            let path = match output {
                Some(path) => path.clone(),
                None => config::default_config_path().context("could not determine home directory")?,
            };
            config::save_template(&path, *force)
                .with_context(|| format!("failed to create config template at {}", path.display()))?;
            println!("Created config template: {}", path.display());
            Ok(())
        }
        ConfigCommand::Check => {
            let cwd = std::env::current_dir()?;
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => config::discover(&cwd, config::default_config_dir().as_deref())
                    .context("no configuration file found")?,
            };
            let app_config = AppConfig::load_file(&path)?;
            let (table, invalid) = hooks::build_hook_table(&app_config.hooks);

            println!("Config: {}", path.display());
            for event in hooks::HookEvent::ALL {
                let count = table.get(&event).map_or(0, Vec::len);
                println!("  {event}: {count} valid action(s)");
            }
            if invalid.is_empty() {
                println!("OK");
                return Ok(());
            }
            for entry in &invalid {
                println!("  invalid {entry}");
            }
            anyhow::bail!("{} invalid action(s) in {}", invalid.len(), path.display())
        }
    }
}

async fn run_monitor(cli: &Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    let repo = git::repository_info(&cwd).await.context(
        "failed to get repository info; run this command in a Git repository with a GitHub remote",
    )?;

    let commit_sha = match &cli.commit {
        Some(sha) => sha.clone(),
        None => match git::current_commit(&cwd).await {
            Ok(sha) => sha,
            Err(AppError::NotPushed(sha)) => {
                anyhow::bail!("Current commit {sha} has not been pushed to GitHub.\nPlease push your commits first: git push")
            }
            Err(e) => return Err(e).context("failed to get current commit"),
        },
    };
    git::validate_commit_sha(&commit_sha)?;

    let (app_config, config_path) = AppConfig::load(cli.config.as_deref())?;
    tracing::debug!(config = ?config_path, github = ?app_config.github, "Configuration resolved");

    let notifier: Arc<dyn Notifier> = if cli.silent {
        Arc::new(SilentNotifier)
    } else {
        let hooks = hooks::load_hook_table(&app_config.hooks);
        Arc::new(
            HookNotifier::new(repo.full_name(), hooks)
                .with_span(tracing::info_span!("hooks", repo = %repo)),
        )
    };

    let provider = Arc::new(GitHubProvider::new(&app_config.github)?);

    let mut display = ConsoleDisplay::stdout();
    display.show_header(&repo.full_name(), &commit_sha);

    let monitor_span = tracing::info_span!("monitor", repo = %repo, commit = %&commit_sha[..7]);
    let mut monitor = Monitor::new(
        MonitorConfig {
            repo,
            commit_sha,
            interval: cli.interval,
        },
        provider,
        Arc::clone(&notifier),
        Box::new(display),
    )
    .with_span(monitor_span);

    let cancel = CancellationToken::new();
    let watcher = cancel_on_shutdown(cancel.clone());

    let result = monitor.run(cancel.clone()).await;

    // Stop the signal watcher, then let background actions finish.
    cancel.cancel();
    let _ = watcher.await;
    drain_pending_actions(notifier.as_ref()).await;

    match result? {
        MonitorOutcome::Completed(summary) => {
            tracing::info!(
                total = summary.total_runs,
                failures = summary.failure_count,
                "Monitoring finished"
            );
        }
        MonitorOutcome::Cancelled => {
            tracing::info!("Monitoring cancelled");
        }
    }

    Ok(())
}
