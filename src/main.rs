use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::DisableMouseCapture,
    execute,
    terminal::{disable_raw_mode, LeaveAlternateScreen},
};
use std::fs::OpenOptions;
use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xdg::BaseDirectories;

use prsign::app::App;
use prsign::config::Config;
use prsign::context::PullRequestContext;
use prsign::controller::ReviewController;
use prsign::diff::DiffSource;
use prsign::github::GhCommentClient;

#[derive(Parser, Debug)]
#[command(name = "prsign")]
#[command(about = "Side-by-side diff viewer with GitHub PR review comments as signs")]
#[command(version)]
struct Args {
    /// Repository name (e.g., "owner/repo"). Overrides the repo env variable.
    #[arg(short, long)]
    repo: Option<String>,

    /// Pull request number. Overrides the PR number env variable.
    #[arg(short, long)]
    pr: Option<u32>,

    /// Revision shown in the LEFT pane (default: merge base of the PR)
    #[arg(long)]
    base: Option<String>,

    /// Config file (default: ~/.config/prsign/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Restore terminal to normal state
fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
}

/// Set up panic hook to restore terminal on panic
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();
        original_hook(panic_info);
    }));
}

/// Log to `$XDG_STATE_HOME/prsign/prsign.log`; the TUI owns stdout/stderr.
/// Filter comes from `PRSIGN_LOG` (default `warn`).
fn init_logging() -> Result<()> {
    let log_path = BaseDirectories::with_prefix("prsign")?
        .place_state_file("prsign.log")
        .context("Failed to create log directory")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    let filter = EnvFilter::try_from_env("PRSIGN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(())
}

/// PR features need a PR context and the gh CLI. The error string is shown
/// in the footer when either is missing.
fn resolve_pr(args: &Args, config: &Config) -> Result<PullRequestContext, String> {
    let pr = PullRequestContext::resolve(
        args.pr,
        args.repo.clone(),
        &config.pull_request.number_env,
        &config.pull_request.repo_env,
    )
    .map_err(|e| e.to_string())?;
    which::which("gh").map_err(|_| "gh CLI not found in PATH".to_string())?;
    Ok(pr)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook before anything else
    setup_panic_hook();

    let args = Args::parse();

    if let Err(e) = init_logging() {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let config = Config::load(args.config.as_deref())?;

    let pr = resolve_pr(&args, &config);
    match &pr {
        Ok(pr) => info!("Reviewing PR #{} of {}", pr.number, pr.repo),
        Err(reason) => warn!("PR features disabled: {}", reason),
    }

    let source = DiffSource::resolve(args.base.clone(), pr.as_ref().ok()).await?;
    let files = source.changed_files().await?;

    let controller =
        pr.map(|pr| ReviewController::new(pr, Arc::new(GhCommentClient::new())));

    let mut app = App::new(config, Some(source), files, controller);

    // Run the app and ensure terminal is restored on error
    let result = app.run().await;
    if result.is_err() {
        restore_terminal();
    }
    result
}
