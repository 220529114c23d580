//! mirrorbot entry point: CLI parsing, login, and the poll loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mirrorbot::config::{self, Credentials, LoadOptions};
use mirrorbot::forum::RedditClient;
use mirrorbot::guard;
use mirrorbot::mirrors::{self, VineClient};
use mirrorbot::notify;
use mirrorbot::pipeline::Pipeline;
use mirrorbot::poll::{self, CycleOutcome};

#[derive(Parser)]
#[command(
    name = "mirrorbot",
    version,
    about = "Forum bot that mirrors short video links across hosting services"
)]
struct Cli {
    /// Perform resolution and mirroring but log the comment instead of
    /// posting it. Exits after the first post.
    #[arg(short = 'd', long)]
    dry_run: bool,

    /// Fire a desktop notification after each poll cycle.
    #[arg(short = 'n', long)]
    notify: bool,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    once: bool,

    /// Remove a post id or URL from the duplicate guard and exit.
    /// Correction path for posts that should be reprocessed.
    #[arg(long, value_name = "KEY")]
    unmark: Option<String>,

    /// Config file path (overrides auto-discovery).
    #[arg(long, env = "MIRRORBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory override.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mirrorbot=info")),
        )
        .init();

    println!("{} Starting mirrorbot", style("→").cyan());

    let settings = config::load_settings_with_options(LoadOptions {
        config_path: cli.config.clone(),
        data_dir: cli.data_dir.clone(),
    })?;
    settings
        .ensure_directories()
        .context("failed to create data directory")?;

    let store = guard::open_store(&settings).await?;

    // Administrative correction: drop a key from the guard and exit.
    if let Some(key) = &cli.unmark {
        store.unmark(key).await?;
        store.flush().await?;
        println!("{} Unmarked {}", style("✓").green(), key);
        return Ok(());
    }

    // Credential or login failure is fatal; nothing below retries it.
    let credentials = Credentials::load(&settings)?;
    let bot_name = credentials.forum_username.clone();

    info!(username = %bot_name, "logging in");
    let forum = match RedditClient::login(
        &settings.user_agent,
        Duration::from_secs(settings.request_timeout),
        &credentials.forum_username,
        &credentials.forum_password,
    )
    .await
    {
        Ok(client) => {
            println!("{} Login successful", style("✓").green());
            client
        }
        Err(err) => {
            eprintln!("{} Login failure: {}", style("✗").red(), err);
            return Err(err.into());
        }
    };

    let http = mirrors::http_client(&settings)?;
    let adapters = mirrors::build_adapters(&settings, &credentials, http.clone());
    let vine = VineClient::new(http);

    let pipeline = Pipeline::new(
        &settings,
        &forum,
        &adapters,
        &vine,
        store.as_ref(),
        cli.dry_run,
    );

    let mut cycles: u64 = 0;
    loop {
        let outcome = tokio::select! {
            outcome = poll::poll_cycle(&settings, &bot_name, &forum, store.as_ref(), &pipeline) => outcome,
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Caught interrupt, exiting gracefully", style("!").yellow());
                break;
            }
        };

        if outcome == CycleOutcome::DryRunComplete {
            println!("{} Dry run complete", style("✓").green());
            break;
        }
        if cli.once {
            break;
        }

        cycles += 1;
        info!(cycles, "looped");
        if cli.notify {
            notify::notify("mirrorbot", "Looped");
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(settings.poll_interval_secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Caught interrupt, exiting gracefully", style("!").yellow());
                break;
            }
        }
    }

    // Orderly shutdown: the guard set only survives restarts if this runs.
    store
        .flush()
        .await
        .context("failed to flush duplicate guard")?;
    println!("{} Shutting down", style("✓").green());
    Ok(())
}
