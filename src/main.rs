use anyhow::{Context, Result};
use blogroll::config::Config;
use blogroll::service::Blogroll;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset or invalid; per-feed failures log at warn.
const DEFAULT_LOG_DIRECTIVE: &str = "warn";

fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}

/// Atomically write a file using write-to-temp-then-rename pattern.
/// This ensures the destination is never left in a partial state.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    // Randomized temp filename so a stale or planted file is never reused
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true) // Fails atomically if file exists (prevents symlink race)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions or disk space",
                temp_path.display()
            )
        })?;

    temp_file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write to temporary file '{}': disk may be full",
            temp_path.display()
        )
    })?;

    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk: disk may be full",
            temp_path.display()
        )
    })?;

    drop(temp_file);

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!(
                "Failed to remove existing '{}' before atomic replace",
                dst.display()
            )
        })?;
    }

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}': check permissions",
            temp_path.display(),
            dst.display()
        )
    })?;

    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "blogroll",
    about = "Collects the latest post of every feed in a feed list as JSON"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (TOML)
    #[arg(long, value_name = "FILE", default_value = "blogroll.toml", global = true)]
    config: PathBuf,

    /// Feed list file (overrides `feeds_file`)
    #[arg(long, value_name = "FILE", global = true)]
    feeds: Option<PathBuf>,

    /// Maximum simultaneous fetches (overrides `concurrency`)
    #[arg(long, value_name = "N", global = true)]
    concurrency: Option<usize>,

    /// Fetch feeds one at a time
    #[arg(long, conflicts_with = "concurrency", global = true)]
    sequential: bool,

    /// Deadline for the whole run in seconds (overrides `aggregation_timeout_secs`)
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Write JSON to this file instead of stdout
    #[arg(long, short, value_name = "FILE", global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Latest post of every feed (default)
    #[default]
    Posts,
    /// The configured feed list
    Sources,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(feeds) = &self.feeds {
            config.feeds_file = feeds.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if self.sequential {
            config.concurrency = 0;
        }
        if let Some(timeout) = self.timeout {
            config.aggregation_timeout_secs = timeout;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only JSON
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    args.apply(&mut config);

    let blogroll = Blogroll::from_config(&config).context("Failed to set up feed aggregation")?;

    let json = match args.command.unwrap_or_default() {
        Command::Posts => {
            let interrupted = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            };
            blogroll
                .latest_posts_json_until(interrupted)
                .await
                .context("Failed to collect latest posts")?
        }
        Command::Sources => blogroll
            .feed_sources_json()
            .await
            .context("Failed to list feeds")?,
    };

    match &args.output {
        Some(path) => {
            atomic_write(path, json.as_bytes())?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => println!("{json}"),
    }

    Ok(())
}
