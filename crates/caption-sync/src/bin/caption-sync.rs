use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use caption_sync::{OutputConfig, SyncEngine, TerminalTarget};
use clap::Parser;

/// Follow live transcript channels and print them to the terminal.
#[derive(Parser, Debug)]
#[command(name = "caption-sync", version)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend endpoint. ws:// or wss:// pushes, http:// or https:// polls.
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Channel to follow. Repeat for several.
    #[arg(long = "channel", value_name = "NAME")]
    channels: Vec<String>,

    /// HTTP method for pull requests.
    #[arg(long)]
    method: Option<String>,

    /// Pause between pull cycles.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Mark output stale after this long without updates.
    #[arg(long)]
    stale_after_ms: Option<u64>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(&self, config: &mut OutputConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if !self.channels.is_empty() {
            config.channels = self.channels.clone();
        }
        if let Some(method) = &self.method {
            config.method = method.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.stale_after_ms {
            config.stale_after_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    caption_sync::logging::init(&cli.log_level);

    let mut output = match &cli.config {
        Some(path) => OutputConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => OutputConfig::default(),
    };
    cli.apply(&mut output);

    let config = output
        .to_engine_config()
        .context("invalid configuration")?;
    let mut engine = SyncEngine::new(config)?;
    engine.on_push_error(|e| {
        if e.is_terminal() {
            tracing::error!("giving up on the backend: {}", e);
        }
    });

    let terminal = Arc::new(TerminalTarget::stdout());
    for channel in &output.channels {
        engine.register(channel, &terminal);
    }

    engine
        .run()
        .with_context(|| format!("starting session against {}", output.endpoint))?;

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        result = engine.join() => {
            result.context("session ended")?;
            false
        }
    };

    if interrupted {
        tracing::info!("interrupted, stopping");
        engine.shutdown().await?;
    }

    let stats = engine.stats();
    tracing::info!(
        applied = stats.applied,
        rejected = stats.rejected,
        malformed = stats.malformed,
        failed_cycles = stats.failed_cycles,
        "done"
    );
    Ok(())
}
