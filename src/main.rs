use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_harvester::{
    browser::{BrowserEngine, ChromiumEngine},
    config::Config,
    models::RunBudget,
    playlist::PlaylistWriter,
    services::{build_validator, ChannelDiscoverer, RunController, RunReport, StreamResolver},
    AppResult,
};

#[derive(Parser)]
#[command(name = "m3u-harvester")]
#[command(version = "0.1.0")]
#[command(about = "Harvests live channel streams from a site into an M3U playlist")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "harvester.toml")]
    config: String,

    /// Playlist output path (overrides config file)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // The runtime ceiling counts from process start.
    let started = tokio::time::Instant::now();
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("m3u_harvester={},chromiumoxide=debug", cli.log_level)
    } else {
        format!("m3u_harvester={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting M3U Harvester v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    if let Some(output) = cli.output {
        config.output.path = output;
    }

    let budget = RunBudget::started_at(started, config.run.max_runtime);
    info!(
        "Harvesting {} (up to {} channels, runtime limit {:?})",
        config.site.base_url, config.site.max_channels, config.run.max_runtime
    );

    let writer = PlaylistWriter::new(config.output.path.clone(), &config.http);
    if writer.remove_stale()? {
        info!("Removed previous playlist {}", writer.path().display());
    }

    let engine = match ChromiumEngine::launch(&config.browser, &config.http).await {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("Browser launch failed: {}", e);
            return Err(e).context("could not start the headless browser");
        }
    };

    let result = harvest(&config, engine.clone(), writer, budget).await;

    match Arc::try_unwrap(engine) {
        Ok(engine) => engine.shutdown().await,
        Err(_) => warn!("Browser still referenced at shutdown; leaving it to process exit"),
    }

    let report = result?;
    if let Some(reason) = &report.discovery_error {
        info!("Nothing harvested: {}", reason);
    }
    Ok(())
}

async fn harvest(
    config: &Config,
    engine: Arc<ChromiumEngine>,
    writer: PlaylistWriter,
    budget: RunBudget,
) -> AppResult<RunReport> {
    let engine: Arc<dyn BrowserEngine> = engine;
    let validator = build_validator(config)?;
    let discoverer = ChannelDiscoverer::new(&config.site)?;
    let resolver = StreamResolver::new(
        engine.clone(),
        validator,
        config.site.base_url.clone(),
        config.resolver.clone(),
    );

    RunController::new(engine, discoverer, resolver, writer)
        .run(budget)
        .await
}
