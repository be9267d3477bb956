//! Run orchestration
//!
//! Discovery, then channels resolved strictly one after another, then the
//! playlist. Whatever was resolved before the budget ran out is written.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::{BrowserEngine, ContextGuard};
use crate::errors::{AppResult, DiscoveryError};
use crate::models::{ChannelId, PlaylistEntry, Resolution, RunBudget};
use crate::playlist::{PlaylistWriter, WriteOutcome};
use crate::services::discovery::ChannelDiscoverer;
use crate::services::resolver::StreamResolver;

/// Summary of a finished run
#[derive(Debug)]
pub struct RunReport {
    pub entries: Vec<PlaylistEntry>,
    pub discovered: usize,
    pub attempted: usize,
    pub not_found: usize,
    pub budget_exhausted: bool,
    pub discovery_error: Option<String>,
    pub elapsed: Duration,
    pub outcome: WriteOutcome,
}

impl RunReport {
    pub fn resolved(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
struct Harvest {
    entries: Vec<PlaylistEntry>,
    attempted: usize,
    not_found: usize,
    budget_exhausted: bool,
}

pub struct RunController {
    engine: Arc<dyn BrowserEngine>,
    discoverer: ChannelDiscoverer,
    resolver: StreamResolver,
    writer: PlaylistWriter,
}

impl RunController {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        discoverer: ChannelDiscoverer,
        resolver: StreamResolver,
        writer: PlaylistWriter,
    ) -> Self {
        Self {
            engine,
            discoverer,
            resolver,
            writer,
        }
    }

    /// Execute one full run against `budget`.
    ///
    /// Only a failure to write or remove the playlist is returned as an
    /// error; discovery and resolution problems end up in the report.
    pub async fn run(&self, budget: RunBudget) -> AppResult<RunReport> {
        let (channels, discovery_error) = match self.discover().await {
            Ok(channels) => (channels, None),
            Err(e) => {
                warn!("Channel discovery failed: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let harvest = self.harvest(&channels, &budget).await;
        let outcome = self.writer.write(&harvest.entries)?;

        let report = RunReport {
            discovered: channels.len(),
            attempted: harvest.attempted,
            not_found: harvest.not_found,
            budget_exhausted: harvest.budget_exhausted,
            entries: harvest.entries,
            discovery_error,
            elapsed: budget.elapsed(),
            outcome,
        };

        info!(
            "Run finished: {} live of {} attempted ({} discovered, {} not found) in {:.1}s{}",
            report.resolved(),
            report.attempted,
            report.discovered,
            report.not_found,
            report.elapsed.as_secs_f64(),
            if report.budget_exhausted { ", stopped by runtime limit" } else { "" }
        );
        Ok(report)
    }

    async fn discover(&self) -> Result<Vec<ChannelId>, DiscoveryError> {
        let mut guard = ContextGuard::open(self.engine.as_ref(), "discovery")
            .await
            .map_err(|e| DiscoveryError::Navigation {
                url: self.discoverer.base_url().to_string(),
                message: e.to_string(),
            })?;

        let result = match guard.context() {
            Ok(context) => self.discoverer.discover(context).await,
            Err(e) => Err(DiscoveryError::Navigation {
                url: self.discoverer.base_url().to_string(),
                message: e.to_string(),
            }),
        };
        guard.release().await;
        result
    }

    async fn harvest(&self, channels: &[ChannelId], budget: &RunBudget) -> Harvest {
        let mut harvest = Harvest::default();

        for (index, channel) in channels.iter().enumerate() {
            info!("[{}/{}] resolving {}", index + 1, channels.len(), channel);
            match self.resolver.resolve(channel, budget).await {
                Resolution::Resolved(stream) => {
                    harvest.attempted += 1;
                    harvest.entries.push(PlaylistEntry::new(channel.clone(), stream));
                }
                Resolution::NotFound => {
                    harvest.attempted += 1;
                    harvest.not_found += 1;
                }
                Resolution::BudgetExhausted => {
                    info!(
                        "Runtime limit reached, skipping {} remaining channels",
                        channels.len() - index
                    );
                    harvest.budget_exhausted = true;
                    break;
                }
            }
        }

        harvest
    }
}
