//! Per-channel stream resolution
//!
//! Each attempt opens a fresh isolated browsing context, loads the channel
//! page and waits for the player to request its manifest. The captured URL
//! is validated before it is accepted. Attempts are bounded per channel and
//! by the global run budget.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::browser::{BrowserEngine, ContextGuard};
use crate::config::ResolverConfig;
use crate::models::{CandidateStream, ChannelId, Resolution, RunBudget, ValidatedStream};
use crate::services::validator::StreamValidator;
use crate::utils::jitter::with_jitter;

/// Where a channel's resolution currently stands
#[derive(Debug)]
enum AttemptState {
    /// Between attempts; budget and attempt count are checked here
    Idle,
    Navigating,
    CandidateFound(CandidateStream),
    Validating(CandidateStream),
    Success(ValidatedStream),
    RetryOrFail,
}

pub struct StreamResolver {
    engine: Arc<dyn BrowserEngine>,
    validator: Arc<dyn StreamValidator>,
    base_url: String,
    config: ResolverConfig,
}

impl StreamResolver {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        validator: Arc<dyn StreamValidator>,
        base_url: impl Into<String>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            engine,
            validator,
            base_url: base_url.into(),
            config,
        }
    }

    /// Resolve one channel to a validated stream.
    ///
    /// Never fails: exhausted retries give `NotFound`, an expired run budget
    /// gives `BudgetExhausted` without opening another context.
    pub async fn resolve(&self, channel: &ChannelId, budget: &RunBudget) -> Resolution {
        let max_attempts = self.config.effective_attempts();
        let page_url = channel.page_url(&self.base_url);
        let mut attempt = 0u32;
        let mut state = AttemptState::Idle;

        loop {
            state = match state {
                AttemptState::Idle => {
                    if attempt >= max_attempts {
                        info!("[{}] no live stream after {} attempts", channel, attempt);
                        return Resolution::NotFound;
                    }
                    if budget.is_exhausted() {
                        info!("Run budget of {:?} exhausted before resolving {}", budget.ceiling(), channel);
                        return Resolution::BudgetExhausted;
                    }
                    attempt += 1;
                    debug!("[{}] attempt {}/{}", channel, attempt, max_attempts);
                    AttemptState::Navigating
                }
                AttemptState::Navigating => match self.capture(channel, &page_url).await {
                    Some(candidate) => AttemptState::CandidateFound(candidate),
                    None => AttemptState::RetryOrFail,
                },
                AttemptState::CandidateFound(candidate) => {
                    info!("[{}] checking stream {}", channel, candidate.url());
                    AttemptState::Validating(candidate)
                }
                AttemptState::Validating(candidate) => {
                    if self.validator.validate(&candidate).await {
                        AttemptState::Success(candidate.into_validated())
                    } else {
                        warn!("[{}] stream rejected by {} validator", channel, self.validator.name());
                        AttemptState::RetryOrFail
                    }
                }
                AttemptState::Success(stream) => {
                    info!("[{}] live", channel);
                    return Resolution::Resolved(stream);
                }
                AttemptState::RetryOrFail => {
                    if attempt < max_attempts && !budget.is_exhausted() {
                        let cooldown = with_jitter(self.config.retry_cooldown, self.config.retry_jitter_percent);
                        debug!("[{}] retrying in {:?}", channel, cooldown);
                        tokio::time::sleep(cooldown).await;
                    }
                    AttemptState::Idle
                }
            };
        }
    }

    /// One navigation attempt. The context is released before returning on
    /// every path.
    async fn capture(&self, channel: &ChannelId, page_url: &str) -> Option<CandidateStream> {
        let mut guard = match ContextGuard::open(self.engine.as_ref(), channel.as_str()).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!("[{}] could not open browsing context: {}", channel, e);
                return None;
            }
        };

        let captured = match guard.context() {
            Ok(context) => {
                context
                    .capture_request(page_url, &self.config.manifest_marker, self.config.attempt_timeout)
                    .await
            }
            Err(e) => Err(e),
        };
        guard.release().await;

        match captured {
            Ok(Some(url)) => Some(CandidateStream::new(url)),
            Ok(None) => {
                debug!("[{}] no manifest request within {:?}", channel, self.config.attempt_timeout);
                None
            }
            Err(e) => {
                debug!("[{}] attempt failed: {}", channel, e);
                None
            }
        }
    }
}
