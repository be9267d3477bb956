//! Channel discovery
//!
//! Loads the site's landing page in a browsing context and derives channel
//! ids from links shaped like `<host>/<id>-online`.

use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::BrowsingContext;
use crate::config::defaults::DEFAULT_CHANNEL_PATH_SUFFIX;
use crate::config::SiteConfig;
use crate::errors::{AppError, AppResult, DiscoveryError};
use crate::models::ChannelId;

pub struct ChannelDiscoverer {
    base_url: String,
    pattern: Regex,
    max_channels: usize,
    nav_timeout: Duration,
    settle_delay: Duration,
}

impl ChannelDiscoverer {
    pub fn new(site: &SiteConfig) -> AppResult<Self> {
        Ok(Self {
            base_url: site.base_url.clone(),
            pattern: channel_pattern(&site.base_url)?,
            max_channels: site.max_channels,
            nav_timeout: site.discovery_timeout,
            settle_delay: site.settle_delay,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Load the landing page and return the sorted, deduplicated channel ids
    pub async fn discover(&self, context: &mut dyn BrowsingContext) -> Result<Vec<ChannelId>, DiscoveryError> {
        info!("Discovering channels on {}", self.base_url);

        let hrefs = context
            .collect_anchor_hrefs(&self.base_url, self.nav_timeout, self.settle_delay)
            .await
            .map_err(|e| DiscoveryError::Navigation {
                url: self.base_url.clone(),
                message: e.to_string(),
            })?;

        if hrefs.is_empty() {
            return Err(DiscoveryError::NoAnchors {
                url: self.base_url.clone(),
            });
        }
        debug!("Landing page exposes {} links", hrefs.len());

        let channels = extract_channel_ids(&hrefs, &self.pattern, self.max_channels);
        if channels.is_empty() {
            warn!("No channel links among {} anchors on {}", hrefs.len(), self.base_url);
            return Err(DiscoveryError::NoMatchingLinks {
                url: self.base_url.clone(),
                anchors: hrefs.len(),
            });
        }

        info!("Found {} channels", channels.len());
        Ok(channels)
    }
}

/// Regex matching channel links on the configured site.
///
/// A leading `www.` is dropped from the host so links with and without it
/// both match.
pub fn channel_pattern(base_url: &str) -> AppResult<Regex> {
    let url = Url::parse(base_url)
        .map_err(|e| AppError::configuration(format!("Invalid site base URL '{base_url}': {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::configuration(format!("Site base URL '{base_url}' has no host")))?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    let pattern = format!(
        r"{}/([\w-]+){}",
        regex::escape(host),
        regex::escape(DEFAULT_CHANNEL_PATH_SUFFIX)
    );
    Regex::new(&pattern).map_err(|e| AppError::internal(format!("Invalid channel pattern: {e}")))
}

/// Pull channel ids out of `hrefs`: first-seen dedup, lexicographic sort,
/// then cap at `max`.
pub fn extract_channel_ids<S: AsRef<str>>(hrefs: &[S], pattern: &Regex, max: usize) -> Vec<ChannelId> {
    let mut seen = HashSet::new();
    let mut ids: Vec<String> = hrefs
        .iter()
        .filter_map(|href| pattern.captures(href.as_ref()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|id| seen.insert(id.clone()))
        .collect();

    ids.sort();
    ids.truncate(max);
    ids.into_iter().map(ChannelId::new).collect()
}
