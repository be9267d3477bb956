use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::defaults::DEFAULT_CHANNEL_PATH_SUFFIX;

/// Identifier slug taken from a channel page URL (`<host>/<id>-online`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name shown to playback clients
    pub fn display_name(&self) -> String {
        self.0.to_uppercase()
    }

    /// Channel page on the site, e.g. `https://host/news1-online`
    pub fn page_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}{}",
            base_url.trim_end_matches('/'),
            self.0,
            DEFAULT_CHANNEL_PATH_SUFFIX
        )
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Manifest URL observed while a channel page was rendering.
///
/// These are usually signed and short-lived; a candidate is only meaningful
/// inside the attempt that captured it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStream {
    url: String,
}

impl CandidateStream {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Promote a candidate that passed validation
    pub fn into_validated(self) -> ValidatedStream {
        ValidatedStream { url: self.url }
    }
}

/// Candidate confirmed reachable and content-bearing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedStream {
    url: String,
}

impl ValidatedStream {
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// One working channel in the output playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistEntry {
    pub channel: ChannelId,
    pub stream: ValidatedStream,
}

impl PlaylistEntry {
    pub fn new(channel: ChannelId, stream: ValidatedStream) -> Self {
        Self { channel, stream }
    }

    pub fn url(&self) -> &str {
        self.stream.url()
    }
}

/// Outcome of resolving a single channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A candidate was captured and passed validation
    Resolved(ValidatedStream),
    /// Every attempt failed; the channel is left out of the playlist
    NotFound,
    /// The global run budget ran out; no further channels should be tried
    BudgetExhausted,
}
