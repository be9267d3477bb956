//! Error type definitions for the harvester
//!
//! This module defines the error types used throughout the pipeline. Only a
//! handful of them ever reach the process boundary: discovery and resolution
//! failures are recovered locally and surface as log lines or missing
//! playlist entries.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Browser engine errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Channel discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Filesystem errors while writing or removing the playlist
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by the browser engine and its browsing contexts
#[derive(Error, Debug)]
pub enum BrowserError {
    /// The browser process could not be started
    #[error("Failed to launch browser: {message}")]
    Launch { message: String },

    /// A browsing context could not be created or prepared
    #[error("Browsing context error: {message}")]
    Context { message: String },

    /// Navigation to a page failed
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// An operation exceeded its deadline
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// Low level DevTools protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),
}

/// Reasons why discovery produced no channels
///
/// Each variant is a distinct condition so that an unreachable site can be
/// told apart from a site whose markup no longer matches the channel pattern.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Landing page could not be loaded or evaluated
    #[error("Could not load landing page {url}: {message}")]
    Navigation { url: String, message: String },

    /// Landing page loaded but contained no links at all
    #[error("Landing page {url} contains no links")]
    NoAnchors { url: String },

    /// Links exist but none of them look like a channel page
    #[error("None of the {anchors} links on {url} match the channel pattern (site layout may have changed)")]
    NoMatchingLinks { url: String, anchors: usize },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl BrowserError {
    /// Create a navigation error
    pub fn navigation<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a browsing context error
    pub fn context<S: Into<String>>(message: S) -> Self {
        Self::Context {
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Cdp(err.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        Self::configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_errors_are_distinguishable() {
        let unreachable = DiscoveryError::Navigation {
            url: "https://site.example".to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        };
        let changed = DiscoveryError::NoMatchingLinks {
            url: "https://site.example".to_string(),
            anchors: 42,
        };

        assert!(unreachable.to_string().contains("Could not load"));
        assert!(changed.to_string().contains("42 links"));
        assert!(changed.to_string().contains("layout may have changed"));
    }

    #[test]
    fn test_browser_error_wraps_into_app_error() {
        let err: AppError = BrowserError::timeout("navigate", 20).into();
        assert_eq!(err.to_string(), "Browser error: Timed out after 20s: navigate");
    }
}
