//! Centralized error handling for the harvester
//!
//! # Error Categories
//!
//! - **Browser Errors**: launch failures, context setup, navigation, CDP
//! - **Discovery Errors**: landing page unreachable or no recognisable links
//! - **Configuration Errors**: invalid configuration file or environment
//! - **I/O Errors**: playlist writing and cleanup
//!
//! Stream validation never produces an error; it answers yes or no.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;
