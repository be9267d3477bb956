pub mod browser;
pub mod config;
pub mod errors;
pub mod models;
pub mod playlist;
pub mod services;
pub mod utils;

pub use config::Config;
pub use errors::{AppError, AppResult};
