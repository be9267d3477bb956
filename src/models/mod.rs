//! Domain types shared by the pipeline stages

pub mod budget;
pub mod channel;

pub use budget::RunBudget;
pub use channel::*;
