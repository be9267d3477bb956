use std::time::Duration;
use tokio::time::Instant;

/// Global wall-clock ceiling for a run.
///
/// Captured once at process start from the monotonic clock and only read
/// afterwards, so it is `Copy` and can be handed to every stage freely.
#[derive(Debug, Clone, Copy)]
pub struct RunBudget {
    started: Instant,
    ceiling: Duration,
}

impl RunBudget {
    /// Start the clock now
    pub fn start(ceiling: Duration) -> Self {
        Self::started_at(Instant::now(), ceiling)
    }

    pub fn started_at(started: Instant, ceiling: Duration) -> Self {
        Self { started, ceiling }
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.ceiling.saturating_sub(self.elapsed())
    }

    /// True once elapsed time has passed the ceiling
    pub fn is_exhausted(&self) -> bool {
        self.elapsed() > self.ceiling
    }
}
