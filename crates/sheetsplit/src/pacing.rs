//! Optional pauses around each export, for watching the office window or
//! easing load on a slow server.

use std::time::Duration;

/// Length of one pause.
pub const PACING_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Pacer {
    enabled: bool,
    steps: usize,
}

impl Pacer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, steps: 0 }
    }

    /// Sleep for [`PACING_DELAY`] when enabled; return at once otherwise.
    pub async fn pace(&mut self) {
        if !self.enabled {
            return;
        }
        tokio::time::sleep(PACING_DELAY).await;
        self.steps += 1;
    }

    /// Pauses taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
}
