use lessoncast_core::validation::MAX_VIDEO_SIZE_BYTES;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Advisory client-side limit; the server checks again on finalize.
    pub max_size_bytes: u64,
    /// Share of the progress bar held back until the server acknowledges finalize.
    /// Read through [`UploadOptions::reserve_percent`].
    pub finalize_reserve_percent: u8,
}

impl UploadOptions {
    pub const MIN_RESERVE_PERCENT: u8 = 5;
    pub const MAX_RESERVE_PERCENT: u8 = 10;

    /// The finalize reserve, held to 5..=10 percent.
    pub fn reserve_percent(&self) -> u8 {
        self.finalize_reserve_percent
            .clamp(Self::MIN_RESERVE_PERCENT, Self::MAX_RESERVE_PERCENT)
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_size_bytes: MAX_VIDEO_SIZE_BYTES,
            finalize_reserve_percent: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub initial_interval: Duration,
    pub backoff_factor: u32,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            backoff_factor: 2,
            max_interval: Duration::from_secs(30),
            max_attempts: 120,
        }
    }
}

impl PollOptions {
    /// Delay after the `attempt`-th poll (1-based).
    pub fn interval_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_factor
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}
