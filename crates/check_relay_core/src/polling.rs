use std::time::Duration;

pub const MAX_WAIT_TIME_SECONDS: i32 = 20;
pub const MAX_BATCH_SIZE: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Long-poll wait passed to each receive call.
    pub wait_time_seconds: i32,
    /// Upper bound on messages fetched per receive call.
    pub max_messages: i32,
    /// Delay between successive receive calls. Zero polls back to back.
    pub interval: Duration,
    /// Messages from one batch handled at the same time.
    pub concurrency: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollSettingsError {
    #[error("wait time must be between 0 and 20 seconds, got {0}")]
    WaitTime(i32),
    #[error("batch size must be between 1 and 10, got {0}")]
    BatchSize(i32),
    #[error("concurrency must be a positive integer")]
    Concurrency,
}

impl PollSettings {
    /// Status-queue consumer: short batches every ten seconds, handled together.
    pub fn status_queue() -> Self {
        Self {
            wait_time_seconds: 1,
            max_messages: MAX_BATCH_SIZE,
            interval: Duration::from_secs(10),
            concurrency: MAX_BATCH_SIZE as usize,
        }
    }

    /// Work-queue consumer: continuous long polling, one item at a time.
    pub fn work_queue() -> Self {
        Self {
            wait_time_seconds: 5,
            max_messages: 1,
            interval: Duration::ZERO,
            concurrency: 1,
        }
    }

    pub fn validate(self) -> Result<Self, PollSettingsError> {
        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(PollSettingsError::WaitTime(self.wait_time_seconds));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.max_messages) {
            return Err(PollSettingsError::BatchSize(self.max_messages));
        }
        if self.concurrency == 0 {
            return Err(PollSettingsError::Concurrency);
        }
        Ok(self)
    }
}

/// Outcome counters for one receive-handle-acknowledge round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub received: usize,
    pub handled: usize,
    pub handler_failures: usize,
    pub acknowledged: usize,
    pub acknowledge_failures: usize,
}

impl PollReport {
    pub fn merge(&mut self, other: PollReport) {
        self.received += other.received;
        self.handled += other.handled;
        self.handler_failures += other.handler_failures;
        self.acknowledged += other.acknowledged;
        self.acknowledge_failures += other.acknowledge_failures;
    }
}
