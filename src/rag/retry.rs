use std::time::Duration;

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    Transient,
}

/// Per-file retry ceiling, failure classification and delay schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub rate_limit_cooldown: Duration,
    pub transient_backoff: Duration,
    pub inter_file_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_cooldown: Duration::from_secs(70),
            transient_backoff: Duration::from_secs(5),
            inter_file_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Same ceiling, no waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            rate_limit_cooldown: Duration::ZERO,
            transient_backoff: Duration::ZERO,
            inter_file_delay: Duration::ZERO,
        }
    }

    /// Document-load failures are not told apart from provider failures.
    pub fn classify(&self, err: &IngestError) -> FailureClass {
        match err {
            IngestError::Provider(e) if e.is_rate_limit() => FailureClass::RateLimited,
            _ => FailureClass::Transient,
        }
    }

    pub fn backoff(&self, class: FailureClass) -> Duration {
        match class {
            FailureClass::RateLimited => self.rate_limit_cooldown,
            FailureClass::Transient => self.transient_backoff,
        }
    }

    /// Whether another attempt follows attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
