//! Retry window and exponential backoff.
//!
//! Retries are bounded by time rather than by count: a call may be retried
//! until the reiteration window, measured from its first failure, has passed.
//! A caller can additionally cap the number of retries. Redirects are tracked
//! separately and never consume the retry count or a backoff delay.

use std::time::Duration;

use tokio::time::Instant;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// How long after the first failure retries may still be attempted.
    pub reiteration_time: Duration,
    /// Delay before the first retry; doubled after each one.
    pub start_delay: Duration,
    /// Maximum redirects followed within one call.
    pub max_redirects: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            reiteration_time: Duration::from_secs(5),
            start_delay: Duration::from_millis(200),
            max_redirects: 10,
        }
    }
}

impl RetryConfig {
    /// Set the reiteration window.
    pub fn with_reiteration_time(mut self, window: Duration) -> Self {
        self.reiteration_time = window;
        self
    }

    /// Set the initial backoff delay.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Set the redirect cap.
    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    /// Disable retries. Redirects share the window, so they are not
    /// followed either.
    pub fn no_retry() -> Self {
        Self {
            reiteration_time: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Longer window with a shorter first delay, for important operations.
    pub fn aggressive() -> Self {
        Self {
            reiteration_time: Duration::from_secs(30),
            start_delay: Duration::from_millis(100),
            max_redirects: 10,
        }
    }
}

/// Outcome of asking whether another attempt is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryGate {
    Allowed,
    RetriesExhausted,
    DeadlineExceeded,
    RedirectsExhausted,
}

/// Retry bookkeeping for one logical call, created at its first failure.
#[derive(Debug, Clone)]
pub struct RetryState {
    started_at: Instant,
    deadline: Instant,
    delay: Duration,
    retries: u32,
    redirects: u32,
    max_retries: Option<u32>,
    max_redirects: u32,
}

impl RetryState {
    /// Start the window now.
    pub fn start(config: &RetryConfig, max_retries: Option<u32>) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: started_at + config.reiteration_time,
            delay: config.start_delay,
            retries: 0,
            redirects: 0,
            max_retries,
            max_redirects: config.max_redirects,
        }
    }

    /// Number of real retries performed so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn redirects(&self) -> u32 {
        self.redirects
    }

    /// Delay the next retry will sleep.
    pub fn current_delay(&self) -> Duration {
        self.delay
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// May a transient failure be retried?
    pub fn check_retry(&self) -> RetryGate {
        if self.max_retries.is_some_and(|max| self.retries >= max) {
            return RetryGate::RetriesExhausted;
        }
        self.check_deadline()
    }

    /// May a redirect be followed?
    pub fn check_redirect(&self) -> RetryGate {
        if self.redirects >= self.max_redirects {
            return RetryGate::RedirectsExhausted;
        }
        self.check_deadline()
    }

    fn check_deadline(&self) -> RetryGate {
        if Instant::now() < self.deadline {
            RetryGate::Allowed
        } else {
            RetryGate::DeadlineExceeded
        }
    }

    /// Count a retry and return how long to sleep before it. The following
    /// retry waits twice as long.
    pub fn next_backoff(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = self.delay.saturating_mul(2);
        self.retries += 1;
        delay
    }

    pub fn record_redirect(&mut self) {
        self.redirects += 1;
    }
}
