//! Poll-until-timeout assertion evaluator.
//!
//! Every poll is a fresh read of the live page: no prior evaluation result
//! influences the next one. A transient false evaluation before the deadline
//! never short-circuits failure; failure is only reported once the timeout
//! budget is exhausted, and it carries the last observed state for triage.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Outcome of a single poll of an assertion
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Predicate held
    Pass,
    /// Predicate did not hold; carries what was actually observed
    Fail {
        /// State seen on this poll (element text, current URL, "not found", ...)
        observed: String,
    },
}

impl PollOutcome {
    /// Build a failing outcome
    #[must_use]
    pub fn fail(observed: impl Into<String>) -> Self {
        Self::Fail {
            observed: observed.into(),
        }
    }

    /// Check if the outcome is a pass
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Configuration for retry behavior.
///
/// The default timeout is generous enough to absorb one full page
/// navigation plus render; both knobs are overridable per assertion and
/// per suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total timeout budget
    pub timeout: Duration,
    /// Interval between polls
    pub poll_interval: Duration,
    /// Maximum number of polls (0 = unlimited within timeout)
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            max_attempts: 0,
        }
    }
}

impl RetryConfig {
    /// Create a retry config with the given timeout
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(100),
            max_attempts: 0,
        }
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum number of polls
    #[must_use]
    pub const fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Short budget for unit-scale checks
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(20),
            max_attempts: 0,
        }
    }

    /// Long budget that rides out a slow navigation
    #[must_use]
    pub const fn slow() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            max_attempts: 0,
        }
    }

    /// Cap the timeout so it does not exceed `deadline`.
    ///
    /// Used to fold a scenario-level budget into an individual assertion.
    #[must_use]
    pub fn clamped_to(mut self, deadline: Instant) -> Self {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining < self.timeout {
            self.timeout = remaining;
        }
        self
    }
}

/// An assertion that polls a predicate until success or timeout.
///
/// # Example
///
/// ```ignore
/// let mut assertion = RetryAssertion::new(|| {
///     if error_region_visible() {
///         PollOutcome::Pass
///     } else {
///         PollOutcome::fail("error region hidden")
///     }
/// })
/// .with_description("error region becomes visible");
///
/// assertion.verify()?;
/// ```
pub struct RetryAssertion<F>
where
    F: FnMut() -> PollOutcome,
{
    check: F,
    config: RetryConfig,
    description: String,
}

impl<F> RetryAssertion<F>
where
    F: FnMut() -> PollOutcome,
{
    /// Create a retry assertion with default config
    #[must_use]
    pub fn new(check: F) -> Self {
        Self {
            check,
            config: RetryConfig::default(),
            description: String::new(),
        }
    }

    /// Set the timeout budget
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the full config
    #[must_use]
    pub const fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a human-readable description used in failure reports
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Get the current config
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Poll until the predicate passes or the budget is exhausted.
    ///
    /// Success returns immediately on the first true evaluation; no polling
    /// continues after success. Failure is reported only once elapsed time
    /// reaches the timeout (or `max_attempts` is hit), never earlier.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError`] with the last observed state after timeout.
    pub fn verify(&mut self) -> Result<RetryPass, RetryError> {
        let start = Instant::now();
        let mut attempts = 0usize;
        let mut last_observed = String::new();

        loop {
            attempts += 1;

            match (self.check)() {
                PollOutcome::Pass => {
                    tracing::debug!(
                        description = %self.description,
                        attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "assertion passed"
                    );
                    return Ok(RetryPass {
                        attempts,
                        elapsed: start.elapsed(),
                    });
                }
                PollOutcome::Fail { observed } => {
                    last_observed = observed;
                }
            }

            let elapsed = start.elapsed();
            let budget_spent = elapsed >= self.config.timeout;
            let attempts_spent =
                self.config.max_attempts > 0 && attempts >= self.config.max_attempts;
            if budget_spent || attempts_spent {
                tracing::debug!(
                    description = %self.description,
                    attempts,
                    last_observed = %last_observed,
                    "assertion exhausted its budget"
                );
                return Err(RetryError {
                    description: self.description.clone(),
                    last_observed,
                    attempts,
                    elapsed,
                    timeout: self.config.timeout,
                });
            }

            // Never sleep past the deadline; failure lands at ~timeout,
            // within one poll interval of tolerance.
            let remaining = self.config.timeout.saturating_sub(elapsed);
            std::thread::sleep(self.config.poll_interval.min(remaining));
        }
    }
}

impl<F> Debug for RetryAssertion<F>
where
    F: FnMut() -> PollOutcome,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryAssertion")
            .field("config", &self.config)
            .field("description", &self.description)
            .finish()
    }
}

/// Result of a successful retry assertion
#[derive(Debug, Clone, Copy)]
pub struct RetryPass {
    /// Number of polls before success
    pub attempts: usize,
    /// Total time spent polling
    pub elapsed: Duration,
}

/// Error when a retry assertion exhausts its budget
#[derive(Debug, Clone)]
pub struct RetryError {
    /// Description of the assertion
    pub description: String,
    /// Last state observed before the deadline
    pub last_observed: String,
    /// Number of polls made
    pub attempts: usize,
    /// Total time spent polling
    pub elapsed: Duration,
    /// Configured timeout budget
    pub timeout: Duration,
}

impl std::fmt::Display for RetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.description.is_empty() {
            write!(f, "{}: ", self.description)?;
        }
        write!(
            f,
            "failed after {} poll(s) in {:.2}s (budget {:.2}s); last observed: {}",
            self.attempts,
            self.elapsed.as_secs_f64(),
            self.timeout.as_secs_f64(),
            self.last_observed
        )
    }
}

impl std::error::Error for RetryError {}
