//! Soft assertions: evaluate many conditions, fail at the end.
//!
//! A hard assertion aborts its scenario on timeout. A soft collector keeps
//! going instead, recording every failed condition, and reports them all at
//! once when the collector is closed. Useful for audit-style scenarios that
//! sweep a whole results page and should report every discrepancy, not just
//! the first.

use std::fmt;

use super::retry::{RetryAssertion, RetryConfig};
use super::Expectation;
use crate::driver::PageDriver;

/// One recorded soft failure
#[derive(Debug, Clone)]
pub struct SoftFailure {
    /// Description of the condition that never held
    pub description: String,
    /// Last state observed before giving up
    pub observed: String,
}

/// Summary of all failures collected by a [`SoftAssertions`]
#[derive(Debug, Clone)]
pub struct SoftErrors {
    /// Every failed check, in evaluation order
    pub failures: Vec<SoftFailure>,
    /// Total number of checks evaluated, passing or not
    pub checks: usize,
}

impl fmt::Display for SoftErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} of {} soft check(s) failed:",
            self.failures.len(),
            self.checks
        )?;
        for failure in &self.failures {
            writeln!(
                f,
                "  - {} (observed: {})",
                failure.description, failure.observed
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for SoftErrors {}

/// Collector for non-aborting assertions.
///
/// # Example
///
/// ```ignore
/// let mut soft = SoftAssertions::new();
/// soft.check(&mut driver, &Expectation::Visible(Selector::id("matrix")));
/// soft.check(&mut driver, &Expectation::Visible(Selector::id("legend")));
/// soft.into_result()?;
/// ```
#[derive(Debug, Default)]
pub struct SoftAssertions {
    failures: Vec<SoftFailure>,
    checks: usize,
}

impl SoftAssertions {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate an expectation once, without retry, recording a failure
    /// instead of aborting. Returns whether the check passed.
    pub fn check(&mut self, driver: &mut dyn PageDriver, expectation: &Expectation) -> bool {
        self.checks += 1;
        match expectation.evaluate(driver) {
            super::PollOutcome::Pass => true,
            super::PollOutcome::Fail { observed } => {
                self.failures.push(SoftFailure {
                    description: expectation.describe(),
                    observed,
                });
                false
            }
        }
    }

    /// Evaluate an expectation with the full retry budget, recording a
    /// failure instead of aborting. Returns whether the check passed.
    pub fn check_with_retry(
        &mut self,
        driver: &mut dyn PageDriver,
        expectation: &Expectation,
        config: RetryConfig,
    ) -> bool {
        self.checks += 1;
        let outcome = RetryAssertion::new(|| expectation.evaluate(&mut *driver))
            .with_description(expectation.describe())
            .with_config(config)
            .verify();
        match outcome {
            Ok(_) => true,
            Err(err) => {
                self.failures.push(SoftFailure {
                    description: expectation.describe(),
                    observed: err.last_observed,
                });
                false
            }
        }
    }

    /// Record an externally detected failure
    pub fn record(&mut self, description: impl Into<String>, observed: impl Into<String>) {
        self.checks += 1;
        self.failures.push(SoftFailure {
            description: description.into(),
            observed: observed.into(),
        });
    }

    /// Number of failures recorded so far
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of checks evaluated so far
    #[must_use]
    pub const fn check_count(&self) -> usize {
        self.checks
    }

    /// Whether every check so far passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Close the collector: the number of passed checks on success, or the
    /// full failure list.
    ///
    /// # Errors
    ///
    /// Returns [`SoftErrors`] listing every failed check.
    pub fn into_result(self) -> Result<usize, SoftErrors> {
        if self.failures.is_empty() {
            Ok(self.checks)
        } else {
            Err(SoftErrors {
                failures: self.failures,
                checks: self.checks,
            })
        }
    }
}
