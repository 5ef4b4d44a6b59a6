//! Suite-level result aggregation and rendering.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::ManejarResult;
use crate::scenario::{ScenarioResult, ScenarioState};

/// Aggregated verdicts for one suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite_name: String,
    results: Vec<ScenarioResult>,
    /// Total wall-clock time for the run
    pub duration: Duration,
    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl SuiteReport {
    /// Build a report from executed scenario results
    #[must_use]
    pub fn new(
        suite_name: impl Into<String>,
        results: Vec<ScenarioResult>,
        duration: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            suite_name: suite_name.into(),
            results,
            duration,
            started_at,
        }
    }

    /// Per-scenario results in execution order
    #[must_use]
    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    /// Whether no scenario failed (skips do not count against the run)
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.state != ScenarioState::Failed)
    }

    /// Number of passed scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(ScenarioState::Passed)
    }

    /// Number of failed scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(ScenarioState::Failed)
    }

    /// Number of skipped scenarios
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(ScenarioState::Skipped)
    }

    /// Total number of scenarios in the report
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    fn count(&self, state: ScenarioState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }

    /// Only the failed results, in execution order
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioResult> {
        self.results.iter().filter(|r| r.failed()).collect()
    }

    /// Render a human-readable summary.
    ///
    /// One line per scenario plus a totals line; failed scenarios carry
    /// their failing command and reason indented underneath.
    #[must_use]
    pub fn render_console(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("suite '{}'\n", self.suite_name));
        for result in &self.results {
            let mark = match result.state {
                ScenarioState::Passed => "PASS",
                ScenarioState::Failed => "FAIL",
                ScenarioState::Skipped => "SKIP",
                ScenarioState::Pending | ScenarioState::Running => "....",
            };
            out.push_str(&format!(
                "  {mark} {} ({}ms)\n",
                result.name,
                result.duration.as_millis()
            ));
            if let Some(failure) = &result.failure {
                out.push_str(&format!(
                    "       command #{}: {}\n       {}\n",
                    failure.sequence, failure.command, failure.reason
                ));
            }
            if let Some(screenshot) = &result.screenshot {
                out.push_str(&format!("       screenshot: {screenshot}\n"));
            }
        }
        out.push_str(&format!(
            "{} passed, {} failed, {} skipped in {:.2}s\n",
            self.passed_count(),
            self.failed_count(),
            self.skipped_count(),
            self.duration.as_secs_f64()
        ));
        out
    }

    /// Write the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written or serialized.
    pub fn write_json(&self, path: impl AsRef<Path>) -> ManejarResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
