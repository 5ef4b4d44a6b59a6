//! Scenario and suite execution.
//!
//! A scenario is a named command list with a pass/fail verdict; a suite
//! groups scenarios with shared setup. Scenarios run sequentially, each
//! against a fresh queue, under a per-scenario deadline that is folded into
//! every command's retry budget. One scenario failing never stops the rest
//! of the suite unless fail-fast is on.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandQueue};
use crate::config::EngineConfig;
use crate::driver::PageDriver;
use crate::reporter::SuiteReport;
use crate::result::ManejarResult;
use crate::session::SessionCache;

/// Lifecycle state of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioState {
    /// Not yet started
    Pending,
    /// Currently executing
    Running,
    /// Every command succeeded
    Passed,
    /// A command failed or the deadline was hit
    Failed,
    /// Excluded from this run
    Skipped,
}

impl std::fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// A named command list with optional per-scenario overrides
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name, used in reports and screenshot labels
    pub name: String,
    commands: Vec<Command>,
    timeout: Option<Duration>,
    skip: bool,
}

impl Scenario {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            timeout: None,
            skip: false,
        }
    }

    /// Append a command
    #[must_use]
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Append several commands in order
    #[must_use]
    pub fn with_commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Override the suite-level scenario timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Exclude this scenario from the run while keeping it in the report
    #[must_use]
    pub const fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Commands in execution order
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Whether this scenario is excluded from the run
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skip
    }
}

/// What failed, pinned to the command that caused it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Sequence number of the failing command (0 for setup failures)
    pub sequence: u64,
    /// Description of the failing command
    pub command: String,
    /// Why it failed
    pub reason: String,
}

/// Verdict for one executed scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,
    /// Final state
    pub state: ScenarioState,
    /// Present when the scenario failed
    pub failure: Option<FailureDetail>,
    /// Wall-clock execution time
    pub duration: Duration,
    /// Screenshot artifact captured on failure, if any
    pub screenshot: Option<String>,
    /// When the scenario finished
    pub completed_at: DateTime<Utc>,
}

impl ScenarioResult {
    /// Whether the scenario passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.state == ScenarioState::Passed
    }

    /// Whether the scenario failed
    #[must_use]
    pub fn failed(&self) -> bool {
        self.state == ScenarioState::Failed
    }
}

type SetupFn = Box<dyn FnMut(&mut dyn PageDriver, &SessionCache) -> ManejarResult<()>>;

/// A named group of scenarios with optional shared setup.
///
/// The `before_each` hook runs ahead of every scenario; a hook failure
/// fails that scenario without running any of its commands. The hook
/// receives the session cache so login-style setup can be done once and
/// restored cheaply afterwards.
pub struct Suite {
    /// Suite name, used in the report header
    pub name: String,
    scenarios: Vec<Scenario>,
    before_each: Option<SetupFn>,
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("scenarios", &self.scenarios.len())
            .field("has_before_each", &self.before_each.is_some())
            .finish()
    }
}

impl Suite {
    /// Create an empty suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
            before_each: None,
        }
    }

    /// Append a scenario
    #[must_use]
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Install a hook that runs before every scenario
    #[must_use]
    pub fn with_before_each<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn PageDriver, &SessionCache) -> ManejarResult<()> + 'static,
    {
        self.before_each = Some(Box::new(hook));
        self
    }

    /// Scenarios in execution order
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }
}

/// Executes suites sequentially against a driver.
///
/// Each scenario gets a fresh command queue and a deadline derived from its
/// timeout (or the engine default). On failure the runner captures a
/// screenshot when the engine is configured to.
#[derive(Debug)]
pub struct SuiteRunner {
    config: EngineConfig,
    sessions: SessionCache,
    fail_fast: bool,
}

impl SuiteRunner {
    /// Create a runner with the given engine config
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            sessions: SessionCache::new(),
            fail_fast: false,
        }
    }

    /// Stop running further scenarios after the first failure
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Session cache shared across every scenario this runner executes
    #[must_use]
    pub const fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Engine config the runner was built with
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every scenario in the suite and aggregate the verdicts.
    ///
    /// Cached sessions are dropped when the suite finishes.
    pub fn run(&self, suite: &mut Suite, driver: &mut dyn PageDriver) -> SuiteReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut results = Vec::with_capacity(suite.scenarios.len());
        let mut saw_failure = false;

        for index in 0..suite.scenarios.len() {
            let scenario = suite.scenarios[index].clone();
            if scenario.skip || (self.fail_fast && saw_failure) {
                tracing::info!(scenario = %scenario.name, "skipped");
                results.push(ScenarioResult {
                    name: scenario.name,
                    state: ScenarioState::Skipped,
                    failure: None,
                    duration: Duration::ZERO,
                    screenshot: None,
                    completed_at: Utc::now(),
                });
                continue;
            }

            let result = self.run_scenario(&scenario, suite.before_each.as_mut(), driver);
            saw_failure |= result.failed();
            results.push(result);
        }

        self.sessions.clear();
        SuiteReport::new(&suite.name, results, started.elapsed(), started_at)
    }

    fn run_scenario(
        &self,
        scenario: &Scenario,
        mut before_each: Option<&mut SetupFn>,
        driver: &mut dyn PageDriver,
    ) -> ScenarioResult {
        tracing::info!(scenario = %scenario.name, "running");
        let started = Instant::now();
        let deadline =
            started + scenario.timeout.unwrap_or(self.config.scenario_timeout);

        if let Some(hook) = before_each.as_deref_mut() {
            if let Err(err) = hook(driver, &self.sessions) {
                tracing::warn!(scenario = %scenario.name, error = %err, "setup failed");
                return self.failed_result(
                    scenario,
                    driver,
                    started,
                    FailureDetail {
                        sequence: 0,
                        command: "before_each".to_string(),
                        reason: err.to_string(),
                    },
                );
            }
        }

        let mut queue = CommandQueue::new();
        for command in scenario.commands() {
            queue.enqueue(command.clone());
        }

        match queue.run(driver, &self.config, Some(deadline)) {
            Ok(()) => {
                tracing::info!(
                    scenario = %scenario.name,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "passed"
                );
                ScenarioResult {
                    name: scenario.name.clone(),
                    state: ScenarioState::Passed,
                    failure: None,
                    duration: started.elapsed(),
                    screenshot: None,
                    completed_at: Utc::now(),
                }
            }
            Err(err) => {
                tracing::warn!(scenario = %scenario.name, error = %err, "failed");
                self.failed_result(
                    scenario,
                    driver,
                    started,
                    FailureDetail {
                        sequence: err.sequence,
                        command: err.command,
                        reason: err.source.to_string(),
                    },
                )
            }
        }
    }

    fn failed_result(
        &self,
        scenario: &Scenario,
        driver: &mut dyn PageDriver,
        started: Instant,
        failure: FailureDetail,
    ) -> ScenarioResult {
        let screenshot = if self.config.screenshot_on_failure {
            let label = format!(
                "{}/{}",
                self.config.artifacts_dir.trim_end_matches('/'),
                screenshot_label(&scenario.name)
            );
            driver.capture_screenshot(&label)
        } else {
            None
        };
        ScenarioResult {
            name: scenario.name.clone(),
            state: ScenarioState::Failed,
            failure: Some(failure),
            duration: started.elapsed(),
            screenshot,
            completed_at: Utc::now(),
        }
    }
}

/// Filesystem-safe label derived from a scenario name
fn screenshot_label(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
