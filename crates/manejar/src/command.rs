//! Deferred commands and the FIFO execution queue.
//!
//! Building a command performs no page work: invalid pairings (typing into
//! a select box, clicking a region) are rejected right there, while
//! everything page-dependent waits until the queue runs. Execution is
//! strictly in enqueue order, one command at a time; the first hard failure
//! aborts the rest of the queue.

use std::fmt;
use std::time::{Duration, Instant};

use crate::assertion::retry::{RetryAssertion, RetryConfig};
use crate::assertion::Expectation;
use crate::config::EngineConfig;
use crate::driver::PageDriver;
use crate::resolver::resolve_interactable;
use crate::result::{ManejarError, ManejarResult};
use crate::selector::Target;

/// A single deferred operation
#[derive(Debug, Clone)]
pub enum Command {
    /// Navigate to a path (resolved against the configured base URL)
    Visit {
        /// Path or absolute URL
        path: String,
    },
    /// Replace the value of a text input
    Type {
        /// Input to drive
        target: Target,
        /// Text to enter
        text: String,
    },
    /// Choose an option on a select box
    Select {
        /// Select box to drive
        target: Target,
        /// Option value to choose
        value: String,
    },
    /// Check or uncheck a checkbox
    SetChecked {
        /// Checkbox to drive
        target: Target,
        /// Desired state
        checked: bool,
    },
    /// Click a button, link, or checkbox
    Click {
        /// Element to click
        target: Target,
    },
    /// Evaluate an expectation under retry
    Assert {
        /// Condition that must become true
        expectation: Expectation,
        /// Per-assertion budget override; `None` uses the engine default
        retry: Option<RetryConfig>,
    },
    /// Sleep for a fixed duration.
    ///
    /// Escape hatch for pages with no observable settling signal; prefer an
    /// assertion on the thing being waited for.
    Pause {
        /// How long to sleep
        duration: Duration,
    },
}

impl Command {
    /// Navigate to a path
    #[must_use]
    pub fn visit(path: impl Into<String>) -> Self {
        Self::Visit { path: path.into() }
    }

    /// Type into a text input.
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::InvalidCommand`] when the target is not a
    /// text input.
    pub fn type_text(target: Target, text: impl Into<String>) -> ManejarResult<Self> {
        if !target.kind.accepts_text() {
            return Err(ManejarError::InvalidCommand {
                message: format!("cannot type into {target}"),
            });
        }
        Ok(Self::Type {
            target,
            text: text.into(),
        })
    }

    /// Choose an option on a select box.
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::InvalidCommand`] when the target is not a
    /// select box.
    pub fn select(target: Target, value: impl Into<String>) -> ManejarResult<Self> {
        if !target.kind.accepts_select() {
            return Err(ManejarError::InvalidCommand {
                message: format!("cannot select an option on {target}"),
            });
        }
        Ok(Self::Select {
            target,
            value: value.into(),
        })
    }

    /// Check or uncheck a checkbox.
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::InvalidCommand`] when the target is not a
    /// checkbox.
    pub fn set_checked(target: Target, checked: bool) -> ManejarResult<Self> {
        if !target.kind.accepts_check() {
            return Err(ManejarError::InvalidCommand {
                message: format!("cannot check {target}"),
            });
        }
        Ok(Self::SetChecked { target, checked })
    }

    /// Click a clickable element.
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::InvalidCommand`] when the target does not
    /// accept clicks.
    pub fn click(target: Target) -> ManejarResult<Self> {
        if !target.kind.accepts_click() {
            return Err(ManejarError::InvalidCommand {
                message: format!("cannot click {target}"),
            });
        }
        Ok(Self::Click { target })
    }

    /// Assert an expectation with the engine's default budget
    #[must_use]
    pub const fn assert(expectation: Expectation) -> Self {
        Self::Assert {
            expectation,
            retry: None,
        }
    }

    /// Assert an expectation with an explicit budget
    #[must_use]
    pub const fn assert_within(expectation: Expectation, retry: RetryConfig) -> Self {
        Self::Assert {
            expectation,
            retry: Some(retry),
        }
    }

    /// Sleep for a fixed duration
    #[must_use]
    pub const fn pause(duration: Duration) -> Self {
        Self::Pause { duration }
    }

    /// Human-readable description for logs and failure reports
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Visit { path } => format!("visit '{path}'"),
            Self::Type { target, text } => format!("type '{text}' into {target}"),
            Self::Select { target, value } => format!("select '{value}' on {target}"),
            Self::SetChecked { target, checked } => {
                if *checked {
                    format!("check {target}")
                } else {
                    format!("uncheck {target}")
                }
            }
            Self::Click { target } => format!("click {target}"),
            Self::Assert { expectation, .. } => format!("assert {}", expectation.describe()),
            Self::Pause { duration } => format!("pause {}ms", duration.as_millis()),
        }
    }
}

/// A command stamped with its position in the queue
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    /// 1-based position in enqueue order
    pub sequence: u64,
    /// The deferred operation
    pub command: Command,
}

/// Error aborting a queue run, pinned to the command that caused it
#[derive(Debug)]
pub struct QueueError {
    /// Sequence number of the failing command
    pub sequence: u64,
    /// Description of the failing command
    pub command: String,
    /// Underlying failure
    pub source: ManejarError,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command #{} ({}) failed: {}",
            self.sequence, self.command, self.source
        )
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// FIFO queue of deferred commands.
///
/// Enqueueing records intent; nothing touches the page until [`run`]
/// executes the queue front to back against a driver.
///
/// [`run`]: CommandQueue::run
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<QueuedCommand>,
    next_sequence: u64,
}

impl CommandQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command; sequence numbers follow enqueue order
    pub fn enqueue(&mut self, command: Command) -> &mut Self {
        self.next_sequence += 1;
        self.commands.push(QueuedCommand {
            sequence: self.next_sequence,
            command,
        });
        self
    }

    /// Number of queued commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the queue holds no commands
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Queued commands in execution order
    #[must_use]
    pub fn commands(&self) -> &[QueuedCommand] {
        &self.commands
    }

    /// Execute the queue front to back.
    ///
    /// Actions auto-wait for their target to become interactable under the
    /// engine's retry budget, then act exactly once. Assertions poll under
    /// their budget. The optional `deadline` caps the whole run: each
    /// command's budget is clamped to the time remaining, and a command
    /// reached after the deadline fails as a scenario timeout.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] naming the first failing command; later
    /// commands do not run.
    pub fn run(
        &self,
        driver: &mut dyn PageDriver,
        config: &EngineConfig,
        deadline: Option<Instant>,
    ) -> Result<(), QueueError> {
        for queued in &self.commands {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(QueueError {
                        sequence: queued.sequence,
                        command: queued.command.describe(),
                        source: ManejarError::ScenarioTimeout {
                            in_flight: queued.command.describe(),
                        },
                    });
                }
            }
            tracing::debug!(
                sequence = queued.sequence,
                command = %queued.command.describe(),
                "executing command"
            );
            Self::execute(driver, config, deadline, &queued.command).map_err(|source| {
                QueueError {
                    sequence: queued.sequence,
                    command: queued.command.describe(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn budget(config: &EngineConfig, deadline: Option<Instant>) -> RetryConfig {
        match deadline {
            Some(deadline) => config.retry.clamped_to(deadline),
            None => config.retry,
        }
    }

    fn execute(
        driver: &mut dyn PageDriver,
        config: &EngineConfig,
        deadline: Option<Instant>,
        command: &Command,
    ) -> ManejarResult<()> {
        match command {
            Command::Visit { path } => driver.navigate(&config.resolve(path)),
            Command::Type { target, text } => {
                resolve_interactable(driver, &target.selector, Self::budget(config, deadline))?;
                driver.type_text(&target.selector, text)
            }
            Command::Select { target, value } => {
                resolve_interactable(driver, &target.selector, Self::budget(config, deadline))?;
                driver.select_value(&target.selector, value)
            }
            Command::SetChecked { target, checked } => {
                resolve_interactable(driver, &target.selector, Self::budget(config, deadline))?;
                driver.set_checked(&target.selector, *checked)
            }
            Command::Click { target } => {
                resolve_interactable(driver, &target.selector, Self::budget(config, deadline))?;
                driver.click(&target.selector)
            }
            Command::Assert { expectation, retry } => {
                let mut budget = (*retry).unwrap_or(config.retry);
                if let Some(deadline) = deadline {
                    budget = budget.clamped_to(deadline);
                }
                RetryAssertion::new(|| expectation.evaluate(&mut *driver))
                    .with_description(expectation.describe())
                    .with_config(budget)
                    .verify()
                    .map(|_| ())
                    .map_err(|err| ManejarError::AssertionFailed {
                        description: err.description,
                        last_observed: err.last_observed,
                        elapsed_ms: err.elapsed.as_millis() as u64,
                        timeout_ms: err.timeout.as_millis() as u64,
                    })
            }
            Command::Pause { duration } => {
                let sleep = match deadline {
                    Some(deadline) => {
                        (*duration).min(deadline.saturating_duration_since(Instant::now()))
                    }
                    None => *duration,
                };
                std::thread::sleep(sleep);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Document, Element, MockPage};
    use crate::selector::Selector;

    fn engine_config() -> EngineConfig {
        EngineConfig::new()
            .with_base_url("/")
            .with_retry(RetryConfig::fast())
    }

    fn form_page() -> MockPage {
        let mut page = MockPage::new();
        page.add_page(
            "/asset-correlations",
            Document::new()
                .with(Element::text_input("symbols"))
                .with(Element::select_box("timePeriod", &["1", "2", "4"]).with_value("2"))
                .with(Element::checkbox("includeDividends"))
                .with(Element::button("submitButton", "Analyze")),
        );
        page
    }

    mod construction {
        use super::*;

        #[test]
        fn test_type_into_select_rejected_before_any_page_work() {
            let err = Command::type_text(Target::select_box("timePeriod"), "1").unwrap_err();
            assert!(matches!(err, ManejarError::InvalidCommand { .. }));
        }

        #[test]
        fn test_select_on_text_input_rejected() {
            let err = Command::select(Target::text_input("symbols"), "2").unwrap_err();
            assert!(matches!(err, ManejarError::InvalidCommand { .. }));
        }

        #[test]
        fn test_click_on_region_rejected() {
            let err = Command::click(Target::region(Selector::id("panel"))).unwrap_err();
            assert!(matches!(err, ManejarError::InvalidCommand { .. }));
        }

        #[test]
        fn test_click_accepts_checkbox() {
            assert!(Command::click(Target::checkbox("includeDividends")).is_ok());
        }

        #[test]
        fn test_describe_names_the_operation() {
            let command =
                Command::select(Target::select_box("timePeriod"), "1").unwrap();
            assert_eq!(
                command.describe(),
                "select '1' on #timePeriod (select box)"
            );
        }
    }

    mod queue {
        use super::*;

        #[test]
        fn test_sequence_numbers_follow_enqueue_order() {
            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/asset-correlations"))
                .enqueue(Command::type_text(Target::text_input("symbols"), "VTI").unwrap());
            let sequences: Vec<u64> =
                queue.commands().iter().map(|c| c.sequence).collect();
            assert_eq!(sequences, vec![1, 2]);
        }

        #[test]
        fn test_enqueue_performs_no_page_work() {
            let mut queue = CommandQueue::new();
            // No page is registered; enqueueing against it must still succeed
            queue.enqueue(Command::visit("/nowhere"));
            assert_eq!(queue.len(), 1);
        }

        #[test]
        fn test_run_executes_in_order() {
            let mut page = form_page();
            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/asset-correlations"))
                .enqueue(Command::type_text(Target::text_input("symbols"), "VTI").unwrap())
                .enqueue(
                    Command::type_text(Target::text_input("symbols"), "VTI, BND").unwrap(),
                );
            queue.run(&mut page, &engine_config(), None).unwrap();

            // Later writes win: the queue ran front to back
            let handle = page.query_one(&Selector::id("symbols")).unwrap();
            assert_eq!(handle.value, "VTI, BND");
        }

        #[test]
        fn test_first_failure_aborts_remainder() {
            let mut page = form_page();
            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/asset-correlations"))
                .enqueue(Command::select(Target::select_box("timePeriod"), "99").unwrap())
                .enqueue(Command::type_text(Target::text_input("symbols"), "VTI").unwrap());

            let err = queue.run(&mut page, &engine_config(), None).unwrap_err();
            assert_eq!(err.sequence, 2);

            // The command after the failure never ran
            let handle = page.query_one(&Selector::id("symbols")).unwrap();
            assert_eq!(handle.value, "");
        }

        #[test]
        fn test_action_auto_waits_for_interactable() {
            let mut page = form_page();
            page.add_page(
                "/delayed",
                Document::new().with(Element::text_input("late").hidden()),
            );
            page.schedule("/delayed", Duration::from_millis(30), |doc| {
                doc.set_visible("late", true);
            });

            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/delayed"))
                .enqueue(Command::type_text(Target::text_input("late"), "value").unwrap());
            queue.run(&mut page, &engine_config(), None).unwrap();

            let handle = page.query_one(&Selector::id("late")).unwrap();
            assert_eq!(handle.value, "value");
        }

        #[test]
        fn test_assertion_failure_carries_diagnostics() {
            let mut page = form_page();
            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/asset-correlations"))
                .enqueue(Command::assert(Expectation::Exists(Selector::id(
                    "analysisResults",
                ))));

            let err = queue.run(&mut page, &engine_config(), None).unwrap_err();
            match err.source {
                ManejarError::AssertionFailed {
                    ref description,
                    ref last_observed,
                    ..
                } => {
                    assert!(description.contains("#analysisResults"));
                    assert!(last_observed.contains("#analysisResults"));
                }
                ref other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_per_assertion_budget_override() {
            let mut page = form_page();
            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/asset-correlations"))
                .enqueue(Command::assert_within(
                    Expectation::Exists(Selector::id("missing")),
                    RetryConfig::new(Duration::from_millis(50))
                        .with_poll_interval(Duration::from_millis(10)),
                ));

            let started = Instant::now();
            let err = queue.run(&mut page, &engine_config(), None).unwrap_err();
            assert!(started.elapsed() < Duration::from_millis(400));
            assert!(matches!(err.source, ManejarError::AssertionFailed { .. }));
        }

        #[test]
        fn test_deadline_times_out_pending_commands() {
            let mut page = form_page();
            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/asset-correlations"))
                .enqueue(Command::pause(Duration::from_millis(60)))
                .enqueue(Command::assert(Expectation::Exists(Selector::id("symbols"))));

            let deadline = Instant::now() + Duration::from_millis(40);
            let err = queue
                .run(&mut page, &engine_config(), Some(deadline))
                .unwrap_err();
            assert!(matches!(err.source, ManejarError::ScenarioTimeout { .. }));
            assert_eq!(err.sequence, 3);
        }

        #[test]
        fn test_click_submits_and_navigates() {
            let mut page = form_page();
            page.on_click("/asset-correlations", Selector::id("submitButton"), |doc, _| {
                doc.add(Element::region("analysisResults").with_text("matrix"));
                Some("/asset-correlations#analysisResults".to_string())
            });

            let mut queue = CommandQueue::new();
            queue
                .enqueue(Command::visit("/asset-correlations"))
                .enqueue(Command::click(Target::button("submitButton")).unwrap())
                .enqueue(Command::assert(Expectation::UrlContains {
                    needle: "#analysisResults".to_string(),
                }));
            queue.run(&mut page, &engine_config(), None).unwrap();
        }
    }
}
