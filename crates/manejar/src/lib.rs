//! Manejar: Declarative, Retrying Form Driving for Web E2E Suites
//!
//! Manejar (Spanish: "to drive/handle") drives form-heavy web pages through
//! a deferred command queue and verifies them with assertions that retry
//! until a timeout instead of failing on the first false read. Pages that
//! re-render asynchronously after every input are the target: the engine
//! never trusts a single snapshot of the DOM.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     MANEJAR Architecture                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │ Scenario │──►│ Command   │──►│ Resolver │──►│ Page     │  │
//! │  │ Runner   │   │ Queue     │   │ + Retry  │   │ Driver   │  │
//! │  └──────────┘   └───────────┘   └──────────┘   └──────────┘  │
//! │       │               │                                      │
//! │  ┌──────────┐   ┌───────────┐                                │
//! │  │ Session  │   │ Suite     │                                │
//! │  │ Cache    │   │ Report    │                                │
//! │  └──────────┘   └───────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod assertion;
#[allow(clippy::must_use_candidate, clippy::missing_const_for_fn)]
pub mod command;
pub mod config;
#[allow(clippy::must_use_candidate, clippy::missing_const_for_fn)]
pub mod driver;
pub mod reporter;
pub mod resolver;
pub mod result;
pub mod scenario;
pub mod selector;
pub mod session;

pub use assertion::{
    Expectation, PollOutcome, RetryAssertion, RetryConfig, RetryError, RetryPass,
    SoftAssertions,
};
pub use command::{Command, CommandQueue, QueueError, QueuedCommand};
pub use config::{Credentials, EngineConfig};
pub use driver::{Document, Element, ElementHandle, MockPage, PageDriver};
pub use reporter::SuiteReport;
pub use resolver::{resolve, resolve_interactable, resolve_with_retry};
pub use result::{ManejarError, ManejarResult};
pub use scenario::{
    FailureDetail, Scenario, ScenarioResult, ScenarioState, Suite, SuiteRunner,
};
pub use selector::{ControlKind, Selector, Target};
pub use session::{Cookie, Session, SessionCache, StorageState};

/// Common imports for writing suites
pub mod prelude {
    pub use super::assertion::soft::*;
    pub use super::assertion::*;
    pub use super::command::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::reporter::*;
    pub use super::resolver::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::selector::*;
    pub use super::session::*;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn engine_config() -> EngineConfig {
        EngineConfig::new()
            .with_base_url("/")
            .with_retry(
                RetryConfig::new(Duration::from_millis(400))
                    .with_poll_interval(Duration::from_millis(20)),
            )
            .with_scenario_timeout(Duration::from_secs(3))
    }

    /// Correlation request form: symbols input, period select, a months
    /// select shown for monthly/annual periods and a trading-days select
    /// shown for daily, plus a submit button.
    fn correlation_form() -> Document {
        Document::new()
            .with(Element::text_input("symbols"))
            .with(Element::select_box("timePeriod", &["1", "2", "4"]).with_value("2"))
            .with(
                Element::select_box("months", &["12", "24", "36", "48", "60"])
                    .with_value("36"),
            )
            .with(Element::select_box("tradingDays", &["60", "120"]).hidden())
            .with(Element::button("submitButton", "Analyze"))
    }

    fn wire_period_toggle(page: &mut MockPage) {
        page.on_change("/asset-correlations", Selector::id("timePeriod"), |doc, value| {
            let daily = value == "1";
            doc.set_visible("tradingDays", daily);
            doc.set_visible("months", !daily);
        });
    }

    mod validation_flow {
        use super::*;

        #[test]
        fn test_empty_submit_surfaces_required_error() {
            super::init_tracing();
            let mut page = MockPage::new();
            page.add_page("/asset-correlations", correlation_form());
            page.on_click(
                "/asset-correlations",
                Selector::id("submitButton"),
                |doc, _| {
                    let filled = doc.value_of("symbols").is_some_and(|v| !v.is_empty());
                    if !filled {
                        doc.add(
                            Element::region("errorRegion")
                                .with_text("Symbols is a required field"),
                        );
                    }
                    None
                },
            );

            let mut suite = Suite::new("asset correlation").with_scenario(
                Scenario::new("flags missing symbols")
                    .with_command(Command::visit("/asset-correlations"))
                    .with_command(Command::click(Target::button("submitButton")).unwrap())
                    .with_command(Command::assert(
                        Expectation::page_text_matches(r"(?i)(error|invalid|required)")
                            .unwrap(),
                    ))
                    .with_command(Command::assert(Expectation::TextContains {
                        selector: Selector::id("errorRegion"),
                        needle: "required".to_string(),
                    }))
                    // Rejected submits stay on the form
                    .with_command(Command::assert(Expectation::UrlIs {
                        expected: "/asset-correlations".to_string(),
                    })),
            );

            let report = SuiteRunner::new(engine_config()).run(&mut suite, &mut page);
            assert!(report.all_passed(), "{}", report.render_console());
        }
    }

    mod visibility_flow {
        use super::*;

        #[test]
        fn test_period_select_toggles_and_reverts_dependent_fields() {
            let mut page = MockPage::new();
            page.add_page("/asset-correlations", correlation_form());
            wire_period_toggle(&mut page);

            let mut suite = Suite::new("asset correlation").with_scenario(
                Scenario::new("daily period swaps months for trading days")
                    .with_command(Command::visit("/asset-correlations"))
                    .with_command(Command::assert(Expectation::Visible(Selector::id(
                        "months",
                    ))))
                    .with_command(
                        Command::select(Target::select_box("timePeriod"), "1").unwrap(),
                    )
                    .with_command(Command::assert(Expectation::Visible(Selector::id(
                        "tradingDays",
                    ))))
                    .with_command(Command::assert(Expectation::Hidden(Selector::id(
                        "months",
                    ))))
                    .with_command(
                        Command::select(Target::select_box("timePeriod"), "2").unwrap(),
                    )
                    .with_command(Command::assert(Expectation::Hidden(Selector::id(
                        "tradingDays",
                    ))))
                    .with_command(Command::assert(Expectation::Visible(Selector::id(
                        "months",
                    )))),
            );

            let report = SuiteRunner::new(engine_config()).run(&mut suite, &mut page);
            assert!(report.all_passed(), "{}", report.render_console());
        }
    }

    mod results_flow {
        use super::*;

        #[test]
        fn test_submit_lands_on_results_fragment_after_delay() {
            let mut page = MockPage::new();
            page.add_page("/asset-correlations", correlation_form());
            page.on_click(
                "/asset-correlations",
                Selector::id("submitButton"),
                |_, _| Some("/asset-correlations#analysisResults".to_string()),
            );
            // Results render a moment after the navigation settles
            page.schedule(
                "/asset-correlations",
                Duration::from_millis(80),
                |doc| {
                    doc.add(
                        Element::region("analysisResults")
                            .with_text("Correlation matrix for 3 assets"),
                    );
                },
            );

            let mut suite = Suite::new("asset correlation").with_scenario(
                Scenario::new("shows the correlation matrix")
                    .with_command(Command::visit("/asset-correlations"))
                    .with_command(
                        Command::type_text(Target::text_input("symbols"), "VTI, BND, VXUS")
                            .unwrap(),
                    )
                    .with_command(Command::click(Target::button("submitButton")).unwrap())
                    .with_command(Command::assert(Expectation::UrlContains {
                        needle: "#analysisResults".to_string(),
                    }))
                    .with_command(Command::assert(
                        Expectation::text_matches(
                            Selector::id("analysisResults"),
                            r"matrix for \d+ assets",
                        )
                        .unwrap(),
                    ))
                    .with_command(Command::assert(Expectation::Absent(Selector::id(
                        "errorRegion",
                    )))),
            );

            let report = SuiteRunner::new(engine_config()).run(&mut suite, &mut page);
            assert!(report.all_passed(), "{}", report.render_console());
        }
    }

    mod failure_diagnostics {
        use super::*;

        #[test]
        fn test_typoed_selector_fails_near_timeout_naming_the_selector() {
            let mut page = MockPage::new();
            page.add_page("/asset-correlations", correlation_form());

            let budget = Duration::from_millis(200);
            let mut suite = Suite::new("asset correlation").with_scenario(
                Scenario::new("waits for a control that never existed")
                    .with_command(Command::visit("/asset-correlations"))
                    .with_command(Command::assert_within(
                        Expectation::Exists(Selector::id("symbolz")),
                        RetryConfig::new(budget)
                            .with_poll_interval(Duration::from_millis(25)),
                    )),
            );

            let started = Instant::now();
            let report = SuiteRunner::new(engine_config()).run(&mut suite, &mut page);
            let elapsed = started.elapsed();

            let result = &report.results()[0];
            assert!(result.failed());
            // The failure waits out the full budget, then names the selector
            assert!(elapsed >= budget);
            assert!(elapsed < budget + Duration::from_millis(300));
            let failure = result.failure.as_ref().unwrap();
            assert!(failure.reason.contains("#symbolz"), "{}", failure.reason);
        }
    }

    mod queue_ordering {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_sequence_numbers_are_dense_and_ordered(
                paths in prop::collection::vec("[a-z]{1,12}", 1..40)
            ) {
                let mut queue = CommandQueue::new();
                for path in &paths {
                    queue.enqueue(Command::visit(format!("/{path}")));
                }

                let commands = queue.commands();
                prop_assert_eq!(commands.len(), paths.len());
                for (index, queued) in commands.iter().enumerate() {
                    prop_assert_eq!(queued.sequence, index as u64 + 1);
                    match &queued.command {
                        Command::Visit { path } => {
                            prop_assert_eq!(path, &format!("/{}", paths[index]));
                        }
                        other => prop_assert!(false, "unexpected command: {:?}", other),
                    }
                }
            }
        }
    }
}
