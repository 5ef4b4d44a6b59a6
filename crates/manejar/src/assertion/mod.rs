//! Declarative assertions over the live page.
//!
//! An [`Expectation`] names a condition; each evaluation is a single fresh
//! read of the page producing a [`PollOutcome`]. The retry loop in
//! [`retry`] drives evaluations until the condition holds or the budget is
//! exhausted, and [`soft`] collects non-aborting failures.

pub mod retry;
pub mod soft;

pub use retry::{PollOutcome, RetryAssertion, RetryConfig, RetryError, RetryPass};
pub use soft::SoftAssertions;

use regex::Regex;

use crate::driver::PageDriver;
use crate::resolver::resolve;
use crate::result::{ManejarError, ManejarResult};
use crate::selector::Selector;

/// Cap observed state in failure diagnostics; page text can be arbitrarily long
fn excerpt(text: &str) -> String {
    const MAX: usize = 120;
    if text.is_empty() {
        return "<empty>".to_string();
    }
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut cut = MAX;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

/// A condition over the live page, evaluated freshly on every poll
#[derive(Debug, Clone)]
pub enum Expectation {
    /// An element matching the selector exists
    Exists(Selector),
    /// No element matches the selector
    Absent(Selector),
    /// The element exists and is rendered visible
    Visible(Selector),
    /// The element exists and is not rendered visible
    Hidden(Selector),
    /// The element's text content contains a substring
    TextContains {
        /// Element to read
        selector: Selector,
        /// Substring that must appear
        needle: String,
    },
    /// The element's text content matches a regular expression
    TextMatches {
        /// Element to read
        selector: Selector,
        /// Compiled pattern
        pattern: Regex,
    },
    /// The element's current value equals a string exactly
    ValueIs {
        /// Element to read
        selector: Selector,
        /// Expected value
        expected: String,
    },
    /// The checkbox is in the given state
    Checked {
        /// Element to read
        selector: Selector,
        /// Expected checked state
        expected: bool,
    },
    /// The full visible page text matches a regular expression
    PageTextMatches {
        /// Compiled pattern
        pattern: Regex,
    },
    /// The current URL contains a substring (fragments included)
    UrlContains {
        /// Substring that must appear
        needle: String,
    },
    /// The current URL equals a string exactly
    UrlIs {
        /// Expected URL
        expected: String,
    },
}

impl Expectation {
    /// Expect the element's text to match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::InvalidCommand`] when the pattern does not
    /// compile.
    pub fn text_matches(selector: Selector, pattern: &str) -> ManejarResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| ManejarError::InvalidCommand {
            message: format!("invalid pattern '{pattern}': {e}"),
        })?;
        Ok(Self::TextMatches { selector, pattern })
    }

    /// Expect the visible page text to match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::InvalidCommand`] when the pattern does not
    /// compile.
    pub fn page_text_matches(pattern: &str) -> ManejarResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| ManejarError::InvalidCommand {
            message: format!("invalid pattern '{pattern}': {e}"),
        })?;
        Ok(Self::PageTextMatches { pattern })
    }

    /// Human-readable description used in logs and failure reports
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Exists(selector) => format!("element '{selector}' exists"),
            Self::Absent(selector) => format!("no element matches '{selector}'"),
            Self::Visible(selector) => format!("element '{selector}' is visible"),
            Self::Hidden(selector) => format!("element '{selector}' is hidden"),
            Self::TextContains { selector, needle } => {
                format!("text of '{selector}' contains '{needle}'")
            }
            Self::TextMatches { selector, pattern } => {
                format!("text of '{selector}' matches /{pattern}/")
            }
            Self::ValueIs { selector, expected } => {
                format!("value of '{selector}' is '{expected}'")
            }
            Self::Checked { selector, expected } => {
                if *expected {
                    format!("'{selector}' is checked")
                } else {
                    format!("'{selector}' is unchecked")
                }
            }
            Self::PageTextMatches { pattern } => format!("page text matches /{pattern}/"),
            Self::UrlContains { needle } => format!("url contains '{needle}'"),
            Self::UrlIs { expected } => format!("url is '{expected}'"),
        }
    }

    /// Evaluate the condition against the page as it exists right now.
    ///
    /// One call is one fresh read; no state carries over between polls.
    pub fn evaluate(&self, driver: &mut dyn PageDriver) -> PollOutcome {
        match self {
            Self::Exists(selector) => match resolve(driver, selector) {
                Some(_) => PollOutcome::Pass,
                None => PollOutcome::fail(format!("no element matched '{selector}'")),
            },
            Self::Absent(selector) => match resolve(driver, selector) {
                None => PollOutcome::Pass,
                Some(_) => PollOutcome::fail(format!("element '{selector}' is still present")),
            },
            Self::Visible(selector) => match resolve(driver, selector) {
                Some(handle) if handle.visible => PollOutcome::Pass,
                Some(_) => PollOutcome::fail("element is hidden"),
                None => PollOutcome::fail(format!("no element matched '{selector}'")),
            },
            Self::Hidden(selector) => match resolve(driver, selector) {
                Some(handle) if !handle.visible => PollOutcome::Pass,
                Some(_) => PollOutcome::fail("element is visible"),
                None => PollOutcome::fail(format!("no element matched '{selector}'")),
            },
            Self::TextContains { selector, needle } => match resolve(driver, selector) {
                Some(handle) if handle.text.contains(needle.as_str()) => PollOutcome::Pass,
                Some(handle) => {
                    PollOutcome::fail(format!("text was '{}'", excerpt(&handle.text)))
                }
                None => PollOutcome::fail(format!("no element matched '{selector}'")),
            },
            Self::TextMatches { selector, pattern } => match resolve(driver, selector) {
                Some(handle) if pattern.is_match(&handle.text) => PollOutcome::Pass,
                Some(handle) => {
                    PollOutcome::fail(format!("text was '{}'", excerpt(&handle.text)))
                }
                None => PollOutcome::fail(format!("no element matched '{selector}'")),
            },
            Self::ValueIs { selector, expected } => match resolve(driver, selector) {
                Some(handle) if handle.value == *expected => PollOutcome::Pass,
                Some(handle) => {
                    PollOutcome::fail(format!("value was '{}'", excerpt(&handle.value)))
                }
                None => PollOutcome::fail(format!("no element matched '{selector}'")),
            },
            Self::Checked { selector, expected } => match resolve(driver, selector) {
                Some(handle) if handle.checked == *expected => PollOutcome::Pass,
                Some(handle) => PollOutcome::fail(if handle.checked {
                    "checkbox is checked"
                } else {
                    "checkbox is unchecked"
                }),
                None => PollOutcome::fail(format!("no element matched '{selector}'")),
            },
            Self::PageTextMatches { pattern } => {
                let text = driver.page_text();
                if pattern.is_match(&text) {
                    PollOutcome::Pass
                } else {
                    PollOutcome::fail(format!("page text was '{}'", excerpt(&text)))
                }
            }
            Self::UrlContains { needle } => {
                let url = driver.current_url();
                if url.contains(needle.as_str()) {
                    PollOutcome::Pass
                } else {
                    PollOutcome::fail(format!("url was '{url}'"))
                }
            }
            Self::UrlIs { expected } => {
                let url = driver.current_url();
                if url == *expected {
                    PollOutcome::Pass
                } else {
                    PollOutcome::fail(format!("url was '{url}'"))
                }
            }
        }
    }
}
