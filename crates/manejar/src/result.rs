//! Result and error types for Manejar.

use thiserror::Error;

/// Result type for Manejar operations
pub type ManejarResult<T> = Result<T, ManejarError>;

/// Errors that can occur while driving a page or evaluating assertions
#[derive(Debug, Error)]
pub enum ManejarError {
    /// Selector matched no element within the retry budget
    #[error("no element matched '{selector}' after {elapsed_ms}ms")]
    Resolution {
        /// Selector that never resolved
        selector: String,
        /// Time spent polling in milliseconds
        elapsed_ms: u64,
    },

    /// Element resolved but the predicate never became true within budget
    #[error("assertion '{description}' failed after {elapsed_ms}ms (budget {timeout_ms}ms); last observed: {last_observed}")]
    AssertionFailed {
        /// Human-readable description of the expectation
        description: String,
        /// Last state observed before the deadline
        last_observed: String,
        /// Time spent polling in milliseconds
        elapsed_ms: u64,
        /// Configured timeout budget in milliseconds
        timeout_ms: u64,
    },

    /// An action command could not be performed
    #[error("command #{sequence} failed: {detail}")]
    CommandFailed {
        /// Sequence number of the failing command
        sequence: u64,
        /// What went wrong
        detail: String,
    },

    /// Element resolved but cannot receive the requested interaction
    #[error("element '{selector}' is not interactable: {reason}")]
    NotInteractable {
        /// Selector of the offending element
        selector: String,
        /// Why the interaction was refused
        reason: String,
    },

    /// Session setup routine did not reach its success indicator
    #[error("session setup for '{identifier}' failed: {message}")]
    SetupFailed {
        /// Session identifier being created
        identifier: String,
        /// Error message
        message: String,
    },

    /// Navigation did not land on a known page
    #[error("navigation to {url} failed: {message}")]
    NavigationFailed {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Scenario-level timeout budget exhausted mid-queue
    #[error("scenario timed out while {in_flight} was in flight")]
    ScenarioTimeout {
        /// Description of the command that was executing
        in_flight: String,
    },

    /// Command rejected at construction (invalid target/command pairing)
    #[error("invalid command: {message}")]
    InvalidCommand {
        /// Error message
        message: String,
    },

    /// Operation called in the wrong state
    #[error("invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
