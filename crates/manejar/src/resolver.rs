//! Fresh selector resolution against the live page.
//!
//! Resolution never caches: every call walks the page as it exists right
//! now, so a re-render between polls is observed rather than raced.
//! Compound [`Selector::Within`] chains are decomposed here, ancestor first,
//! so drivers only ever answer simple scoped queries.

use crate::assertion::retry::{PollOutcome, RetryAssertion, RetryConfig};
use crate::driver::{ElementHandle, PageDriver};
use crate::result::{ManejarError, ManejarResult};
use crate::selector::Selector;

/// Resolve a selector to at most one element, freshly.
///
/// Returns `None` when no match exists right now; callers that want to wait
/// use [`resolve_with_retry`].
pub fn resolve(driver: &mut dyn PageDriver, selector: &Selector) -> Option<ElementHandle> {
    match selector {
        Selector::Within {
            ancestor,
            descendant,
        } => {
            let scope = resolve(driver, ancestor)?;
            resolve_scoped(driver, &scope, descendant)
        }
        _ => driver.query_one(selector),
    }
}

fn resolve_scoped(
    driver: &mut dyn PageDriver,
    scope: &ElementHandle,
    selector: &Selector,
) -> Option<ElementHandle> {
    match selector {
        Selector::Within {
            ancestor,
            descendant,
        } => {
            let inner = resolve_scoped(driver, scope, ancestor)?;
            resolve_scoped(driver, &inner, descendant)
        }
        _ => driver.query_scoped(scope, selector),
    }
}

/// Resolve a selector, polling until an element appears or the budget is
/// exhausted.
///
/// # Errors
///
/// Returns [`ManejarError::Resolution`] naming the selector when nothing
/// matched within the budget.
pub fn resolve_with_retry(
    driver: &mut dyn PageDriver,
    selector: &Selector,
    config: RetryConfig,
) -> ManejarResult<ElementHandle> {
    let mut found = None;
    let outcome = RetryAssertion::new(|| {
        if let Some(handle) = resolve(&mut *driver, selector) {
            found = Some(handle);
            PollOutcome::Pass
        } else {
            PollOutcome::fail("no element matched")
        }
    })
    .with_config(config)
    .verify();

    match outcome {
        Ok(_) => found.ok_or_else(|| ManejarError::InvalidState {
            message: format!("resolution of '{selector}' passed without a handle"),
        }),
        Err(err) => Err(ManejarError::Resolution {
            selector: selector.to_string(),
            elapsed_ms: err.elapsed.as_millis() as u64,
        }),
    }
}

/// Resolve a selector and wait until the element is visible and enabled.
///
/// This is the auto-wait in front of every interaction: an element that is
/// still hidden or disabled when the budget runs out refuses the action.
///
/// # Errors
///
/// Returns [`ManejarError::Resolution`] when nothing matched at all, or
/// [`ManejarError::NotInteractable`] when an element was present but never
/// became interactable.
pub fn resolve_interactable(
    driver: &mut dyn PageDriver,
    selector: &Selector,
    config: RetryConfig,
) -> ManejarResult<ElementHandle> {
    let mut found = None;
    let mut last_seen = None;
    let outcome = RetryAssertion::new(|| match resolve(&mut *driver, selector) {
        Some(handle) if handle.is_interactable() => {
            found = Some(handle);
            PollOutcome::Pass
        }
        Some(handle) => {
            let observed = if handle.visible {
                "element is disabled"
            } else {
                "element is hidden"
            };
            last_seen = Some(handle);
            PollOutcome::fail(observed)
        }
        None => PollOutcome::fail("no element matched"),
    })
    .with_config(config)
    .verify();

    match outcome {
        Ok(_) => found.ok_or_else(|| ManejarError::InvalidState {
            message: format!("resolution of '{selector}' passed without a handle"),
        }),
        Err(err) => match last_seen {
            Some(_) => Err(ManejarError::NotInteractable {
                selector: selector.to_string(),
                reason: err.last_observed,
            }),
            None => Err(ManejarError::Resolution {
                selector: selector.to_string(),
                elapsed_ms: err.elapsed.as_millis() as u64,
            }),
        },
    }
}
