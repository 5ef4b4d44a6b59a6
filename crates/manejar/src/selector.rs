//! Typed selector abstraction for locating form controls.
//!
//! Selectors are declarative: they name an element, they never hold one.
//! Resolution happens fresh at the moment of use (see [`crate::resolver`]),
//! because the page mutates asynchronously underneath the test.

use std::fmt;

/// The role a target element is expected to play.
///
/// Commands are tagged with the control kind they drive so that an invalid
/// command/target pairing (e.g. selecting an option on a text input) is
/// rejected when the command is built, not when the DOM interaction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ControlKind {
    /// Free-text input (`<input type="text">`, `<textarea>`)
    TextInput,
    /// Dropdown with a fixed option list (`<select>`)
    SelectBox,
    /// Checkbox (`<input type="checkbox">`)
    Checkbox,
    /// Clickable button or submit control
    Button,
    /// Hyperlink
    Link,
    /// Non-interactive container (error regions, result panels)
    Region,
}

impl ControlKind {
    /// Whether this kind accepts typed text
    #[must_use]
    pub const fn accepts_text(self) -> bool {
        matches!(self, Self::TextInput)
    }

    /// Whether this kind accepts option selection
    #[must_use]
    pub const fn accepts_select(self) -> bool {
        matches!(self, Self::SelectBox)
    }

    /// Whether this kind accepts check/uncheck
    #[must_use]
    pub const fn accepts_check(self) -> bool {
        matches!(self, Self::Checkbox)
    }

    /// Whether this kind accepts a click
    #[must_use]
    pub const fn accepts_click(self) -> bool {
        matches!(self, Self::Button | Self::Link | Self::Checkbox)
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TextInput => "text input",
            Self::SelectBox => "select box",
            Self::Checkbox => "checkbox",
            Self::Button => "button",
            Self::Link => "link",
            Self::Region => "region",
        };
        f.write_str(name)
    }
}

/// Selector for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Element id (`#startDate`)
    Id(String),
    /// Simplified CSS selector: `#id`, `.class`, or a bare tag name
    Css(String),
    /// First element whose text content contains the given string
    Text(String),
    /// Descendant-of chain: resolve the ancestor first, then scope the
    /// descendant lookup beneath it
    Within {
        /// Ancestor selector, resolved first
        ancestor: Box<Selector>,
        /// Descendant selector, looked up inside the ancestor
        descendant: Box<Selector>,
    },
}

impl Selector {
    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text-content selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Scope a descendant lookup beneath this selector
    #[must_use]
    pub fn within(self, descendant: Selector) -> Self {
        Self::Within {
            ancestor: Box::new(self),
            descendant: Box::new(descendant),
        }
    }

    /// Depth of the descendant chain (1 for simple selectors)
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Within { descendant, .. } => 1 + descendant.depth(),
            _ => 1,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Css(css) => f.write_str(css),
            Self::Text(text) => write!(f, "text={text}"),
            Self::Within {
                ancestor,
                descendant,
            } => write!(f, "{ancestor} >> {descendant}"),
        }
    }
}

/// A selector paired with the control kind the caller expects it to resolve to.
///
/// The kind is a construction-time contract; the driver re-checks the live
/// element at interaction time and refuses mismatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// How to find the element
    pub selector: Selector,
    /// What the element must be
    pub kind: ControlKind,
}

impl Target {
    /// Target a text input by element id
    #[must_use]
    pub fn text_input(id: impl Into<String>) -> Self {
        Self {
            selector: Selector::id(id),
            kind: ControlKind::TextInput,
        }
    }

    /// Target a select box by element id
    #[must_use]
    pub fn select_box(id: impl Into<String>) -> Self {
        Self {
            selector: Selector::id(id),
            kind: ControlKind::SelectBox,
        }
    }

    /// Target a checkbox by element id
    #[must_use]
    pub fn checkbox(id: impl Into<String>) -> Self {
        Self {
            selector: Selector::id(id),
            kind: ControlKind::Checkbox,
        }
    }

    /// Target a button by element id
    #[must_use]
    pub fn button(id: impl Into<String>) -> Self {
        Self {
            selector: Selector::id(id),
            kind: ControlKind::Button,
        }
    }

    /// Target a link by its visible text
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self {
            selector: Selector::text(text),
            kind: ControlKind::Link,
        }
    }

    /// Target a non-interactive region by arbitrary selector
    #[must_use]
    pub fn region(selector: Selector) -> Self {
        Self {
            selector,
            kind: ControlKind::Region,
        }
    }

    /// Target an arbitrary selector with an explicit kind
    #[must_use]
    pub fn new(selector: Selector, kind: ControlKind) -> Self {
        Self { selector, kind }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.selector, self.kind)
    }
}
