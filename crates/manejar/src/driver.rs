//! Page driver boundary and the scripted mock page.
//!
//! The driver trait is the seam to the (external) application under test:
//! the engine issues navigation and form interactions and observes URLs and
//! rendered state through it, without knowing anything about the page's
//! implementation. `MockPage` is the reference implementation: a scripted
//! in-memory page with time-delayed mutations (standing in for AJAX
//! re-renders), click handlers (standing in for submit-side validation and
//! navigation), and select-driven visibility toggling.

use std::collections::HashMap;
use std::time::Instant;

use crate::result::{ManejarError, ManejarResult};
use crate::selector::{ControlKind, Selector};
use crate::session::StorageState;

/// A transient reference to a live page element.
///
/// Handles are snapshots: created at evaluation time, discarded after the
/// command or assertion poll that used them. They are never cached across
/// commands; the `epoch` field records which navigation generation produced
/// the handle, and a handle from an earlier epoch must be re-acquired, not
/// reused.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    /// Selector used to obtain the handle
    pub selector: Selector,
    /// Opaque node reference, meaningful only to the driver that issued it
    pub node: u64,
    /// Element tag name
    pub tag_name: String,
    /// Control kind of the live element
    pub kind: ControlKind,
    /// Text content
    pub text: String,
    /// Current value (inputs, selects)
    pub value: String,
    /// Whether the element is rendered visible
    pub visible: bool,
    /// Checkbox state
    pub checked: bool,
    /// Whether the element refuses interaction
    pub disabled: bool,
    /// Navigation generation this handle was resolved under
    pub epoch: u64,
    /// When the handle was resolved
    pub resolved_at: Instant,
}

impl ElementHandle {
    /// Whether the element can receive an interaction right now
    #[must_use]
    pub const fn is_interactable(&self) -> bool {
        self.visible && !self.disabled
    }
}

/// Boundary to the page under test.
///
/// Every query is a fresh read of the live page; implementations must apply
/// any due asynchronous mutations before answering so that polling observes
/// the page as it currently is.
pub trait PageDriver {
    /// Navigate to a URL. Bumps the handle epoch: all previously resolved
    /// handles are invalid afterwards.
    fn navigate(&mut self, url: &str) -> ManejarResult<()>;

    /// Current URL, including any fragment
    fn current_url(&self) -> String;

    /// Current navigation generation
    fn epoch(&self) -> u64;

    /// Resolve a selector to at most one element, freshly
    fn query_one(&mut self, selector: &Selector) -> Option<ElementHandle>;

    /// Resolve a selector scoped beneath a previously resolved ancestor.
    /// The scope handle must come from the current epoch.
    fn query_scoped(&mut self, scope: &ElementHandle, selector: &Selector)
        -> Option<ElementHandle>;

    /// Full visible text of the page
    fn page_text(&mut self) -> String;

    /// Click an element
    fn click(&mut self, selector: &Selector) -> ManejarResult<()>;

    /// Replace the value of a text input
    fn type_text(&mut self, selector: &Selector, text: &str) -> ManejarResult<()>;

    /// Choose an option on a select box
    fn select_value(&mut self, selector: &Selector, value: &str) -> ManejarResult<()>;

    /// Check or uncheck a checkbox
    fn set_checked(&mut self, selector: &Selector, checked: bool) -> ManejarResult<()>;

    /// Capture the current browser storage (cookies, local/session storage)
    fn storage_state(&self) -> StorageState;

    /// Apply a previously captured storage state to this context
    fn restore_storage(&mut self, state: &StorageState);

    /// Capture a screenshot artifact; returns a reference to it
    fn capture_screenshot(&mut self, label: &str) -> Option<String>;
}

/// Declarative element description for building mock documents
#[derive(Debug, Clone)]
pub struct Element {
    dom_id: Option<String>,
    tag: String,
    kind: ControlKind,
    classes: Vec<String>,
    text: String,
    value: String,
    visible: bool,
    checked: bool,
    disabled: bool,
    options: Vec<String>,
    parent: Option<String>,
}

impl Element {
    fn new(tag: &str, kind: ControlKind) -> Self {
        Self {
            dom_id: None,
            tag: tag.to_string(),
            kind,
            classes: Vec::new(),
            text: String::new(),
            value: String::new(),
            visible: true,
            checked: false,
            disabled: false,
            options: Vec::new(),
            parent: None,
        }
    }

    /// A text input with the given id
    #[must_use]
    pub fn text_input(id: &str) -> Self {
        Self::new("input", ControlKind::TextInput).with_id(id)
    }

    /// A select box with the given id and option values
    #[must_use]
    pub fn select_box(id: &str, options: &[&str]) -> Self {
        let mut element = Self::new("select", ControlKind::SelectBox).with_id(id);
        element.options = options.iter().map(|o| (*o).to_string()).collect();
        if let Some(first) = element.options.first() {
            element.value.clone_from(first);
        }
        element
    }

    /// A checkbox with the given id
    #[must_use]
    pub fn checkbox(id: &str) -> Self {
        Self::new("input", ControlKind::Checkbox).with_id(id)
    }

    /// A button with the given id and label
    #[must_use]
    pub fn button(id: &str, label: &str) -> Self {
        Self::new("button", ControlKind::Button)
            .with_id(id)
            .with_text(label)
    }

    /// A link with the given visible text
    #[must_use]
    pub fn link(text: &str) -> Self {
        Self::new("a", ControlKind::Link).with_text(text)
    }

    /// A non-interactive region with the given id
    #[must_use]
    pub fn region(id: &str) -> Self {
        Self::new("div", ControlKind::Region).with_id(id)
    }

    /// Set the element id
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.dom_id = Some(id.to_string());
        self
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Set the current value
    #[must_use]
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    /// Add a CSS class
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    /// Start hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Start disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Nest inside the element with the given id
    #[must_use]
    pub fn child_of(mut self, parent_id: &str) -> Self {
        self.parent = Some(parent_id.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: u64,
    element: Element,
}

/// In-memory document for one mock page
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    next_id: u64,
}

impl Document {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element, builder-style
    #[must_use]
    pub fn with(mut self, element: Element) -> Self {
        self.add(element);
        self
    }

    /// Add an element
    pub fn add(&mut self, element: Element) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.push(Node { id, element });
        id
    }

    /// Toggle visibility of the element with the given id
    pub fn set_visible(&mut self, dom_id: &str, visible: bool) {
        if let Some(node) = self.node_by_dom_id_mut(dom_id) {
            node.element.visible = visible;
        }
    }

    /// Replace the text content of the element with the given id
    pub fn set_text(&mut self, dom_id: &str, text: &str) {
        if let Some(node) = self.node_by_dom_id_mut(dom_id) {
            node.element.text = text.to_string();
        }
    }

    /// Replace the value of the element with the given id
    pub fn set_value(&mut self, dom_id: &str, value: &str) {
        if let Some(node) = self.node_by_dom_id_mut(dom_id) {
            node.element.value = value.to_string();
        }
    }

    /// Current value of the element with the given id
    #[must_use]
    pub fn value_of(&self, dom_id: &str) -> Option<String> {
        self.node_by_dom_id(dom_id)
            .map(|n| n.element.value.clone())
    }

    /// Checkbox state of the element with the given id
    #[must_use]
    pub fn checked_of(&self, dom_id: &str) -> Option<bool> {
        self.node_by_dom_id(dom_id).map(|n| n.element.checked)
    }

    /// Remove the element with the given id
    pub fn remove(&mut self, dom_id: &str) {
        self.nodes
            .retain(|n| n.element.dom_id.as_deref() != Some(dom_id));
    }

    fn node_by_dom_id(&self, dom_id: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.element.dom_id.as_deref() == Some(dom_id))
    }

    fn node_by_dom_id_mut(&mut self, dom_id: &str) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.element.dom_id.as_deref() == Some(dom_id))
    }

    fn matches(node: &Node, selector: &Selector) -> bool {
        match selector {
            Selector::Id(id) => node.element.dom_id.as_deref() == Some(id.as_str()),
            Selector::Css(css) => {
                if let Some(id) = css.strip_prefix('#') {
                    node.element.dom_id.as_deref() == Some(id)
                } else if let Some(class) = css.strip_prefix('.') {
                    node.element.classes.iter().any(|c| c == class)
                } else {
                    node.element.tag == *css
                }
            }
            Selector::Text(text) => node.element.text.contains(text.as_str()),
            Selector::Within { .. } => false,
        }
    }

    fn is_descendant_of(&self, node: &Node, ancestor: u64) -> bool {
        let mut parent_id = node.element.parent.clone();
        while let Some(pid) = parent_id {
            match self.node_by_dom_id(&pid) {
                Some(parent) if parent.id == ancestor => return true,
                Some(parent) => parent_id = parent.element.parent.clone(),
                None => return false,
            }
        }
        false
    }

    fn find(&self, selector: &Selector) -> Option<&Node> {
        match selector {
            Selector::Within {
                ancestor,
                descendant,
            } => {
                let scope = self.find(ancestor)?;
                let scope_id = scope.id;
                self.nodes
                    .iter()
                    .filter(|n| Self::matches(n, descendant))
                    .find(|n| self.is_descendant_of(n, scope_id))
            }
            _ => self.nodes.iter().find(|n| Self::matches(n, selector)),
        }
    }

    fn find_scoped(&self, scope: u64, selector: &Selector) -> Option<&Node> {
        self.nodes
            .iter()
            .filter(|n| Self::matches(n, selector))
            .find(|n| self.is_descendant_of(n, scope))
    }

    fn visible_text(&self) -> String {
        let mut parts = Vec::new();
        for node in &self.nodes {
            if !node.element.visible {
                continue;
            }
            if !node.element.text.is_empty() {
                parts.push(node.element.text.clone());
            }
            if !node.element.value.is_empty() {
                parts.push(node.element.value.clone());
            }
        }
        parts.join(" ")
    }
}

type ClickHandler = Box<dyn FnMut(&mut Document, &mut StorageState) -> Option<String>>;
type ChangeHandler = Box<dyn FnMut(&mut Document, &str)>;

struct Scheduled {
    url_key: String,
    due: Instant,
    edit: Box<dyn FnOnce(&mut Document)>,
}

/// Scripted in-memory page implementing [`PageDriver`].
///
/// Pages are registered up front; behaviors (submit validation, navigation,
/// select-driven visibility toggling) are scripted as click/change handlers,
/// and asynchronous re-renders are scripted as time-delayed mutations that
/// become observable on the next fresh read after they fall due.
#[derive(Default)]
pub struct MockPage {
    docs: HashMap<String, Document>,
    current_url: String,
    epoch: u64,
    storage: StorageState,
    click_handlers: HashMap<(String, String), ClickHandler>,
    change_handlers: HashMap<(String, String), ChangeHandler>,
    scheduled: Vec<Scheduled>,
    artifacts: Vec<String>,
}

impl std::fmt::Debug for MockPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPage")
            .field("current_url", &self.current_url)
            .field("epoch", &self.epoch)
            .field("pages", &self.docs.len())
            .field("pending_mutations", &self.scheduled.len())
            .finish()
    }
}

impl MockPage {
    /// Create an empty mock page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// URL fragments address positions within a page, not distinct pages
    fn url_key(url: &str) -> &str {
        url.split('#').next().unwrap_or(url)
    }

    /// Register a page document under a URL
    pub fn add_page(&mut self, url: &str, doc: Document) -> &mut Self {
        self.docs.insert(Self::url_key(url).to_string(), doc);
        self
    }

    /// Script a click behavior for a selector on a page.
    ///
    /// The handler may mutate the document and storage; returning a URL
    /// triggers a navigation (epoch bump) to it.
    pub fn on_click<F>(&mut self, url: &str, selector: Selector, handler: F) -> &mut Self
    where
        F: FnMut(&mut Document, &mut StorageState) -> Option<String> + 'static,
    {
        self.click_handlers.insert(
            (Self::url_key(url).to_string(), selector.to_string()),
            Box::new(handler),
        );
        self
    }

    /// Script a change behavior for a select box or checkbox on a page.
    /// The handler receives the newly committed value.
    pub fn on_change<F>(&mut self, url: &str, selector: Selector, handler: F) -> &mut Self
    where
        F: FnMut(&mut Document, &str) + 'static,
    {
        self.change_handlers.insert(
            (Self::url_key(url).to_string(), selector.to_string()),
            Box::new(handler),
        );
        self
    }

    /// Schedule a delayed mutation against a page, simulating an AJAX
    /// re-render that lands after `delay`.
    pub fn schedule<F>(&mut self, url: &str, delay: std::time::Duration, edit: F) -> &mut Self
    where
        F: FnOnce(&mut Document) + 'static,
    {
        self.scheduled.push(Scheduled {
            url_key: Self::url_key(url).to_string(),
            due: Instant::now() + delay,
            edit: Box::new(edit),
        });
        self
    }

    /// Directly edit the current page document (test scripting helper)
    pub fn edit_current<F: FnOnce(&mut Document)>(&mut self, edit: F) {
        let key = Self::url_key(&self.current_url).to_string();
        if let Some(doc) = self.docs.get_mut(&key) {
            edit(doc);
        }
    }

    /// Screenshot artifact references captured so far
    #[must_use]
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Apply scheduled mutations that have fallen due for the current page
    fn settle(&mut self) {
        let key = Self::url_key(&self.current_url).to_string();
        let now = Instant::now();
        let mut pending = Vec::new();
        let mut ready = Vec::new();
        for entry in self.scheduled.drain(..) {
            if entry.url_key == key && entry.due <= now {
                ready.push(entry);
            } else {
                pending.push(entry);
            }
        }
        self.scheduled = pending;
        if let Some(doc) = self.docs.get_mut(&key) {
            for entry in ready {
                (entry.edit)(doc);
            }
        }
    }

    fn handle(&self, node: &Node, selector: &Selector) -> ElementHandle {
        ElementHandle {
            selector: selector.clone(),
            node: node.id,
            tag_name: node.element.tag.clone(),
            kind: node.element.kind,
            text: node.element.text.clone(),
            value: node.element.value.clone(),
            visible: node.element.visible,
            checked: node.element.checked,
            disabled: node.element.disabled,
            epoch: self.epoch,
            resolved_at: Instant::now(),
        }
    }

    fn interactable_node(
        &mut self,
        selector: &Selector,
    ) -> ManejarResult<(String, u64)> {
        self.settle();
        let key = Self::url_key(&self.current_url).to_string();
        let doc = self
            .docs
            .get(&key)
            .ok_or_else(|| ManejarError::InvalidState {
                message: format!("no page loaded at '{}'", self.current_url),
            })?;
        let node = doc
            .find(selector)
            .ok_or_else(|| ManejarError::NotInteractable {
                selector: selector.to_string(),
                reason: "element not found".to_string(),
            })?;
        if !node.element.visible {
            return Err(ManejarError::NotInteractable {
                selector: selector.to_string(),
                reason: "element is hidden".to_string(),
            });
        }
        if node.element.disabled {
            return Err(ManejarError::NotInteractable {
                selector: selector.to_string(),
                reason: "element is disabled".to_string(),
            });
        }
        Ok((key, node.id))
    }

    fn fire_change(&mut self, key: &str, selector: &Selector, value: &str) {
        let handler_key = (key.to_string(), selector.to_string());
        if let Some(mut handler) = self.change_handlers.remove(&handler_key) {
            if let Some(doc) = self.docs.get_mut(key) {
                handler(doc, value);
            }
            self.change_handlers.insert(handler_key, handler);
        }
    }
}

impl PageDriver for MockPage {
    fn navigate(&mut self, url: &str) -> ManejarResult<()> {
        let key = Self::url_key(url);
        if !self.docs.contains_key(key) {
            return Err(ManejarError::NavigationFailed {
                url: url.to_string(),
                message: "no page registered at this URL".to_string(),
            });
        }
        tracing::debug!(url, "navigating");
        self.current_url = url.to_string();
        self.epoch += 1;
        Ok(())
    }

    fn current_url(&self) -> String {
        self.current_url.clone()
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn query_one(&mut self, selector: &Selector) -> Option<ElementHandle> {
        self.settle();
        let key = Self::url_key(&self.current_url);
        let doc = self.docs.get(key)?;
        doc.find(selector).map(|n| self.handle(n, selector))
    }

    fn query_scoped(
        &mut self,
        scope: &ElementHandle,
        selector: &Selector,
    ) -> Option<ElementHandle> {
        if scope.epoch != self.epoch {
            return None;
        }
        self.settle();
        let key = Self::url_key(&self.current_url);
        let doc = self.docs.get(key)?;
        doc.find_scoped(scope.node, selector)
            .map(|n| self.handle(n, selector))
    }

    fn page_text(&mut self) -> String {
        self.settle();
        let key = Self::url_key(&self.current_url);
        self.docs.get(key).map(Document::visible_text).unwrap_or_default()
    }

    fn click(&mut self, selector: &Selector) -> ManejarResult<()> {
        let (key, node_id) = self.interactable_node(selector)?;
        // Look the kind up before firing any handler
        let kind = self
            .docs
            .get(&key)
            .and_then(|d| d.nodes.iter().find(|n| n.id == node_id))
            .map(|n| n.element.kind)
            .unwrap_or(ControlKind::Region);
        if !kind.accepts_click() {
            return Err(ManejarError::NotInteractable {
                selector: selector.to_string(),
                reason: format!("a {kind} does not accept clicks"),
            });
        }
        if kind == ControlKind::Checkbox {
            if let Some(doc) = self.docs.get_mut(&key) {
                if let Some(node) = doc.nodes.iter_mut().find(|n| n.id == node_id) {
                    node.element.checked = !node.element.checked;
                }
            }
        }

        let handler_key = (key.clone(), selector.to_string());
        let mut destination = None;
        if let Some(mut handler) = self.click_handlers.remove(&handler_key) {
            if let Some(doc) = self.docs.get_mut(&key) {
                destination = handler(doc, &mut self.storage);
            }
            self.click_handlers.insert(handler_key, handler);
        }
        if let Some(url) = destination {
            self.navigate(&url)?;
        }
        Ok(())
    }

    fn type_text(&mut self, selector: &Selector, text: &str) -> ManejarResult<()> {
        let (key, node_id) = self.interactable_node(selector)?;
        let doc = self.docs.get_mut(&key).ok_or(ManejarError::InvalidState {
            message: "page disappeared mid-interaction".to_string(),
        })?;
        let node = doc
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or(ManejarError::InvalidState {
                message: "node disappeared mid-interaction".to_string(),
            })?;
        if !node.element.kind.accepts_text() {
            return Err(ManejarError::NotInteractable {
                selector: selector.to_string(),
                reason: format!("a {} does not accept typed text", node.element.kind),
            });
        }
        node.element.value = text.to_string();
        Ok(())
    }

    fn select_value(&mut self, selector: &Selector, value: &str) -> ManejarResult<()> {
        let (key, node_id) = self.interactable_node(selector)?;
        {
            let doc = self.docs.get_mut(&key).ok_or(ManejarError::InvalidState {
                message: "page disappeared mid-interaction".to_string(),
            })?;
            let node = doc
                .nodes
                .iter_mut()
                .find(|n| n.id == node_id)
                .ok_or(ManejarError::InvalidState {
                    message: "node disappeared mid-interaction".to_string(),
                })?;
            if !node.element.kind.accepts_select() {
                return Err(ManejarError::NotInteractable {
                    selector: selector.to_string(),
                    reason: format!("a {} does not accept option selection", node.element.kind),
                });
            }
            if !node.element.options.iter().any(|o| o == value) {
                return Err(ManejarError::NotInteractable {
                    selector: selector.to_string(),
                    reason: format!("no option with value '{value}'"),
                });
            }
            node.element.value = value.to_string();
        }
        self.fire_change(&key, selector, value);
        Ok(())
    }

    fn set_checked(&mut self, selector: &Selector, checked: bool) -> ManejarResult<()> {
        let (key, node_id) = self.interactable_node(selector)?;
        {
            let doc = self.docs.get_mut(&key).ok_or(ManejarError::InvalidState {
                message: "page disappeared mid-interaction".to_string(),
            })?;
            let node = doc
                .nodes
                .iter_mut()
                .find(|n| n.id == node_id)
                .ok_or(ManejarError::InvalidState {
                    message: "node disappeared mid-interaction".to_string(),
                })?;
            if !node.element.kind.accepts_check() {
                return Err(ManejarError::NotInteractable {
                    selector: selector.to_string(),
                    reason: format!("a {} cannot be checked", node.element.kind),
                });
            }
            node.element.checked = checked;
        }
        let value = if checked { "true" } else { "false" };
        self.fire_change(&key, selector, value);
        Ok(())
    }

    fn storage_state(&self) -> StorageState {
        self.storage.clone()
    }

    fn restore_storage(&mut self, state: &StorageState) {
        self.storage = state.clone();
    }

    fn capture_screenshot(&mut self, label: &str) -> Option<String> {
        let reference = format!("{label}.png");
        self.artifacts.push(reference.clone());
        Some(reference)
    }
}
