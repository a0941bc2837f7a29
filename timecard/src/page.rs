//! The seam between the automation logic and the browser tab.
//!
//! Every backend (the WebSocket bridge into a real tab, or the in-memory page
//! used by tests) implements [`HostPage`]. Element references are opaque
//! [`NodeId`] handles that stay valid for as long as the backend keeps the
//! node alive; a handle to a node the host has since removed yields
//! [`TimecardError::ElementDetached`].

use crate::errors::TimecardError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque handle to a node in the host page.
pub type NodeId = u64;

/// A synthetic DOM event sent to the host. There is no acknowledgment beyond
/// the `dispatchEvent` return value; callers verify effects separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyntheticEvent {
    Click,
    DoubleClick,
    ContextMenu,
    /// `input` event, with the inserted data when known.
    Input { data: Option<String> },
    Change,
    KeyDown { key: String, key_code: u32 },
    KeyUp { key: String, key_code: u32 },
    /// A `CustomEvent` with the given name, bubbling.
    Custom { name: String },
}

impl SyntheticEvent {
    pub fn enter_down() -> Self {
        SyntheticEvent::KeyDown {
            key: "Enter".to_string(),
            key_code: 13,
        }
    }

    pub fn enter_up() -> Self {
        SyntheticEvent::KeyUp {
            key: "Enter".to_string(),
            key_code: 13,
        }
    }

    pub fn custom(name: &str) -> Self {
        SyntheticEvent::Custom {
            name: name.to_string(),
        }
    }

    /// DOM event type name, as passed to the event constructor.
    pub fn event_type(&self) -> &str {
        match self {
            SyntheticEvent::Click => "click",
            SyntheticEvent::DoubleClick => "dblclick",
            SyntheticEvent::ContextMenu => "contextmenu",
            SyntheticEvent::Input { .. } => "input",
            SyntheticEvent::Change => "change",
            SyntheticEvent::KeyDown { .. } => "keydown",
            SyntheticEvent::KeyUp { .. } => "keyup",
            SyntheticEvent::Custom { name } => name,
        }
    }
}

/// Description of an element the automation creates in the host page
/// (toolbar button, comment bar, dialog shell, stylesheet).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    #[serde(default)]
    pub text: Option<String>,
    /// Name of the [`crate::PageAction`] the page reports when this element is
    /// clicked. Rendered as a `data-timecard-action` attribute.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Operations the automation needs from the host page.
///
/// All selectors are plain CSS. Absence is reported as `Ok(None)` / empty
/// vectors; `Err` is reserved for transport problems and detached handles.
#[async_trait]
pub trait HostPage: Send + Sync {
    /// `window.location.pathname`
    async fn location_path(&self) -> Result<String, TimecardError>;

    async fn body(&self) -> Result<NodeId, TimecardError>;

    /// First match of `css` below `scope` (or the document when `None`).
    async fn query(&self, scope: Option<NodeId>, css: &str)
        -> Result<Option<NodeId>, TimecardError>;

    async fn query_all(&self, scope: Option<NodeId>, css: &str)
        -> Result<Vec<NodeId>, TimecardError>;

    /// `document.getElementById`, for ids that are not valid CSS identifiers.
    async fn element_by_id(&self, id: &str) -> Result<Option<NodeId>, TimecardError>;

    /// The focused element; `None` when nothing but the body has focus.
    async fn active_element(&self) -> Result<Option<NodeId>, TimecardError>;

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError>;

    async fn next_sibling(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError>;

    async fn first_child(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError>;

    /// Upper-case tag name, as `Element.tagName` reports it for HTML.
    async fn tag_name(&self, node: NodeId) -> Result<String, TimecardError>;

    async fn inner_text(&self, node: NodeId) -> Result<String, TimecardError>;

    /// Raw inline style value (`element.style[property]`), empty when unset.
    async fn style(&self, node: NodeId, property: &str) -> Result<String, TimecardError>;

    async fn has_class(&self, node: NodeId, class: &str) -> Result<bool, TimecardError>;

    /// The element's `value` property, `None` when it has none.
    async fn value(&self, node: NodeId) -> Result<Option<String>, TimecardError>;

    async fn set_value(&self, node: NodeId, value: &str) -> Result<(), TimecardError>;

    async fn focus(&self, node: NodeId) -> Result<(), TimecardError>;

    async fn blur(&self, node: NodeId) -> Result<(), TimecardError>;

    async fn click(&self, node: NodeId) -> Result<(), TimecardError>;

    /// Dispatch a synthetic event; returns `dispatchEvent`'s result (false when
    /// a listener cancelled it).
    async fn dispatch(&self, node: NodeId, event: &SyntheticEvent)
        -> Result<bool, TimecardError>;

    /// `document.execCommand('insertText')` at the current focus. Returns
    /// false when the page does not support programmatic insertion.
    async fn insert_text(&self, text: &str) -> Result<bool, TimecardError>;

    /// Create `spec` under `parent`, before `before` when given.
    async fn insert_element(
        &self,
        parent: NodeId,
        before: Option<NodeId>,
        spec: &ElementSpec,
    ) -> Result<NodeId, TimecardError>;

    async fn set_inner_html(&self, node: NodeId, html: &str) -> Result<(), TimecardError>;

    async fn remove(&self, node: NodeId) -> Result<(), TimecardError>;

    /// `dialog.showModal()`
    async fn show_modal(&self, node: NodeId) -> Result<(), TimecardError>;

    /// `dialog.close()`
    async fn close_modal(&self, node: NodeId) -> Result<(), TimecardError>;

    /// Blocking user notification.
    async fn alert(&self, message: &str) -> Result<(), TimecardError>;

    async fn write_clipboard(&self, text: &str) -> Result<(), TimecardError>;
}

/// A live element in the host page: a handle plus the page it belongs to.
#[derive(Clone)]
pub struct Element {
    page: Arc<dyn HostPage>,
    id: NodeId,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element").field("id", &self.id).finish()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Element {
    pub fn new(page: Arc<dyn HostPage>, id: NodeId) -> Self {
        Self { page, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn page(&self) -> &Arc<dyn HostPage> {
        &self.page
    }

    fn wrap(&self, id: NodeId) -> Element {
        Element::new(self.page.clone(), id)
    }

    pub async fn query(&self, css: &str) -> Result<Option<Element>, TimecardError> {
        Ok(self
            .page
            .query(Some(self.id), css)
            .await?
            .map(|id| self.wrap(id)))
    }

    pub async fn query_all(&self, css: &str) -> Result<Vec<Element>, TimecardError> {
        Ok(self
            .page
            .query_all(Some(self.id), css)
            .await?
            .into_iter()
            .map(|id| self.wrap(id))
            .collect())
    }

    pub async fn parent(&self) -> Result<Option<Element>, TimecardError> {
        Ok(self.page.parent(self.id).await?.map(|id| self.wrap(id)))
    }

    pub async fn next_sibling(&self) -> Result<Option<Element>, TimecardError> {
        Ok(self.page.next_sibling(self.id).await?.map(|id| self.wrap(id)))
    }

    pub async fn first_child(&self) -> Result<Option<Element>, TimecardError> {
        Ok(self.page.first_child(self.id).await?.map(|id| self.wrap(id)))
    }

    pub async fn tag_name(&self) -> Result<String, TimecardError> {
        self.page.tag_name(self.id).await
    }

    pub async fn text(&self) -> Result<String, TimecardError> {
        self.page.inner_text(self.id).await
    }

    pub async fn style(&self, property: &str) -> Result<String, TimecardError> {
        self.page.style(self.id, property).await
    }

    pub async fn has_class(&self, class: &str) -> Result<bool, TimecardError> {
        self.page.has_class(self.id, class).await
    }

    pub async fn value(&self) -> Result<Option<String>, TimecardError> {
        self.page.value(self.id).await
    }

    pub async fn set_value(&self, value: &str) -> Result<(), TimecardError> {
        self.page.set_value(self.id, value).await
    }

    pub async fn focus(&self) -> Result<(), TimecardError> {
        self.page.focus(self.id).await
    }

    pub async fn blur(&self) -> Result<(), TimecardError> {
        self.page.blur(self.id).await
    }

    pub async fn click(&self) -> Result<(), TimecardError> {
        self.page.click(self.id).await
    }

    pub async fn dispatch(&self, event: &SyntheticEvent) -> Result<bool, TimecardError> {
        self.page.dispatch(self.id, event).await
    }

    /// Fire-and-forget dispatch. Failures thrown by the host's own handlers
    /// are logged and dropped; `None` means the dispatch itself failed.
    pub async fn fire(&self, event: &SyntheticEvent) -> Option<bool> {
        match self.page.dispatch(self.id, event).await {
            Ok(not_cancelled) => Some(not_cancelled),
            Err(e) => {
                debug!(node = self.id, event = event.event_type(), error = %e, "dispatch failed");
                None
            }
        }
    }

    /// Best-effort focus, see [`Element::fire`].
    pub async fn try_focus(&self) {
        if let Err(e) = self.page.focus(self.id).await {
            debug!(node = self.id, error = %e, "focus failed");
        }
    }

    /// Best-effort blur, see [`Element::fire`].
    pub async fn try_blur(&self) {
        if let Err(e) = self.page.blur(self.id).await {
            debug!(node = self.id, error = %e, "blur failed");
        }
    }

    /// Best-effort click, see [`Element::fire`].
    pub async fn try_click(&self) {
        if let Err(e) = self.page.click(self.id).await {
            debug!(node = self.id, error = %e, "click failed");
        }
    }

    pub async fn insert_child(
        &self,
        before: Option<&Element>,
        spec: &ElementSpec,
    ) -> Result<Element, TimecardError> {
        let id = self
            .page
            .insert_element(self.id, before.map(|b| b.id), spec)
            .await?;
        Ok(self.wrap(id))
    }

    pub async fn remove(&self) -> Result<(), TimecardError> {
        self.page.remove(self.id).await
    }
}
