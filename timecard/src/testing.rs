//! In-memory [`HostPage`] for driving the automation without a browser.
//!
//! `FakePage` keeps a small DOM tree, answers a subset of CSS (type, `#id`,
//! `.class`, `[attr]`, `[attr=value]` compounds joined by descendant
//! combinators, comma groups) and imitates the parts of the Oracle UI the
//! automation depends on: the timecard grid opens an editor on double-click
//! and commits according to a [`CommitTrigger`], a context-menu on a cell
//! offers "insert comment", and the comment drawer stores its text on Save.

use crate::errors::TimecardError;
use crate::page::{ElementSpec, HostPage, NodeId, SyntheticEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const GRID_CELL_CLASS: &str = "oj-datagrid-cell";
const COMMENT_PANEL_CLASS: &str = "oj-sp-create-edit-drawer-template-main-container";
const EDITOR_MARKER: &str = "data-fake-editor";
const MENU_CLASS: &str = "fake-context-menu";

/// What the grid puts into a cell on double-click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeEditor {
    #[default]
    NativeInput,
    /// `oj-input-text` with a `value` property and no inner input.
    Custom,
    ContentEditable,
    /// Double-click does nothing.
    Missing,
}

/// Which signal makes the grid accept the edited value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitTrigger {
    #[default]
    Enter,
    Blur,
    /// Blur closes the editor but the value only lands on a later Enter.
    EnterAfterBlur,
    /// The editor is discarded on blur; nothing is ever committed.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeBehavior {
    pub editor: FakeEditor,
    pub commit: CommitTrigger,
    /// Whether `insert_text` works at the focused editor.
    pub insert_text: bool,
    /// Whether a context-menu on a cell shows the comment options.
    pub comment_menu: bool,
    /// Event types the host handles but calls `preventDefault()` on, so
    /// `dispatch` reports `false`.
    pub cancelled_events: &'static [&'static str],
    /// Event types whose dispatch throws before any handler runs.
    pub failing_events: &'static [&'static str],
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            editor: FakeEditor::NativeInput,
            commit: CommitTrigger::Enter,
            insert_text: true,
            comment_menu: true,
            cancelled_events: &[],
            failing_events: &[],
        }
    }
}

/// Handles of the two grid containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeGrid {
    pub header: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Default, Clone)]
struct Node {
    tag: String,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    style: HashMap<String, String>,
    text: String,
    value: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
    html: Option<String>,
    open: bool,
    comment: Option<String>,
    pending: Option<String>,
}

impl Node {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn is_editable(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea") || self.attr("contenteditable").is_some()
    }
}

struct Dom {
    nodes: HashMap<NodeId, Node>,
    next_id: NodeId,
    root: NodeId,
    body: NodeId,
    active: Option<NodeId>,
    path: String,
    behavior: FakeBehavior,
    comment_target: Option<NodeId>,
    alerts: Vec<String>,
    clipboard: Vec<String>,
    log: Vec<(NodeId, String)>,
}

fn detached(id: NodeId) -> TimecardError {
    TimecardError::ElementDetached(format!("node {id}"))
}

fn parse_style(style: &str) -> HashMap<String, String> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

impl Dom {
    fn new(path: &str) -> Self {
        let mut dom = Dom {
            nodes: HashMap::new(),
            next_id: 1,
            root: 0,
            body: 0,
            active: None,
            path: path.to_string(),
            behavior: FakeBehavior::default(),
            comment_target: None,
            alerts: Vec::new(),
            clipboard: Vec::new(),
            log: Vec::new(),
        };
        dom.root = dom.alloc(Node {
            tag: "html".into(),
            attached: true,
            ..Default::default()
        });
        let root = dom.root;
        dom.body = dom.create(root, None, &ElementSpec::new("body"));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, TimecardError> {
        self.nodes
            .get(&id)
            .filter(|n| n.attached)
            .ok_or_else(|| detached(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TimecardError> {
        self.nodes
            .get_mut(&id)
            .filter(|n| n.attached)
            .ok_or_else(|| detached(id))
    }

    fn create(&mut self, parent: NodeId, before: Option<NodeId>, spec: &ElementSpec) -> NodeId {
        let tag = spec.tag.to_ascii_lowercase();
        let mut attrs = spec.attributes.clone();
        if let Some(action) = &spec.action {
            attrs.push(("data-timecard-action".into(), action.clone()));
        }
        let style = attrs
            .iter()
            .find(|(n, _)| n == "style")
            .map(|(_, v)| parse_style(v))
            .unwrap_or_default();
        let has_value = matches!(tag.as_str(), "input" | "textarea")
            || (tag.starts_with("oj-") && tag.contains("input"));
        let value = has_value.then(|| {
            attrs
                .iter()
                .find(|(n, _)| n == "value")
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        });
        let id = self.alloc(Node {
            tag,
            classes: spec.classes.clone(),
            attrs,
            style,
            text: spec.text.clone().unwrap_or_default(),
            value,
            parent: Some(parent),
            attached: true,
            ..Default::default()
        });
        if let Some(p) = self.nodes.get_mut(&parent) {
            let at = before
                .and_then(|b| p.children.iter().position(|c| *c == b))
                .unwrap_or(p.children.len());
            p.children.insert(at, id);
        }
        for child in &spec.children {
            self.create(id, None, child);
        }
        id
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(n) = self.nodes.get_mut(&current) {
                n.attached = false;
                stack.extend(n.children.iter().copied());
            }
            if self.active == Some(current) {
                self.active = None;
            }
        }
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(n) = self.nodes.get(&current) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(&id).and_then(|n| n.parent), move |p| {
            self.nodes.get(p).and_then(|n| n.parent)
        })
    }

    fn text(&self, id: NodeId) -> String {
        let Some(node) = self.nodes.get(&id) else {
            return String::new();
        };
        let mut out = node.text.clone();
        for child in &node.children {
            out.push_str(&self.text(*child));
        }
        out
    }

    fn select(&self, scope: Option<NodeId>, css: &str) -> Vec<NodeId> {
        let selector = Selector::parse(css);
        self.descendants(scope.unwrap_or(self.root))
            .into_iter()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    fn cell_of(&self, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| self.nodes.get(n).is_some_and(|n| n.has_class(GRID_CELL_CLASS)))
    }

    fn editor_in(&self, cell: NodeId) -> Option<NodeId> {
        self.descendants(cell)
            .into_iter()
            .find(|n| self.nodes.get(n).and_then(|n| n.attr(EDITOR_MARKER)).is_some())
    }

    fn editor_content(&self, editor: NodeId) -> String {
        self.nodes
            .get(&editor)
            .map(|n| n.value.clone().unwrap_or_else(|| n.text.clone()))
            .unwrap_or_default()
    }

    fn commit(&mut self, cell: NodeId, editor: NodeId) {
        let value = self.editor_content(editor);
        self.detach(editor);
        if let Some(c) = self.nodes.get_mut(&cell) {
            c.text = value;
        }
    }

    fn open_editor(&mut self, cell: NodeId) {
        if self.editor_in(cell).is_some() {
            return;
        }
        let spec = match self.behavior.editor {
            FakeEditor::NativeInput => ElementSpec::new("input").class("oj-inputtext-input"),
            FakeEditor::Custom => ElementSpec::new("oj-input-text"),
            FakeEditor::ContentEditable => ElementSpec::new("div").attr("contenteditable", "true"),
            FakeEditor::Missing => return,
        };
        let editor = self.create(cell, None, &spec.attr(EDITOR_MARKER, ""));
        self.active = Some(editor);
    }

    fn press_enter(&mut self, target: NodeId) {
        let Some(cell) = self.cell_of(target) else {
            return;
        };
        match self.editor_in(cell) {
            Some(editor) if self.behavior.commit == CommitTrigger::Enter => self.commit(cell, editor),
            Some(_) => {}
            None => {
                if let Some(pending) = self.nodes.get_mut(&cell).and_then(|c| c.pending.take()) {
                    if let Some(c) = self.nodes.get_mut(&cell) {
                        c.text = pending;
                    }
                }
            }
        }
    }

    fn blur_editor(&mut self, editor: NodeId) {
        let is_editor = self
            .nodes
            .get(&editor)
            .and_then(|n| n.attr(EDITOR_MARKER))
            .is_some();
        let Some(cell) = self.cell_of(editor).filter(|_| is_editor) else {
            return;
        };
        match self.behavior.commit {
            CommitTrigger::Blur => self.commit(cell, editor),
            CommitTrigger::EnterAfterBlur => {
                let value = self.editor_content(editor);
                self.detach(editor);
                if let Some(c) = self.nodes.get_mut(&cell) {
                    c.pending = Some(value);
                }
            }
            CommitTrigger::Never => self.detach(editor),
            CommitTrigger::Enter => {}
        }
    }

    fn open_context_menu(&mut self, target: NodeId) {
        if !self.behavior.comment_menu {
            return;
        }
        for menu in self.select(None, &format!(".{MENU_CLASS}")) {
            self.detach(menu);
        }
        let has_comment = self.nodes.get(&target).is_some_and(|n| n.comment.is_some());
        let option = if has_comment { "editComment" } else { "insertComment" };
        self.comment_target = Some(target);
        let body = self.body;
        self.create(
            body,
            None,
            &ElementSpec::new("oj-menu")
                .class(MENU_CLASS)
                .child(ElementSpec::new("oj-option").attr("id", option).text("Comment")),
        );
    }

    fn open_comment_panel(&mut self) -> (NodeId, NodeId) {
        for menu in self.select(None, &format!(".{MENU_CLASS}")) {
            self.detach(menu);
        }
        let existing = self.comment_target.and_then(|t| self.nodes.get(&t)?.comment.clone());
        let body = self.body;
        let panel = self.create(
            body,
            None,
            &ElementSpec::new("div")
                .class(COMMENT_PANEL_CLASS)
                .child(
                    ElementSpec::new("div").class("oj-form-layout-row").child(
                        ElementSpec::new("div")
                            .class("oj-text-field-container")
                            .child(ElementSpec::new("textarea")),
                    ),
                )
                .child(ElementSpec::new("button").attr("aria-label", "Save").text("Save")),
        );
        let textarea = self.select(Some(panel), "textarea")[0];
        if let Some(t) = self.nodes.get_mut(&textarea) {
            t.value = Some(existing.unwrap_or_default());
        }
        (panel, textarea)
    }

    fn save_comment(&mut self, button: NodeId) -> bool {
        let Some(panel) = self
            .ancestors(button)
            .find(|n| self.nodes.get(n).is_some_and(|n| n.has_class(COMMENT_PANEL_CLASS)))
        else {
            return false;
        };
        let text = self
            .select(Some(panel), "textarea")
            .first()
            .and_then(|t| self.nodes.get(t)?.value.clone())
            .unwrap_or_default();
        if let Some(target) = self.comment_target.take() {
            if let Some(t) = self.nodes.get_mut(&target) {
                t.comment = Some(text);
            }
        }
        self.detach(panel);
        true
    }

    fn click(&mut self, id: NodeId) {
        self.log.push((id, "click".into()));
        let (option, save) = match self.nodes.get(&id) {
            Some(n) => (
                matches!(n.attr("id"), Some("insertComment" | "editComment")),
                n.attr("aria-label") == Some("Save"),
            ),
            None => return,
        };
        if option {
            let (_, textarea) = self.open_comment_panel();
            self.active = Some(textarea);
        } else if save {
            self.save_comment(id);
        }
    }
}

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    unsupported: bool,
}

impl Compound {
    fn parse(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let mut c = Compound::default();
        let mut i = 0;
        let ident = |i: &mut usize| {
            let start = *i;
            while *i < chars.len() && (chars[*i].is_alphanumeric() || matches!(chars[*i], '-' | '_')) {
                *i += 1;
            }
            chars[start..*i].iter().collect::<String>()
        };
        while i < chars.len() {
            match chars[i] {
                '*' => i += 1,
                '#' => {
                    i += 1;
                    c.id = Some(ident(&mut i));
                }
                '.' => {
                    i += 1;
                    c.classes.push(ident(&mut i));
                }
                '[' => {
                    let end = chars[i..].iter().position(|ch| *ch == ']').map(|p| i + p);
                    let Some(end) = end else {
                        c.unsupported = true;
                        break;
                    };
                    let body: String = chars[i + 1..end].iter().collect();
                    let attr = match body.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_string(),
                            Some(value.trim().trim_matches(['"', '\'']).to_string()),
                        ),
                        None => (body.trim().to_string(), None),
                    };
                    c.attrs.push(attr);
                    i = end + 1;
                }
                ch if ch.is_alphabetic() => c.tag = Some(ident(&mut i).to_ascii_lowercase()),
                _ => {
                    c.unsupported = true;
                    break;
                }
            }
        }
        c
    }

    fn matches(&self, node: &Node) -> bool {
        !self.unsupported
            && self.tag.as_ref().map_or(true, |t| *t == node.tag)
            && self.id.as_deref().map_or(true, |id| node.attr("id") == Some(id))
            && self.classes.iter().all(|c| node.has_class(c))
            && self.attrs.iter().all(|(name, value)| match value {
                Some(v) => node.attr(name) == Some(v.as_str()),
                None => node.attr(name).is_some(),
            })
    }
}

/// Split on `sep` outside brackets, parentheses and quotes.
fn split_top_level(input: &str, sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for ch in input.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' | '(' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' => {
                depth -= 1;
                current.push(ch);
            }
            c if depth == 0 && sep(c) => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

struct Selector {
    groups: Vec<Vec<Compound>>,
}

impl Selector {
    fn parse(css: &str) -> Self {
        Self {
            groups: split_top_level(css, |c| c == ',')
                .iter()
                .map(|group| {
                    split_top_level(group, char::is_whitespace)
                        .iter()
                        .map(|part| Compound::parse(part))
                        .collect()
                })
                .collect(),
        }
    }

    fn matches(&self, dom: &Dom, id: NodeId) -> bool {
        self.groups.iter().any(|chain| Self::chain_matches(dom, chain, id))
    }

    fn chain_matches(dom: &Dom, chain: &[Compound], id: NodeId) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !dom.nodes.get(&id).is_some_and(|n| last.matches(n)) {
            return false;
        }
        let mut remaining = rest.iter().rev().peekable();
        for ancestor in dom.ancestors(id) {
            let Some(compound) = remaining.peek() else {
                break;
            };
            if dom.nodes.get(&ancestor).is_some_and(|n| compound.matches(n)) {
                remaining.next();
            }
        }
        remaining.peek().is_none()
    }
}

/// See the module docs.
pub struct FakePage {
    dom: Mutex<Dom>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new(crate::shortcuts::TIMECARDS_PAGE)
    }
}

impl FakePage {
    pub fn new(path: &str) -> Self {
        Self {
            dom: Mutex::new(Dom::new(path)),
        }
    }

    pub fn with_behavior(self, behavior: FakeBehavior) -> Self {
        self.dom().behavior = behavior;
        self
    }

    fn dom(&self) -> MutexGuard<'_, Dom> {
        self.dom.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_path(&self, path: &str) {
        self.dom().path = path.to_string();
    }

    pub fn set_behavior(&self, behavior: FakeBehavior) {
        self.dom().behavior = behavior;
    }

    pub fn body_id(&self) -> NodeId {
        self.dom().body
    }

    /// Append `spec` under `parent`.
    pub fn add(&self, parent: NodeId, spec: &ElementSpec) -> NodeId {
        self.dom().create(parent, None, spec)
    }

    /// Header container with one header cell per `(label, left)`, and an empty
    /// data body.
    pub fn add_timecard_grid(&self, headers: &[(&str, &str)]) -> FakeGrid {
        let mut dom = self.dom();
        let body = dom.body;
        let mut header_spec = ElementSpec::new("div").attr("id", "timecard-datagrid:columnHeader");
        for (label, left) in headers {
            header_spec = header_spec.child(
                ElementSpec::new("div")
                    .class("oj-datagrid-header-cell")
                    .attr("style", &format!("left: {left}; top: 0px"))
                    .text(label),
            );
        }
        let header = dom.create(body, None, &header_spec);
        let data = dom.create(
            body,
            None,
            &ElementSpec::new("div").attr("id", "timecard-datagrid:databody"),
        );
        FakeGrid { header, body: data }
    }

    /// A body cell at `(left, top)`; `top` may be empty to leave it unset.
    pub fn add_cell(&self, grid: &FakeGrid, left: &str, top: &str, text: &str) -> NodeId {
        let style = if top.is_empty() {
            format!("left: {left}")
        } else {
            format!("left: {left}; top: {top}")
        };
        self.dom().create(
            grid.body,
            None,
            &ElementSpec::new("div")
                .class(GRID_CELL_CLASS)
                .attr("tabindex", "0")
                .attr("style", &style)
                .text(text),
        )
    }

    /// A populated inline input inside `cell`.
    pub fn add_input(&self, cell: NodeId, value: &str) -> NodeId {
        self.dom()
            .create(cell, None, &ElementSpec::new("input").attr("value", value))
    }

    pub fn add_toolbar(&self) -> NodeId {
        let mut dom = self.dom();
        let body = dom.body;
        dom.create(
            body,
            None,
            &ElementSpec::new("oj-toolbar")
                .attr("aria-label", "Header Toolbar")
                .child(ElementSpec::new("oj-button").text("Submit")),
        )
    }

    pub fn add_banner(&self) -> NodeId {
        let mut dom = self.dom();
        let body = dom.body;
        dom.create(
            body,
            None,
            &ElementSpec::new("div")
                .class("oj-sp-banner-container")
                .class("oj-sp-banner-layout")
                .class("oj-private-scale-lg")
                .class("oj-sp-common-banner-content-layout")
                .text("Scheduled maintenance"),
        )
    }

    /// Mount the comment drawer as if the user opened it; returns
    /// `(panel, textarea)`.
    pub fn open_comment_panel(&self) -> (NodeId, NodeId) {
        self.dom().open_comment_panel()
    }

    pub fn focus_node(&self, id: NodeId) {
        self.dom().active = Some(id);
    }

    pub fn find_all(&self, css: &str) -> Vec<NodeId> {
        self.dom().select(None, css)
    }

    pub fn count(&self, css: &str) -> usize {
        self.find_all(css).len()
    }

    pub fn text_of(&self, id: NodeId) -> String {
        self.dom().text(id)
    }

    pub fn value_of(&self, id: NodeId) -> Option<String> {
        self.dom().nodes.get(&id).and_then(|n| n.value.clone())
    }

    pub fn attr_of(&self, id: NodeId, name: &str) -> Option<String> {
        self.dom()
            .nodes
            .get(&id)
            .and_then(|n| n.attr(name).map(str::to_string))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.dom().nodes.get(&id).is_some_and(|n| n.attached)
    }

    /// Comment saved against `cell` through the comment drawer.
    pub fn comment_of(&self, cell: NodeId) -> Option<String> {
        self.dom().nodes.get(&cell).and_then(|n| n.comment.clone())
    }

    /// Markup last written with `set_inner_html`.
    pub fn html_of(&self, id: NodeId) -> Option<String> {
        self.dom().nodes.get(&id).and_then(|n| n.html.clone())
    }

    pub fn is_open(&self, id: NodeId) -> bool {
        self.dom().nodes.get(&id).is_some_and(|n| n.attached && n.open)
    }

    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.dom()
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.dom().alerts.clone()
    }

    pub fn clipboard(&self) -> Vec<String> {
        self.dom().clipboard.clone()
    }

    /// `(node, event type)` for every dispatched event and click, in order.
    pub fn events(&self) -> Vec<(NodeId, String)> {
        self.dom().log.clone()
    }
}

#[async_trait]
impl HostPage for FakePage {
    async fn location_path(&self) -> Result<String, TimecardError> {
        Ok(self.dom().path.clone())
    }

    async fn body(&self) -> Result<NodeId, TimecardError> {
        Ok(self.dom().body)
    }

    async fn query(&self, scope: Option<NodeId>, css: &str) -> Result<Option<NodeId>, TimecardError> {
        let dom = self.dom();
        if let Some(s) = scope {
            dom.node(s)?;
        }
        Ok(dom.select(scope, css).into_iter().next())
    }

    async fn query_all(&self, scope: Option<NodeId>, css: &str) -> Result<Vec<NodeId>, TimecardError> {
        let dom = self.dom();
        if let Some(s) = scope {
            dom.node(s)?;
        }
        Ok(dom.select(scope, css))
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<NodeId>, TimecardError> {
        let dom = self.dom();
        Ok(dom
            .descendants(dom.root)
            .into_iter()
            .find(|n| dom.nodes.get(n).and_then(|n| n.attr("id")) == Some(id)))
    }

    async fn active_element(&self) -> Result<Option<NodeId>, TimecardError> {
        let dom = self.dom();
        Ok(dom.active.filter(|id| dom.node(*id).is_ok()))
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError> {
        let dom = self.dom();
        let parent = dom.node(node)?.parent;
        Ok(parent.filter(|p| *p != dom.root))
    }

    async fn next_sibling(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError> {
        let dom = self.dom();
        let Some(parent) = dom.node(node)?.parent else {
            return Ok(None);
        };
        let siblings = &dom.node(parent)?.children;
        Ok(siblings
            .iter()
            .position(|c| *c == node)
            .and_then(|i| siblings.get(i + 1))
            .copied())
    }

    async fn first_child(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError> {
        Ok(self.dom().node(node)?.children.first().copied())
    }

    async fn tag_name(&self, node: NodeId) -> Result<String, TimecardError> {
        Ok(self.dom().node(node)?.tag.to_ascii_uppercase())
    }

    async fn inner_text(&self, node: NodeId) -> Result<String, TimecardError> {
        let dom = self.dom();
        dom.node(node)?;
        Ok(dom.text(node))
    }

    async fn style(&self, node: NodeId, property: &str) -> Result<String, TimecardError> {
        Ok(self
            .dom()
            .node(node)?
            .style
            .get(property)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_class(&self, node: NodeId, class: &str) -> Result<bool, TimecardError> {
        Ok(self.dom().node(node)?.has_class(class))
    }

    async fn value(&self, node: NodeId) -> Result<Option<String>, TimecardError> {
        Ok(self.dom().node(node)?.value.clone())
    }

    async fn set_value(&self, node: NodeId, value: &str) -> Result<(), TimecardError> {
        self.dom().node_mut(node)?.value = Some(value.to_string());
        Ok(())
    }

    async fn focus(&self, node: NodeId) -> Result<(), TimecardError> {
        let mut dom = self.dom();
        dom.node(node)?;
        dom.active = Some(node);
        dom.log.push((node, "focus".into()));
        Ok(())
    }

    async fn blur(&self, node: NodeId) -> Result<(), TimecardError> {
        let mut dom = self.dom();
        dom.node(node)?;
        if dom.active == Some(node) {
            dom.active = None;
        }
        dom.log.push((node, "blur".into()));
        dom.blur_editor(node);
        Ok(())
    }

    async fn click(&self, node: NodeId) -> Result<(), TimecardError> {
        let mut dom = self.dom();
        dom.node(node)?;
        dom.click(node);
        Ok(())
    }

    async fn dispatch(&self, node: NodeId, event: &SyntheticEvent) -> Result<bool, TimecardError> {
        let mut dom = self.dom();
        dom.node(node)?;
        let kind = event.event_type();
        dom.log.push((node, kind.to_string()));
        if dom.behavior.failing_events.iter().any(|e| *e == kind) {
            return Err(TimecardError::ScriptError(format!("{kind} dispatch threw")));
        }
        match event {
            SyntheticEvent::Click => dom.click(node),
            SyntheticEvent::DoubleClick => {
                if let Some(cell) = dom.cell_of(node) {
                    dom.open_editor(cell);
                }
            }
            SyntheticEvent::ContextMenu => dom.open_context_menu(node),
            SyntheticEvent::KeyDown { key, .. } if key == "Enter" => dom.press_enter(node),
            _ => {}
        }
        Ok(!dom.behavior.cancelled_events.iter().any(|e| *e == kind))
    }

    async fn insert_text(&self, text: &str) -> Result<bool, TimecardError> {
        let mut dom = self.dom();
        if !dom.behavior.insert_text {
            return Ok(false);
        }
        let Some(active) = dom.active else {
            return Ok(false);
        };
        let node = dom.node_mut(active)?;
        if !node.is_editable() {
            return Ok(false);
        }
        match node.value.as_mut() {
            Some(value) => value.push_str(text),
            None => node.text.push_str(text),
        }
        Ok(true)
    }

    async fn insert_element(
        &self,
        parent: NodeId,
        before: Option<NodeId>,
        spec: &ElementSpec,
    ) -> Result<NodeId, TimecardError> {
        let mut dom = self.dom();
        dom.node(parent)?;
        Ok(dom.create(parent, before, spec))
    }

    async fn set_inner_html(&self, node: NodeId, html: &str) -> Result<(), TimecardError> {
        let mut dom = self.dom();
        let children = dom.node(node)?.children.clone();
        for child in children {
            dom.detach(child);
        }
        dom.node_mut(node)?.html = Some(html.to_string());
        Ok(())
    }

    async fn remove(&self, node: NodeId) -> Result<(), TimecardError> {
        let mut dom = self.dom();
        dom.node(node)?;
        dom.detach(node);
        Ok(())
    }

    async fn show_modal(&self, node: NodeId) -> Result<(), TimecardError> {
        self.dom().node_mut(node)?.open = true;
        Ok(())
    }

    async fn close_modal(&self, node: NodeId) -> Result<(), TimecardError> {
        self.dom().node_mut(node)?.open = false;
        Ok(())
    }

    async fn alert(&self, message: &str) -> Result<(), TimecardError> {
        self.dom().alerts.push(message.to_string());
        Ok(())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), TimecardError> {
        self.dom().clipboard.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing_and_matching() {
        let page = FakePage::default();
        let toolbar = page.add_toolbar();
        assert_eq!(page.find_all("oj-toolbar[aria-label=\"Header Toolbar\"]"), vec![toolbar]);
        assert_eq!(page.count("oj-toolbar oj-button"), 1);
        assert_eq!(page.count("body oj-button, .missing"), 1);
        assert_eq!(page.count("div:has(>table)"), 0);
    }

    #[tokio::test]
    async fn double_click_then_enter_commits() {
        let page = FakePage::default();
        let grid = page.add_timecard_grid(&[("Wed,Dec 03", "240px")]);
        let cell = page.add_cell(&grid, "240px", "0px", "");
        page.dispatch(cell, &SyntheticEvent::DoubleClick).await.unwrap();
        let input = page.query(Some(cell), "input").await.unwrap().unwrap();
        assert_eq!(page.active_element().await.unwrap(), Some(input));
        assert!(page.insert_text("8").await.unwrap());
        page.dispatch(input, &SyntheticEvent::enter_down()).await.unwrap();
        assert_eq!(page.text_of(cell), "8");
        assert!(!page.is_attached(input));
    }

    #[tokio::test]
    async fn detached_nodes_error() {
        let page = FakePage::default();
        let banner = page.add_banner();
        page.remove(banner).await.unwrap();
        assert!(matches!(
            page.tag_name(banner).await,
            Err(TimecardError::ElementDetached(_))
        ));
    }

    #[test]
    fn style_declarations_are_split() {
        let style = parse_style("left: 240px; top: 30.5px;");
        assert_eq!(style.get("left").map(String::as_str), Some("240px"));
        assert_eq!(style.get("top").map(String::as_str), Some("30.5px"));
    }
}
