//! Logical names for the host page elements the automation touches, each
//! mapped to one or more CSS selectors tried in order.

use crate::errors::TimecardError;
use crate::page::{Element, HostPage};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A logical UI element of the host page (or of our own dialogs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    // Oracle Cloud UI
    CommentOption,
    SaveButton,
    CommentView,
    CommentTextarea,
    Banner,
    HeaderToolbar,

    // Oracle JET data grid
    GridColumnHeader,
    GridDataBody,
    GridHeaderCell,
    GridCell,
    Input,
    CustomEditor,
    ContentEditable,

    // Our own markup
    DevopsDialog,
    DevopsButton,
    TemplatesDialog,
    TemplateBar,
}

impl Target {
    /// Fallback selectors, most specific first.
    pub fn selectors(&self) -> &'static [&'static str] {
        match self {
            Target::CommentOption => &["#insertComment", "#editComment"],
            Target::SaveButton => &["button[aria-label=Save]"],
            Target::CommentView => &[".oj-sp-create-edit-drawer-template-main-container"],
            Target::CommentTextarea => &["textarea"],
            Target::Banner => &[
                "div:has(>table[role=presentation])",
                ".oj-sp-banner-container.oj-sp-banner-layout.oj-private-scale-lg.oj-sp-common-banner-content-layout",
            ],
            Target::HeaderToolbar => &["oj-toolbar[aria-label=\"Header Toolbar\"]"],
            Target::GridColumnHeader => &["#timecard-datagrid:columnHeader"],
            Target::GridDataBody => &["#timecard-datagrid:databody"],
            Target::GridHeaderCell => &[".oj-datagrid-header-cell"],
            Target::GridCell => &[".oj-datagrid-cell"],
            Target::Input => &["input", "textarea"],
            Target::CustomEditor => &[
                "oj-input-text",
                "oj-input-number",
                "oj-c-input-text",
                "oj-c-input-number",
                "oj-input-date-time",
            ],
            Target::ContentEditable => &["[contenteditable=\"true\"]", "[contenteditable]"],
            Target::DevopsDialog => &[".devops-dialog"],
            Target::DevopsButton => &[".devops-btn"],
            Target::TemplatesDialog => &[".templates-dialog"],
            Target::TemplateBar => &[".template-btn-bar"],
        }
    }

    /// The primary selector's bare class name, for markers we create ourselves.
    pub fn marker_class(&self) -> Option<&'static str> {
        self.selectors()
            .first()
            .and_then(|s| s.strip_prefix('.'))
            .filter(|s| !s.contains(['.', ' ', '[', ':']))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Grid ids contain a colon, which CSS would read as a pseudo-class.
fn literal_id(selector: &str) -> Option<&str> {
    selector.strip_prefix('#').filter(|id| id.contains(':'))
}

/// Query primitives over the [`Target`] table.
#[derive(Clone)]
pub struct Selectors {
    page: Arc<dyn HostPage>,
}

impl Selectors {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Arc<dyn HostPage> {
        &self.page
    }

    /// First element matching any of the target's selectors, in fallback order.
    pub async fn query(&self, target: Target) -> Result<Option<Element>, TimecardError> {
        for selector in target.selectors() {
            let hit = match literal_id(selector) {
                Some(id) => self.page.element_by_id(id).await?,
                None => self.page.query(None, selector).await?,
            };
            if let Some(id) = hit {
                trace!(%target, selector, "matched");
                return Ok(Some(Element::new(self.page.clone(), id)));
            }
        }
        Ok(None)
    }

    /// Like [`Selectors::query`] but scoped to descendants of `scope`.
    pub async fn query_within(
        &self,
        scope: &Element,
        target: Target,
    ) -> Result<Option<Element>, TimecardError> {
        for selector in target.selectors() {
            if let Some(found) = scope.query(selector).await? {
                trace!(%target, selector, "matched within scope");
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// All descendants of `scope` matching the target's primary selector.
    pub async fn query_all_within(
        &self,
        scope: &Element,
        target: Target,
    ) -> Result<Vec<Element>, TimecardError> {
        match target.selectors().first() {
            Some(selector) => scope.query_all(selector).await,
            None => Ok(Vec::new()),
        }
    }
}
