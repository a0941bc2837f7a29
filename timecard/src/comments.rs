//! Comment drawer automation: the button bar injected into the host's comment
//! panel, and the "open comment panel for a cell" primitive.

use crate::app::PageAction;
use crate::config::FeatureFlags;
use crate::errors::TimecardError;
use crate::guard::ReentrancyGuard;
use crate::page::{Element, ElementSpec, HostPage, SyntheticEvent};
use crate::poll::Timings;
use crate::selector::{Selectors, Target};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Alert shown when the comment for an inserted task could not be written.
pub const COMMENT_FAILED: &str = "No se pudo agregar el comentario. Intente nuevamente.";

const BAR_CLASS: &str = "template-btn-bar";

pub struct CommentEngine {
    selectors: Selectors,
    guard: ReentrancyGuard,
    timings: Timings,
    features: FeatureFlags,
}

impl CommentEngine {
    pub fn new(page: Arc<dyn HostPage>, timings: Timings, features: FeatureFlags) -> Self {
        Self {
            selectors: Selectors::new(page),
            guard: ReentrancyGuard::new(),
            timings,
            features,
        }
    }

    pub fn guard(&self) -> &ReentrancyGuard {
        &self.guard
    }

    /// Called on every shortcut key-up.
    pub fn release(&self) {
        self.guard.exit();
    }

    fn bar_spec(&self) -> ElementSpec {
        let class = Target::TemplateBar.marker_class().unwrap_or(BAR_CLASS);
        let mut bar = ElementSpec::new("div").class(class).child(
            ElementSpec::new("button")
                .class("template-btn")
                .attr("type", "button")
                .text("Comment Templates")
                .action(PageAction::OpenTemplates.as_str()),
        );
        if self.features.azure_devops {
            bar = bar.child(
                ElementSpec::new("button")
                    .class("template-btn")
                    .attr("type", "button")
                    .text("Add from DevOps")
                    .action(PageAction::OpenImportDialog.as_str()),
            );
        }
        bar
    }

    /// Handle a batch of added nodes: augment the comment panel if it is
    /// mounted and not augmented yet. Returns the injected bar.
    pub async fn on_mutation(&self) -> Result<Option<Element>, TimecardError> {
        let Some(view) = self.selectors.query(Target::CommentView).await? else {
            return Ok(None);
        };
        if self
            .selectors
            .query_within(&view, Target::TemplateBar)
            .await?
            .is_some()
        {
            return Ok(None);
        }
        let Some(textarea) = self
            .selectors
            .query_within(&view, Target::CommentTextarea)
            .await?
        else {
            return Ok(None);
        };

        // After the textarea's grandparent row; inside its parent otherwise.
        let parent = textarea.parent().await?;
        let row = match &parent {
            Some(p) => p.parent().await?,
            None => None,
        };
        let spec = self.bar_spec();
        let bar = match &row {
            Some(row) => match row.parent().await? {
                Some(container) => {
                    let after = row.next_sibling().await?;
                    container.insert_child(after.as_ref(), &spec).await?
                }
                None => row.insert_child(None, &spec).await?,
            },
            None => match &parent {
                Some(p) => p.insert_child(None, &spec).await?,
                None => return Ok(None),
            },
        };
        info!("Injected comment template bar");
        Ok(Some(bar))
    }

    /// Shortcut entry point. The guard stays held until the next key-up.
    #[instrument(level = "debug", skip(self))]
    pub async fn open_from_shortcut(&self) -> Result<bool, TimecardError> {
        if !self.guard.enter() {
            debug!("comment trigger already in progress");
            return Ok(false);
        }
        self.open(None).await
    }

    /// Open the comment panel for `cell`, holding the guard for the duration.
    #[instrument(level = "debug", skip(self, cell), fields(cell = cell.id()))]
    pub async fn open_for_cell(&self, cell: &Element) -> Result<bool, TimecardError> {
        let Some(_ticket) = self.guard.scoped() else {
            debug!("comment trigger already in progress");
            return Ok(false);
        };
        self.open(Some(cell)).await
    }

    async fn focused_div(&self) -> Result<Option<Element>, TimecardError> {
        let page = self.selectors.page();
        let Some(active) = page.active_element().await? else {
            return Ok(None);
        };
        let mut focused = Element::new(page.clone(), active);
        if focused.tag_name().await? != "DIV" {
            match focused.parent().await? {
                Some(parent) => focused = parent,
                None => return Ok(None),
            }
        }
        if focused.tag_name().await? != "DIV" {
            return Ok(None);
        }
        Ok(Some(focused))
    }

    /// Context-menu on the target, click the comment option, wait for the
    /// panel and focus its textarea. True when the textarea got focus.
    async fn open(&self, target: Option<&Element>) -> Result<bool, TimecardError> {
        let target = match target {
            Some(cell) => cell.clone(),
            None => match self.focused_div().await? {
                Some(div) => div,
                None => {
                    debug!("no focused grid cell to comment on");
                    return Ok(false);
                }
            },
        };

        // Hosts that draw their own menu cancel the event; only the menu
        // item appearing counts.
        target.fire(&SyntheticEvent::ContextMenu).await;

        let selectors = &self.selectors;
        let option = self
            .timings
            .comment_option
            .until(|| async move { selectors.query(Target::CommentOption).await.ok().flatten() })
            .await;
        let Some(option) = option else {
            debug!("comment option never appeared");
            return Ok(false);
        };
        option.try_click().await;

        match self.wait_for_textarea().await {
            Some(textarea) => {
                textarea.try_focus().await;
                Ok(true)
            }
            None => {
                debug!("comment panel never appeared");
                Ok(false)
            }
        }
    }

    async fn wait_for_textarea(&self) -> Option<Element> {
        let selectors = &self.selectors;
        self.timings
            .comment_panel
            .until(|| async move {
                let view = selectors.query(Target::CommentView).await.ok().flatten()?;
                selectors
                    .query_within(&view, Target::CommentTextarea)
                    .await
                    .ok()
                    .flatten()
            })
            .await
    }

    async fn fill(textarea: &Element, text: &str) -> Result<(), TimecardError> {
        textarea.try_focus().await;
        textarea.set_value(text).await?;
        textarea
            .fire(&SyntheticEvent::Input {
                data: Some(text.to_string()),
            })
            .await;
        textarea.fire(&SyntheticEvent::Change).await;
        Ok(())
    }

    /// Write `text` into the open panel's textarea, waiting for it to mount.
    /// False when the panel never showed up.
    #[instrument(level = "debug", skip(self))]
    pub async fn populate(&self, text: &str) -> Result<bool, TimecardError> {
        let Some(textarea) = self.wait_for_textarea().await else {
            return Ok(false);
        };
        Self::fill(&textarea, text).await?;
        Ok(true)
    }

    /// Put a template into the panel if one is open right now.
    pub async fn use_template(&self, content: &str) -> Result<bool, TimecardError> {
        let Some(view) = self.selectors.query(Target::CommentView).await? else {
            return Ok(false);
        };
        match self
            .selectors
            .query_within(&view, Target::CommentTextarea)
            .await?
        {
            Some(textarea) => {
                Self::fill(&textarea, content).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Click the panel's Save button.
    pub async fn save(&self) -> Result<bool, TimecardError> {
        let Some(view) = self.selectors.query(Target::CommentView).await? else {
            return Ok(false);
        };
        match self.selectors.query_within(&view, Target::SaveButton).await? {
            Some(button) => {
                button.try_click().await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
