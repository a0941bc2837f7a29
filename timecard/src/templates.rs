//! Comment templates: a persisted list of snippets and the dialog to manage
//! them.

use crate::comments::CommentEngine;
use crate::dialog::view::{DialogRenderer, EditorView};
use crate::errors::TimecardError;
use crate::page::{Element, ElementSpec, HostPage};
use crate::selector::{Selectors, Target};
use crate::storage::{keys, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const FILL_BOTH: &str = "Please fill both title and content.";

const DIALOG_CLASS: &str = "templates-dialog";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub title: String,
    pub content: String,
}

/// The template list under `comment_templates`. Every mutation rewrites the
/// whole list.
#[derive(Clone)]
pub struct TemplateStore {
    store: Arc<dyn KeyValueStore>,
}

impl TemplateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<Template> {
        let Some(raw) = self.store.get(keys::TEMPLATES) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "stored templates are not valid JSON");
            Vec::new()
        })
    }

    fn write(&self, templates: &[Template]) -> Result<(), TimecardError> {
        self.store
            .set(keys::TEMPLATES, &serde_json::to_string(templates)?)
    }

    pub fn get(&self, index: usize) -> Option<Template> {
        self.list().into_iter().nth(index)
    }

    /// Insert a new template, or replace the one at `index`. Title and content
    /// are trimmed and must not be empty.
    pub fn save(
        &self,
        index: Option<usize>,
        title: &str,
        content: &str,
    ) -> Result<Vec<Template>, TimecardError> {
        let (title, content) = (title.trim(), content.trim());
        if title.is_empty() || content.is_empty() {
            return Err(TimecardError::InvalidArgument(
                "template title and content are required".into(),
            ));
        }
        let template = Template {
            title: title.to_string(),
            content: content.to_string(),
        };
        let mut templates = self.list();
        match index {
            Some(i) if i < templates.len() => templates[i] = template,
            Some(i) => {
                return Err(TimecardError::InvalidArgument(format!(
                    "no template at index {i}"
                )))
            }
            None => templates.push(template),
        }
        self.write(&templates)?;
        Ok(templates)
    }

    /// Remove the template at `index`; out of range is a no-op.
    pub fn delete(&self, index: usize) -> Result<Vec<Template>, TimecardError> {
        let mut templates = self.list();
        if index < templates.len() {
            templates.remove(index);
            self.write(&templates)?;
        }
        Ok(templates)
    }
}

#[derive(Debug, Default)]
struct EditorState {
    open: bool,
    index: Option<usize>,
}

/// The templates dialog. Single instance, like the task dialog.
pub struct TemplatesDialog {
    selectors: Selectors,
    renderer: DialogRenderer,
    templates: TemplateStore,
    comments: Arc<CommentEngine>,
    editor: Mutex<EditorState>,
}

impl TemplatesDialog {
    pub fn new(
        page: Arc<dyn HostPage>,
        templates: TemplateStore,
        comments: Arc<CommentEngine>,
    ) -> Result<Self, TimecardError> {
        Ok(Self {
            selectors: Selectors::new(page),
            renderer: DialogRenderer::new()?,
            templates,
            comments,
            editor: Mutex::new(EditorState::default()),
        })
    }

    fn editor(&self) -> MutexGuard<'_, EditorState> {
        self.editor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn store(&self) -> &TemplateStore {
        &self.templates
    }

    fn page(&self) -> &Arc<dyn HostPage> {
        self.selectors.page()
    }

    async fn existing(&self) -> Result<Option<Element>, TimecardError> {
        self.selectors.query(Target::TemplatesDialog).await
    }

    async fn element(&self) -> Result<Element, TimecardError> {
        if let Some(dialog) = self.existing().await? {
            return Ok(dialog);
        }
        let body = Element::new(self.page().clone(), self.page().body().await?);
        let class = Target::TemplatesDialog.marker_class().unwrap_or(DIALOG_CLASS);
        body.insert_child(None, &ElementSpec::new("dialog").class(class))
            .await
    }

    fn editor_view(&self, templates: &[Template]) -> Option<EditorView> {
        let state = self.editor();
        if !state.open {
            return None;
        }
        Some(match state.index.and_then(|i| templates.get(i)) {
            Some(t) => EditorView {
                heading: "Edit Template",
                title: t.title.clone(),
                content: t.content.clone(),
            },
            None => EditorView {
                heading: "New Template",
                title: String::new(),
                content: String::new(),
            },
        })
    }

    pub async fn render(&self) -> Result<(), TimecardError> {
        let Some(dialog) = self.existing().await? else {
            return Ok(());
        };
        let templates = self.templates.list();
        let editor = self.editor_view(&templates);
        let html = self.renderer.templates_dialog(&templates, editor.as_ref())?;
        self.page().set_inner_html(dialog.id(), &html).await
    }

    pub async fn open(&self) -> Result<(), TimecardError> {
        *self.editor() = EditorState::default();
        let dialog = self.element().await?;
        self.render().await?;
        self.page().show_modal(dialog.id()).await?;
        debug!("templates dialog opened");
        Ok(())
    }

    pub async fn close(&self) -> Result<(), TimecardError> {
        if let Some(dialog) = self.existing().await? {
            self.page().close_modal(dialog.id()).await?;
        }
        Ok(())
    }

    pub async fn new_template(&self) -> Result<(), TimecardError> {
        *self.editor() = EditorState {
            open: true,
            index: None,
        };
        self.render().await
    }

    pub async fn edit(&self, index: usize) -> Result<(), TimecardError> {
        *self.editor() = EditorState {
            open: true,
            index: Some(index),
        };
        self.render().await
    }

    pub async fn cancel(&self) -> Result<(), TimecardError> {
        *self.editor() = EditorState::default();
        self.render().await
    }

    /// Save the editor's fields as a new template or over the one being
    /// edited.
    pub async fn save(&self, title: &str, content: &str) -> Result<(), TimecardError> {
        let index = self.editor().index;
        match self.templates.save(index, title, content) {
            Ok(templates) => {
                info!(count = templates.len(), "Template saved");
                *self.editor() = EditorState::default();
                self.render().await
            }
            Err(TimecardError::InvalidArgument(reason)) => {
                debug!(reason, "template rejected");
                self.page().alert(FILL_BOTH).await
            }
            Err(e) => Err(e),
        }
    }

    /// The page asks for confirmation before sending this.
    pub async fn delete(&self, index: usize) -> Result<(), TimecardError> {
        self.templates.delete(index)?;
        {
            let mut editor = self.editor();
            if editor.index == Some(index) {
                *editor = EditorState::default();
            }
        }
        self.render().await
    }

    /// Copy the template to the clipboard, close, and put it into the open
    /// comment panel.
    pub async fn use_template(&self, index: usize) -> Result<bool, TimecardError> {
        let Some(template) = self.templates.get(index) else {
            return Ok(false);
        };
        if let Err(e) = self.page().write_clipboard(&template.content).await {
            debug!(error = %e, "clipboard write failed");
        }
        self.close().await?;
        self.comments.use_template(&template.content).await
    }
}
