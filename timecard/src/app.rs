//! Wires the engines together and routes page events to them.

use crate::comments::CommentEngine;
use crate::config::FeatureFlags;
use crate::dialog::{DialogTab, SortColumn, TaskDialog};
use crate::errors::TimecardError;
use crate::grid::GridEngine;
use crate::page::HostPage;
use crate::poll::Timings;
use crate::selector::{Selectors, Target};
use crate::shortcuts::{ChordBinding, CommandKind, KeyEvent, KeyOutcome, ShortcutEngine};
use crate::storage::{CompletionFlag, KeyValueStore};
use crate::templates::{TemplateStore, TemplatesDialog};
use crate::toolbar;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// A click (or edit) on one of our own controls, reported by the page. The
/// page builds it from the element's `data-timecard-action` name, its other
/// `data-*` attributes and the `data-field` inputs of the enclosing dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageAction {
    OpenImportDialog,
    CloseDialog,
    SwitchTab {
        tab: DialogTab,
    },
    Search {
        #[serde(default)]
        start_date: String,
        #[serde(default)]
        end_date: String,
    },
    SortBy {
        column: SortColumn,
    },
    AddToTimesheet {
        id: u64,
    },
    CopyTask {
        id: u64,
    },
    AddAll,
    UsernameChanged {
        #[serde(default)]
        username: String,
    },
    SaveSettings {
        #[serde(default)]
        org_url: String,
        #[serde(default)]
        project: String,
        #[serde(default)]
        api_version: String,
        #[serde(default)]
        token: Option<String>,
    },
    OpenTemplates,
    CloseTemplates,
    NewTemplate,
    EditTemplate {
        index: usize,
    },
    CancelTemplate,
    SaveTemplate {
        #[serde(default)]
        title: String,
        #[serde(default)]
        content: String,
    },
    DeleteTemplate {
        index: usize,
    },
    UseTemplate {
        index: usize,
    },
}

impl PageAction {
    /// The serialized tag, as written into `data-timecard-action`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageAction::OpenImportDialog => "open_import_dialog",
            PageAction::CloseDialog => "close_dialog",
            PageAction::SwitchTab { .. } => "switch_tab",
            PageAction::Search { .. } => "search",
            PageAction::SortBy { .. } => "sort_by",
            PageAction::AddToTimesheet { .. } => "add_to_timesheet",
            PageAction::CopyTask { .. } => "copy_task",
            PageAction::AddAll => "add_all",
            PageAction::UsernameChanged { .. } => "username_changed",
            PageAction::SaveSettings { .. } => "save_settings",
            PageAction::OpenTemplates => "open_templates",
            PageAction::CloseTemplates => "close_templates",
            PageAction::NewTemplate => "new_template",
            PageAction::EditTemplate { .. } => "edit_template",
            PageAction::CancelTemplate => "cancel_template",
            PageAction::SaveTemplate { .. } => "save_template",
            PageAction::DeleteTemplate { .. } => "delete_template",
            PageAction::UseTemplate { .. } => "use_template",
        }
    }
}

/// Everything the page reports.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// The page script (re)connected.
    Connected,
    KeyDown { event: KeyEvent, path: String },
    KeyUp(KeyEvent),
    /// Nodes were added somewhere in the document.
    Mutation,
    Action(PageAction),
}

/// The whole automation for one tab.
pub struct App {
    selectors: Selectors,
    shortcuts: Mutex<ShortcutEngine>,
    comments: Arc<CommentEngine>,
    grid: Arc<GridEngine>,
    dialog: Arc<TaskDialog>,
    templates: Arc<TemplatesDialog>,
    features: FeatureFlags,
    timings: Timings,
}

impl App {
    /// `settings` is the persisted store, `session` the per-run one.
    pub fn new(
        page: Arc<dyn HostPage>,
        settings: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        timings: Timings,
    ) -> Result<Self, TimecardError> {
        let features = FeatureFlags::load(&*settings);
        let comments = Arc::new(CommentEngine::new(page.clone(), timings.clone(), features));
        let grid = Arc::new(GridEngine::new(
            page.clone(),
            comments.clone(),
            CompletionFlag::new(session.clone()),
            timings.clone(),
        ));
        let dialog = Arc::new(TaskDialog::new(
            page.clone(),
            settings.clone(),
            session,
            grid.clone(),
            timings.clone(),
        )?);
        let templates = Arc::new(TemplatesDialog::new(
            page.clone(),
            TemplateStore::new(settings),
            comments.clone(),
        )?);
        info!(azure_devops = features.azure_devops, "Timecard automation ready");
        Ok(Self {
            selectors: Selectors::new(page),
            shortcuts: Mutex::new(ShortcutEngine::default()),
            comments,
            grid,
            dialog,
            templates,
            features,
            timings,
        })
    }

    fn shortcuts(&self) -> MutexGuard<'_, ShortcutEngine> {
        self.shortcuts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    pub fn comments(&self) -> &Arc<CommentEngine> {
        &self.comments
    }

    pub fn grid(&self) -> &Arc<GridEngine> {
        &self.grid
    }

    pub fn dialog(&self) -> &Arc<TaskDialog> {
        &self.dialog
    }

    pub fn templates(&self) -> &Arc<TemplatesDialog> {
        &self.templates
    }

    /// Chords the page must claim before they reach the browser.
    pub fn bindings(&self) -> Vec<ChordBinding> {
        self.shortcuts().bindings()
    }

    /// Toolbar button (when enabled) and banner removal, each polling in the
    /// background.
    pub fn spawn_page_setup(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if self.features.azure_devops {
            let app = self.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) =
                    toolbar::inject_toolbar_button(&app.selectors, app.timings.toolbar).await
                {
                    warn!(error = %e, "toolbar button injection failed");
                }
            }));
        }
        let app = self.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = toolbar::remove_banner(&app.selectors, app.timings.banner).await {
                warn!(error = %e, "banner removal failed");
            }
        }));
        tasks
    }

    /// Route one event. Key bookkeeping and mutations are handled inline;
    /// commands and dialog actions run on their own task, whose handle is
    /// returned.
    #[instrument(level = "debug", skip(self))]
    pub async fn handle(self: &Arc<Self>, event: PageEvent) -> Option<JoinHandle<()>> {
        match event {
            PageEvent::Connected => {
                self.spawn_page_setup();
                None
            }
            PageEvent::KeyDown { event, path } => {
                let outcome = self.shortcuts().key_down(&event, &path);
                match outcome {
                    KeyOutcome::Dispatch(kind) => {
                        let app = self.clone();
                        Some(tokio::spawn(async move {
                            if let Err(e) = app.run_command(kind).await {
                                warn!(command = ?kind, error = %e, "shortcut handler failed");
                            }
                        }))
                    }
                    KeyOutcome::PassThrough => None,
                }
            }
            PageEvent::KeyUp(event) => {
                self.shortcuts().key_up(&event);
                self.comments.release();
                None
            }
            PageEvent::Mutation => {
                if let Err(e) = self.comments.on_mutation().await {
                    debug!(error = %e, "comment bar injection failed");
                }
                None
            }
            PageEvent::Action(action) => {
                let app = self.clone();
                Some(tokio::spawn(async move {
                    let name = action.as_str();
                    if let Err(e) = app.run_action(action).await {
                        warn!(action = name, error = %e, "page action failed");
                    }
                }))
            }
        }
    }

    pub async fn run_command(&self, kind: CommandKind) -> Result<(), TimecardError> {
        match kind {
            CommandKind::OpenComment => {
                self.comments.open_from_shortcut().await?;
            }
            CommandKind::OpenImportDialog => {
                if self.features.azure_devops {
                    self.dialog.open().await?;
                } else {
                    debug!("Azure DevOps feature is off, ignoring shortcut");
                }
            }
            CommandKind::Save => match self.selectors.query(Target::SaveButton).await? {
                Some(button) => button.try_click().await,
                None => debug!("no Save button on the page"),
            },
        }
        Ok(())
    }

    pub async fn run_action(&self, action: PageAction) -> Result<(), TimecardError> {
        let dialog = &self.dialog;
        let templates = &self.templates;
        match action {
            PageAction::OpenImportDialog => dialog.open().await,
            PageAction::CloseDialog => dialog.close().await,
            PageAction::SwitchTab { tab } => dialog.switch_tab(tab).await,
            PageAction::Search {
                start_date,
                end_date,
            } => dialog.search(&start_date, &end_date).await,
            PageAction::SortBy { column } => dialog.sort_by(column).await,
            PageAction::AddToTimesheet { id } => dialog.add_to_timesheet(id).await.map(|_| ()),
            PageAction::CopyTask { id } => dialog.copy_task(id).await,
            PageAction::AddAll => dialog.add_all().await.map(|_| ()),
            PageAction::UsernameChanged { username } => dialog.username_changed(&username).await,
            PageAction::SaveSettings {
                org_url,
                project,
                api_version,
                token,
            } => {
                dialog
                    .save_settings(&org_url, &project, &api_version, token.as_deref())
                    .await
            }
            PageAction::OpenTemplates => templates.open().await,
            PageAction::CloseTemplates => templates.close().await,
            PageAction::NewTemplate => templates.new_template().await,
            PageAction::EditTemplate { index } => templates.edit(index).await,
            PageAction::CancelTemplate => templates.cancel().await,
            PageAction::SaveTemplate { title, content } => templates.save(&title, &content).await,
            PageAction::DeleteTemplate { index } => templates.delete(index).await,
            PageAction::UseTemplate { index } => templates.use_template(index).await.map(|_| ()),
        }
    }
}
