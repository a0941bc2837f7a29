//! The "Add from DevOps" dialog: search the tracker, browse the results and
//! hand a task over to the grid engine.

pub mod sort;
pub mod view;

use crate::config::TrackerSettings;
use crate::errors::{TimecardError, TrackerError};
use crate::grid::{GridEngine, InsertionOutcome, InsertionTask};
use crate::page::{Element, ElementSpec, HostPage};
use crate::poll::Timings;
use crate::selector::{Selectors, Target};
use crate::storage::{keys, CompletionFlag, KeyValueStore};
use crate::tracker::{TrackerClient, WorkItem};
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

pub use sort::{SortColumn, SortState};
pub use view::{DialogRenderer, DialogTab, TaskDialogView};

/// User-facing alert texts.
pub mod messages {
    pub const SELECT_DATES: &str = "Please select both start and end dates";
    pub const ENTER_USERNAME: &str = "Please enter a username";
    pub const NO_TASKS: &str = "No tasks found for the selected range.";
    pub const FETCH_FAILED: &str = "Error fetching tasks";
    pub const TASK_NOT_FOUND: &str = "Task not found in cache.";
    pub const ALL_SAVED: &str = "All tasks saved to sessionStorage (devOpsCompleteJSON)!";
    pub const NOTHING_TO_ADD: &str = "No tasks to add.";
    pub const SETTINGS_SAVED: &str = "Settings saved!";
    pub const SETTINGS_REQUIRED: &str = "Please fill all required fields";
}

const DIALOG_CLASS: &str = "devops-dialog";

#[derive(Debug, Default)]
struct DialogState {
    tab: DialogTab,
    start_date: String,
    end_date: String,
    sort: SortState,
    searching: bool,
    items: Vec<WorkItem>,
}

/// Background work started by "Add to Time Sheet".
pub struct InsertionHandles {
    pub insertion: JoinHandle<Result<InsertionOutcome, TimecardError>>,
    /// Resolves true when the completion flag was seen and the dialog
    /// reopened.
    pub completion: JoinHandle<bool>,
}

/// Single-instance task dialog controller.
pub struct TaskDialog {
    selectors: Selectors,
    renderer: DialogRenderer,
    settings: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    grid: Arc<GridEngine>,
    flag: CompletionFlag,
    timings: Timings,
    state: Mutex<DialogState>,
}

impl TaskDialog {
    pub fn new(
        page: Arc<dyn HostPage>,
        settings: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        grid: Arc<GridEngine>,
        timings: Timings,
    ) -> Result<Self, TimecardError> {
        Ok(Self {
            selectors: Selectors::new(page),
            renderer: DialogRenderer::new()?,
            flag: CompletionFlag::new(session.clone()),
            settings,
            session,
            grid,
            timings,
            state: Mutex::new(DialogState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, DialogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn page(&self) -> &Arc<dyn HostPage> {
        self.selectors.page()
    }

    async fn notify(&self, message: &str) {
        if let Err(e) = self.page().alert(message).await {
            warn!(error = %e, "alert failed");
        }
    }

    fn username(&self) -> String {
        self.settings.get(keys::USERNAME).unwrap_or_default()
    }

    /// Results of the last successful search, if any.
    pub fn cached_items(&self) -> Option<Vec<WorkItem>> {
        let raw = self.session.get(keys::TASKS_CACHE)?;
        match serde_json::from_str(&raw) {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(error = %e, "task cache is corrupt, ignoring it");
                None
            }
        }
    }

    fn cached_item(&self, id: u64) -> Option<WorkItem> {
        self.cached_items()?.into_iter().find(|item| item.id == id)
    }

    /// Snapshot of everything the markup shows.
    pub fn view(&self) -> TaskDialogView {
        let settings = TrackerSettings::load(&*self.settings);
        let username = self.username();
        let state = self.state();
        TaskDialogView {
            tab: state.tab,
            start_date: state.start_date.clone(),
            end_date: state.end_date.clone(),
            missing: settings.missing(Some(&username)),
            has_token: settings.has_token(),
            org_url: settings.org_url,
            project: settings.project,
            api_version: settings.api_version,
            username,
            searching: state.searching,
            sort: state.sort,
            items: state.items.clone(),
        }
    }

    async fn existing(&self) -> Result<Option<Element>, TimecardError> {
        self.selectors.query(Target::DevopsDialog).await
    }

    async fn element(&self) -> Result<Element, TimecardError> {
        if let Some(dialog) = self.existing().await? {
            return Ok(dialog);
        }
        let body = Element::new(self.page().clone(), self.page().body().await?);
        let class = Target::DevopsDialog.marker_class().unwrap_or(DIALOG_CLASS);
        body.insert_child(None, &ElementSpec::new("dialog").class(class))
            .await
    }

    /// Re-render the dialog if it is mounted.
    pub async fn render(&self) -> Result<(), TimecardError> {
        let Some(dialog) = self.existing().await? else {
            return Ok(());
        };
        let html = self.renderer.task_dialog(&self.view())?;
        self.page().set_inner_html(dialog.id(), &html).await
    }

    /// Yesterday and today, or the last searched range.
    fn default_range(&self) -> (String, String) {
        let remembered = (
            self.settings.get_non_empty(keys::FILTER_START_DATE),
            self.settings.get_non_empty(keys::FILTER_END_DATE),
        );
        if let (Some(start), Some(end)) = remembered {
            return (start, end);
        }
        let today = Utc::now().date_naive();
        let yesterday = today - Duration::days(1);
        (
            yesterday.format("%Y-%m-%d").to_string(),
            today.format("%Y-%m-%d").to_string(),
        )
    }

    /// Show the dialog. Cached results are shown as-is; without a cache it
    /// searches right away when configured, or lands on the settings tab
    /// when the connection is incomplete.
    #[instrument(level = "info", skip(self))]
    pub async fn open(&self) -> Result<(), TimecardError> {
        let cached = self.cached_items();
        let settings = TrackerSettings::load(&*self.settings);
        let ready = settings.missing(Some(&self.username())).is_empty();
        let (start, end) = self.default_range();

        let auto_search = {
            let mut state = self.state();
            if state.start_date.is_empty() {
                state.start_date = start;
            }
            if state.end_date.is_empty() {
                state.end_date = end;
            }
            state.searching = false;
            match &cached {
                Some(items) => {
                    state.items = items.clone();
                    None
                }
                None => {
                    state.items.clear();
                    if settings.connection_incomplete() {
                        state.tab = DialogTab::Settings;
                    }
                    ready.then(|| (state.start_date.clone(), state.end_date.clone()))
                }
            }
        };

        let dialog = self.element().await?;
        self.render().await?;
        self.page().show_modal(dialog.id()).await?;
        info!(cached = cached.is_some(), "Task dialog opened");

        if let Some((start, end)) = auto_search {
            self.search(&start, &end).await?;
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<(), TimecardError> {
        if let Some(dialog) = self.existing().await? {
            self.page().close_modal(dialog.id()).await?;
        }
        Ok(())
    }

    pub async fn switch_tab(&self, tab: DialogTab) -> Result<(), TimecardError> {
        self.state().tab = tab;
        self.render().await
    }

    async fn query_tracker(
        &self,
        start: &str,
        end: &str,
        username: &str,
    ) -> Result<Vec<WorkItem>, TrackerError> {
        let client = TrackerClient::new(TrackerSettings::load(&*self.settings));
        let ids = client.search_ids(start, end, username).await?;
        client.fetch_details(&ids).await
    }

    /// Query the tracker for `[start, end]` and show the results. A non-empty
    /// result replaces the session cache.
    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, start: &str, end: &str) -> Result<(), TimecardError> {
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            self.notify(messages::SELECT_DATES).await;
            return Ok(());
        }
        let Some(username) = self.settings.get_non_empty(keys::USERNAME) else {
            self.notify(messages::ENTER_USERNAME).await;
            return Ok(());
        };

        {
            let mut state = self.state();
            state.start_date = start.to_string();
            state.end_date = end.to_string();
            state.searching = true;
        }
        self.settings.set(keys::FILTER_START_DATE, start)?;
        self.settings.set(keys::FILTER_END_DATE, end)?;
        self.render().await?;

        let result = self.query_tracker(start, end, &username).await;
        self.state().searching = false;
        match result {
            Ok(items) if items.is_empty() => {
                self.state().items.clear();
                self.render().await?;
                self.notify(messages::NO_TASKS).await;
            }
            Ok(items) => {
                info!("Found {} tasks", items.len());
                self.session
                    .set(keys::TASKS_CACHE, &serde_json::to_string(&items)?)?;
                self.state().items = items;
                self.render().await?;
            }
            Err(TrackerError::MissingToken) => {
                self.render().await?;
                self.notify(&TrackerError::MissingToken.to_string()).await;
            }
            Err(e) => {
                error!("Error fetching tasks: {}", e);
                self.render().await?;
                self.notify(messages::FETCH_FAILED).await;
            }
        }
        Ok(())
    }

    /// Header click. Sorting works on the cached results only.
    pub async fn sort_by(&self, column: SortColumn) -> Result<(), TimecardError> {
        let Some(items) = self.cached_items() else {
            debug!("nothing cached to sort");
            return Ok(());
        };
        {
            let mut state = self.state();
            state.sort.toggle(column);
            state.items = items;
        }
        self.render().await
    }

    /// Copy `"{id}: {title}"` to the clipboard and close.
    pub async fn copy_task(&self, id: u64) -> Result<(), TimecardError> {
        let Some(item) = self.cached_item(id) else {
            self.notify(messages::TASK_NOT_FOUND).await;
            return Ok(());
        };
        self.page().write_clipboard(&item.summary()).await?;
        self.close().await
    }

    /// Stash the row, close the dialog and start both the grid insertion and
    /// the completion watch. `None` when the id is not in the cache.
    #[instrument(level = "info", skip(self))]
    pub async fn add_to_timesheet(
        self: &Arc<Self>,
        id: u64,
    ) -> Result<Option<InsertionHandles>, TimecardError> {
        let Some(item) = self.cached_item(id) else {
            self.notify(messages::TASK_NOT_FOUND).await;
            return Ok(None);
        };
        self.session
            .set(keys::ROW_JSON, &serde_json::to_string(&item)?)?;
        self.close().await?;
        self.flag.reset()?;

        let completion = self.clone().watch_completion();
        let grid = self.grid.clone();
        let task = InsertionTask::from_work_item(&item);
        let insertion = tokio::spawn(async move { grid.insert(&task).await });
        Ok(Some(InsertionHandles {
            insertion,
            completion,
        }))
    }

    /// Hand the whole cache over through the session store.
    pub async fn add_all(self: &Arc<Self>) -> Result<Option<JoinHandle<bool>>, TimecardError> {
        let raw = match (self.cached_items(), self.session.get(keys::TASKS_CACHE)) {
            (Some(items), Some(raw)) if !items.is_empty() => raw,
            _ => {
                self.notify(messages::NOTHING_TO_ADD).await;
                return Ok(None);
            }
        };
        self.session.set(keys::COMPLETE_JSON, &raw)?;
        self.notify(messages::ALL_SAVED).await;
        self.close().await?;
        self.flag.reset()?;
        Ok(Some(self.clone().watch_completion()))
    }

    /// Poll the completion flag; reopen the dialog once it flips.
    pub fn watch_completion(self: Arc<Self>) -> JoinHandle<bool> {
        tokio::spawn(async move {
            let flag = &self.flag;
            let done = self
                .timings
                .completion
                .until(|| async move { flag.is_done().then_some(()) })
                .await
                .is_some();
            if !done {
                debug!("completion flag never set, giving up");
                return false;
            }
            if let Err(e) = self.flag.clear() {
                warn!(error = %e, "could not clear completion flag");
            }
            if let Err(e) = self.open().await {
                warn!(error = %e, "could not reopen task dialog");
            }
            true
        })
    }

    pub async fn username_changed(&self, username: &str) -> Result<(), TimecardError> {
        self.settings.set(keys::USERNAME, username)?;
        self.render().await
    }

    /// Persist connection settings; a blank token keeps the stored one.
    pub async fn save_settings(
        &self,
        org_url: &str,
        project: &str,
        api_version: &str,
        token: Option<&str>,
    ) -> Result<(), TimecardError> {
        match TrackerSettings::save(&*self.settings, org_url, project, api_version, token) {
            Ok(_) => {
                info!("Tracker settings saved");
                self.notify(messages::SETTINGS_SAVED).await;
            }
            Err(TimecardError::InvalidArgument(reason)) => {
                debug!(reason, "settings rejected");
                self.notify(messages::SETTINGS_REQUIRED).await;
            }
            Err(e) => return Err(e),
        }
        self.render().await
    }
}
