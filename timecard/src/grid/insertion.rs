use super::editor::{commit, type_value, EditorHost};
use super::GridLocator;
use crate::comments::{CommentEngine, COMMENT_FAILED};
use crate::errors::TimecardError;
use crate::page::{Element, HostPage, SyntheticEvent};
use crate::poll::{settle, Timings};
use crate::storage::CompletionFlag;
use crate::tracker::WorkItem;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Alert shown when the cell disappeared between the comment and the value.
pub const CELL_NOT_FOUND: &str = "No se pudo encontrar la celda para insertar el valor.";

/// One "put this task into the timecard" request.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertionTask {
    pub work_item_id: u64,
    pub title: String,
    /// ISO-8601 date selecting the column.
    pub date: String,
    /// Text typed into the cell.
    pub value: String,
}

impl InsertionTask {
    pub fn from_work_item(item: &WorkItem) -> Self {
        Self {
            work_item_id: item.id,
            title: item.title.clone(),
            date: item.changed_date.clone(),
            value: item.estimate_text(),
        }
    }

    /// Comment attached to the cell, `"{id}: {title}"`.
    pub fn comment(&self) -> String {
        format!("{}: {}", self.work_item_id, self.title.replacen(':', " ", 1))
    }
}

/// How an insertion ended. Only the first two set the completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionOutcome {
    Verified,
    /// Verified after the one fallback recovery.
    Recovered,
    /// Typed and committed, but the value never showed up.
    Unverified,
    /// Date not in view, or its column is full.
    NoEmptyCell,
    CommentFailed,
    /// The cell was gone after the comment was saved.
    CellLost,
}

impl InsertionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InsertionOutcome::Verified | InsertionOutcome::Recovered)
    }
}

/// Drives a task into the grid: comment first, then the value, then a
/// re-scan to confirm it landed.
pub struct GridEngine {
    locator: GridLocator,
    comments: Arc<CommentEngine>,
    flag: CompletionFlag,
    timings: Timings,
}

impl GridEngine {
    pub fn new(
        page: Arc<dyn HostPage>,
        comments: Arc<CommentEngine>,
        flag: CompletionFlag,
        timings: Timings,
    ) -> Self {
        Self {
            locator: GridLocator::new(page),
            comments,
            flag,
            timings,
        }
    }

    pub fn locator(&self) -> &GridLocator {
        &self.locator
    }

    fn page(&self) -> &Arc<dyn HostPage> {
        self.locator.selectors().page()
    }

    async fn notify(&self, message: &str) {
        if let Err(e) = self.page().alert(message).await {
            warn!(error = %e, "alert failed");
        }
    }

    #[instrument(level = "info", skip(self, task), fields(id = task.work_item_id, date = %task.date))]
    pub async fn insert(&self, task: &InsertionTask) -> Result<InsertionOutcome, TimecardError> {
        settle(self.timings.before_insertion).await;

        let Some(cell) = self.locator.first_empty_cell(&task.date).await? else {
            warn!("No empty cell for the task date");
            return Ok(InsertionOutcome::NoEmptyCell);
        };

        if !self.comments.open_for_cell(&cell).await.unwrap_or(false) {
            debug!("comment panel did not open on the first try");
        }
        settle(self.timings.after_comment_open).await;

        let populated = match self.comments.populate(&task.comment()).await {
            Ok(done) => done,
            Err(e) => {
                debug!(error = %e, "comment population failed");
                false
            }
        };
        if !populated {
            self.notify(COMMENT_FAILED).await;
            return Ok(InsertionOutcome::CommentFailed);
        }
        if !self.comments.save().await.unwrap_or(false) {
            debug!("comment save button not found");
        }
        settle(self.timings.after_comment_save).await;

        // Saving the comment may re-render the grid.
        let Some(cell) = self.locator.first_empty_cell(&task.date).await? else {
            self.notify(CELL_NOT_FOUND).await;
            return Ok(InsertionOutcome::CellLost);
        };
        self.write_cell(&cell, task).await
    }

    /// Activate, type, commit and verify, with one recovery attempt.
    pub async fn write_cell(
        &self,
        cell: &Element,
        task: &InsertionTask,
    ) -> Result<InsertionOutcome, TimecardError> {
        cell.try_focus().await;
        cell.fire(&SyntheticEvent::DoubleClick).await;

        let host = match EditorHost::wait(self.locator.selectors(), cell, self.timings.editor_host).await {
            Some(host) => host,
            None => {
                debug!(cell = cell.id(), "no editor host, typing into the cell");
                EditorHost::fallback(cell)
            }
        };
        type_value(&host, &task.value, self.timings.keystroke).await;

        let outside = self.outside_target().await;
        commit(&host, outside.as_ref()).await;
        settle(self.timings.after_commit).await;

        if self.verify(task).await {
            self.mark_done();
            info!("Task value inserted");
            return Ok(InsertionOutcome::Verified);
        }

        self.recover(cell, outside.as_ref()).await;
        if self.verify(task).await {
            self.mark_done();
            info!("Task value inserted after recovery");
            return Ok(InsertionOutcome::Recovered);
        }

        warn!(value = %task.value, "Insertion could not be confirmed");
        Ok(InsertionOutcome::Unverified)
    }

    /// The grid body, else the document body.
    async fn outside_target(&self) -> Option<Element> {
        if let Ok(Some(body)) = self.locator.data_body().await {
            return Some(body);
        }
        match self.page().body().await {
            Ok(id) => Some(Element::new(self.page().clone(), id)),
            Err(e) => {
                debug!(error = %e, "no document body");
                None
            }
        }
    }

    async fn verify(&self, task: &InsertionTask) -> bool {
        match self.locator.column_shows(&task.date, &task.value).await {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "verification scan failed");
                false
            }
        }
    }

    async fn active(&self) -> Option<Element> {
        match self.page().active_element().await {
            Ok(Some(id)) => Some(Element::new(self.page().clone(), id)),
            _ => None,
        }
    }

    /// Blur whatever has focus, click outside, then Enter on the new focus.
    async fn recover(&self, cell: &Element, outside: Option<&Element>) {
        debug!("running insertion recovery");
        if let Some(active) = self.active().await {
            active.try_blur().await;
        }
        if let Some(outside) = outside {
            outside.try_click().await;
        }
        settle(self.timings.recovery_step).await;

        let target = self.active().await.unwrap_or_else(|| cell.clone());
        target.fire(&SyntheticEvent::enter_down()).await;
        settle(self.timings.recovery_step).await;
    }

    fn mark_done(&self) {
        if let Err(e) = self.flag.mark_done() {
            warn!(error = %e, "could not set completion flag");
        }
    }
}
