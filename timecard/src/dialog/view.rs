//! Markup of our two dialogs, rendered with minijinja from plain view models.

use super::sort::{SortColumn, SortState};
use crate::errors::TimecardError;
use crate::grid::parse_date;
use crate::templates::Template;
use crate::tracker::WorkItem;
use minijinja::Environment;
use serde::Serialize;

const DEVOPS_TEMPLATE: &str = "devops_dialog.html";
const TEMPLATES_TEMPLATE: &str = "templates_dialog.html";

/// Which panel of the task dialog is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogTab {
    #[default]
    Tasks,
    Settings,
}

impl DialogTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogTab::Tasks => "tasks",
            DialogTab::Settings => "settings",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DialogTab::Tasks => "Tasks",
            DialogTab::Settings => "Settings",
        }
    }
}

#[derive(Debug, Serialize)]
struct TabView {
    name: &'static str,
    label: &'static str,
    active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingView {
    pub column: &'static str,
    pub label: String,
}

/// One rendered result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub id: u64,
    pub title: String,
    pub date: String,
    pub status: String,
    pub estimate: String,
    /// Alternate background; flips whenever the display date changes.
    pub banded: bool,
}

/// Everything the task dialog template needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDialogView {
    pub tab: DialogTab,
    pub start_date: String,
    pub end_date: String,
    pub username: String,
    pub org_url: String,
    pub project: String,
    pub api_version: String,
    pub has_token: bool,
    /// Names of the settings a search still needs.
    pub missing: Vec<&'static str>,
    pub searching: bool,
    pub sort: SortState,
    pub items: Vec<WorkItem>,
}

impl TaskDialogView {
    pub fn search_enabled(&self) -> bool {
        self.missing.is_empty() && !self.searching
    }

    /// Tooltip of the search button.
    pub fn search_title(&self) -> String {
        if self.missing.is_empty() {
            "Search tasks".to_string()
        } else {
            format!("Missing: {}", self.missing.join(", "))
        }
    }

    pub fn headings(&self) -> Vec<HeadingView> {
        SortColumn::ALL
            .iter()
            .map(|column| HeadingView {
                column: column.as_str(),
                label: format!("{}{}", column.heading(), self.sort.indicator(*column)),
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<RowView> {
        let mut banded = false;
        let mut last_date: Option<String> = None;
        self.sort
            .apply(&self.items)
            .into_iter()
            .map(|item| {
                let date = display_date(&item.changed_date);
                if last_date.as_deref() != Some(date.as_str()) {
                    banded = !banded;
                    last_date = Some(date.clone());
                }
                RowView {
                    id: item.id,
                    estimate: display_estimate(item.original_estimate),
                    title: item.title,
                    status: item.state,
                    date,
                    banded,
                }
            })
            .collect()
    }
}

/// `M/D/YYYY` of the UTC date; the raw string when it does not parse.
pub fn display_date(iso: &str) -> String {
    match parse_date(iso) {
        Some(date) => date.format("%-m/%-d/%Y").to_string(),
        None => iso.to_string(),
    }
}

/// The estimate, or `-` when absent or zero.
pub fn display_estimate(estimate: Option<f64>) -> String {
    match estimate {
        Some(e) if e != 0.0 => e.to_string(),
        _ => "-".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorView {
    pub heading: &'static str,
    pub title: String,
    pub content: String,
}

/// Compiled templates for both dialogs.
pub struct DialogRenderer {
    env: Environment<'static>,
}

impl DialogRenderer {
    pub fn new() -> Result<Self, TimecardError> {
        let mut env = Environment::new();
        env.add_template(DEVOPS_TEMPLATE, include_str!("templates/devops_dialog.html"))?;
        env.add_template(
            TEMPLATES_TEMPLATE,
            include_str!("templates/templates_dialog.html"),
        )?;
        Ok(Self { env })
    }

    pub fn task_dialog(&self, view: &TaskDialogView) -> Result<String, TimecardError> {
        let tabs: Vec<TabView> = [DialogTab::Tasks, DialogTab::Settings]
            .into_iter()
            .map(|tab| TabView {
                name: tab.as_str(),
                label: tab.label(),
                active: tab == view.tab,
            })
            .collect();
        let search_label = if view.searching { "Searching..." } else { "Search" };
        let html = self.env.get_template(DEVOPS_TEMPLATE)?.render(minijinja::context! {
            tabs => tabs,
            active_tab => view.tab.as_str(),
            start_date => view.start_date,
            end_date => view.end_date,
            search_enabled => view.search_enabled(),
            search_title => view.search_title(),
            search_label => search_label,
            headings => view.headings(),
            rows => view.rows(),
            username => view.username,
            org_url => view.org_url,
            project => view.project,
            api_version => view.api_version,
            has_token => view.has_token,
        })?;
        Ok(html)
    }

    pub fn templates_dialog(
        &self,
        templates: &[Template],
        editor: Option<&EditorView>,
    ) -> Result<String, TimecardError> {
        let html = self.env.get_template(TEMPLATES_TEMPLATE)?.render(minijinja::context! {
            templates => templates,
            editor => editor,
        })?;
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, title: &str, date: &str, estimate: Option<f64>) -> WorkItem {
        WorkItem {
            id,
            title: title.into(),
            changed_date: date.into(),
            state: "Active".into(),
            original_estimate: estimate,
        }
    }

    fn view(items: Vec<WorkItem>) -> TaskDialogView {
        TaskDialogView {
            items,
            ..Default::default()
        }
    }

    #[test]
    fn dates_and_estimates_for_display() {
        assert_eq!(display_date("2025-12-03T18:16:38.757Z"), "12/3/2025");
        assert_eq!(display_date("garbage"), "garbage");
        assert_eq!(display_estimate(Some(2.5)), "2.5");
        assert_eq!(display_estimate(Some(0.0)), "-");
        assert_eq!(display_estimate(None), "-");
    }

    #[test]
    fn banding_flips_on_date_change() {
        let rows = view(vec![
            item(1, "a", "2025-12-03T10:00:00Z", None),
            item(2, "b", "2025-12-03T09:00:00Z", None),
            item(3, "c", "2025-12-02T09:00:00Z", None),
            item(4, "d", "2025-12-01T09:00:00Z", None),
        ])
        .rows();
        let banded: Vec<bool> = rows.iter().map(|r| r.banded).collect();
        assert_eq!(banded, vec![true, true, false, true]);
    }

    #[test]
    fn search_button_reports_missing_settings() {
        let mut v = view(Vec::new());
        v.missing = vec!["Token", "Project"];
        assert!(!v.search_enabled());
        assert_eq!(v.search_title(), "Missing: Token, Project");
        v.missing.clear();
        v.searching = true;
        assert!(!v.search_enabled());
    }

    #[test]
    fn task_dialog_markup() {
        let renderer = DialogRenderer::new().unwrap();
        let mut v = view(vec![item(4521, "Fix <login>", "2025-12-03T18:16:38Z", Some(8.0))]);
        v.searching = true;
        let html = renderer.task_dialog(&v).unwrap();
        assert!(html.contains("Azure DevOps Tasks"));
        assert!(html.contains("Changed Date ↓"));
        assert!(html.contains("data-id=\"4521\""));
        assert!(html.contains("Fix &lt;login&gt;"));
        assert!(html.contains("class=\"task-row-alt\""));
        assert!(html.contains("Searching..."));
        assert!(html.contains(" disabled"));
        assert!(html.contains("data-content=\"settings\" style=\"display: none;\""));
    }

    #[test]
    fn templates_dialog_markup() {
        let renderer = DialogRenderer::new().unwrap();
        let templates = vec![Template {
            title: "Standup".into(),
            content: "Daily sync".into(),
        }];
        let html = renderer.templates_dialog(&templates, None).unwrap();
        assert!(html.contains("Standup"));
        assert!(html.contains("data-index=\"0\""));
        assert!(html.contains("emptyState"));

        let editor = EditorView {
            heading: "Edit Template",
            title: "Standup".into(),
            content: "Daily sync".into(),
        };
        let html = renderer.templates_dialog(&templates, Some(&editor)).unwrap();
        assert!(html.contains("Edit Template"));
        assert!(html.contains(">Daily sync</textarea>"));
    }
}
