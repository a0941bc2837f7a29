use crate::grid::parse_date;
use crate::tracker::WorkItem;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    Title,
    Date,
    Status,
    Estimate,
}

impl SortColumn {
    pub const ALL: [SortColumn; 5] = [
        SortColumn::Id,
        SortColumn::Title,
        SortColumn::Date,
        SortColumn::Status,
        SortColumn::Estimate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Title => "title",
            SortColumn::Date => "date",
            SortColumn::Status => "status",
            SortColumn::Estimate => "estimate",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            SortColumn::Id => "Task ID",
            SortColumn::Title => "Title",
            SortColumn::Date => "Changed Date",
            SortColumn::Status => "Status",
            SortColumn::Estimate => "Original Estimate",
        }
    }

    /// Ascending comparison of two items on this column.
    pub fn compare(&self, a: &WorkItem, b: &WorkItem) -> Ordering {
        match self {
            SortColumn::Id => a.id.cmp(&b.id),
            SortColumn::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortColumn::Date => parse_date(&a.changed_date).cmp(&parse_date(&b.changed_date)),
            SortColumn::Status => a.state.to_lowercase().cmp(&b.state.to_lowercase()),
            SortColumn::Estimate => a
                .original_estimate
                .unwrap_or(0.0)
                .total_cmp(&b.original_estimate.unwrap_or(0.0)),
        }
    }
}

/// Column and direction of the results table. Newest first by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: SortColumn,
    pub ascending: bool,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            column: SortColumn::Date,
            ascending: false,
        }
    }
}

impl SortState {
    /// Header click: the same column flips direction, another column starts
    /// ascending.
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == column {
            self.ascending = !self.ascending;
        } else {
            self.column = column;
            self.ascending = true;
        }
    }

    /// Stable sort; descending reverses the comparator, so ties keep their
    /// cached order either way.
    pub fn apply(&self, items: &[WorkItem]) -> Vec<WorkItem> {
        let mut sorted = items.to_vec();
        sorted.sort_by(|a, b| {
            let order = self.column.compare(a, b);
            if self.ascending {
                order
            } else {
                order.reverse()
            }
        });
        sorted
    }

    /// `" ↑"` / `" ↓"` for the sorted column, empty for the others.
    pub fn indicator(&self, column: SortColumn) -> &'static str {
        match (self.column == column, self.ascending) {
            (false, _) => "",
            (true, true) => " ↑",
            (true, false) => " ↓",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, title: &str, date: &str, state: &str, estimate: Option<f64>) -> WorkItem {
        WorkItem {
            id,
            title: title.into(),
            changed_date: date.into(),
            state: state.into(),
            original_estimate: estimate,
        }
    }

    fn ids(items: &[WorkItem]) -> Vec<u64> {
        items.iter().map(|i| i.id).collect()
    }

    fn sample() -> Vec<WorkItem> {
        vec![
            item(30, "beta", "2025-12-02T10:00:00Z", "Active", Some(2.0)),
            item(4, "Alpha", "2025-12-03T09:00:00Z", "closed", None),
            item(12, "gamma", "2025-12-01T08:00:00Z", "New", Some(2.0)),
            item(7, "delta", "2025-12-03T11:00:00Z", "active", Some(0.5)),
        ]
    }

    #[test]
    fn default_is_newest_first() {
        assert_eq!(ids(&SortState::default().apply(&sample())), vec![7, 4, 30, 12]);
    }

    #[test]
    fn estimate_toggle_keeps_ties_stable() {
        let mut state = SortState::default();
        state.toggle(SortColumn::Estimate);
        assert!(state.ascending);
        // None counts as 0; 30 and 12 tie at 2.0 and keep cache order.
        assert_eq!(ids(&state.apply(&sample())), vec![4, 7, 30, 12]);

        state.toggle(SortColumn::Estimate);
        assert!(!state.ascending);
        assert_eq!(ids(&state.apply(&sample())), vec![30, 12, 7, 4]);
    }

    #[test]
    fn ids_sort_numerically_and_text_ignores_case() {
        let mut state = SortState::default();
        state.toggle(SortColumn::Id);
        assert_eq!(ids(&state.apply(&sample())), vec![4, 7, 12, 30]);
        state.toggle(SortColumn::Title);
        assert_eq!(ids(&state.apply(&sample())), vec![4, 30, 7, 12]);
        state.toggle(SortColumn::Status);
        assert_eq!(ids(&state.apply(&sample())), vec![30, 7, 4, 12]);
    }

    #[test]
    fn indicator_marks_sorted_column_only() {
        let state = SortState::default();
        assert_eq!(state.indicator(SortColumn::Date), " ↓");
        assert_eq!(state.indicator(SortColumn::Id), "");
    }
}
