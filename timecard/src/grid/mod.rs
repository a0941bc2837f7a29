//! Locating cells in the Oracle JET timecard grid.
//!
//! The grid is virtualized: cells are absolutely positioned and DOM order says
//! nothing about visual order. A date's column is found through its header's
//! `left` style, compared as an opaque string, and rows are recovered by
//! sorting on `top`.

pub mod editor;
pub mod insertion;

use crate::errors::TimecardError;
use crate::page::{Element, HostPage};
use crate::selector::{Selectors, Target};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, trace};

pub use editor::EditorHost;
pub use insertion::{GridEngine, InsertionOutcome, InsertionTask, CELL_NOT_FOUND};

/// Column header text for `date`: `{Www},{Mmm} {DD}` from the UTC fields,
/// e.g. `Wed,Dec 03`.
pub fn header_label(date: &DateTime<Utc>) -> String {
    date.format("%a,%b %d").to_string()
}

/// Parse an ISO-8601 timestamp (or bare `YYYY-MM-DD`) as UTC.
pub fn parse_date(iso: &str) -> Option<DateTime<Utc>> {
    let iso = iso.trim();
    DateTime::parse_from_rfc3339(iso)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(iso, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

/// [`header_label`] of an ISO string; `None` when it does not parse.
pub fn header_label_for(iso: &str) -> Option<String> {
    parse_date(iso).map(|d| header_label(&d))
}

/// Leading float of a CSS length (`"30.5px"` → 30.5); 0 when absent or
/// unparsable.
pub fn parse_offset(value: &str) -> f64 {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && matches!(c, '-' | '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0.0)
}

/// Stable sort of `(top, item)` pairs by parsed `top`.
pub fn order_by_top<T>(mut cells: Vec<(String, T)>) -> Vec<T> {
    cells.sort_by(|(a, _), (b, _)| parse_offset(a).total_cmp(&parse_offset(b)));
    cells.into_iter().map(|(_, cell)| cell).collect()
}

/// A cell is free when its text is blank and its inline input, if any, holds
/// nothing. A stale text node can sit next to a live input, so both count.
pub fn is_empty_cell(text: &str, input_value: Option<&str>) -> bool {
    text.trim().is_empty() && input_value.unwrap_or_default().is_empty()
}

/// Whether a cell shows `value`, either as text or in its inline input.
pub fn cell_shows(text: &str, input_value: Option<&str>, value: &str) -> bool {
    let value = value.trim();
    text.trim() == value || input_value.unwrap_or_default().trim() == value
}

/// Read-only queries over the grid.
#[derive(Clone)]
pub struct GridLocator {
    selectors: Selectors,
}

impl GridLocator {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self {
            selectors: Selectors::new(page),
        }
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    pub async fn data_body(&self) -> Result<Option<Element>, TimecardError> {
        self.selectors.query(Target::GridDataBody).await
    }

    /// The `left` style of the header showing `label`.
    pub async fn column_key(&self, label: &str) -> Result<Option<String>, TimecardError> {
        let Some(header) = self.selectors.query(Target::GridColumnHeader).await? else {
            debug!("grid column header not mounted");
            return Ok(None);
        };
        for cell in self
            .selectors
            .query_all_within(&header, Target::GridHeaderCell)
            .await?
        {
            if cell.text().await?.trim() == label {
                return Ok(Some(cell.style("left").await?));
            }
        }
        trace!(label, "no header for date");
        Ok(None)
    }

    /// Body cells whose `left` equals `key` exactly, in row order.
    pub async fn column_cells(&self, key: &str) -> Result<Vec<Element>, TimecardError> {
        let Some(body) = self.data_body().await? else {
            return Ok(Vec::new());
        };
        let mut column = Vec::new();
        for cell in self
            .selectors
            .query_all_within(&body, Target::GridCell)
            .await?
        {
            if cell.style("left").await? == key {
                column.push((cell.style("top").await?, cell));
            }
        }
        Ok(order_by_top(column))
    }

    async fn input_value(&self, cell: &Element) -> Result<Option<String>, TimecardError> {
        match self.selectors.query_within(cell, Target::Input).await? {
            Some(input) => Ok(Some(input.value().await?.unwrap_or_default())),
            None => Ok(None),
        }
    }

    pub async fn is_empty(&self, cell: &Element) -> Result<bool, TimecardError> {
        let text = cell.text().await?;
        let input = self.input_value(cell).await?;
        Ok(is_empty_cell(&text, input.as_deref()))
    }

    /// First free cell in the column of `iso_date`. `None` when the date is
    /// not in view or its column is full, both normal outcomes.
    pub async fn first_empty_cell(&self, iso_date: &str) -> Result<Option<Element>, TimecardError> {
        let Some(label) = header_label_for(iso_date) else {
            debug!(iso_date, "unparsable task date");
            return Ok(None);
        };
        let Some(key) = self.column_key(&label).await? else {
            return Ok(None);
        };
        for cell in self.column_cells(&key).await? {
            if self.is_empty(&cell).await? {
                debug!(label, key, cell = cell.id(), "found empty cell");
                return Ok(Some(cell));
            }
        }
        debug!(label, key, "column full");
        Ok(None)
    }

    /// Re-scan for `value`: the date's column when it is still in view,
    /// every body cell otherwise.
    pub async fn column_shows(&self, iso_date: &str, value: &str) -> Result<bool, TimecardError> {
        let key = match header_label_for(iso_date) {
            Some(label) => self.column_key(&label).await?,
            None => None,
        };
        let cells = match key {
            Some(key) => self.column_cells(&key).await?,
            None => match self.data_body().await? {
                Some(body) => {
                    self.selectors
                        .query_all_within(&body, Target::GridCell)
                        .await?
                }
                None => Vec::new(),
            },
        };
        for cell in cells {
            let text = cell.text().await?;
            let input = self.input_value(&cell).await?;
            if cell_shows(&text, input.as_deref(), value) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_label_uses_utc_fields() {
        assert_eq!(
            header_label_for("2025-12-03T18:16:38.757Z").as_deref(),
            Some("Wed,Dec 03")
        );
        // 23:30 at -05:00 is already Thursday in UTC.
        assert_eq!(
            header_label_for("2025-12-03T23:30:00-05:00").as_deref(),
            Some("Thu,Dec 04")
        );
        assert_eq!(header_label_for("2025-01-05").as_deref(), Some("Sun,Jan 05"));
        assert_eq!(header_label_for("not a date"), None);
    }

    #[test]
    fn emptiness_needs_blank_text_and_input() {
        assert!(is_empty_cell("", None));
        assert!(is_empty_cell("  \n ", None));
        assert!(is_empty_cell("", Some("")));
        assert!(!is_empty_cell("", Some("8")));
        assert!(!is_empty_cell("8", None));
    }

    #[test]
    fn offsets_parse_like_css_lengths() {
        assert_eq!(parse_offset("30px"), 30.0);
        assert_eq!(parse_offset("30.5px"), 30.5);
        assert_eq!(parse_offset(""), 0.0);
        assert_eq!(parse_offset("auto"), 0.0);
        assert_eq!(parse_offset("-4px"), -4.0);
    }

    #[test]
    fn row_order_is_recovered_from_top() {
        let scrambled = vec![
            ("60px".to_string(), "c"),
            ("".to_string(), "a"),
            ("30px".to_string(), "b"),
            ("30.0px".to_string(), "b2"),
        ];
        assert_eq!(order_by_top(scrambled), vec!["a", "b", "b2", "c"]);
    }

    #[test]
    fn shown_value_is_trimmed() {
        assert!(cell_shows(" 8 ", None, "8"));
        assert!(cell_shows("", Some("2.5 "), "2.5"));
        assert!(!cell_shows("1", Some("2"), "8"));
    }
}
