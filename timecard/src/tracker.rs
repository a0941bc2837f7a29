//! Azure DevOps work-item client: WIQL id search plus batch detail fetch.
//!
//! One attempt per call, no retry. A missing token is reported before any
//! request goes out; a non-2xx answer is a [`TrackerError::Status`]; transport
//! and decode failures are logged and turn into an empty result so the dialog
//! degrades to "no tasks found".

use crate::config::{decode_token, TrackerSettings};
use crate::errors::TrackerError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

const FIELD_ID: &str = "System.Id";
const FIELD_TITLE: &str = "System.Title";
const FIELD_CHANGED_DATE: &str = "System.ChangedDate";
const FIELD_STATE: &str = "System.State";
const FIELD_ORIGINAL_ESTIMATE: &str = "Microsoft.VSTS.Scheduling.OriginalEstimate";

/// A task as returned by the tracker. Never mutated, only replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "System.Id")]
    pub id: u64,
    #[serde(rename = "System.Title", default)]
    pub title: String,
    /// ISO-8601 timestamp, UTC.
    #[serde(rename = "System.ChangedDate", default)]
    pub changed_date: String,
    #[serde(rename = "System.State", default)]
    pub state: String,
    #[serde(
        rename = "Microsoft.VSTS.Scheduling.OriginalEstimate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_estimate: Option<f64>,
}

impl WorkItem {
    /// `"{id}: {title}"` with the first colon of the title turned into a space.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.id, self.title.replacen(':', " ", 1))
    }

    /// The estimate as the text typed into the grid; empty when unset.
    pub fn estimate_text(&self) -> String {
        self.original_estimate
            .map(|e| e.to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct WiqlRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WorkItemRef>,
}

#[derive(Debug, Deserialize)]
struct WorkItemRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    value: Vec<RawWorkItem>,
}

#[derive(Debug, Deserialize)]
struct RawWorkItem {
    fields: WorkItem,
}

/// Builds the WIQL query for tasks of `project` changed by `username` in
/// `[start, end]`.
pub fn task_query(project: &str, start: &str, end: &str, username: &str) -> String {
    format!(
        "SELECT [{FIELD_ID}] FROM workitems WHERE [System.WorkItemType] = 'Task' \
         AND [System.TeamProject] = '{project}' \
         AND [{FIELD_CHANGED_DATE}] >= '{start}' \
         AND [{FIELD_CHANGED_DATE}] <= '{end}' \
         AND [System.ChangedBy] = '{username}'"
    )
}

/// HTTP client bound to one set of connection settings.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    settings: TrackerSettings,
    client: reqwest::Client,
}

impl TrackerClient {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    fn base_url(&self) -> String {
        format!(
            "{}/{}/_apis/wit",
            self.settings.org_url.trim_end_matches('/'),
            self.settings.project
        )
    }

    /// The bare secret from the stored token.
    pub fn bearer_token(&self) -> Result<String, TrackerError> {
        let encoded = self
            .settings
            .encoded_token
            .as_deref()
            .ok_or(TrackerError::MissingToken)?;
        decode_token(encoded).map_err(|e| TrackerError::InvalidToken(e.to_string()))
    }

    /// Ids of tasks changed by `username` between `start` and `end`.
    #[instrument(level = "debug", skip(self))]
    pub async fn search_ids(
        &self,
        start: &str,
        end: &str,
        username: &str,
    ) -> Result<Vec<u64>, TrackerError> {
        let token = self.bearer_token()?;
        let url = format!(
            "{}/wiql?api-version={}",
            self.base_url(),
            self.settings.api_version
        );
        let body = WiqlRequest {
            query: task_query(&self.settings.project, start, end, username),
        };

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Error fetching task IDs: {}", e);
                return Ok(Vec::new());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "API Error Response: {}", text);
            return Err(TrackerError::Status {
                context: "WIQL",
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        match response.json::<WiqlResponse>().await {
            Ok(data) => {
                let ids: Vec<u64> = data.work_items.into_iter().map(|w| w.id).collect();
                debug!("WIQL returned {} ids", ids.len());
                Ok(ids)
            }
            Err(e) => {
                error!("Error decoding WIQL response: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Details for `ids`, in the order the tracker returns them. No request is
    /// made for an empty id list.
    #[instrument(level = "debug", skip(self, ids), fields(count = ids.len()))]
    pub async fn fetch_details(&self, ids: &[u64]) -> Result<Vec<WorkItem>, TrackerError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let token = self.bearer_token()?;
        let ids = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let fields = [
            FIELD_ID,
            FIELD_TITLE,
            FIELD_CHANGED_DATE,
            FIELD_STATE,
            FIELD_ORIGINAL_ESTIMATE,
        ]
        .join(",");
        let url = format!(
            "{}/workitems?ids={ids}&fields={fields}&api-version={}",
            self.base_url(),
            self.settings.api_version
        );

        let response = match self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Error fetching details: {}", e);
                return Ok(Vec::new());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Details Error Response: {}", text);
            return Err(TrackerError::Status {
                context: "Details",
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        match response.json::<DetailsResponse>().await {
            Ok(data) => Ok(data.value.into_iter().map(|raw| raw.fields).collect()),
            Err(e) => {
                warn!("Error decoding work item details: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::encode_token;

    #[test]
    fn query_embeds_project_range_and_author() {
        let q = task_query("Payroll", "2025-12-01", "2025-12-03", "jdoe@acme.com");
        assert_eq!(
            q,
            "SELECT [System.Id] FROM workitems WHERE [System.WorkItemType] = 'Task' \
             AND [System.TeamProject] = 'Payroll' \
             AND [System.ChangedDate] >= '2025-12-01' \
             AND [System.ChangedDate] <= '2025-12-03' \
             AND [System.ChangedBy] = 'jdoe@acme.com'"
        );
    }

    #[test]
    fn bearer_token_requires_stored_token() {
        let client = TrackerClient::new(TrackerSettings::default());
        assert!(matches!(
            client.bearer_token(),
            Err(TrackerError::MissingToken)
        ));

        let client = TrackerClient::new(TrackerSettings {
            encoded_token: Some(encode_token("pat-123")),
            ..Default::default()
        });
        assert_eq!(client.bearer_token().unwrap(), "pat-123");
    }

    #[test]
    fn work_item_from_fields_map() {
        let json = serde_json::json!({
            "System.Id": 4521,
            "System.Title": "Fix: login timeout",
            "System.ChangedDate": "2025-12-03T18:16:38.757Z",
            "System.State": "Active",
            "Microsoft.VSTS.Scheduling.OriginalEstimate": 2.5
        });
        let item: WorkItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.id, 4521);
        assert_eq!(item.original_estimate, Some(2.5));
        assert_eq!(item.summary(), "4521: Fix  login timeout");
        assert_eq!(item.estimate_text(), "2.5");
    }

    #[test]
    fn missing_estimate_types_nothing() {
        let item: WorkItem = serde_json::from_value(serde_json::json!({
            "System.Id": 7,
            "System.Title": "Standup"
        }))
        .unwrap();
        assert_eq!(item.original_estimate, None);
        assert_eq!(item.estimate_text(), "");
    }

    #[tokio::test]
    async fn empty_id_list_makes_no_request() {
        let client = TrackerClient::new(TrackerSettings::default());
        // No token and no server: would fail if a request were attempted.
        assert!(client.fetch_details(&[]).await.unwrap().is_empty());
    }
}
