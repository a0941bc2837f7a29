#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use timecard::config::encode_token;
use timecard::storage::keys;
use timecard::{KeyValueStore, MemoryStore, Poll, Timings};

pub const PROJECT: &str = "Payroll";

/// Log to the test writer; `RUST_LOG=timecard=debug` shows the flow.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

pub struct TrackerStub {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
    _server: Arc<tiny_http::Server>,
}

impl TrackerStub {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// Azure DevOps stand-in: answers WIQL with `ids` and the batch endpoint with
/// `details`, or everything with `status` when it is not 200.
pub fn start_tracker(status: u16, ids: &[u64], details: serde_json::Value) -> TrackerStub {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let server_arc = Arc::new(server);
    let server_clone = server_arc.clone();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let wiql = serde_json::json!({
        "workItems": ids.iter().map(|id| serde_json::json!({ "id": id })).collect::<Vec<_>>()
    });
    let details = serde_json::json!({
        "value": details
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|fields| serde_json::json!({ "fields": fields }))
            .collect::<Vec<_>>()
    });

    thread::spawn(move || {
        for mut request in server_clone.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let authorization = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_string());
            let url = request.url().to_string();
            recorded.lock().unwrap().push(Recorded {
                method: request.method().as_str().to_string(),
                url: url.clone(),
                authorization,
                body,
            });

            let header: tiny_http::Header = "Content-Type: application/json".parse().unwrap();
            let response = if status != 200 {
                tiny_http::Response::from_string("{\"message\":\"denied\"}").with_status_code(status)
            } else if url.contains("/wiql") {
                tiny_http::Response::from_string(wiql.to_string())
            } else {
                tiny_http::Response::from_string(details.to_string())
            };
            request.respond(response.with_header(header)).unwrap();
        }
    });

    TrackerStub {
        url: format!("http://127.0.0.1:{port}"),
        requests,
        _server: server_arc,
    }
}

/// Persisted settings pointing at `org_url`, with token and username.
pub fn configured_settings(org_url: &str) -> Arc<MemoryStore> {
    let settings = Arc::new(MemoryStore::new());
    settings.set(keys::ORG_URL, org_url).unwrap();
    settings.set(keys::PROJECT, PROJECT).unwrap();
    settings.set(keys::API_VERSION, "7.1").unwrap();
    settings.set(keys::TOKEN, &encode_token("pat-123")).unwrap();
    settings.set(keys::USERNAME, "jdoe@acme.com").unwrap();
    settings
}

/// Zero delays, but a completion poll long enough for an in-memory insertion.
pub fn test_timings(completion_attempts: u32) -> Timings {
    Timings {
        completion: Poll::new(Duration::from_millis(5), completion_attempts),
        ..Timings::immediate()
    }
}

pub fn work_item(id: u64, title: &str, date: &str, estimate: Option<f64>) -> serde_json::Value {
    let mut fields = serde_json::json!({
        "System.Id": id,
        "System.Title": title,
        "System.ChangedDate": date,
        "System.State": "Active"
    });
    if let Some(estimate) = estimate {
        fields["Microsoft.VSTS.Scheduling.OriginalEstimate"] = serde_json::json!(estimate);
    }
    fields
}
