mod common;

use common::{configured_settings, init_tracing, start_tracker, test_timings, work_item};
use std::sync::Arc;
use timecard::dialog::messages;
use timecard::storage::{keys, CompletionFlag};
use timecard::testing::FakePage;
use timecard::{
    App, InsertionOutcome, KeyValueStore, MemoryStore, NodeId, PageAction, PageEvent, Timings,
};

struct Flow {
    page: Arc<FakePage>,
    settings: Arc<MemoryStore>,
    session: Arc<MemoryStore>,
    app: Arc<App>,
}

fn flow(org_url: &str, timings: Timings) -> Flow {
    init_tracing();
    let page = Arc::new(FakePage::default());
    let settings = configured_settings(org_url);
    settings.set(keys::FILTER_START_DATE, "2025-12-01").unwrap();
    settings.set(keys::FILTER_END_DATE, "2025-12-03").unwrap();
    let session = Arc::new(MemoryStore::new());
    let app = Arc::new(App::new(page.clone(), settings.clone(), session.clone(), timings).unwrap());
    Flow {
        page,
        settings,
        session,
        app,
    }
}

impl Flow {
    fn dialog_node(&self) -> NodeId {
        self.page.find_all(".devops-dialog")[0]
    }

    fn dialog_html(&self) -> String {
        self.page.html_of(self.dialog_node()).unwrap_or_default()
    }

    async fn act(&self, action: serde_json::Value) {
        let action: PageAction = serde_json::from_value(action).unwrap();
        self.app
            .handle(PageEvent::Action(action))
            .await
            .unwrap()
            .await
            .unwrap();
    }
}

fn two_tasks() -> serde_json::Value {
    serde_json::json!([
        work_item(4521, "Fix: login", "2025-12-03T18:16:38.757Z", Some(8.0)),
        work_item(7, "Review", "2025-12-02T09:00:00Z", None),
    ])
}

#[tokio::test]
async fn open_searches_remembered_range() {
    let stub = start_tracker(200, &[4521, 7], two_tasks());
    let f = flow(&stub.url, Timings::immediate());

    f.app.dialog().open().await.unwrap();

    assert!(f.page.is_open(f.dialog_node()));
    assert!(f.page.alerts().is_empty());
    let html = f.dialog_html();
    assert!(html.contains("data-id=\"4521\""));
    assert!(html.contains("12/3/2025"));
    assert!(html.contains("data-id=\"7\""));

    let cached = f.session.get(keys::TASKS_CACHE).unwrap();
    assert!(cached.contains("\"System.Id\":4521"));
    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].body.contains("2025-12-01"));
    assert!(requests[0].body.contains("2025-12-03"));
}

#[tokio::test]
async fn reopening_uses_cache() {
    let stub = start_tracker(200, &[4521, 7], two_tasks());
    let f = flow(&stub.url, Timings::immediate());

    f.app.dialog().open().await.unwrap();
    f.app.dialog().close().await.unwrap();
    assert!(!f.page.is_open(f.dialog_node()));
    f.app.dialog().open().await.unwrap();

    assert_eq!(stub.requests().len(), 2);
    assert_eq!(f.page.count(".devops-dialog"), 1);
    assert!(f.dialog_html().contains("data-id=\"4521\""));
}

#[tokio::test]
async fn add_to_timesheet_end_to_end() {
    let stub = start_tracker(200, &[4521, 7], two_tasks());
    let f = flow(&stub.url, test_timings(200));
    let grid = f.page.add_timecard_grid(&[("Wed,Dec 03", "240px")]);
    let cell = f.page.add_cell(&grid, "240px", "0px", "");

    f.app.dialog().open().await.unwrap();
    let handles = f.app.dialog().add_to_timesheet(4521).await.unwrap().unwrap();
    assert!(!f.page.is_open(f.dialog_node()));
    assert!(f.session.get(keys::ROW_JSON).unwrap().contains("4521"));

    assert_eq!(
        handles.insertion.await.unwrap().unwrap(),
        InsertionOutcome::Verified
    );
    assert!(handles.completion.await.unwrap());

    assert_eq!(f.page.text_of(cell), "8");
    assert_eq!(f.page.comment_of(cell).as_deref(), Some("4521: Fix  login"));
    assert_eq!(CompletionFlag::new(f.session.clone()).raw(), None);
    assert!(f.page.is_open(f.dialog_node()));
    assert_eq!(stub.requests().len(), 2);
}

#[tokio::test]
async fn date_out_of_view_never_completes() {
    let stub = start_tracker(
        200,
        &[9],
        serde_json::json!([work_item(9, "Later", "2025-12-10T08:00:00Z", Some(2.0))]),
    );
    let f = flow(&stub.url, test_timings(10));
    let grid = f.page.add_timecard_grid(&[("Wed,Dec 03", "240px")]);
    let cell = f.page.add_cell(&grid, "240px", "0px", "");

    f.app.dialog().open().await.unwrap();
    let handles = f.app.dialog().add_to_timesheet(9).await.unwrap().unwrap();

    assert_eq!(
        handles.insertion.await.unwrap().unwrap(),
        InsertionOutcome::NoEmptyCell
    );
    assert!(!handles.completion.await.unwrap());
    assert_eq!(f.page.text_of(cell), "");
    assert_eq!(CompletionFlag::new(f.session.clone()).raw().as_deref(), Some("0"));
    assert!(!f.page.is_open(f.dialog_node()));
}

#[tokio::test]
async fn unknown_task_leaves_grid_alone() {
    let stub = start_tracker(200, &[], serde_json::json!([]));
    let f = flow(&stub.url, Timings::immediate());
    let grid = f.page.add_timecard_grid(&[("Wed,Dec 03", "240px")]);
    f.page.add_cell(&grid, "240px", "0px", "");

    assert!(f.app.dialog().add_to_timesheet(99).await.unwrap().is_none());
    assert_eq!(f.page.alerts(), vec![messages::TASK_NOT_FOUND.to_string()]);
    assert!(f.page.events().is_empty());
    assert!(f.session.get(keys::ROW_JSON).is_none());
}

#[tokio::test]
async fn empty_result_alerts_without_caching() {
    let stub = start_tracker(200, &[], serde_json::json!([]));
    let f = flow(&stub.url, Timings::immediate());

    f.app.dialog().open().await.unwrap();

    assert_eq!(f.page.alerts(), vec![messages::NO_TASKS.to_string()]);
    assert!(f.session.get(keys::TASKS_CACHE).is_none());
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn tracker_failure_alerts() {
    let stub = start_tracker(500, &[], serde_json::json!([]));
    let f = flow(&stub.url, Timings::immediate());

    f.app.dialog().open().await.unwrap();

    assert_eq!(f.page.alerts(), vec![messages::FETCH_FAILED.to_string()]);
    assert!(f.session.get(keys::TASKS_CACHE).is_none());
    assert!(!f.dialog_html().contains("Searching..."));
}

#[tokio::test]
async fn page_actions_drive_the_dialog() {
    let stub = start_tracker(200, &[4521, 7], two_tasks());
    let f = flow(&stub.url, Timings::immediate());

    f.act(serde_json::json!({ "action": "open_import_dialog" })).await;
    f.act(serde_json::json!({
        "action": "search",
        "start_date": "2025-11-01",
        "end_date": "2025-11-30"
    }))
    .await;
    assert_eq!(
        f.settings.get(keys::FILTER_START_DATE).as_deref(),
        Some("2025-11-01")
    );
    assert_eq!(stub.requests().len(), 4);

    f.act(serde_json::json!({ "action": "sort_by", "column": "id" })).await;
    let html = f.dialog_html();
    let first = html.find("data-id=\"7\"").unwrap();
    let second = html.find("data-id=\"4521\"").unwrap();
    assert!(first < second);

    f.act(serde_json::json!({ "action": "copy_task", "id": 7 })).await;
    assert_eq!(f.page.clipboard(), vec!["7: Review".to_string()]);
    assert!(!f.page.is_open(f.dialog_node()));
}

#[tokio::test]
async fn add_all_hands_over_cache_and_reopens() {
    let stub = start_tracker(200, &[4521, 7], two_tasks());
    let f = flow(&stub.url, test_timings(200));

    f.app.dialog().open().await.unwrap();
    let watch = f.app.dialog().add_all().await.unwrap().unwrap();
    assert_eq!(
        f.session.get(keys::COMPLETE_JSON),
        f.session.get(keys::TASKS_CACHE)
    );
    assert_eq!(f.page.alerts(), vec![messages::ALL_SAVED.to_string()]);
    assert!(!f.page.is_open(f.dialog_node()));

    CompletionFlag::new(f.session.clone()).mark_done().unwrap();
    assert!(watch.await.unwrap());
    assert!(f.page.is_open(f.dialog_node()));
}

#[tokio::test]
async fn settings_tab_saves_connection() {
    let f = flow("", Timings::immediate());
    f.settings.remove(keys::ORG_URL).unwrap();

    f.act(serde_json::json!({ "action": "open_import_dialog" })).await;
    assert!(f
        .dialog_html()
        .contains("data-content=\"tasks\" style=\"display: none;\""));
    assert!(f.page.alerts().is_empty());

    f.act(serde_json::json!({
        "action": "save_settings",
        "org_url": "https://dev.azure.com/acme",
        "project": "Payroll",
        "api_version": "7.1",
        "token": ""
    }))
    .await;
    assert_eq!(f.page.alerts(), vec![messages::SETTINGS_SAVED.to_string()]);
    assert_eq!(
        f.settings.get(keys::ORG_URL).as_deref(),
        Some("https://dev.azure.com/acme")
    );
    assert!(f.settings.get(keys::TOKEN).is_some());
}
