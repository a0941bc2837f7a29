use std::sync::Arc;
use timecard::comments::{CommentEngine, COMMENT_FAILED};
use timecard::storage::CompletionFlag;
use timecard::testing::{CommitTrigger, FakeBehavior, FakeEditor, FakeGrid, FakePage};
use timecard::{FeatureFlags, GridEngine, InsertionOutcome, InsertionTask, MemoryStore, Timings};

const DATE: &str = "2025-12-03T18:16:38.757Z";

struct Harness {
    page: Arc<FakePage>,
    grid: FakeGrid,
    engine: GridEngine,
    flag: CompletionFlag,
}

fn harness(behavior: FakeBehavior) -> Harness {
    let page = Arc::new(FakePage::default().with_behavior(behavior));
    let grid = page.add_timecard_grid(&[("Tue,Dec 02", "120px"), ("Wed,Dec 03", "240px")]);
    let session = Arc::new(MemoryStore::new());
    let flag = CompletionFlag::new(session.clone());
    flag.reset().unwrap();
    let timings = Timings::immediate();
    let comments = Arc::new(CommentEngine::new(
        page.clone(),
        timings.clone(),
        FeatureFlags::default(),
    ));
    let engine = GridEngine::new(page.clone(), comments, CompletionFlag::new(session), timings);
    Harness {
        page,
        grid,
        engine,
        flag,
    }
}

fn task(value: &str) -> InsertionTask {
    InsertionTask {
        work_item_id: 4521,
        title: "Fix: login".into(),
        date: DATE.into(),
        value: value.into(),
    }
}

#[tokio::test]
async fn comment_then_value_into_first_empty_cell() {
    let h = harness(FakeBehavior::default());
    let other_day = h.page.add_cell(&h.grid, "120px", "0px", "");
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");
    let below = h.page.add_cell(&h.grid, "240px", "30px", "");

    let outcome = h.engine.insert(&task("8")).await.unwrap();

    assert_eq!(outcome, InsertionOutcome::Verified);
    assert_eq!(h.page.text_of(cell), "8");
    assert_eq!(h.page.comment_of(cell).as_deref(), Some("4521: Fix  login"));
    assert_eq!(h.page.text_of(below), "");
    assert_eq!(h.page.text_of(other_day), "");
    assert!(h.flag.is_done());
    assert!(h.page.alerts().is_empty());

    let events = h.page.events();
    let context_menu = events
        .iter()
        .position(|(id, ev)| *id == cell && ev == "contextmenu")
        .unwrap();
    let double_click = events
        .iter()
        .position(|(id, ev)| *id == cell && ev == "dblclick")
        .unwrap();
    assert!(context_menu < double_click);
}

#[tokio::test]
async fn rows_are_taken_in_visual_order() {
    let h = harness(FakeBehavior::default());
    let last = h.page.add_cell(&h.grid, "240px", "60px", "");
    let filled = h.page.add_cell(&h.grid, "240px", "0px", "4");
    let middle = h.page.add_cell(&h.grid, "240px", "30px", "");

    assert_eq!(
        h.engine.insert(&task("8")).await.unwrap(),
        InsertionOutcome::Verified
    );
    assert_eq!(h.page.text_of(middle), "8");
    assert_eq!(h.page.text_of(filled), "4");
    assert_eq!(h.page.text_of(last), "");
}

#[tokio::test]
async fn column_key_must_match_exactly() {
    let h = harness(FakeBehavior::default());
    let near = h.page.add_cell(&h.grid, "240.0px", "0px", "");
    let exact = h.page.add_cell(&h.grid, "240px", "30px", "");

    h.engine.insert(&task("6")).await.unwrap();
    assert_eq!(h.page.text_of(exact), "6");
    assert_eq!(h.page.text_of(near), "");
}

#[tokio::test]
async fn cell_holding_an_input_value_is_not_empty() {
    let h = harness(FakeBehavior::default());
    let draft = h.page.add_cell(&h.grid, "240px", "0px", "");
    h.page.add_input(draft, "3");
    let free = h.page.add_cell(&h.grid, "240px", "30px", "");

    h.engine.insert(&task("8")).await.unwrap();
    assert_eq!(h.page.text_of(free), "8");
}

#[tokio::test]
async fn late_commit_is_picked_up_by_recovery() {
    let h = harness(FakeBehavior {
        commit: CommitTrigger::EnterAfterBlur,
        ..Default::default()
    });
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");

    let outcome = h.engine.insert(&task("8")).await.unwrap();
    assert_eq!(outcome, InsertionOutcome::Recovered);
    assert_eq!(h.page.text_of(cell), "8");
    assert!(h.flag.is_done());
}

#[tokio::test]
async fn discarded_edit_leaves_flag_unset() {
    let h = harness(FakeBehavior {
        commit: CommitTrigger::Never,
        ..Default::default()
    });
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");

    let outcome = h.engine.insert(&task("8")).await.unwrap();
    assert_eq!(outcome, InsertionOutcome::Unverified);
    assert_eq!(h.page.text_of(cell), "");
    assert!(!h.flag.is_done());
    assert_eq!(h.flag.raw().as_deref(), Some("0"));
}

#[tokio::test]
async fn custom_editor_commits_on_blur() {
    let h = harness(FakeBehavior {
        editor: FakeEditor::Custom,
        commit: CommitTrigger::Blur,
        insert_text: false,
        ..Default::default()
    });
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");

    assert_eq!(
        h.engine.insert(&task("7.5")).await.unwrap(),
        InsertionOutcome::Verified
    );
    assert_eq!(h.page.text_of(cell), "7.5");
}

#[tokio::test]
async fn date_out_of_view_touches_nothing() {
    let h = harness(FakeBehavior::default());
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");
    let mut out_of_view = task("8");
    out_of_view.date = "2025-12-10T08:00:00Z".into();

    let outcome = h.engine.insert(&out_of_view).await.unwrap();
    assert_eq!(outcome, InsertionOutcome::NoEmptyCell);
    assert!(h.page.events().is_empty());
    assert_eq!(h.page.text_of(cell), "");
    assert!(!h.flag.is_done());
}

#[tokio::test]
async fn full_column_is_no_empty_cell() {
    let h = harness(FakeBehavior::default());
    h.page.add_cell(&h.grid, "240px", "0px", "4");
    assert_eq!(
        h.engine.insert(&task("8")).await.unwrap(),
        InsertionOutcome::NoEmptyCell
    );
}

#[tokio::test]
async fn missing_comment_menu_alerts_and_stops() {
    let h = harness(FakeBehavior {
        comment_menu: false,
        ..Default::default()
    });
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");

    let outcome = h.engine.insert(&task("8")).await.unwrap();
    assert_eq!(outcome, InsertionOutcome::CommentFailed);
    assert_eq!(h.page.alerts(), vec![COMMENT_FAILED.to_string()]);
    assert!(!h
        .page
        .events()
        .iter()
        .any(|(id, ev)| *id == cell && ev == "dblclick"));
}

#[tokio::test]
async fn missing_estimate_verifies_trivially() {
    let h = harness(FakeBehavior::default());
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");

    assert_eq!(
        h.engine.insert(&task("")).await.unwrap(),
        InsertionOutcome::Verified
    );
    assert_eq!(h.page.text_of(cell), "");
    assert_eq!(h.page.comment_of(cell).as_deref(), Some("4521: Fix  login"));
}

#[tokio::test]
async fn cancelled_context_menu_still_gets_comment_and_value() {
    let h = harness(FakeBehavior {
        cancelled_events: &["contextmenu"],
        ..Default::default()
    });
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");

    let outcome = h.engine.insert(&task("8")).await.unwrap();

    assert_eq!(outcome, InsertionOutcome::Verified);
    assert_eq!(h.page.comment_of(cell).as_deref(), Some("4521: Fix  login"));
    assert_eq!(h.page.text_of(cell), "8");
    assert!(h.flag.is_done());
    assert!(h.page.alerts().is_empty());
}

#[tokio::test]
async fn throwing_and_cancelled_dispatches_never_abort_insertion() {
    let h = harness(FakeBehavior {
        cancelled_events: &["contextmenu", "dblclick", "keydown"],
        failing_events: &["input", "change", "keyup", "valueChanged"],
        ..Default::default()
    });
    let cell = h.page.add_cell(&h.grid, "240px", "0px", "");

    let outcome = h.engine.insert(&task("7.5")).await.unwrap();

    assert_eq!(outcome, InsertionOutcome::Verified);
    assert_eq!(h.page.text_of(cell), "7.5");
    assert_eq!(h.page.comment_of(cell).as_deref(), Some("4521: Fix  login"));
    assert!(h.flag.is_done());
    // The failing events were still attempted.
    let events = h.page.events();
    assert!(events.iter().any(|(id, ev)| *id != cell && ev == "change"));
    assert!(events.iter().any(|(_, ev)| ev == "keyup"));
}
