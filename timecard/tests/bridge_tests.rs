use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use timecard::shortcuts::TIMECARDS_PAGE;
use timecard::{
    BridgePage, ExtensionBridge, HostPage, KeyEvent, PageEvent, ShortcutEngine, TimecardError,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connected() -> (Arc<ExtensionBridge>, UnboundedReceiver<PageEvent>, Socket) {
    let (bridge, mut events) =
        ExtensionBridge::start("127.0.0.1:0", ShortcutEngine::default().bindings())
            .await
            .unwrap();
    let (mut ws, _) = connect_async(format!("ws://{}", bridge.local_addr()))
        .await
        .unwrap();
    send(&mut ws, json!({ "type": "hello", "from": "test-extension" })).await;
    assert_eq!(events.recv().await, Some(PageEvent::Connected));
    (bridge, events, ws)
}

async fn send(ws: &mut Socket, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn receive(ws: &mut Socket) -> Value {
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn hello_gets_shortcut_table() {
    let (bridge, _events, mut ws) = connected().await;
    assert!(bridge.is_client_connected().await);

    let pushed = receive(&mut ws).await;
    assert_eq!(pushed["type"], "shortcuts");
    let chords = pushed["chords"].as_array().unwrap();
    assert_eq!(chords.len(), ShortcutEngine::default().bindings().len());
    assert!(chords.iter().all(|c| c["path"] == TIMECARDS_PAGE));
}

#[tokio::test]
async fn eval_round_trip() {
    let (bridge, _events, mut ws) = connected().await;
    receive(&mut ws).await;

    let b = bridge.clone();
    let eval = tokio::spawn(async move { b.eval("1 + 41", Duration::from_secs(5)).await });
    let request = receive(&mut ws).await;
    assert_eq!(request["action"], "eval");
    assert_eq!(request["code"], "1 + 41");
    send(&mut ws, json!({ "id": request["id"], "ok": true, "result": 42 })).await;

    assert_eq!(eval.await.unwrap().unwrap(), json!(42));
}

#[tokio::test]
async fn page_errors_and_silence() {
    let (bridge, _events, mut ws) = connected().await;
    receive(&mut ws).await;

    let b = bridge.clone();
    let failing = tokio::spawn(async move { b.eval("boom()", Duration::from_secs(5)).await });
    let request = receive(&mut ws).await;
    send(
        &mut ws,
        json!({ "id": request["id"], "ok": false, "error": "ReferenceError: boom is not defined" }),
    )
    .await;
    assert!(matches!(
        failing.await.unwrap(),
        Err(TimecardError::ScriptError(message)) if message.contains("boom")
    ));

    let silent = bridge.eval("1", Duration::from_millis(50)).await;
    assert!(matches!(silent, Err(TimecardError::Timeout(_))));
}

#[tokio::test]
async fn eval_without_page_fails_fast() {
    let (bridge, _events) = ExtensionBridge::start("127.0.0.1:0", Vec::new()).await.unwrap();
    assert!(!bridge.is_client_connected().await);
    assert!(matches!(
        bridge.eval("1", Duration::from_secs(5)).await,
        Err(TimecardError::Bridge(_))
    ));
}

#[tokio::test]
async fn page_events_are_forwarded() {
    let (_bridge, mut events, mut ws) = connected().await;

    send(
        &mut ws,
        json!({
            "type": "key_down",
            "keyCode": 75,
            "ctrlKey": true,
            "targetClasses": ["oj-datagrid-cell"],
            "path": TIMECARDS_PAGE
        }),
    )
    .await;
    send(&mut ws, json!({ "type": "key_up", "keyCode": 75 })).await;
    send(&mut ws, json!({ "type": "console_event", "level": "error", "args": ["x"] })).await;
    send(&mut ws, json!({ "type": "mutation", "added": 3 })).await;

    assert_eq!(
        events.recv().await,
        Some(PageEvent::KeyDown {
            event: KeyEvent {
                key_code: 75,
                ctrl_key: true,
                target_classes: vec!["oj-datagrid-cell".into()],
                ..Default::default()
            },
            path: TIMECARDS_PAGE.to_string(),
        })
    );
    assert_eq!(
        events.recv().await,
        Some(PageEvent::KeyUp(KeyEvent {
            key_code: 75,
            ..Default::default()
        }))
    );
    assert_eq!(events.recv().await, Some(PageEvent::Mutation));
}

#[tokio::test]
async fn bridge_page_maps_detached_nodes() {
    let (bridge, _events, mut ws) = connected().await;
    receive(&mut ws).await;
    let page = BridgePage::new(bridge, Duration::from_secs(5));

    let lookup = tokio::spawn(async move { page.tag_name(7).await });
    let request = receive(&mut ws).await;
    let code = request["code"].as_str().unwrap();
    assert!(code.starts_with("globalThis.__timecard.call(\"tag_name\""));
    assert!(code.contains("\"node\":7"));
    send(
        &mut ws,
        json!({ "id": request["id"], "ok": false, "error": "Error: detached:7" }),
    )
    .await;

    assert!(matches!(
        lookup.await.unwrap(),
        Err(TimecardError::ElementDetached(node)) if node == "7"
    ));
}

#[tokio::test]
async fn bridge_page_decodes_results() {
    let (bridge, _events, mut ws) = connected().await;
    receive(&mut ws).await;
    let page = BridgePage::new(bridge, Duration::from_secs(5));

    let lookup = tokio::spawn(async move { page.query(None, ".devops-btn").await });
    let request = receive(&mut ws).await;
    send(&mut ws, json!({ "id": request["id"], "ok": true, "result": 12 })).await;
    assert_eq!(lookup.await.unwrap().unwrap(), Some(12));
}
