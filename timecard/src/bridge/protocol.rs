//! Messages exchanged with the browser extension over the WebSocket.

use crate::app::{PageAction, PageEvent};
use crate::shortcuts::{ChordBinding, KeyEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Agent → page: evaluate `code` in the tab and report back under `id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvalRequest {
    pub id: String,
    pub action: String,
    pub code: String,
    #[serde(default)]
    pub await_promise: bool,
}

impl EvalRequest {
    pub fn new(id: String, code: &str) -> Self {
        Self {
            id,
            action: "eval".into(),
            code: code.to_string(),
            await_promise: true,
        }
    }
}

/// Agent → page notifications.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outgoing {
    /// Chords the page claims (prevents the browser default) on its own.
    #[serde(rename = "shortcuts")]
    Shortcuts { chords: Vec<ChordBinding> },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeIncoming {
    EvalResult {
        id: String,
        ok: bool,
        result: Option<serde_json::Value>,
        error: Option<String>,
    },
    Typed(TypedIncoming),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TypedIncoming {
    #[serde(rename = "hello")]
    Hello { from: Option<String> },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "key_down")]
    KeyDown {
        #[serde(flatten)]
        event: KeyEvent,
        #[serde(default)]
        path: String,
    },
    #[serde(rename = "key_up")]
    KeyUp {
        #[serde(flatten)]
        event: KeyEvent,
    },
    /// A MutationObserver batch with added nodes.
    #[serde(rename = "mutation")]
    Mutation { added: Option<u32> },
    #[serde(rename = "dialog_action")]
    DialogAction { detail: PageAction },
    #[serde(rename = "console_event")]
    ConsoleEvent {
        level: Option<String>,
        args: Option<serde_json::Value>,
    },
}

impl TypedIncoming {
    /// The automation-level event, if this message carries one. Console
    /// output is logged here and goes no further.
    pub fn into_event(self) -> Option<PageEvent> {
        match self {
            TypedIncoming::Hello { from } => {
                info!(from = from.as_deref().unwrap_or("unknown"), "Extension connected");
                Some(PageEvent::Connected)
            }
            TypedIncoming::Pong => None,
            TypedIncoming::KeyDown { event, path } => Some(PageEvent::KeyDown { event, path }),
            TypedIncoming::KeyUp { event } => Some(PageEvent::KeyUp(event)),
            TypedIncoming::Mutation { added } => {
                debug!(added = added.unwrap_or(0), "mutation batch");
                Some(PageEvent::Mutation)
            }
            TypedIncoming::DialogAction { detail } => Some(PageEvent::Action(detail)),
            TypedIncoming::ConsoleEvent { level, args } => {
                let args = args.map(|v| v.to_string()).unwrap_or_else(|| "[]".into());
                match level.as_deref().unwrap_or("log") {
                    "error" => error!(args = %args, "Console error event"),
                    "warning" | "warn" => warn!(args = %args, "Console warn event"),
                    _ => debug!(args = %args, "Console event"),
                }
                None
            }
        }
    }
}
