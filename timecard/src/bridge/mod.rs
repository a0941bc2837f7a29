//! WebSocket bridge to the browser extension.
//!
//! The extension connects to the agent, relays `eval` requests into the
//! timecard tab and streams the tab's key, mutation and dialog events back.

pub mod page;
pub mod protocol;

use crate::app::PageEvent;
use crate::errors::TimecardError;
use crate::shortcuts::ChordBinding;
use futures_util::{SinkExt, StreamExt};
use protocol::{BridgeIncoming, EvalRequest, Outgoing};
use serde_json::Value;
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

pub use page::BridgePage;

pub const DEFAULT_WS_ADDR: &str = "127.0.0.1:17373";

/// Longest page error kept in the debug log.
const ERROR_LOG_CHARS: usize = 400;

type EvalOutcome = Result<Value, String>;
type Waiters = Arc<Mutex<HashMap<String, oneshot::Sender<EvalOutcome>>>>;
type Tabs = Arc<Mutex<Vec<Tab>>>;

/// One connected extension (one timecard tab).
struct Tab {
    id: Uuid,
    outbox: mpsc::UnboundedSender<Message>,
}

/// Shared by the accept loop and every connection task.
#[derive(Clone)]
struct Shared {
    tabs: Tabs,
    waiters: Waiters,
    events: mpsc::UnboundedSender<PageEvent>,
    /// Serialized [`Outgoing::Shortcuts`], sent after each hello.
    shortcuts: Arc<str>,
}

pub struct ExtensionBridge {
    _accept_task: JoinHandle<()>,
    tabs: Tabs,
    waiters: Waiters,
    local_addr: SocketAddr,
}

async fn bind(addr: &str) -> Result<TcpListener, TimecardError> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            warn!(%addr, ?e, "Bridge port busy, retrying once in 2 seconds");
            tokio::time::sleep(Duration::from_secs(2)).await;
            TcpListener::bind(addr).await.map_err(|retry| {
                TimecardError::Bridge(format!("Failed to bind {addr} after retry: {retry}"))
            })
        }
        Err(e) => Err(TimecardError::Bridge(format!("Failed to bind {addr}: {e}"))),
    }
}

/// Hand an eval result to whoever is waiting on `id`.
async fn resolve(
    waiters: &Waiters,
    id: String,
    ok: bool,
    result: Option<Value>,
    error: Option<String>,
) {
    let outcome = if ok {
        Ok(result.unwrap_or(Value::Null))
    } else {
        let message = error.unwrap_or_else(|| "unknown error".into());
        let head: String = message.chars().take(ERROR_LOG_CHARS).collect();
        debug!(%id, error = %head, "page reported eval failure");
        Err(message)
    };
    match waiters.lock().await.remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(outcome);
        }
        None => trace!(%id, "eval result with nobody waiting"),
    }
}

/// Read one tab's socket until it closes.
async fn serve_tab(stream: TcpStream, shared: Shared) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("ws handshake error: {}", e);
            return;
        }
    };
    let (mut sink, mut incoming) = socket.split();
    let (outbox, mut queued) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = queued.recv().await {
            if let Err(e) = sink.send(msg).await {
                warn!("ws send error: {}", e);
                break;
            }
        }
    });

    let tab_id = Uuid::new_v4();
    shared.tabs.lock().await.push(Tab {
        id: tab_id,
        outbox: outbox.clone(),
    });

    while let Some(Ok(msg)) = incoming.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        match serde_json::from_str::<BridgeIncoming>(&text) {
            Ok(BridgeIncoming::EvalResult {
                id,
                ok,
                result,
                error,
            }) => resolve(&shared.waiters, id, ok, result, error).await,
            Ok(BridgeIncoming::Typed(typed)) => {
                let Some(event) = typed.into_event() else {
                    continue;
                };
                if event == PageEvent::Connected
                    && outbox.send(Message::Text(shared.shortcuts.to_string())).is_err()
                {
                    warn!("could not push shortcut table");
                }
                if shared.events.send(event).is_err() {
                    debug!("page event receiver dropped");
                }
            }
            Err(e) => warn!("Unrecognized message from extension: {}", e),
        }
    }

    shared.tabs.lock().await.retain(|tab| tab.id != tab_id);
    info!(%tab_id, "Extension disconnected");
    writer.abort();
}

impl ExtensionBridge {
    /// Listen on `addr`. Page events arrive on the returned receiver; every
    /// newly connected page is sent `bindings` right after its hello.
    pub async fn start(
        addr: &str,
        bindings: Vec<ChordBinding>,
    ) -> Result<(Arc<ExtensionBridge>, mpsc::UnboundedReceiver<PageEvent>), TimecardError> {
        let listener = bind(addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TimecardError::Bridge(format!("no local address: {e}")))?;
        info!("Timecard extension bridge listening on {}", local_addr);

        let (events, receiver) = mpsc::unbounded_channel::<PageEvent>();
        let shared = Shared {
            tabs: Arc::new(Mutex::new(Vec::new())),
            waiters: Arc::new(Mutex::new(HashMap::new())),
            events,
            shortcuts: serde_json::to_string(&Outgoing::Shortcuts { chords: bindings })?.into(),
        };
        let (tabs, waiters) = (shared.tabs.clone(), shared.waiters.clone());

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!(%peer, "extension connecting");
                        tokio::spawn(serve_tab(stream, shared.clone()));
                    }
                    Err(e) => warn!("ws accept error: {}", e),
                }
            }
        });

        Ok((
            Arc::new(ExtensionBridge {
                _accept_task: accept_task,
                tabs,
                waiters,
                local_addr,
            }),
            receiver,
        ))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn is_client_connected(&self) -> bool {
        !self.tabs.lock().await.is_empty()
    }

    /// Evaluate `code` in the most recently connected tab and return its
    /// JSON result.
    pub async fn eval(&self, code: &str, timeout: Duration) -> Result<Value, TimecardError> {
        let id = Uuid::new_v4().to_string();
        let (waiter, answer) = oneshot::channel::<EvalOutcome>();
        self.waiters.lock().await.insert(id.clone(), waiter);
        let request = serde_json::to_string(&EvalRequest::new(id.clone(), code))?;
        trace!(preview = %request.chars().take(120).collect::<String>(), "eval request");

        let queued = match self.tabs.lock().await.last() {
            Some(tab) => tab.outbox.send(Message::Text(request)).is_ok(),
            None => false,
        };
        if !queued {
            self.waiters.lock().await.remove(&id);
            return Err(TimecardError::Bridge("no page connected".into()));
        }

        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(TimecardError::ScriptError(message)),
            Ok(Err(_)) => Err(TimecardError::Bridge("eval result channel closed".into())),
            Err(_) => {
                self.waiters.lock().await.remove(&id);
                Err(TimecardError::Timeout(format!(
                    "no EvalResult for {id} within {timeout:?}"
                )))
            }
        }
    }
}
