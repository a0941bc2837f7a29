//! [`HostPage`] over the extension bridge. Every call is one `eval` of a
//! helper installed by the page prelude.

use super::ExtensionBridge;
use crate::errors::TimecardError;
use crate::page::{ElementSpec, HostPage, NodeId, SyntheticEvent};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Installs `globalThis.__timecard`: the node handle registry, the DOM
/// helpers called below, and the listeners that report events.
pub const PRELUDE: &str = include_str!("scripts/prelude.js");

const DETACHED_PREFIX: &str = "detached:";

pub struct BridgePage {
    bridge: Arc<ExtensionBridge>,
    timeout: Duration,
}

impl BridgePage {
    pub fn new(bridge: Arc<ExtensionBridge>, timeout: Duration) -> Self {
        Self { bridge, timeout }
    }

    /// Evaluate the prelude in the tab. Safe to repeat; the script keeps its
    /// registry across re-installs.
    #[instrument(level = "debug", skip(self))]
    pub async fn install(&self) -> Result<(), TimecardError> {
        self.bridge.eval(PRELUDE, self.timeout).await?;
        debug!("page prelude installed");
        Ok(())
    }

    async fn call<T: DeserializeOwned>(&self, op: &str, args: Value) -> Result<T, TimecardError> {
        let code = format!(
            "globalThis.__timecard.call({}, {})",
            serde_json::to_string(op)?,
            args
        );
        let value = match self.bridge.eval(&code, self.timeout).await {
            Ok(value) => value,
            Err(TimecardError::ScriptError(message)) => {
                return Err(match message.split_once(DETACHED_PREFIX) {
                    Some((_, node)) => TimecardError::ElementDetached(node.to_string()),
                    None => TimecardError::ScriptError(format!("{op}: {message}")),
                })
            }
            Err(e) => return Err(e),
        };
        serde_json::from_value(value)
            .map_err(|e| TimecardError::Bridge(format!("unexpected result for {op}: {e}")))
    }

    async fn run(&self, op: &str, args: Value) -> Result<(), TimecardError> {
        self.call::<Value>(op, args).await.map(|_| ())
    }
}

#[async_trait]
impl HostPage for BridgePage {
    async fn location_path(&self) -> Result<String, TimecardError> {
        self.call("location_path", json!({})).await
    }

    async fn body(&self) -> Result<NodeId, TimecardError> {
        self.call("body", json!({})).await
    }

    async fn query(
        &self,
        scope: Option<NodeId>,
        css: &str,
    ) -> Result<Option<NodeId>, TimecardError> {
        self.call("query", json!({ "scope": scope, "css": css })).await
    }

    async fn query_all(
        &self,
        scope: Option<NodeId>,
        css: &str,
    ) -> Result<Vec<NodeId>, TimecardError> {
        self.call("query_all", json!({ "scope": scope, "css": css }))
            .await
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<NodeId>, TimecardError> {
        self.call("element_by_id", json!({ "id": id })).await
    }

    async fn active_element(&self) -> Result<Option<NodeId>, TimecardError> {
        self.call("active_element", json!({})).await
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError> {
        self.call("parent", json!({ "node": node })).await
    }

    async fn next_sibling(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError> {
        self.call("next_sibling", json!({ "node": node })).await
    }

    async fn first_child(&self, node: NodeId) -> Result<Option<NodeId>, TimecardError> {
        self.call("first_child", json!({ "node": node })).await
    }

    async fn tag_name(&self, node: NodeId) -> Result<String, TimecardError> {
        self.call("tag_name", json!({ "node": node })).await
    }

    async fn inner_text(&self, node: NodeId) -> Result<String, TimecardError> {
        self.call("inner_text", json!({ "node": node })).await
    }

    async fn style(&self, node: NodeId, property: &str) -> Result<String, TimecardError> {
        self.call("style", json!({ "node": node, "property": property }))
            .await
    }

    async fn has_class(&self, node: NodeId, class: &str) -> Result<bool, TimecardError> {
        self.call("has_class", json!({ "node": node, "class": class }))
            .await
    }

    async fn value(&self, node: NodeId) -> Result<Option<String>, TimecardError> {
        self.call("value", json!({ "node": node })).await
    }

    async fn set_value(&self, node: NodeId, value: &str) -> Result<(), TimecardError> {
        self.run("set_value", json!({ "node": node, "value": value }))
            .await
    }

    async fn focus(&self, node: NodeId) -> Result<(), TimecardError> {
        self.run("focus", json!({ "node": node })).await
    }

    async fn blur(&self, node: NodeId) -> Result<(), TimecardError> {
        self.run("blur", json!({ "node": node })).await
    }

    async fn click(&self, node: NodeId) -> Result<(), TimecardError> {
        self.run("click", json!({ "node": node })).await
    }

    async fn dispatch(
        &self,
        node: NodeId,
        event: &SyntheticEvent,
    ) -> Result<bool, TimecardError> {
        self.call("dispatch", json!({ "node": node, "event": event }))
            .await
    }

    async fn insert_text(&self, text: &str) -> Result<bool, TimecardError> {
        self.call("insert_text", json!({ "text": text })).await
    }

    async fn insert_element(
        &self,
        parent: NodeId,
        before: Option<NodeId>,
        spec: &ElementSpec,
    ) -> Result<NodeId, TimecardError> {
        self.call(
            "insert_element",
            json!({ "parent": parent, "before": before, "spec": spec }),
        )
        .await
    }

    async fn set_inner_html(&self, node: NodeId, html: &str) -> Result<(), TimecardError> {
        self.run("set_inner_html", json!({ "node": node, "html": html }))
            .await
    }

    async fn remove(&self, node: NodeId) -> Result<(), TimecardError> {
        self.run("remove", json!({ "node": node })).await
    }

    async fn show_modal(&self, node: NodeId) -> Result<(), TimecardError> {
        self.run("show_modal", json!({ "node": node })).await
    }

    async fn close_modal(&self, node: NodeId) -> Result<(), TimecardError> {
        self.run("close_modal", json!({ "node": node })).await
    }

    async fn alert(&self, message: &str) -> Result<(), TimecardError> {
        self.run("alert", json!({ "message": message })).await
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), TimecardError> {
        self.run("write_clipboard", json!({ "text": text })).await
    }
}
