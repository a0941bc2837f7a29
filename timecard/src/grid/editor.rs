//! Inline editors the grid mounts into a cell, and how to type into them.

use crate::errors::TimecardError;
use crate::page::{Element, SyntheticEvent};
use crate::poll::{settle, Poll};
use crate::selector::{Selectors, Target};
use std::time::Duration;
use tracing::debug;

/// Whatever the grid put into the cell for text entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorHost {
    /// `input` / `textarea`
    NativeInput(Element),
    /// An Oracle JET input component, driven through its `value` property.
    Custom(Element),
    ContentEditable(Element),
}

impl EditorHost {
    pub fn element(&self) -> &Element {
        match self {
            EditorHost::NativeInput(e) | EditorHost::Custom(e) | EditorHost::ContentEditable(e) => e,
        }
    }

    /// First editor inside `cell`: native input, then custom component, then
    /// contenteditable.
    pub async fn discover(
        selectors: &Selectors,
        cell: &Element,
    ) -> Result<Option<EditorHost>, TimecardError> {
        if let Some(e) = selectors.query_within(cell, Target::Input).await? {
            return Ok(Some(EditorHost::NativeInput(e)));
        }
        if let Some(e) = selectors.query_within(cell, Target::CustomEditor).await? {
            return Ok(Some(EditorHost::Custom(e)));
        }
        if let Some(e) = selectors.query_within(cell, Target::ContentEditable).await? {
            return Ok(Some(EditorHost::ContentEditable(e)));
        }
        Ok(None)
    }

    /// Poll for an editor after activation.
    pub async fn wait(selectors: &Selectors, cell: &Element, poll: Poll) -> Option<EditorHost> {
        poll.until(|| async move { Self::discover(selectors, cell).await.ok().flatten() })
            .await
    }

    /// The cell itself when no editor ever mounted.
    pub fn fallback(cell: &Element) -> EditorHost {
        EditorHost::Custom(cell.clone())
    }
}

/// How characters reach the editor; chosen on the first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypingMode {
    InsertText,
    NativeValue,
    CustomValue,
}

/// Type `value` one character at a time, `keystroke` apart.
pub async fn type_value(host: &EditorHost, value: &str, keystroke: Duration) {
    let element = host.element();
    element.try_focus().await;

    let mut typed = element.value().await.ok().flatten().unwrap_or_default();
    let mut mode = None;
    for ch in value.chars() {
        let text = ch.to_string();
        let current = match mode {
            Some(m) => m,
            None => {
                let m = pick_mode(host, &text).await;
                debug!(?m, "typing mode");
                mode = Some(m);
                if m == TypingMode::InsertText {
                    settle(keystroke).await;
                    continue;
                }
                m
            }
        };
        match current {
            TypingMode::InsertText => {
                if let Err(e) = element.page().insert_text(&text).await {
                    debug!(error = %e, "insertText failed");
                }
            }
            TypingMode::NativeValue => {
                typed.push(ch);
                if let Err(e) = element.set_value(&typed).await {
                    debug!(error = %e, "value write failed");
                }
                element
                    .fire(&SyntheticEvent::Input {
                        data: Some(text.clone()),
                    })
                    .await;
            }
            TypingMode::CustomValue => {
                typed.push(ch);
                if let Err(e) = element.set_value(&typed).await {
                    debug!(error = %e, "component value write failed");
                }
                element.fire(&SyntheticEvent::custom("rawValueChanged")).await;
                element.fire(&SyntheticEvent::custom("valueChanged")).await;
            }
        }
        settle(keystroke).await;
    }
}

/// Try programmatic insertion with the first character; it is consumed when
/// that works.
async fn pick_mode(host: &EditorHost, first: &str) -> TypingMode {
    match host.element().page().insert_text(first).await {
        Ok(true) => TypingMode::InsertText,
        Ok(false) | Err(_) => match host {
            EditorHost::NativeInput(_) => TypingMode::NativeValue,
            EditorHost::Custom(_) | EditorHost::ContentEditable(_) => TypingMode::CustomValue,
        },
    }
}

/// Every commit signal we know of, in order: change, Enter, blur, click
/// outside. Which one the grid actually listens to is unknown.
pub async fn commit(host: &EditorHost, outside: Option<&Element>) {
    let element = host.element();
    match host {
        EditorHost::Custom(_) => {
            element.fire(&SyntheticEvent::custom("valueChanged")).await;
            element.fire(&SyntheticEvent::Change).await;
        }
        EditorHost::NativeInput(_) | EditorHost::ContentEditable(_) => {
            element.fire(&SyntheticEvent::Change).await;
        }
    }
    element.fire(&SyntheticEvent::enter_down()).await;
    element.fire(&SyntheticEvent::enter_up()).await;
    element.try_blur().await;
    if let Some(outside) = outside {
        outside.try_click().await;
    }
}
