//! Automation for the Oracle Cloud timecard page
//!
//! Keyboard shortcuts, an Azure DevOps task import dialog and form filling
//! into the page's virtualized data grid. The browser tab is reached through
//! the [`HostPage`] trait: [`bridge::BridgePage`] drives a real tab through
//! the browser extension, `testing::FakePage` (behind the `testing`
//! feature) is an in-memory stand-in.

pub mod app;
pub mod bridge;
pub mod comments;
pub mod config;
pub mod dialog;
pub mod errors;
pub mod grid;
pub mod guard;
pub mod page;
pub mod poll;
pub mod selector;
pub mod shortcuts;
pub mod storage;
pub mod templates;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod toolbar;
pub mod tracker;

pub use app::{App, PageAction, PageEvent};
pub use bridge::{BridgePage, ExtensionBridge};
pub use config::{FeatureFlags, TrackerSettings};
pub use errors::{TimecardError, TrackerError};
pub use grid::{GridEngine, InsertionOutcome, InsertionTask};
pub use page::{Element, HostPage, NodeId, SyntheticEvent};
pub use poll::{Poll, Timings};
pub use shortcuts::{KeyEvent, ShortcutEngine};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tracker::{TrackerClient, WorkItem};
