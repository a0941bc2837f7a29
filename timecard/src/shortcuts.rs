//! Keyboard chord tracking and the fixed command table.
//!
//! The engine sees every key-down/key-up of the page. A key-down whose
//! `(ctrl, shift, alt, action key, page path)` tuple equals a registered
//! command's tuple is claimed (the page must prevent its default) and mapped
//! to exactly one [`CommandKind`]; anything else passes through untouched so
//! native shortcuts such as copy/paste keep working.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Path of the timecards landing page, the only context with commands.
pub const TIMECARDS_PAGE: &str = "/fscmUI/redwood/time/timecards/landing-page";

/// Key-down events from elements with this class are ignored (form rows of
/// our own dialog).
const IGNORED_TARGET_CLASS: &str = "control-group";

/// A key event as reported by the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub key_code: u32,
    #[serde(default)]
    pub ctrl_key: bool,
    #[serde(default)]
    pub shift_key: bool,
    #[serde(default)]
    pub alt_key: bool,
    #[serde(default)]
    pub target_classes: Vec<String>,
}

impl KeyEvent {
    pub fn new(key_code: u32) -> Self {
        Self {
            key_code,
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl_key = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift_key = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt_key = true;
        self
    }
}

/// Modifier flags, the key codes that set them, and the current action key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub ctrl_code: Option<u32>,
    pub shift_code: Option<u32>,
    pub alt_code: Option<u32>,
    pub action_key: Option<u32>,
}

impl ModifierState {
    fn is_modifier_code(&self, code: u32) -> bool {
        [self.ctrl_code, self.shift_code, self.alt_code].contains(&Some(code))
    }
}

/// Owns the modifier state for the page session.
#[derive(Debug, Default)]
pub struct KeyChordTracker {
    state: ModifierState,
}

impl KeyChordTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ModifierState {
        self.state
    }

    pub fn key_down(&mut self, ev: &KeyEvent) {
        let s = &mut self.state;
        s.ctrl |= ev.ctrl_key;
        s.shift |= ev.shift_key;
        s.alt |= ev.alt_key;

        if s.ctrl_code.is_none() && ev.ctrl_key {
            s.ctrl_code = Some(ev.key_code);
        }
        if s.shift_code.is_none() && ev.shift_key {
            s.shift_code = Some(ev.key_code);
        }
        if s.alt_code.is_none() && ev.alt_key {
            s.alt_code = Some(ev.key_code);
        }

        if !s.is_modifier_code(ev.key_code) {
            s.action_key = Some(ev.key_code);
        }
    }

    /// Only the flag whose recorded code equals the released code is cleared,
    /// so releasing Shift in Ctrl+Shift+X leaves Ctrl held.
    pub fn key_up(&mut self, ev: &KeyEvent) {
        let s = &mut self.state;
        let code = Some(ev.key_code);
        if s.ctrl_code == code {
            s.ctrl = false;
            s.ctrl_code = None;
        } else if s.shift_code == code {
            s.shift = false;
            s.shift_code = None;
        } else if s.alt_code == code {
            s.alt = false;
            s.alt_code = None;
        } else if s.action_key == code {
            s.action_key = None;
        }
    }

    /// The chord currently held, if an action key is down.
    pub fn chord(&self) -> Option<Chord> {
        let s = &self.state;
        s.action_key.map(|key_code| Chord {
            ctrl: s.ctrl,
            shift: s.shift,
            alt: s.alt,
            key_code,
        })
    }
}

/// Modifiers plus one action key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chord {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key_code: u32,
}

impl Chord {
    pub const fn new(ctrl: bool, shift: bool, alt: bool, key_code: u32) -> Self {
        Self {
            ctrl,
            shift,
            alt,
            key_code,
        }
    }
}

/// `"ctrl,shift,alt,keyCode"`, e.g. `"true,false,true,67"`.
impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.ctrl, self.shift, self.alt, self.key_code
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Open the host's comment editor for the focused cell.
    OpenComment,
    /// Open the Azure DevOps import dialog.
    OpenImportDialog,
    /// Press the host's Save button.
    Save,
}

/// A registered shortcut: chord + page guard + what it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub chord: Chord,
    pub path: &'static str,
    pub key: char,
    pub label: &'static str,
    pub description: &'static str,
}

impl Command {
    /// Key names for display, e.g. `["Ctrl", "Alt", "C"]`.
    pub fn display_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if self.chord.ctrl {
            keys.push("Ctrl".to_string());
        }
        if self.chord.shift {
            keys.push("Shift".to_string());
        }
        if self.chord.alt {
            keys.push("Alt".to_string());
        }
        keys.push(self.key.to_string());
        keys
    }

    fn matches(&self, chord: &Chord, path: &str) -> bool {
        self.chord == *chord && self.path == path
    }
}

/// The built-in command table.
pub fn default_commands() -> Vec<Command> {
    vec![
        Command {
            kind: CommandKind::OpenComment,
            chord: Chord::new(true, false, true, 67),
            path: TIMECARDS_PAGE,
            key: 'C',
            label: "Open Comments Dialog",
            description: "Open the comment dialog for the active cell",
        },
        Command {
            kind: CommandKind::OpenImportDialog,
            chord: Chord::new(true, false, false, 68),
            path: TIMECARDS_PAGE,
            key: 'D',
            label: "Open Azure DevOps Dialog",
            description: "Open the Azure DevOps tasks dialog",
        },
        Command {
            kind: CommandKind::Save,
            chord: Chord::new(true, false, false, 83),
            path: TIMECARDS_PAGE,
            key: 'S',
            label: "Save Timecard/Comment",
            description: "Save the current timecard or comment",
        },
    ]
}

/// What the page should do with a key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Prevent the browser default and run this command.
    Dispatch(CommandKind),
    PassThrough,
}

/// A chord binding as sent to the page so it can prevent defaults locally.
///
/// The page compares bindings against the raw modifier flags of each
/// key-down, while [`ShortcutEngine`] dispatches from tracked state where a
/// modifier stays held until its own key-up arrives. When that key-up is lost
/// (focus leaves the window with Ctrl down) the engine can still run a
/// command for a keystroke the page let through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordBinding {
    #[serde(flatten)]
    pub chord: Chord,
    pub path: String,
}

/// Matches key events against the command table.
///
/// Dispatch is Idle → Dispatching → Idle per claimed key-down; there is no
/// queue. Handlers are launched by the caller and are expected to be
/// idempotent or guarded themselves.
#[derive(Debug)]
pub struct ShortcutEngine {
    tracker: KeyChordTracker,
    commands: Vec<Command>,
}

impl Default for ShortcutEngine {
    fn default() -> Self {
        Self::new(default_commands())
    }
}

impl ShortcutEngine {
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            tracker: KeyChordTracker::new(),
            commands,
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn modifiers(&self) -> ModifierState {
        self.tracker.state()
    }

    pub fn bindings(&self) -> Vec<ChordBinding> {
        self.commands
            .iter()
            .map(|c| ChordBinding {
                chord: c.chord,
                path: c.path.to_string(),
            })
            .collect()
    }

    pub fn key_down(&mut self, ev: &KeyEvent, path: &str) -> KeyOutcome {
        if ev
            .target_classes
            .iter()
            .any(|class| class == IGNORED_TARGET_CLASS)
        {
            trace!(key_code = ev.key_code, "key-down from dialog form ignored");
            return KeyOutcome::PassThrough;
        }

        self.tracker.key_down(ev);
        let Some(chord) = self.tracker.chord() else {
            return KeyOutcome::PassThrough;
        };

        // First match in table order wins if the table is ever ambiguous.
        match self.commands.iter().find(|c| c.matches(&chord, path)) {
            Some(command) => {
                debug!(chord = %chord, path, command = ?command.kind, "shortcut matched");
                KeyOutcome::Dispatch(command.kind)
            }
            None => KeyOutcome::PassThrough,
        }
    }

    pub fn key_up(&mut self, ev: &KeyEvent) {
        self.tracker.key_up(ev);
    }
}
