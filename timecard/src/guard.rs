use std::sync::atomic::{AtomicBool, Ordering};

/// State of a [`ReentrancyGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    InProgress,
}

/// Two-state guard ensuring at most one in-flight trigger.
///
/// Unlike a lock, exit is explicit: the comment shortcut stays `InProgress`
/// until the next key-up, however long its own polling takes.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    busy: AtomicBool,
}

impl ReentrancyGuard {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Idle → InProgress. Returns false (and changes nothing) when already
    /// in progress.
    pub fn enter(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Back to Idle, whatever the current state.
    pub fn exit(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn state(&self) -> GuardState {
        if self.busy.load(Ordering::Acquire) {
            GuardState::InProgress
        } else {
            GuardState::Idle
        }
    }

    /// Enter and get a ticket that exits on drop.
    pub fn scoped(&self) -> Option<GuardTicket<'_>> {
        self.enter().then_some(GuardTicket { guard: self })
    }
}

/// Returned by [`ReentrancyGuard::scoped`].
#[derive(Debug)]
pub struct GuardTicket<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardTicket<'_> {
    fn drop(&mut self) {
        self.guard.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_enter_is_refused() {
        let guard = ReentrancyGuard::new();
        assert!(guard.enter());
        assert!(!guard.enter());
        assert_eq!(guard.state(), GuardState::InProgress);
        guard.exit();
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(guard.enter());
    }

    #[test]
    fn ticket_releases_on_drop() {
        let guard = ReentrancyGuard::new();
        {
            let _ticket = guard.scoped().unwrap();
            assert!(guard.scoped().is_none());
        }
        assert_eq!(guard.state(), GuardState::Idle);
    }
}
