//! Bounded polling and settle delays.
//!
//! Every "wait for X to appear" in the crate goes through [`Poll::until`]. A
//! poll either resolves with the probe's value or gives up silently after its
//! attempt budget; nothing outside cancels it.

use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// Fixed-interval poll with a maximum number of retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    pub interval: Duration,
    /// Retries after the first, immediate probe.
    pub max_attempts: u32,
}

impl Poll {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub const fn millis(interval_ms: u64, max_attempts: u32) -> Self {
        Self::new(Duration::from_millis(interval_ms), max_attempts)
    }

    /// Probe once immediately, then every `interval` until the probe yields a
    /// value or the budget is spent.
    pub async fn until<T, F, Fut>(&self, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        if let Some(found) = probe().await {
            return Some(found);
        }
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;
            if let Some(found) = probe().await {
                trace!(attempt, "poll resolved");
                return Some(found);
            }
        }
        trace!(attempts = self.max_attempts, "poll budget exhausted");
        None
    }
}

/// Pause to let the host react to what we just did.
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// All waits and delays used by the automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    pub toolbar: Poll,
    pub banner: Poll,
    pub comment_option: Poll,
    pub comment_panel: Poll,
    pub editor_host: Poll,
    pub completion: Poll,
    /// Dialog close → first grid scan.
    pub before_insertion: Duration,
    /// Comment panel opened → textarea population.
    pub after_comment_open: Duration,
    /// Comment saved → fresh cell scan.
    pub after_comment_save: Duration,
    /// Gap between typed characters.
    pub keystroke: Duration,
    /// Commit signals sent → verification scan.
    pub after_commit: Duration,
    /// Each step of the fallback recovery.
    pub recovery_step: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            toolbar: Poll::millis(200, 150),
            banner: Poll::millis(200, 50),
            comment_option: Poll::millis(200, 10),
            comment_panel: Poll::millis(300, 5),
            editor_host: Poll::millis(100, 15),
            completion: Poll::millis(1000, 120),
            before_insertion: Duration::from_millis(300),
            after_comment_open: Duration::from_millis(300),
            after_comment_save: Duration::from_millis(350),
            keystroke: Duration::from_millis(40),
            after_commit: Duration::from_millis(250),
            recovery_step: Duration::from_millis(200),
        }
    }
}

impl Timings {
    /// Same attempt budgets, no waiting. For driving an in-memory page.
    pub fn immediate() -> Self {
        let zero = |p: Poll| Poll::new(Duration::ZERO, p.max_attempts);
        let d = Self::default();
        Self {
            toolbar: zero(d.toolbar),
            banner: zero(d.banner),
            comment_option: zero(d.comment_option),
            comment_panel: zero(d.comment_panel),
            editor_host: zero(d.editor_host),
            completion: zero(d.completion),
            before_insertion: Duration::ZERO,
            after_comment_open: Duration::ZERO,
            after_comment_save: Duration::ZERO,
            keystroke: Duration::ZERO,
            after_commit: Duration::ZERO,
            recovery_step: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn resolves_on_first_hit() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let poll = Poll::millis(1, 10);
        let found = poll
            .until(|| async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                (n == 3).then_some(n)
            })
            .await;
        assert_eq!(found, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let poll = Poll::new(Duration::ZERO, 5);
        let found: Option<()> = poll
            .until(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            })
            .await;
        assert_eq!(found, None);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn immediate_keeps_budgets() {
        let t = Timings::immediate();
        assert_eq!(t.editor_host.max_attempts, 15);
        assert!(t.editor_host.interval.is_zero());
        assert!(t.keystroke.is_zero());
    }
}
