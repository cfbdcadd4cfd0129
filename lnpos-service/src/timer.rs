//! Timer ownership
//!
//! Every logical timer lives in a [`TimerSlot`] owned by exactly one state
//! machine. Arming a slot aborts whatever it held before, and dropping the
//! slot aborts the running task, so a timer can never outlive its owner.

use std::fmt;
use std::future::Future;
use tokio::task::JoinHandle;

/// Logical timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Invoice settlement poll
    SettlementPoll,
    /// Invoice countdown
    Countdown,
    /// Extend/cancel prompt auto-dismiss
    PromptDismiss,
    /// Protected screen session re-check
    SessionRecheck,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SettlementPoll => "settlement-poll",
            Self::Countdown => "countdown",
            Self::PromptDismiss => "prompt-dismiss",
            Self::SessionRecheck => "session-recheck",
        };
        f.write_str(name)
    }
}

/// Slot holding at most one running timer task
#[derive(Debug)]
pub struct TimerSlot {
    kind: TimerKind,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Empty slot
    pub fn new(kind: TimerKind) -> Self {
        Self { kind, handle: None }
    }

    /// Timer kind
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// Spawn `task` in this slot, aborting the previous one. Must be called
    /// from within a tokio runtime.
    pub fn arm<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        tracing::trace!("Arming {} timer", self.kind);
        self.handle = Some(tokio::spawn(task));
    }

    /// Abort the running task. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::trace!("Cancelled {} timer", self.kind);
                true
            }
            None => false,
        }
    }

    /// Whether a task is armed and still running
    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ticking(counter: Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_task() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut slot = TimerSlot::new(TimerKind::Countdown);

        slot.arm(ticking(first.clone()));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        slot.arm(ticking(second.clone()));
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 3);
        assert!(slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut slot = TimerSlot::new(TimerKind::SettlementPoll);
            slot.arm(ticking(counter.clone()));
            tokio::time::sleep(Duration::from_millis(1_500)).await;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_reports_state() {
        let mut slot = TimerSlot::new(TimerKind::PromptDismiss);
        assert!(!slot.cancel());
        slot.arm(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert!(slot.is_armed());
        assert!(slot.cancel());
        assert!(!slot.is_armed());
    }
}
