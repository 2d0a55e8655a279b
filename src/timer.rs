//! Cancel-and-replace timers
//!
//! A [`TimerSlot`] holds at most one pending timer. Scheduling aborts the
//! previous one first, and every firing carries a generation so a firing that
//! was already queued when the slot was cancelled is recognised as stale.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::events::{Event, Inbox};
use crate::page::ElementId;

/// What a timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Debounced recorder stop after speech end
    HangoverStop,
    /// Hard ceiling on one recording (also paces manual chunks)
    RecordingCeiling,
    /// Delayed STT provider restart
    ProviderRestart,
    /// Delayed wake-word recognizer restart
    WakeRestart,
    /// Remove a field highlight
    Highlight(ElementId),
}

/// A timer firing delivered to the assistant inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Timer purpose
    pub kind: TimerKind,
    /// Slot generation at scheduling time
    pub generation: u64,
}

/// Holds one cancellable timer
#[derive(Debug)]
pub struct TimerSlot {
    kind: TimerKind,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Create an empty slot
    #[must_use]
    pub const fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            generation: 0,
            handle: None,
        }
    }

    /// Schedule a firing, replacing any pending one
    pub fn schedule(&mut self, after: Duration, inbox: &Inbox) {
        self.cancel();

        let fired = TimerFired {
            kind: self.kind,
            generation: self.generation,
        };
        let inbox = inbox.clone();

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = inbox.send(Event::Timer(fired));
        }));
    }

    /// Cancel the pending firing, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Whether a firing is pending
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Accept a firing for this slot
    ///
    /// Returns true exactly once per scheduled firing; stale or foreign
    /// firings return false.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        if fired.kind != self.kind || fired.generation != self.generation || self.handle.is_none() {
            return false;
        }
        self.handle = None;
        true
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::inbox;

    async fn next_timer(rx: &mut crate::events::InboxReceiver) -> TimerFired {
        match rx.recv().await {
            Some(Event::Timer(fired)) => fired,
            other => panic!("expected timer event, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once() {
        let (tx, mut rx) = inbox();
        let mut slot = TimerSlot::new(TimerKind::HangoverStop);

        slot.schedule(Duration::from_millis(1500), &tx);
        assert!(slot.is_armed());

        let fired = next_timer(&mut rx).await;
        assert!(slot.accept(fired));
        assert!(!slot.accept(fired));
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces() {
        let (tx, mut rx) = inbox();
        let mut slot = TimerSlot::new(TimerKind::HangoverStop);

        slot.schedule(Duration::from_millis(100), &tx);
        slot.schedule(Duration::from_millis(200), &tx);

        let fired = next_timer(&mut rx).await;
        assert!(slot.accept(fired));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_firing_rejected() {
        let (tx, mut rx) = inbox();
        let mut slot = TimerSlot::new(TimerKind::RecordingCeiling);

        slot.schedule(Duration::from_millis(10), &tx);
        let fired = next_timer(&mut rx).await;

        // Cancelled after the firing was queued but before it was handled
        slot.cancel();
        assert!(!slot.accept(fired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_kind_rejected() {
        let (tx, mut rx) = inbox();
        let mut slot = TimerSlot::new(TimerKind::WakeRestart);
        let mut other = TimerSlot::new(TimerKind::ProviderRestart);

        other.schedule(Duration::from_millis(10), &tx);
        slot.schedule(Duration::from_millis(20), &tx);

        let fired = next_timer(&mut rx).await;
        assert!(!slot.accept(fired));
        assert!(other.accept(fired));
    }
}
