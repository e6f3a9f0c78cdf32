//! The long-poll scheduler: the state machine for a suspended
//! `/meta/connect`.
//!
//! Exactly one of four resume paths -- message arrival, timer expiry,
//! duplicate-connect preemption, transport error -- completes a given
//! waiter, and only the first one to fire wins (`SPEC_FULL.md` §4.4/§5).
//! Completion is a plain `std::sync::Mutex`-guarded take of the one-shot
//! sender: cheap, synchronous, and safe to call from any of the four call
//! sites without an `.await`.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterOutcome {
    /// The hold ended because a message became available (`timed_out =
    /// false`) or the timer fired first (`timed_out = true`).
    Resumed { timed_out: bool },
    /// A newer `/meta/connect` for the same session preempted this one.
    CancelledByDuplicate,
    /// The underlying HTTP response errored or its socket was destroyed.
    CancelledByTransportError,
}

pub struct LongPollWaiter {
    tx: StdMutex<Option<oneshot::Sender<WaiterOutcome>>>,
    timer: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl LongPollWaiter {
    /// Arms a waiter: starts a single-shot timer for `timeout` that resolves
    /// with `Resumed { timed_out: true }` if nothing else completes it
    /// first.
    pub fn new_armed(tx: oneshot::Sender<WaiterOutcome>, timeout: Duration) -> Arc<Self> {
        let waiter = Arc::new(Self {
            tx: StdMutex::new(Some(tx)),
            timer: StdMutex::new(None),
        });
        let weak: Weak<Self> = Arc::downgrade(&waiter);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(waiter) = weak.upgrade() {
                waiter.complete(WaiterOutcome::Resumed { timed_out: true });
            }
        });
        *waiter.timer.lock().expect("timer mutex poisoned") = Some(handle);
        waiter
    }

    fn complete(&self, outcome: WaiterOutcome) -> bool {
        let sender = self.tx.lock().expect("waiter mutex poisoned").take();
        match sender {
            Some(tx) => {
                if let Some(handle) = self.timer.lock().expect("timer mutex poisoned").take() {
                    handle.abort();
                }
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Resume path 1/2: a message is now available for the session. Returns
    /// `true` if this call won the race (first completion).
    pub fn resume_with_message(&self) -> bool {
        self.complete(WaiterOutcome::Resumed { timed_out: false })
    }

    /// Resume path 3: a newer `/meta/connect` preempted this one.
    pub fn cancel_duplicate(&self) -> bool {
        self.complete(WaiterOutcome::CancelledByDuplicate)
    }

    /// Resume path 4: the response's socket errored or was destroyed.
    pub fn cancel_transport_error(&self) -> bool {
        self.complete(WaiterOutcome::CancelledByTransportError)
    }

    /// True once this waiter has already completed via any path.
    pub fn is_settled(&self) -> bool {
        self.tx.lock().expect("waiter mutex poisoned").is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn resume_wins_over_later_expiry() {
        let (tx, rx) = oneshot::channel();
        let waiter = LongPollWaiter::new_armed(tx, Duration::from_millis(1_000));
        assert!(waiter.resume_with_message());
        assert!(!waiter.resume_with_message(), "second completion must be a no-op");
        let outcome = rx.await.unwrap();
        assert_eq!(outcome, WaiterOutcome::Resumed { timed_out: false });
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_when_nothing_else_completes_first() {
        let (tx, rx) = oneshot::channel();
        let _waiter = LongPollWaiter::new_armed(tx, Duration::from_millis(500));
        tokio::time::advance(Duration::from_millis(600)).await;
        let outcome = rx.await.unwrap();
        assert_eq!(outcome, WaiterOutcome::Resumed { timed_out: true });
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_connect_cancels_before_timer() {
        let (tx, rx) = oneshot::channel();
        let waiter = LongPollWaiter::new_armed(tx, Duration::from_secs(30));
        assert!(waiter.cancel_duplicate());
        let outcome = rx.await.unwrap();
        assert_eq!(outcome, WaiterOutcome::CancelledByDuplicate);
        // Timer was aborted -- advancing well past it must not panic or
        // double-send (the oneshot is already consumed).
        tokio::time::advance(Duration::from_secs(60)).await;
    }
}
