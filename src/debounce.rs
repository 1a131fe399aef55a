/// Quiet-period debouncing for bursts of change notifications
use log::debug;
use std::cell::Cell;
use std::time::Duration;

/// Something that can wait. `setTimeout` in the browser.
#[allow(async_fn_in_trait)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    /// Waiting for the quiet period of the event holding `ticket`
    Pending { ticket: u64 },
}

/// Collapses a burst of events into a single action.
///
/// Each call to [`Debouncer::settle`] registers an event and waits out the
/// quiet period. Only the wait belonging to the latest event resolves to
/// `true`; every earlier one resolves to `false` once it wakes up. Nothing
/// already running is interrupted.
pub struct Debouncer<T: Timer> {
    timer: T,
    quiet_period: Duration,
    state: Cell<DebounceState>,
    last_ticket: Cell<u64>,
}

impl<T: Timer> Debouncer<T> {
    pub fn new(timer: T, quiet_period: Duration) -> Self {
        Debouncer {
            timer,
            quiet_period,
            state: Cell::new(DebounceState::Idle),
            last_ticket: Cell::new(0),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state.get()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state.get(), DebounceState::Pending { .. })
    }

    /// Register an event; true when no later event arrived during the quiet period
    pub async fn settle(&self) -> bool {
        let ticket = self.last_ticket.get().wrapping_add(1);
        self.last_ticket.set(ticket);
        self.state.set(DebounceState::Pending { ticket });

        self.timer.sleep(self.quiet_period).await;

        if self.state.get() == (DebounceState::Pending { ticket }) {
            self.state.set(DebounceState::Idle);
            true
        } else {
            debug!("NovaTab: event {} superseded", ticket);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TokioTimer;
    use std::rc::Rc;
    use tokio::task::{spawn_local, LocalSet};
    use tokio::time::sleep;

    fn create_test_debouncer() -> Rc<Debouncer<TokioTimer>> {
        Rc::new(Debouncer::new(TokioTimer, Duration::from_millis(500)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_event_fires() {
        let debouncer = create_test_debouncer();
        assert_eq!(debouncer.state(), DebounceState::Idle);

        assert!(debouncer.settle().await);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_event_fires() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let debouncer = create_test_debouncer();
                let mut handles = Vec::new();

                for _ in 0..3 {
                    let d = debouncer.clone();
                    handles.push(spawn_local(async move { d.settle().await }));
                    sleep(Duration::from_millis(100)).await;
                }
                assert!(debouncer.is_pending());

                let mut results = Vec::new();
                for handle in handles {
                    results.push(handle.await.unwrap());
                }

                assert_eq!(results, vec![false, false, true]);
                assert_eq!(debouncer.state(), DebounceState::Idle);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_after_quiet_period_each_fire() {
        let debouncer = create_test_debouncer();

        assert!(debouncer.settle().await);
        sleep(Duration::from_millis(600)).await;
        assert!(debouncer.settle().await);
    }
}
