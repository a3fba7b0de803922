use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
enum Slot<T> {
    Pending,
    Resolved(T),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("wait was cancelled before a result was produced")]
    Cancelled,
}

/// Single-assignment result slot shared between producers and waiters.
///
/// The slot starts pending and moves exactly once to either resolved or
/// cancelled. Clones share the same slot. Any number of tasks may `wait()`
/// concurrently and all of them observe the same terminal state.
#[derive(Debug)]
pub struct Deferred<T> {
    slot: Arc<watch::Sender<Slot<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Deferred<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Slot::Pending);
        Self { slot: Arc::new(tx) }
    }

    /// Resolve the slot with `value`. Returns `true` only for the call that
    /// actually performed the transition.
    pub fn complete(&self, value: T) -> bool {
        self.transition(Slot::Resolved(value))
    }

    /// Cancel the slot if it is still pending. Waiters get `WaitError::Cancelled`.
    pub fn cancel(&self) -> bool {
        self.transition(Slot::Cancelled)
    }

    fn transition(&self, terminal: Slot<T>) -> bool {
        // send_if_modified runs the closure under the channel's write lock,
        // so the pending check and the store are one atomic step.
        self.slot.send_if_modified(|slot| {
            if matches!(slot, Slot::Pending) {
                *slot = terminal;
                true
            } else {
                false
            }
        })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(*self.slot.borrow(), Slot::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Resolved(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Cancelled)
    }

    /// The resolved value, if there is one yet.
    pub fn try_get(&self) -> Option<T> {
        match &*self.slot.borrow() {
            Slot::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Suspend until the slot leaves the pending state.
    pub async fn wait(&self) -> Result<T, WaitError> {
        let mut rx = self.slot.subscribe();
        let slot = rx
            .wait_for(|slot| !matches!(slot, Slot::Pending))
            .await
            .map_err(|_| WaitError::Cancelled)?;
        match &*slot {
            Slot::Resolved(value) => Ok(value.clone()),
            _ => Err(WaitError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_completion_wins() {
        let deferred = Deferred::new();
        assert!(!deferred.is_terminal());
        assert!(deferred.complete(1));
        assert!(!deferred.complete(2));
        assert!(!deferred.cancel());
        assert!(deferred.is_completed());
        assert!(!deferred.is_cancelled());
        assert_eq!(deferred.try_get(), Some(1));
    }

    #[test]
    fn cancel_blocks_later_completion() {
        let deferred = Deferred::<u32>::new();
        assert!(deferred.cancel());
        assert!(!deferred.complete(7));
        assert!(deferred.is_terminal());
        assert!(deferred.is_cancelled());
        assert_eq!(deferred.try_get(), None);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_resolved() {
        let deferred = Deferred::new();
        deferred.complete("done");
        assert_eq!(deferred.wait().await, Ok("done"));
    }

    #[tokio::test]
    async fn all_waiters_see_the_same_value() {
        let deferred = Deferred::<u64>::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let d = deferred.clone();
                tokio::spawn(async move { d.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(deferred.complete(11));

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok(11));
        }
    }

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let deferred = Deferred::<u64>::new();
        let waiter = {
            let d = deferred.clone();
            tokio::spawn(async move { d.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(deferred.cancel());
        assert_eq!(waiter.await.unwrap(), Err(WaitError::Cancelled));
    }

    #[test]
    fn concurrent_completions_have_one_winner() {
        let deferred = Deferred::<usize>::new();
        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let d = &deferred;
                    s.spawn(move || d.complete(i) as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
        assert!(deferred.try_get().is_some());
    }
}
