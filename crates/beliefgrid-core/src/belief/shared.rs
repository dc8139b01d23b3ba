use super::BeliefState;
use parking_lot::Mutex;
use std::sync::Arc;

/// A belief shared by every task instance of one kind.
///
/// Clones refer to the same slot. The first `initialize_with` wins; later
/// calls see the existing belief.
#[derive(Debug, Clone, Default)]
pub struct SharedBelief {
    slot: Arc<Mutex<SharedSlot>>,
}

#[derive(Debug, Default)]
struct SharedSlot {
    initial: Option<BeliefState>,
    current: Option<BeliefState>,
}

impl SharedBelief {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `init` only if no belief exists yet. Returns whether it ran.
    pub fn initialize_with(&self, init: impl FnOnce() -> BeliefState) -> bool {
        let mut slot = self.slot.lock();
        if slot.current.is_some() {
            return false;
        }
        let belief = init();
        slot.initial = Some(belief.clone());
        slot.current = Some(belief);
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.lock().current.is_some()
    }

    /// Restores the belief captured at initialization.
    pub fn reset(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.initial.clone() {
            Some(initial) => {
                slot.current = Some(initial);
                true
            }
            None => false,
        }
    }

    /// Runs `f` under the lock; `None` if the belief was never initialized.
    pub fn with_belief<R>(&self, f: impl FnOnce(&mut BeliefState) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        slot.current.as_mut().map(f)
    }

    pub fn snapshot(&self) -> Option<BeliefState> {
        self.slot.lock().current.clone()
    }

    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn initializes_once_across_threads() {
        let shared = SharedBelief::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let shared = shared.clone();
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    shared.initialize_with(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        BeliefState::one_hot(4, worker % 4).expect("belief")
                    })
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .filter(|ran| *ran)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(shared.is_initialized());
    }

    #[test]
    fn clones_observe_each_others_updates() {
        let shared = SharedBelief::new();
        let other = shared.clone();
        assert_eq!(shared.handle_count(), 2);
        assert!(other.with_belief(|_| ()).is_none());

        shared.initialize_with(|| BeliefState::one_hot(3, 0).expect("belief"));
        other
            .with_belief(|belief| belief.reset_to(2))
            .expect("initialized")
            .expect("in range");
        assert_eq!(shared.snapshot().map(|b| b.argmax()), Some(2));

        assert!(shared.reset());
        assert_eq!(other.snapshot().map(|b| b.argmax()), Some(0));
    }
}
