//! One-way flags shared between the session and the work it schedules.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Cancels everything holding a clone. Once cancelled it stays cancelled;
/// callers that want to schedule again mint a new token.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Sending half of a render-finished notification. Resolving consumes it, so
/// one render can report completion at most once.
#[derive(Debug)]
pub struct CompletionSignal {
    fired: Arc<AtomicBool>,
}

impl CompletionSignal {
    pub fn resolve(self) {
        self.fired.store(true, Ordering::Release);
    }
}

/// Receiving half, owned by the transport. `take` reports a completion once
/// and then reads as pending again.
#[derive(Debug, Default)]
pub struct RenderCompletion {
    fired: Arc<AtomicBool>,
}

impl RenderCompletion {
    pub fn pair() -> (CompletionSignal, RenderCompletion) {
        let fired = Arc::new(AtomicBool::new(false));
        (
            CompletionSignal {
                fired: Arc::clone(&fired),
            },
            RenderCompletion { fired },
        )
    }

    pub fn take(&self) -> bool {
        self.fired.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_visible_to_clones() {
        let token = CancellationToken::new();
        let held = token.clone();
        assert!(!held.is_cancelled());
        token.cancel();
        assert!(held.is_cancelled());
    }

    #[test]
    fn completion_is_observed_exactly_once() {
        let (signal, completion) = RenderCompletion::pair();
        assert!(!completion.take());
        signal.resolve();
        assert!(completion.take());
        assert!(!completion.take());
    }

    #[test]
    fn completion_crosses_threads() {
        let (signal, completion) = RenderCompletion::pair();
        std::thread::spawn(move || signal.resolve())
            .join()
            .unwrap();
        assert!(completion.take());
    }
}
