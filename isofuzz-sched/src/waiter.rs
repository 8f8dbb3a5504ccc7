use std::sync::{Condvar, Mutex, PoisonError};

// One-shot park/release pair: a ready flag plus its condvar. Exactly one
// producer calls release and exactly one consumer calls park. The parked
// worker holds the primary Arc; the scheduler's clone lives in the waiter
// map and is removed before the signal, so after release only the worker
// can reach the object and the final drop runs on the observing thread.
#[derive(Debug, Default)]
pub(crate) struct Waiter {
    ready: Mutex<bool>,
    cv: Condvar,
}

impl Waiter {
    pub(crate) fn new() -> Self {
        Waiter::default()
    }

    // Block until released. Returns immediately if release already ran.
    pub(crate) fn park(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        while !*ready {
            ready = self.cv.wait(ready).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn release(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        *ready = true;
        drop(ready);
        self.cv.notify_one();
    }
}
