// The epoch scheduler is a batching rendezvous. Worker threads hand in a
// request and park; a dedicated background thread alternates between two
// phases:
//
//   COLLECTING -- sleep one epoch (a short wall-clock window), then move
//   whatever accumulated in the pending FIFO into a priority queue. An
//   empty FIFO means another COLLECTING round.
//
//   DRAINING -- release the batch one worker at a time in ascending order
//   of priorities drawn from a seeded PRNG, FIFO among equals. When the
//   queue is empty, go back to COLLECTING.
//
// The interleaving the host observes is therefore a seeded random shuffle
// of each epoch's batch. Requests that arrive while a batch drains wait
// for the next epoch; a request whose FIFO push races the drain itself is
// deferred the same way, which is an accepted sampling artifact.
//
// Locking. Two mutexes, never held together:
//
//   - the pending mutex covers only the handoff FIFO, so submission never
//     contends with batch drain;
//   - the scheduler-global mutex covers the priority queue, the waiter
//     map, the PRNG, and the epoch-state writes on the draining path.
//
// Waiter lifetime is the delicate part. Each parked worker owns its
// waiter; the map holds a second reference which the background thread
// removes *before* signaling. After the signal only the woken worker can
// reach the waiter, so its destruction is single-threaded. A worker
// inserts its waiter into the map before pushing onto the FIFO: the
// pending mutex then orders insert-before-drain, and a batched entry
// always finds its waiter in the map.
//
// Transaction-lifecycle events never come through here; the entry-point
// layer routes them straight to the trace. Parking a begin or commit
// can deadlock against the host's own transaction-manager locks.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use isofuzz_base::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

mod waiter;
use waiter::Waiter;

#[cfg(test)]
mod test;

pub const PRIORITY_MAX: u32 = 1_000_000;

// Epoch state. Relaxed suffices: every transition on the draining path is
// paired with an acquisition of the scheduler-global mutex.
const COLLECTING: u8 = 0;
const DRAINING: u8 = 1;

fn draw_priority(rng: &mut StdRng) -> u32 {
    rng.gen_range(0..=PRIORITY_MAX)
}

// One batched request. Ordering is ascending priority, then insertion
// sequence among equals.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
struct Entry {
    priority: u32,
    seq: u64,
    lib_id: u64,
}

// The priority queue for the batch under active drain.
#[derive(Debug, Default)]
struct Batch {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Batch {
    fn push(&mut self, priority: u32, lib_id: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            priority,
            seq,
            lib_id,
        }));
    }

    fn pop_min(&mut self) -> Option<Entry> {
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    fn clear(&mut self) {
        self.heap.clear();
    }
}

// Everything under the scheduler-global mutex.
#[derive(Debug)]
struct Core {
    rng: StdRng,
    batch: Batch,
    waiters: HashMap<u64, Arc<Waiter>>,
}

#[derive(Debug, Default)]
struct Counters {
    epochs: AtomicU64,
    released: AtomicU64,
}

// Point-in-time scheduler counters: epochs that drained a non-empty
// batch, and workers released from them.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Stats {
    pub epochs: u64,
    pub released: u64,
}

#[derive(Debug)]
struct Shared {
    running: AtomicBool,
    state: AtomicU8,
    epoch: Duration,
    pending: Mutex<VecDeque<(u32, u64)>>,
    core: Mutex<Core>,
    // Interruptible epoch sleep; the flag is the stop request.
    doze: (Mutex<bool>, Condvar),
    counters: Counters,
    #[cfg(test)]
    release_log: Mutex<Vec<u64>>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, VecDeque<(u32, u64)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Sleep one epoch, or less if stop is requested. True means stop.
    fn doze_for_epoch(&self) -> bool {
        let (lock, cv) = &self.doze;
        let mut stop = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.epoch;
        while !*stop {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = cv
                .wait_timeout(stop, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            stop = guard;
        }
        true
    }
}

// Owning handle for the background epoch thread. Dropping it stops the
// thread and force-releases anything still parked.
#[derive(Debug)]
pub struct Scheduler {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn start(seed: u64, epoch: Duration) -> Scheduler {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            state: AtomicU8::new(COLLECTING),
            epoch,
            pending: Mutex::new(VecDeque::new()),
            core: Mutex::new(Core {
                rng: StdRng::seed_from_u64(seed),
                batch: Batch::default(),
                waiters: HashMap::new(),
            }),
            doze: (Mutex::new(false), Condvar::new()),
            counters: Counters::default(),
            #[cfg(test)]
            release_log: Mutex::new(Vec::new()),
        });
        debug!(target: "isofuzz", "scheduler starting: seed={seed}, epoch={epoch:?}");
        let thread = std::thread::Builder::new()
            .name("isofuzz-epoch".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(&shared)
            })
            .map_err(Error::scheduler_down);
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(_) => {
                // With no epoch thread nothing would ever be released, so
                // requests must not park at all.
                shared.running.store(false, Ordering::Relaxed);
                None
            }
        };
        Scheduler {
            shared,
            thread: Mutex::new(thread),
        }
    }

    // Park the calling worker until the scheduler grants its turn in some
    // epoch. Returns immediately once stop has begun.
    pub fn request(&self, lib_id: u64) {
        let shared = &self.shared;
        let waiter = Arc::new(Waiter::new());
        let priority = {
            let mut core = shared.core();
            if !shared.running.load(Ordering::Relaxed) {
                return;
            }
            let priority = draw_priority(&mut core.rng);
            core.waiters.insert(lib_id, Arc::clone(&waiter));
            priority
        };
        shared.pending().push_back((priority, lib_id));
        trace!(target: "isofuzz", "request {lib_id} parked at priority {priority}");
        waiter.park();
        // Final drop of the waiter happens here, on the observing thread.
    }

    // Stop the epoch thread, then force-release every worker still parked.
    // Idempotent; request() is a no-op afterwards.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Relaxed);
        {
            let (lock, cv) = &self.shared.doze;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cv.notify_one();
        }
        let joinable = {
            let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
            thread.take()
        };
        if let Some(handle) = joinable {
            let _ = handle.join();
        }
        // The epoch thread is gone; whatever remains in the map is a
        // worker parked across shutdown. Remove each entry before its
        // signal, as on the normal release path.
        let leftovers: Vec<Arc<Waiter>> = {
            let mut core = self.shared.core();
            core.batch.clear();
            core.waiters.drain().map(|(_, waiter)| waiter).collect()
        };
        let stragglers = leftovers.len();
        for waiter in leftovers {
            waiter.release();
        }
        self.shared.pending().clear();
        self.shared.state.store(COLLECTING, Ordering::Relaxed);
        let stats = self.stats();
        debug!(
            target: "isofuzz",
            "scheduler stopped: {} epochs drained, {} released, {} force-released",
            stats.epochs, stats.released, stragglers
        );
    }

    pub fn stats(&self) -> Stats {
        Stats {
            epochs: self.shared.counters.epochs.load(Ordering::Relaxed),
            released: self.shared.counters.released.load(Ordering::Relaxed),
        }
    }

    // Number of currently-parked workers; zero between epochs and after
    // stop.
    pub fn parked(&self) -> usize {
        self.shared.core().waiters.len()
    }

    #[cfg(test)]
    fn release_log(&self) -> Vec<u64> {
        self.shared
            .release_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared) {
    trace!(target: "isofuzz", "epoch thread up");
    while shared.running.load(Ordering::Relaxed) {
        if shared.doze_for_epoch() {
            break;
        }
        let drained: Vec<(u32, u64)> = shared.pending().drain(..).collect();
        if drained.is_empty() {
            continue;
        }
        {
            let mut core = shared.core();
            shared.state.store(DRAINING, Ordering::Relaxed);
            for (priority, lib_id) in drained {
                core.batch.push(priority, lib_id);
            }
        }
        let mut released = 0u64;
        loop {
            let popped = {
                let mut core = shared.core();
                match core.batch.pop_min() {
                    Some(entry) => core
                        .waiters
                        .remove(&entry.lib_id)
                        .map(|waiter| (entry.lib_id, waiter)),
                    None => {
                        shared.state.store(COLLECTING, Ordering::Relaxed);
                        break;
                    }
                }
            };
            // The map entry is gone before the signal: from here only the
            // parked worker can reach this waiter.
            if let Some((lib_id, waiter)) = popped {
                #[cfg(test)]
                shared
                    .release_log
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(lib_id);
                waiter.release();
                released += 1;
                trace!(target: "isofuzz", "request {lib_id} released");
            }
        }
        shared.counters.epochs.fetch_add(1, Ordering::Relaxed);
        shared.counters.released.fetch_add(released, Ordering::Relaxed);
        trace!(target: "isofuzz", "epoch drained: {released} released");
    }
    trace!(target: "isofuzz", "epoch thread down");
}
