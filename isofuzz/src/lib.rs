// Public surface of the fuzzing sidecar. A host DBMS is instrumented at
// transaction begin/commit/abort and per-row read/write/insert/delete
// points; each instrumentation point makes one call here. Two calls pair
// up at every data operation: schedule_op parks the calling worker until
// the epoch scheduler grants its turn, then log_op appends the trace
// line. Transaction-lifecycle events (begin, commit, abort, promote) are
// log-only and never park -- parking them can deadlock against the host's
// own transaction-manager locks.
//
// Nothing here returns an error to the host. A null or stale handle makes
// the operation a no-op; a broken trace destination degrades to stderr;
// init and shutdown are idempotent. The host must call shutdown at
// teardown to unpark any workers still waiting on an epoch turn.
//
// All state lives in a Library value. The host-facing entry points
// operate on one process-wide instance, installed by init and removed by
// shutdown; tests build their own instances with an explicit Config.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

pub use isofuzz_base::Config;
pub use isofuzz_sched::Stats;
pub use isofuzz_trace::{OpKind, Record, RowRef};
pub use isofuzz_txn::TrxHandle;

use isofuzz_sched::Scheduler;
use isofuzz_trace::Sink;
use isofuzz_txn::Registry;

pub mod ffi;


// The caller's declared purpose for a scheduling request. Only Read and
// Write reach the scheduler; the full enumeration is part of the contract
// for future feedback-driven priority policies.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Intent {
    TxnBegin = 0,
    TxnCommit = 1,
    TxnAbort = 2,
    Read = 3,
    Write = 4,
}

impl Intent {
    fn parks(&self) -> bool {
        matches!(self, Intent::Read | Intent::Write)
    }
}

// One complete sidecar: trace sink, transaction registry, epoch
// scheduler.
#[derive(Debug)]
pub struct Library {
    sink: Sink,
    registry: Registry,
    sched: Scheduler,
}

impl Library {
    pub fn new(config: &Config) -> Library {
        Library {
            sink: Sink::from_config(config.out_file.as_deref()),
            registry: Registry::new(),
            sched: Scheduler::start(config.seed, config.epoch),
        }
    }

    pub fn trx_begin(&self) -> TrxHandle {
        self.registry.begin()
    }

    // Record the DBMS-assigned id and emit the PROMOTE line correlating
    // it with the library id: the effective-id field already carries the
    // new id, the writer field the old one.
    pub fn trx_promote(&self, handle: TrxHandle, dbms_id: u64) {
        let Some(record) = self.registry.promote(handle, dbms_id) else {
            return;
        };
        let line = Record::new(
            record.thread(),
            record.effective_id(),
            OpKind::TxnPromote,
            None,
            record.lib_id(),
        );
        self.sink.write_line(&line.to_string());
    }

    // The host calls this after its own commit or abort has completed.
    pub fn trx_end(&self, handle: TrxHandle) {
        self.registry.end(handle);
    }

    // Park until the scheduler grants this transaction's turn in the
    // current epoch. Lifecycle intents pass straight through.
    pub fn schedule_op(&self, handle: TrxHandle, intent: Intent) {
        let Some(record) = self.registry.get(handle) else {
            return;
        };
        if intent.parks() {
            self.sched.request(record.lib_id());
        }
    }

    // Append one trace line attributed to the transaction's originating
    // thread and effective id.
    pub fn log_op(&self, handle: TrxHandle, op: OpKind, obj: Option<RowRef>, last_writer: u64) {
        let Some(record) = self.registry.get(handle) else {
            return;
        };
        let line = Record::new(record.thread(), record.effective_id(), op, obj, last_writer);
        self.sink.write_line(&line.to_string());
    }

    pub fn stats(&self) -> Stats {
        self.sched.stats()
    }

    // Stop the scheduler (unparking any waiting workers), then flush and
    // close the sink.
    pub fn close(&self) {
        self.sched.stop();
        self.sink.close();
    }
}

static GLOBAL: Mutex<Option<Arc<Library>>> = Mutex::new(None);

fn current() -> Option<Arc<Library>> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

// Install the process-wide instance from environment configuration. A
// second call without an intervening shutdown is a no-op.
pub fn init() {
    let mut global = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    if global.is_some() {
        return;
    }
    let config = Config::from_env();
    debug!(target: "isofuzz", "init: {config:?}");
    *global = Some(Arc::new(Library::new(&config)));
}

// Remove and tear down the process-wide instance. Workers parked in
// schedule_op return normally. A second call is a no-op.
pub fn shutdown() {
    let taken = GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    // Torn down outside the lock: joining the epoch thread must not block
    // other entry points on the global mutex.
    if let Some(library) = taken {
        library.close();
        debug!(target: "isofuzz", "shutdown complete");
    }
}

pub fn trx_begin() -> TrxHandle {
    match current() {
        Some(library) => library.trx_begin(),
        None => TrxHandle::NULL,
    }
}

pub fn trx_promote(handle: TrxHandle, dbms_id: u64) {
    if let Some(library) = current() {
        library.trx_promote(handle, dbms_id);
    }
}

pub fn trx_end(handle: TrxHandle) {
    if let Some(library) = current() {
        library.trx_end(handle);
    }
}

pub fn schedule_op(handle: TrxHandle, intent: Intent) {
    if let Some(library) = current() {
        library.schedule_op(handle, intent);
    }
}

pub fn log_op(handle: TrxHandle, op: OpKind, obj: Option<RowRef>, last_writer: u64) {
    if let Some(library) = current() {
        library.log_op(handle, op, obj, last_writer);
    }
}
