// The registry maps opaque host-visible handles to per-transaction
// metadata. Each transaction gets a library-assigned id at begin
// (monotonically increasing from 1, never reused) and may later be
// promoted to carry the permanent DBMS-assigned id; trace attribution
// uses whichever is in effect. The registry is instantiable so the core
// is testable; the process-wide instance lives in the isofuzz crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;


// Opaque pointer-sized token by which the host refers to a live
// transaction. Zero is the null handle, a no-op for every consumer.
// A handle is valid exactly while its library id is present in the
// registry: from trx_begin to trx_end.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TrxHandle(u64);

impl TrxHandle {
    pub const NULL: TrxHandle = TrxHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn from_raw(raw: u64) -> Self {
        TrxHandle(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    fn lib_id(&self) -> Option<u64> {
        (self.0 != 0).then_some(self.0)
    }
}

// Per-transaction metadata. Shared behind Arc: a logger holding a record
// across a concurrent end() still reads valid memory. dbms_id is written
// exactly once, at promotion, and read concurrently by the logger.
#[derive(Debug)]
pub struct TrxRecord {
    lib_id: u64,
    dbms_id: AtomicU64,
    thread: String,
}

impl TrxRecord {
    pub fn lib_id(&self) -> u64 {
        self.lib_id
    }

    pub fn dbms_id(&self) -> u64 {
        self.dbms_id.load(Ordering::Relaxed)
    }

    // The thread that began the transaction, for trace attribution.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    // The DBMS-assigned id once promoted, the library id before that.
    pub fn effective_id(&self) -> u64 {
        match self.dbms_id() {
            0 => self.lib_id,
            id => id,
        }
    }
}

// Worker threads are labeled in begin order on their first registry use.
static NEXT_THREAD_LABEL: AtomicU64 = AtomicU64::new(1);
thread_local! {
    static THREAD_LABEL: String =
        format!("th-{}", NEXT_THREAD_LABEL.fetch_add(1, Ordering::Relaxed));
}

fn current_thread_label() -> String {
    THREAD_LABEL.with(|label| label.clone())
}

#[derive(Debug)]
pub struct Registry {
    next_id: AtomicU64,
    records: Mutex<HashMap<u64, Arc<TrxRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            next_id: AtomicU64::new(1),
            records: Mutex::new(HashMap::new()),
        }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<TrxRecord>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Register a transaction begun on the calling thread and hand back
    // its handle.
    pub fn begin(&self) -> TrxHandle {
        let lib_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(TrxRecord {
            lib_id,
            dbms_id: AtomicU64::new(0),
            thread: current_thread_label(),
        });
        self.records().insert(lib_id, record);
        trace!(target: "isofuzz", "trx {lib_id} begun");
        TrxHandle(lib_id)
    }

    // Unregister. The handle is dead after this; null is a no-op.
    pub fn end(&self, handle: TrxHandle) {
        let Some(lib_id) = handle.lib_id() else {
            return;
        };
        if self.records().remove(&lib_id).is_some() {
            trace!(target: "isofuzz", "trx {lib_id} ended");
        }
    }

    // Resolve a handle. None for null or unknown handles; every caller
    // treats None as a no-op.
    pub fn get(&self, handle: TrxHandle) -> Option<Arc<TrxRecord>> {
        let lib_id = handle.lib_id()?;
        self.records().get(&lib_id).cloned()
    }

    // Store the DBMS-assigned id, returning the record so the caller can
    // emit the PROMOTE trace line correlating old and new ids. A second
    // promotion overwrites the first.
    pub fn promote(&self, handle: TrxHandle, dbms_id: u64) -> Option<Arc<TrxRecord>> {
        let record = self.get(handle)?;
        record.dbms_id.store(dbms_id, Ordering::Relaxed);
        trace!(target: "isofuzz", "trx {} promoted to {dbms_id}", record.lib_id);
        Some(record)
    }

    pub fn live_count(&self) -> usize {
        self.records().len()
    }
}
