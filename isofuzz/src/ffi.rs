// C-ABI surface for hosts that cannot call Rust directly. Handles cross
// the boundary as pointer-sized integers (zero is null); enumerations
// cross as plain ints with out-of-range values degrading to no-op or
// UNKNOWN. Every function catches panics: instrumentation must never
// unwind into the host.

use std::ffi::{c_char, c_int, CStr};
use std::panic::catch_unwind;

use crate::{Intent, OpKind, RowRef, TrxHandle};

fn intent_from_raw(raw: c_int) -> Option<Intent> {
    match raw {
        0 => Some(Intent::TxnBegin),
        1 => Some(Intent::TxnCommit),
        2 => Some(Intent::TxnAbort),
        3 => Some(Intent::Read),
        4 => Some(Intent::Write),
        _ => None,
    }
}

fn op_from_raw(raw: c_int) -> OpKind {
    match raw {
        0 => OpKind::Read,
        1 => OpKind::WriteUpdate,
        2 => OpKind::WriteInsert,
        3 => OpKind::WriteDelete,
        4 => OpKind::TxnPromote,
        5 => OpKind::TxnBegin,
        6 => OpKind::TxnCommit,
        _ => OpKind::Unknown,
    }
}

#[no_mangle]
pub extern "C" fn isofuzz_init() {
    let _ = catch_unwind(crate::init);
}

#[no_mangle]
pub extern "C" fn isofuzz_shutdown() {
    let _ = catch_unwind(crate::shutdown);
}

#[no_mangle]
pub extern "C" fn isofuzz_trx_begin() -> TrxHandle {
    catch_unwind(crate::trx_begin).unwrap_or(TrxHandle::NULL)
}

#[no_mangle]
pub extern "C" fn isofuzz_trx_promote(handle: TrxHandle, dbms_id: u64) {
    let _ = catch_unwind(|| crate::trx_promote(handle, dbms_id));
}

#[no_mangle]
pub extern "C" fn isofuzz_trx_end(handle: TrxHandle) {
    let _ = catch_unwind(|| crate::trx_end(handle));
}

#[no_mangle]
pub extern "C" fn isofuzz_schedule_op(handle: TrxHandle, intent: c_int) {
    let _ = catch_unwind(|| {
        if let Some(intent) = intent_from_raw(intent) {
            crate::schedule_op(handle, intent);
        }
    });
}

// A null table pointer means no object (transaction-lifecycle record); a
// null column pointer means a whole-row operation; a zero has_row flag
// means the object carries no row id. Non-UTF-8 names are replaced
// lossily.
#[no_mangle]
pub unsafe extern "C" fn isofuzz_log_op(
    handle: TrxHandle,
    op: c_int,
    table: *const c_char,
    column: *const c_char,
    has_row: c_int,
    row_id: u64,
    last_writer: u64,
) {
    let obj = if table.is_null() {
        None
    } else {
        let table = unsafe { CStr::from_ptr(table) }
            .to_string_lossy()
            .into_owned();
        let column = if column.is_null() {
            None
        } else {
            Some(
                unsafe { CStr::from_ptr(column) }
                    .to_string_lossy()
                    .into_owned(),
            )
        };
        Some(RowRef {
            table,
            column,
            row: (has_row != 0).then_some(row_id),
        })
    };
    let _ = catch_unwind(|| crate::log_op(handle, op_from_raw(op), obj, last_writer));
}
