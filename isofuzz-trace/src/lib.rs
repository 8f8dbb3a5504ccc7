// The trace is this library's product: one tab-separated line per observed
// operation, read offline by an isolation verifier. This crate owns the
// record model (what a line says) and the sink (where lines go).
//
// Line format, fields tab-separated, one record per line:
//
//   thread_id  effective_trx_id  op_name  table  column  row_id  writer
//
// where effective_trx_id is the DBMS-assigned transaction id once the
// transaction has been promoted and the library-assigned id before that,
// and the final field is the version-writer id (READ/UPDATE/DELETE), the
// pre-promotion library id (PROMOTE), or 0. Object fields not supplied
// render as the literal N/A.

mod record;
mod sink;

pub use record::{OpKind, Record, RowRef};
pub use sink::Sink;

#[cfg(test)]
mod test;
