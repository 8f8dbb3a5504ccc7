use std::fmt;

const NA: &str = "N/A";

// Operation kind as it appears in the op_name field. Unknown is what the
// verifier sees for anything the host adapter could not classify.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OpKind {
    Read,
    WriteUpdate,
    WriteInsert,
    WriteDelete,
    TxnPromote,
    TxnBegin,
    TxnCommit,
    Unknown,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Read => "READ",
            OpKind::WriteUpdate => "UPDATE",
            OpKind::WriteInsert => "INSERT",
            OpKind::WriteDelete => "DELETE",
            OpKind::TxnPromote => "PROMOTE",
            OpKind::TxnBegin => "BEGIN",
            OpKind::TxnCommit => "COMMIT",
            OpKind::Unknown => "UNKNOWN",
        }
    }

    // Kinds whose final trace field is meaningful: the version-writer id
    // for reads and destructive writes, the pre-promotion library id for
    // PROMOTE. Every other kind renders 0 there.
    fn carries_writer(&self) -> bool {
        matches!(
            self,
            OpKind::Read | OpKind::WriteUpdate | OpKind::WriteDelete | OpKind::TxnPromote
        )
    }
}

// The database object an operation touched. Column is absent for
// whole-row operations, the row id for table-level ones.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RowRef {
    pub table: String,
    pub column: Option<String>,
    pub row: Option<u64>,
}

impl RowRef {
    pub fn new(
        table: impl Into<String>,
        column: Option<impl Into<String>>,
        row: Option<u64>,
    ) -> Self {
        RowRef {
            table: table.into(),
            column: column.map(Into::into),
            row,
        }
    }
}

// One fully-attributed trace record. Construction clamps the writer field
// by kind, so an INSERT line can never leak a version-writer id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    thread: String,
    trx_id: u64,
    op: OpKind,
    obj: Option<RowRef>,
    writer: u64,
}

impl Record {
    pub fn new(
        thread: impl Into<String>,
        trx_id: u64,
        op: OpKind,
        obj: Option<RowRef>,
        writer: u64,
    ) -> Self {
        Record {
            thread: thread.into(),
            trx_id,
            op,
            obj,
            writer: if op.carries_writer() { writer } else { 0 },
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t", self.thread, self.trx_id, self.op.name())?;
        match &self.obj {
            Some(obj) => {
                write!(f, "{}\t", obj.table)?;
                match &obj.column {
                    Some(col) => write!(f, "{col}\t")?,
                    None => write!(f, "{NA}\t")?,
                }
                match obj.row {
                    Some(row) => write!(f, "{row}\t")?,
                    None => write!(f, "{NA}\t")?,
                }
            }
            None => write!(f, "{NA}\t{NA}\t{NA}\t")?,
        }
        write!(f, "{}", self.writer)
    }
}
