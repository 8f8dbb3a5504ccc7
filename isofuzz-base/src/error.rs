// Nothing in this library ever returns an error to the host DBMS -- the
// dispatch layer degrades to a no-op instead -- so this type never
// crosses the API boundary. It still earns its keep internally: it names
// which subsystem gave up, captures a backtrace at the failure site, and
// its constructor is the one choke point that echoes every failure into
// the tracing system (and the place to hang a breakpoint).

use backtrace_error::DynBacktraceError;
use std::fmt;
use tracing::error;

#[cfg(test)]
use test_log::test;

// The library's failure sites. Configuration parsing is deliberately
// absent: an unparseable environment value falls back to its default and
// is not a failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    // The trace destination could not be opened for append.
    TraceIo,
    // The epoch scheduler's background thread could not be spawned.
    SchedulerDown,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    cause: DynBacktraceError,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn with_kind<E>(kind: ErrorKind, cause: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        error!(target: "isofuzz", "{kind:?}: {cause}");
        Error {
            kind,
            cause: DynBacktraceError::from(cause),
        }
    }

    pub fn trace_io(cause: std::io::Error) -> Error {
        Error::with_kind(ErrorKind::TraceIo, cause)
    }

    pub fn scheduler_down(cause: std::io::Error) -> Error {
        Error::with_kind(ErrorKind::SchedulerDown, cause)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.cause)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

#[test]
fn test_kind_and_cause_are_preserved() {
    let gone = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err = Error::trace_io(gone);
    assert_eq!(err.kind(), ErrorKind::TraceIo);
    assert!(err.to_string().contains("gone"));
}
