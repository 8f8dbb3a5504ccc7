use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use isofuzz_base::{Error, Result};
use tracing::debug;

// Where trace lines go. Stderr only arises as the fallback when the
// configured file cannot be opened.
#[derive(Debug)]
pub(crate) enum Dest {
    Stdout,
    Stderr,
    File(File),
}

// Serialized append-only line sink. One mutex totally orders concurrent
// writers and also covers the open/close transitions. A failed write is
// dropped: the trace degrades, the host keeps running.
#[derive(Debug)]
pub struct Sink {
    pub(crate) dest: Mutex<Dest>,
}

impl Sink {
    // No configured path: lines go to standard output.
    pub fn stdout() -> Self {
        Sink {
            dest: Mutex::new(Dest::Stdout),
        }
    }

    fn try_open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(Error::trace_io)?;
        debug!(target: "isofuzz", "trace sink opened: {}", path.display());
        Ok(Sink {
            dest: Mutex::new(Dest::File(file)),
        })
    }

    // Open the configured destination. An unopenable path warns once on
    // standard error and falls back there, keeping the library functional.
    pub fn from_config(out_file: Option<&Path>) -> Self {
        match out_file {
            None => Sink::stdout(),
            Some(path) => Sink::try_open(path).unwrap_or_else(|_| {
                eprintln!(
                    "isofuzz: cannot open trace file {} for append, tracing to stderr",
                    path.display()
                );
                Sink {
                    dest: Mutex::new(Dest::Stderr),
                }
            }),
        }
    }

    // Append one line, atomically with respect to concurrent callers.
    pub fn write_line(&self, line: &str) {
        let mut dest = self.dest.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = match &mut *dest {
            Dest::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
            Dest::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
            Dest::File(file) => writeln!(file, "{line}"),
        };
    }

    // Flush and close any opened file and reset to standard output.
    pub fn close(&self) {
        let mut dest = self.dest.lock().unwrap_or_else(PoisonError::into_inner);
        if let Dest::File(file) = &mut *dest {
            let _ = file.flush();
            let _ = file.sync_all();
        }
        *dest = Dest::Stdout;
    }
}
