// All configuration comes from the host process environment, read once at
// init. Parsing is lenient: a value that does not parse falls back to its
// default, silently. The parse helpers are pure functions over the raw
// variable value so they can be tested without touching process state.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_SEED: &str = "RANDOM_SEED";
pub const ENV_OUT_FILE: &str = "OUT_FILE";
pub const ENV_EPOCH_MS: &str = "ISOFUZZ_EPOCH_MS";

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_EPOCH: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Seed for the priority PRNG.
    pub seed: u64,
    // Wall-clock window over which the scheduler batches requests.
    pub epoch: Duration,
    // Trace destination; None means standard output.
    pub out_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            seed: DEFAULT_SEED,
            epoch: DEFAULT_EPOCH,
            out_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            seed: parse_seed(var(ENV_SEED).as_deref()),
            epoch: parse_epoch_ms(var(ENV_EPOCH_MS).as_deref()),
            out_file: parse_out_file(var(ENV_OUT_FILE).as_deref()),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn parse_seed(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_SEED)
}

// Non-positive and non-integer values are both ignored.
pub fn parse_epoch_ms(raw: Option<&str>) -> Duration {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|ms| *ms > 0)
        .map(|ms| Duration::from_millis(ms as u64))
        .unwrap_or(DEFAULT_EPOCH)
}

pub fn parse_out_file(raw: Option<&str>) -> Option<PathBuf> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
