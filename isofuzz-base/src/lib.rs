mod config;
mod error;

pub use config::{
    parse_epoch_ms, parse_out_file, parse_seed, Config, DEFAULT_EPOCH, DEFAULT_SEED, ENV_EPOCH_MS,
    ENV_OUT_FILE, ENV_SEED,
};
pub use error::{Error, ErrorKind, Result};
