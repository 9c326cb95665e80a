pub mod cancel;
pub mod config;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod git_sync;
pub mod ingest;
pub mod lockfile;
pub mod model;
pub mod paths;
pub mod registry;
pub mod remote_url;
pub mod sync_engine;
mod sync_engine_workers;
#[cfg(test)]
mod test_support;

pub use error::{MirrorError, Result};
