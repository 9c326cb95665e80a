use anyhow::Context;
use clap::Parser;
use git_source_core::config::{AppConfig, default_config_path};
use git_source_core::descriptor::build_descriptor;
use git_source_core::git_sync::{SHALLOW_DEPTH, mirror_status};
use git_source_core::ingest::GlobIngestor;
use git_source_core::model::MirrorState;
use git_source_core::paths::mirror_path;
use git_source_core::registry::ManifestRegistry;
use git_source_core::remote_url::RemoteUrl;
use git_source_core::sync_engine::{
    RepoReport, SyncAction, SyncOptions, SyncProgress, SyncSummary, run_sync,
};
use std::cell::Cell;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod app;
mod args;
mod config_cmd;
mod describe_cmd;
mod shared;
mod status_cmd;
mod sync_cmd;
#[cfg(test)]
mod tests;

use args::*;

use config_cmd::handle_validate;
use describe_cmd::handle_describe;
use shared::CliContext;
use status_cmd::handle_status;
use sync_cmd::handle_sync;

pub use app::run;
