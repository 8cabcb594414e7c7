//! Incremental exporter for a local iMessage history.
//!
//! The pipeline is a discrete batch cycle: query the message store,
//! assemble typed conversation threads (decoding archived rich-text
//! bodies and resolving contact identities on the way), merge with the
//! prior snapshot, and persist the result plus everything learned about
//! contacts along the way.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

pub mod assemble;
pub mod cli;
pub mod config;
pub mod decode;
pub mod identity;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod snapshot;
pub mod source;
pub mod stats;

pub use cli::{Cli, Commands};

use config::AppConfig;
use identity::oracle::{ContactDirectory, MacContactsDirectory, NoopDirectory};
use pipeline::{DATASET_FILE, MAPPINGS_FILE, RunContext};
use source::ChatDb;

/// Resolve configuration and dispatch the requested command.
pub fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load();

    let database = cli
        .database
        .clone()
        .or_else(|| config.database_path.clone())
        .or_else(ChatDb::default_path);
    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let directory: Box<dyn ContactDirectory> = if cli.no_oracle || !config.oracle.enabled {
        Box::new(NoopDirectory)
    } else {
        Box::new(MacContactsDirectory::new(Duration::from_secs(
            config.oracle.timeout_secs,
        )))
    };

    let mut ctx = RunContext {
        database,
        dataset_path: output_dir.join(DATASET_FILE),
        mappings_path: output_dir.join(MAPPINGS_FILE),
        message_limit: config.message_limit,
        update_limit: config.update_limit,
        oracle_limit: config.oracle.lookup_limit,
        directory,
    };

    match cli.command.unwrap_or(Commands::Full { limit: None }) {
        Commands::Full { limit } => {
            if let Some(limit) = limit {
                ctx.message_limit = limit;
            }
            pipeline::full_export(&ctx)
        }
        Commands::Update { limit } => {
            if let Some(limit) = limit {
                ctx.update_limit = limit;
            }
            pipeline::update(&ctx)
        }
        Commands::Contacts { limit } => {
            if let Some(limit) = limit {
                ctx.oracle_limit = limit;
            }
            pipeline::resolve_contacts(&ctx)
        }
        Commands::Stats => pipeline::show_stats(&ctx),
    }
}
