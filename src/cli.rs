//! CLI argument parsing for the catalog-migrator binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::types::ResourceKey;

#[derive(Parser)]
#[command(name = "catalog-migrator", about = "Spreadsheet catalog migration worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the polling worker pool until Ctrl-C (default if no subcommand given)
    Serve,
    /// Run queued jobs until none are left, then exit
    Drain,
    /// Run database migrations and exit
    Migrate,
    /// Upload a sheet and queue a migration job
    Enqueue {
        /// products, orders or customers
        #[arg(long)]
        resource: ResourceKey,
        #[arg(long)]
        file: PathBuf,
    },
    /// Show one job
    Status {
        #[arg(long)]
        job: Uuid,
    },
    /// List jobs for a resource, newest first
    List {
        #[arg(long)]
        resource: ResourceKey,
    },
    /// Save a completed job's report
    Download {
        #[arg(long)]
        job: Uuid,
        /// Output file or directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Migrate one file in-process with an in-memory job store
    RunFile {
        #[arg(long)]
        resource: ResourceKey,
        #[arg(long)]
        file: PathBuf,
    },
}
