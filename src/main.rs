//! Catalog Migrator - background worker for spreadsheet catalog migrations
//!
//! Claims queued import jobs from the job store, migrates their sheets into
//! the target platform and records a per-product report.

mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::{Config, JobStoreBackend};
use crate::handlers::HandlerError;
use crate::services::job_listener::listen_for_jobs;
use crate::services::job_queue::JobQueue;
use crate::services::job_runner::JobRunner;
use crate::services::job_store::{JobStore, MemoryJobStore, PgJobStore};
use crate::services::platform::create_platform;
use crate::services::worker_pool::WorkerPool;
use crate::types::{ErrorResponse, ListResponse, SuccessResponse};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    std::fs::create_dir_all(&config.logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Console logs go to stderr so command output on stdout stays JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,catalog_migrator=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Drain => {
            let store = open_store(&config).await?;
            let ran = build_pool(&config, store)?.drain().await;
            print_json(&SuccessResponse::new(serde_json::json!({ "jobsRun": ran })))
        }
        Command::Migrate => {
            let pool = db::create_pool(config.database_url()?).await?;
            db::run_migrations(&pool).await
        }
        Command::Enqueue { resource, file } => {
            let store = open_store(&config).await?;
            let (name, bytes) = read_upload(&file).await?;
            let result = handlers::upload::submit_upload(
                store.as_ref(),
                &config.uploads_dir,
                resource,
                &name,
                &bytes,
            )
            .await;
            respond(result)
        }
        Command::Status { job } => {
            let store = open_store(&config).await?;
            respond(handlers::jobs::get_job(store.as_ref(), job).await)
        }
        Command::List { resource } => {
            let store = open_store(&config).await?;
            respond(handlers::jobs::list_jobs(store.as_ref(), resource).await.map(ListResponse::new))
        }
        Command::Download { job, out } => {
            let store = open_store(&config).await?;
            match handlers::jobs::open_report(store.as_ref(), job).await {
                Ok(mut report) => {
                    let target = if out.is_dir() { out.join(&report.file_name) } else { out };
                    let mut file = tokio::fs::File::create(&target)
                        .await
                        .with_context(|| format!("Failed to create {}", target.display()))?;
                    let bytes = tokio::io::copy(&mut report.file, &mut file).await?;
                    file.flush().await?;
                    print_json(&SuccessResponse::new(serde_json::json!({
                        "path": target.display().to_string(),
                        "fileName": report.file_name,
                        "bytes": bytes,
                    })))
                }
                Err(e) => respond::<()>(Err(e)),
            }
        }
        Command::RunFile { resource, file } => run_file(&config, resource, &file).await,
    }
}

async fn serve(config: &Config) -> Result<()> {
    info!("Starting Catalog Migrator worker {}...", config.worker.worker_id);

    let (store, db) = match config.job_store {
        JobStoreBackend::Postgres => {
            let db = connect_postgres(config).await?;
            let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(db.clone()));
            (store, Some(db))
        }
        JobStoreBackend::Memory => (open_store(config).await?, None),
    };
    let pool = build_pool(config, store)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested, finishing current jobs"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    let listener = db.map(|db| tokio::spawn(listen_for_jobs(db, pool.handle(), cancel.clone())));

    pool.run(cancel).await;
    if let Some(listener) = listener {
        listener.await.ok();
    }
    Ok(())
}

/// One-shot local run: queue the file in a memory store and drain it
async fn run_file(config: &Config, resource: types::ResourceKey, file: &Path) -> Result<()> {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let (name, bytes) = read_upload(file).await?;

    let job = match handlers::upload::submit_upload(store.as_ref(), &config.uploads_dir, resource, &name, &bytes).await {
        Ok(job) => job,
        Err(e) => return respond::<()>(Err(e)),
    };

    build_pool(config, Arc::clone(&store))?.drain().await;
    respond(handlers::jobs::get_job(store.as_ref(), job.id).await)
}

async fn open_store(config: &Config) -> Result<Arc<dyn JobStore>> {
    match config.job_store {
        JobStoreBackend::Postgres => Ok(Arc::new(PgJobStore::new(connect_postgres(config).await?))),
        JobStoreBackend::Memory => {
            info!("Using in-memory job store");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}

async fn connect_postgres(config: &Config) -> Result<sqlx::PgPool> {
    let pool = db::create_pool(config.database_url()?).await?;
    info!("Connected to PostgreSQL");
    db::run_migrations(&pool).await?;
    Ok(pool)
}

fn build_pool(config: &Config, store: Arc<dyn JobStore>) -> Result<WorkerPool> {
    let platform = create_platform(&config.target)?;
    info!("Target platform: {}", platform.name());

    let queue = JobQueue::new(store, config.worker.worker_id.clone(), config.worker.lock_ttl)
        .with_resource_filter(config.worker.resource_filter);
    let runner = JobRunner::new(queue.clone(), platform, config.sync_settings(), config.reports_dir.clone());

    Ok(WorkerPool::new(
        queue,
        runner,
        config.worker.max_jobs,
        config.worker.poll_interval,
    ))
}

async fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Upload path has no file name")?;
    Ok((name, bytes))
}

fn respond<T: Serialize>(result: Result<T, HandlerError>) -> Result<()> {
    match result {
        Ok(payload) => print_json(&SuccessResponse::new(payload)),
        Err(e) => {
            print_json(&ErrorResponse::new(e.code(), e.to_string()))?;
            Err(e.into())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
