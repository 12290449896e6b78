//! Database queries

pub mod import_job;
