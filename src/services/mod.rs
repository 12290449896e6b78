//! Business logic services

pub mod job_listener;
pub mod job_queue;
pub mod job_runner;
pub mod job_store;
pub mod metafield_schema;
pub mod platform;
pub mod product_sync;
pub mod report_builder;
pub mod row_assembler;
pub mod sheet;
pub mod worker_pool;
