//! Type definitions

pub mod import_job;
pub mod messages;
pub mod report;
pub mod staging;

pub use import_job::*;
pub use messages::*;
pub use report::*;
pub use staging::*;
