//! CLI command implementations

pub mod collections;
pub mod deploy;
pub mod jobs;
pub mod secrets;
