//! CLI command implementations

pub mod build;
pub mod fetch;
pub mod init;
