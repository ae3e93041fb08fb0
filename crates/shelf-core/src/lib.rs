//! Shelf Core - Foundational types shared by the Shelf crates
//!
//! This crate provides:
//! - `ContentHash` - SHA-256 based content hashing
//! - Error types and Result alias

mod error;
mod hash;

pub use error::{Result, ShelfError};
pub use hash::ContentHash;
