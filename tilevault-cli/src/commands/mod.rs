//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`download`] - Download tiles into a named map
//! - [`maps`] - Map management (list, delete, rename, clear, count)
//! - [`providers`] - List tile providers

pub mod download;
pub mod maps;
pub mod providers;
