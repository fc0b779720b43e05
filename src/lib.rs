//! pkgmerge library crate: the pieces of the `pkgmerge` binary that sit
//! around the core engine.
//!
//! The engine itself lives in `pkgmerge-core`. This crate adds package file
//! loading, `pkgmerge.toml` configuration, report rendering and logging
//! setup, exposed here so integration tests can drive them without the CLI.

pub mod config;
pub mod format;
pub mod input;
pub mod telemetry;
