//! pyissues - incremental archiver for the Python issue tracker
//!
//! This crate provides the core functionality for the `pyissues` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Issue, Comment, status codes, metadata snapshot)
//! - [`archive`] - Issue container codec (JSON, gzip, base64 text transform)
//! - [`remote`] - Tracker client and issue page extraction
//! - [`storage`] - Metadata and archive files on disk
//! - [`sync`] - Diff, concurrent fetch, and the named operations
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
