//! # Ringling
//!
//! HTTP server and CLI around [`ringling_core`], the parameter set and
//! trained model registry.
//!
//! - [`api`]: axum REST API
//! - [`cli`]: clap commands
//! - [`config`]: TOML file plus `RINGLING_*` environment overrides
//! - [`error`]: application error type

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
