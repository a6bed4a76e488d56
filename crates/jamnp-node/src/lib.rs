//! Configuration loading, CLI surface, and node wiring for the JAMNP-S
//! validator binary (SPEC_FULL.md §1 "Crate boundary").
//!
//! # Modules
//!
//! - [`config`]: layered `NodeConfig` (defaults → TOML → environment)
//! - [`cli`]: the `clap` argument surface
//! - [`node`]: [`node::Node`], the running validator — owns the transport,
//!   connection/validator-set/epoch managers, and the handler registry
//! - [`error`]: [`error::NodeError`]/[`error::ConfigError`]

#![warn(clippy::all)]

pub mod cli;
pub mod config;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
