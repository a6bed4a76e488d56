//! The fifteen CE (Common Ephemeral) stream-kind handlers and the one UP
//! (Unique Persistent) session, plus the service-trait seams they delegate
//! application logic to (spec.md §4.6-§4.8).
//!
//! # Modules
//!
//! - [`codecs`]: per-protocol payload encode/decode
//! - [`services`]: external-collaborator traits and their in-memory doubles
//! - [`handler`]: [`handler::ProtocolHandler`], [`handler::HandlerRegistry`], every concrete handler
//! - [`error`]: the shared [`error::HandlerError`] type

#![warn(clippy::all)]

pub mod codecs;
pub mod error;
pub mod handler;
pub mod services;

pub use error::HandlerError;
pub use handler::{HandlerRegistry, ProtocolHandler, Up0Session};
