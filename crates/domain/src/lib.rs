//! Shared domain model for the Reloom agent engine.
//!
//! Defines the conversation step tree, the projected completions message,
//! the canonical streaming event shape, configuration, and the error type
//! used across all Reloom crates.

pub mod config;
pub mod error;
pub mod message;
pub mod step;
pub mod stream;
pub mod tool;
