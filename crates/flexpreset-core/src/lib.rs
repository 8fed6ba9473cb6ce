//! # FlexPreset Core
//!
//! Document model and codec for the preset store.
//!
//! This crate provides the fundamental building blocks:
//! - [`Document`] - An ordered mapping of named presets
//! - [`Field`] - A declared-type scalar value inside a preset panel
//! - [`SchemaEntry`] - The derived (type, name) pair used for evaluation output
//! - [`PresetError`] - Store error types

pub mod codec;
pub mod error;
pub mod schema;
pub mod types;

// Re-exports for convenience
pub use codec::{decode, encode};
pub use error::{PresetError, Result};
pub use schema::{OutputType, OutputValue, SchemaEntry};
pub use types::{Document, Field, Panel, Preset, ValueType};
