// src/definition/mod.rs

//! Flow definition documents.
//!
//! - [`model`] is the serde-backed document shape (`desc`, `cmd`, `group`,
//!   `depends` per task id).
//! - [`loader`] reads a document from disk (JSON or TOML).

pub mod loader;
pub mod model;

pub use loader::{load_and_validate, load_from_path};
pub use model::{FlowDefinition, TaskDefinition};
