// src/definition/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::dag::{Flow, FlowBuilder};
use crate::definition::model::FlowDefinition;
use crate::errors::Result;

/// Read a flow definition document from disk.
///
/// Files ending in `.toml` are parsed as TOML; everything else as JSON.
/// This only deserializes; use [`load_and_validate`] to also build the flow.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<FlowDefinition> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    let definition: FlowDefinition = if is_toml {
        toml::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };

    debug!(path = %path.display(), tasks = definition.len(), "loaded flow definition");
    Ok(definition)
}

/// Read a definition and build it into a [`Flow`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Flow> {
    let definition = load_from_path(path)?;
    let flow = FlowBuilder::new().build(&definition)?;
    Ok(flow)
}
