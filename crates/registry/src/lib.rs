//! Hub catalog handling for MCP Hub.
//!
//! Loads the hub directory (one YAML entry per server), reads each entry's
//! Smithery config, resolves its command function through the engine and
//! publishes catalog entries.

pub mod catalog;
pub mod config;
pub mod hub;
pub mod smithery;

use mcp_hub_engine::{DescriptorError, resolve_descriptor};
use mcp_hub_types::{PropertySchema, RunDescriptor};
use thiserror::Error;

pub use catalog::{CatalogEntry, CatalogProperty, LaunchSpec, build_catalog_entry, image_name};
pub use config::{CONFIG_PATH_ENV, DEFAULT_HUB_DIR, hub_dir};
pub use hub::{Hub, HubError, MissingField, Platform, Repository};
pub use smithery::{ConfigSchema, SchemaProperty, SmitheryConfig, SmitheryError, StartCommand};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("descriptor '{descriptor}': {source}")]
    Smithery {
        descriptor: String,
        #[source]
        source: SmitheryError,
    },

    #[error(transparent)]
    Resolve(#[from] DescriptorError),
}

/// A hub entry whose command function resolved against its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRepository {
    pub name: String,
    pub schema: PropertySchema,
    pub descriptor: RunDescriptor,
}

/// Loads the entry's Smithery config, builds its schema and resolves the command function.
pub fn resolve_repository(name: &str, repository: &Repository) -> Result<ResolvedRepository, RegistryError> {
    let smithery_error = |source| RegistryError::Smithery {
        descriptor: name.to_string(),
        source,
    };
    let config = repository.smithery_config().map_err(smithery_error)?;
    let start = &config.start_command;
    let schema = start
        .config_schema
        .to_property_schema(&repository.secret_names())
        .map_err(smithery_error)?;
    let descriptor = resolve_descriptor(name, &start.command_function, &schema, start.transport_type())?;
    Ok(ResolvedRepository {
        name: name.to_string(),
        schema,
        descriptor,
    })
}
