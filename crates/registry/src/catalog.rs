//! Public catalog entries.
//!
//! A catalog entry is what the hub publishes for each server: display metadata
//! plus the run descriptor with `$name` placeholders. Secret defaults never leave
//! the process and hidden secrets are not listed at all.

use indexmap::IndexMap;
use mcp_hub_types::{ArgValue, Property, PropertyType, RunDescriptor, TransportType};
use serde::Serialize;
use tracing::debug;

use crate::{RegistryError, ResolvedRepository, hub::Repository, resolve_repository};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub long_description: String,
    pub icon: String,
    pub image: String,
    /// Project homepage, when the hub entry names one.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub enterprise: bool,
    pub coming_soon: bool,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    /// Absent for disabled entries.
    #[serde(flatten)]
    pub launch: Option<LaunchSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<CatalogProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchSpec {
    pub transport: TransportType,
    pub command: String,
    pub args: Vec<ArgValue>,
    pub env: IndexMap<String, ArgValue>,
}

impl From<&RunDescriptor> for LaunchSpec {
    fn from(descriptor: &RunDescriptor) -> Self {
        Self {
            transport: descriptor.transport_type.clone(),
            command: descriptor.command.clone(),
            args: descriptor.args.clone(),
            env: descriptor.env.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    pub required: bool,
    pub secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl From<&Property> for CatalogProperty {
    fn from(property: &Property) -> Self {
        Self {
            name: property.name.clone(),
            property_type: property.property_type.clone(),
            enum_values: property.property_type.enum_values().to_vec(),
            required: property.required,
            secret: property.secret,
            description: property.description.clone(),
            default: property.default.clone().filter(|_| !property.secret),
        }
    }
}

/// `<name>:<tag>`, lowercased.
pub fn image_name(name: &str, tag: &str) -> String {
    format!("{name}:{tag}").to_lowercase()
}

impl CatalogEntry {
    /// Display metadata only; used for disabled entries.
    pub fn metadata(name: &str, repository: &Repository, tag: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: repository.display_name.clone(),
            description: repository.description.clone(),
            long_description: repository.long_description.clone(),
            icon: repository.icon.clone(),
            image: image_name(name, tag),
            url: repository.url.clone(),
            enterprise: repository.enterprise,
            coming_soon: repository.coming_soon,
            tags: repository.tags.clone(),
            categories: repository.categories.clone(),
            launch: None,
            properties: Vec::new(),
        }
    }

    pub fn publish(repository: &Repository, resolved: &ResolvedRepository, tag: &str) -> Self {
        let properties = resolved
            .schema
            .iter()
            .filter(|property| !repository.hidden_secrets.contains(&property.name))
            .map(CatalogProperty::from)
            .collect();
        Self {
            launch: Some(LaunchSpec::from(&resolved.descriptor)),
            properties,
            ..Self::metadata(&resolved.name, repository, tag)
        }
    }
}

/// Resolves an enabled entry and publishes it; disabled entries publish metadata only.
pub fn build_catalog_entry(name: &str, repository: &Repository, tag: &str) -> Result<CatalogEntry, RegistryError> {
    if repository.disabled {
        debug!(descriptor = %name, "entry is disabled; publishing metadata only");
        return Ok(CatalogEntry::metadata(name, repository, tag));
    }
    let resolved = resolve_repository(name, repository)?;
    Ok(CatalogEntry::publish(repository, &resolved, tag))
}
