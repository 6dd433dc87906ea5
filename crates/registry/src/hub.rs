//! Hub directory: one YAML file per catalog entry.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::smithery::{SmitheryConfig, SmitheryError};

const GITHUB_PREFIX: &str = "https://github.com/";
const CHECKOUT_ROOT: &str = "tmp";
/// `smitheryPath` value marking entries whose build files are maintained by the hub itself.
pub const HUB_MANAGED_BUILD: &str = "@mcp-hub";

#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid hub entry {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid hub: {}", .missing.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation { missing: Vec<MissingField> },

    #[error("no hub entry named '{0}'")]
    UnknownEntry(String),
}

/// A mandatory field left empty in a hub entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub repository: String,
    pub field: &'static str,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {} is required in repository {}", self.field, self.repository)
    }
}

/// Build recipe flavour the resolved command is injected into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    #[default]
    Docker,
    Unikraft,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub repository: String,
    /// Local checkout; when empty the entry lives under `tmp/<owner>/<repo>/<branch>`.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_smithery_path")]
    pub smithery_path: String,
    /// Inline Smithery config; takes precedence over `smitheryPath`.
    #[serde(default)]
    pub smithery: Option<SmitheryConfig>,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub enterprise: bool,
    #[serde(default)]
    pub coming_soon: bool,
    #[serde(default)]
    pub secrets: Vec<String>,
    /// Secret properties that are never listed in the published catalog.
    #[serde(default)]
    pub hidden_secrets: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_smithery_path() -> String {
    "smithery.yaml".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Repository {
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Names of mandatory fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("displayName", &self.display_name),
            ("icon", &self.icon),
            ("description", &self.description),
            ("longDescription", &self.long_description),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    pub fn checkout_dir(&self) -> PathBuf {
        if !self.path.trim().is_empty() {
            return PathBuf::from(&self.path);
        }
        let slug = self.repository.strip_prefix(GITHUB_PREFIX).unwrap_or(&self.repository);
        PathBuf::from(CHECKOUT_ROOT).join(slug).join(&self.branch)
    }

    /// The inline `smithery` block, or the file at `smitheryPath` inside the checkout.
    pub fn smithery_config(&self) -> Result<SmitheryConfig, SmitheryError> {
        if let Some(inline) = &self.smithery {
            return Ok(inline.clone());
        }
        SmitheryConfig::load(&self.checkout_dir().join(&self.smithery_path))
    }

    /// Listed secrets followed by hidden ones.
    pub fn secret_names(&self) -> Vec<&str> {
        self.secrets.iter().chain(&self.hidden_secrets).map(String::as_str).collect()
    }

    pub fn build_file(&self, platform: Platform) -> PathBuf {
        match platform {
            Platform::Docker => self.checkout_dir().join(&self.dockerfile),
            Platform::Unikraft => self.checkout_dir().join("Kraftfile"),
        }
    }

    pub fn has_hub_managed_build(&self) -> bool {
        self.smithery_path == HUB_MANAGED_BUILD
    }
}

/// Every hub entry, keyed and ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hub {
    pub repositories: BTreeMap<String, Repository>,
}

impl Hub {
    /// Reads every file in `dir`; the entry name is the file stem.
    pub fn read(dir: &Path) -> Result<Self, HubError> {
        let io_error = |path: &Path| {
            let path = path.display().to_string();
            move |source| HubError::Io { path, source }
        };

        let mut repositories = BTreeMap::new();
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let entry = entry.map_err(io_error(dir))?;
            let path = entry.path();
            if entry.file_type().map_err(io_error(&path))?.is_dir() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string) else {
                continue;
            };

            let content = fs::read_to_string(&path).map_err(io_error(&path))?;
            let repository = Repository::from_yaml_str(&content).map_err(|source| HubError::Yaml {
                path: path.display().to_string(),
                source,
            })?;
            debug!(entry = %name, path = %path.display(), "loaded hub entry");
            repositories.insert(name, repository);
        }
        Ok(Self { repositories })
    }

    /// Reads and validates in one step.
    pub fn load(dir: &Path) -> Result<Self, HubError> {
        let hub = Self::read(dir)?;
        hub.validate()?;
        Ok(hub)
    }

    /// Collects every missing mandatory field across all entries.
    pub fn validate(&self) -> Result<(), HubError> {
        let missing: Vec<MissingField> = self
            .repositories
            .iter()
            .flat_map(|(name, repository)| {
                repository.missing_fields().into_iter().map(move |field| MissingField {
                    repository: name.clone(),
                    field,
                })
            })
            .collect();
        if missing.is_empty() { Ok(()) } else { Err(HubError::Validation { missing }) }
    }

    pub fn get(&self, name: &str) -> Result<&Repository, HubError> {
        self.repositories.get(name).ok_or_else(|| HubError::UnknownEntry(name.to_string()))
    }

    /// All entries, or only `only` when given.
    pub fn select(&self, only: Option<&str>) -> Result<Vec<(&str, &Repository)>, HubError> {
        match only {
            Some(name) => {
                let (name, repository) = self
                    .repositories
                    .get_key_value(name)
                    .ok_or_else(|| HubError::UnknownEntry(name.to_string()))?;
                Ok(vec![(name.as_str(), repository)])
            }
            None => Ok(self.repositories.iter().map(|(name, repository)| (name.as_str(), repository)).collect()),
        }
    }
}
