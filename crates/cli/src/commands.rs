use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow, bail};
use heck::ToShoutySnakeCase;
use mcp_hub_engine::{ResolvedCommand, environment_lookup, inject_command, inject_kraftfile, substitute};
use mcp_hub_registry::{CatalogEntry, Hub, Platform, Repository, ResolvedRepository, build_catalog_entry, resolve_repository};
use mcp_hub_util::{redact_sensitive, write_atomic};
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Debug, Clone, Copy)]
pub struct InjectOptions {
    pub platform: Platform,
    pub substitute: bool,
    pub dry_run: bool,
}

pub async fn resolve(hub_dir: &Path, only: Option<&str>, tag: String) -> Result<()> {
    let hub = load_hub(hub_dir)?;
    let entries = run_per_entry(&hub, only, move |name, repository| {
        build_catalog_entry(name, repository, &tag).map_err(anyhow::Error::from)
    })
    .await?;

    let catalog: Vec<&CatalogEntry> = entries.values().collect();
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

pub async fn inject(hub_dir: &Path, only: Option<&str>, options: InjectOptions) -> Result<()> {
    let hub = load_hub(hub_dir)?;
    if !options.dry_run {
        ensure_distinct_build_files(&hub, only, options.platform)?;
    }
    let rewritten = run_per_entry(&hub, only, move |name, repository| inject_entry(name, repository, options)).await?;

    for (name, outcome) in rewritten {
        match outcome {
            Some(text) if options.dry_run => print!("# {name}\n{text}"),
            Some(_) => info!(descriptor = %name, "build recipe injected"),
            None => {}
        }
    }
    Ok(())
}

pub fn check(hub_dir: &Path, only: Option<&str>) -> Result<()> {
    let name = only.context("check needs a single entry; pass --mcp <name>")?;
    let hub = load_hub(hub_dir)?;
    let repository = hub.get(name)?;
    if repository.disabled {
        bail!("descriptor '{name}' is disabled");
    }

    let resolved = resolve_repository(name, repository)?;
    let command = substitute_from_environment(&resolved).with_context(|| format!("descriptor '{name}'"))?;

    println!("command: {}", command.display_command_line().join(" "));
    for (variable, value) in &command.env {
        println!("{}", redact_sensitive(&format!("{variable}={value}")));
    }
    Ok(())
}

fn load_hub(hub_dir: &Path) -> Result<Hub> {
    Hub::load(hub_dir).with_context(|| format!("load hub from {}", hub_dir.display()))
}

/// Runs `task` for every selected entry on the blocking pool. Failures are logged and
/// counted; the call fails after every entry has been processed if any of them failed.
async fn run_per_entry<T, F>(hub: &Hub, only: Option<&str>, task: F) -> Result<BTreeMap<String, T>>
where
    T: Send + 'static,
    F: Fn(&str, &Repository) -> Result<T> + Send + Sync + 'static,
{
    let task = Arc::new(task);
    let mut join_set = JoinSet::new();
    for (name, repository) in hub.select(only)? {
        let name = name.to_string();
        let repository = repository.clone();
        let task = Arc::clone(&task);
        join_set.spawn_blocking(move || {
            let result = task(&name, &repository);
            (name, result)
        });
    }

    let total = join_set.len();
    let mut succeeded = BTreeMap::new();
    let mut failed = 0usize;
    loop {
        let joined = tokio::select! {
            joined = join_set.join_next() => joined,
            _ = tokio::signal::ctrl_c() => {
                join_set.abort_all();
                bail!("interrupted");
            }
        };
        match joined {
            None => break,
            Some(Ok((name, Ok(value)))) => {
                succeeded.insert(name, value);
            }
            Some(Ok((name, Err(error)))) => {
                failed += 1;
                error!(descriptor = %name, error = %format!("{error:#}"), "descriptor failed");
            }
            Some(Err(join_error)) => {
                failed += 1;
                error!(error = %join_error, "descriptor task did not complete");
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{failed} of {total} descriptors failed"));
    }
    info!(count = total, "processed descriptors");
    Ok(succeeded)
}

/// Why `inject` leaves an entry alone, if it does.
fn skip_reason(repository: &Repository, platform: Platform) -> Option<&'static str> {
    if repository.disabled {
        Some("skipping disabled entry")
    } else if platform == Platform::Unikraft && repository.has_hub_managed_build() {
        Some("skipping hub-managed Kraftfile")
    } else {
        None
    }
}

/// Entries sharing a checkout would rewrite the same file from concurrent tasks.
fn ensure_distinct_build_files(hub: &Hub, only: Option<&str>, platform: Platform) -> Result<()> {
    let mut owners: BTreeMap<PathBuf, &str> = BTreeMap::new();
    for (name, repository) in hub.select(only)? {
        if skip_reason(repository, platform).is_some() {
            continue;
        }
        let path = repository.build_file(platform);
        if let Some(owner) = owners.get(&path) {
            bail!(
                "descriptors '{owner}' and '{name}' both rewrite {}; inject them one at a time with --mcp",
                path.display()
            );
        }
        owners.insert(path, name);
    }
    Ok(())
}

/// Rewrites one entry's build recipe. Returns the new text, or `None` when the entry is skipped.
fn inject_entry(name: &str, repository: &Repository, options: InjectOptions) -> Result<Option<String>> {
    if let Some(reason) = skip_reason(repository, options.platform) {
        info!(descriptor = %name, "{reason}");
        return Ok(None);
    }

    let resolved = resolve_repository(name, repository)?;
    let command_line = if options.substitute {
        let command = substitute_from_environment(&resolved)?;
        if command.has_secrets() {
            info!(descriptor = %name, "secret properties stay as placeholders in the build recipe");
        }
        command.recipe_command_line()
    } else {
        resolved.descriptor.placeholder_command_line()
    };

    let path = repository.build_file(options.platform);
    let original = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let rewritten = match options.platform {
        Platform::Docker => inject_command(&original, &command_line),
        Platform::Unikraft => inject_kraftfile(&original, &command_line),
    }
    .with_context(|| format!("descriptor '{name}': rewrite {}", path.display()))?;

    if !options.dry_run {
        if rewritten == original {
            info!(descriptor = %name, path = %path.display(), "build recipe already up to date");
        } else {
            write_atomic(&path, &rewritten)?;
        }
    }
    Ok(Some(rewritten))
}

fn substitute_from_environment(resolved: &ResolvedRepository) -> Result<ResolvedCommand> {
    Ok(substitute(&resolved.descriptor, &resolved.schema, property_from_environment)?)
}

/// Looks a property up by its own name, then by its upper snake case form (`apiKey` -> `API_KEY`).
fn property_from_environment(property: &str) -> Option<String> {
    environment_lookup(property).or_else(|| environment_lookup(&property.to_shouty_snake_case()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_FILE: &str = "FROM node\nCMD [\"old\"]\n";

    fn repository(checkout: &Path) -> Repository {
        Repository::from_yaml_str(&format!(
            r#"repository: https://github.com/acme/srv
path: {}
displayName: Srv
icon: https://example.com/srv.png
description: Test server
longDescription: Test server.
secrets: [apiKey]
smithery:
  startCommand:
    type: stdio
    configSchema:
      type: object
      required: [apiKey]
      properties:
        apiKey:
          type: string
        port:
          type: string
          default: "9000"
    commandFunction: |-
      config => ({{command: 'srv', args: ['--key', config.apiKey, '--port', config.port]}})
"#,
            checkout.display()
        ))
        .unwrap()
    }

    fn options(dry_run: bool) -> InjectOptions {
        InjectOptions {
            platform: Platform::Docker,
            substitute: true,
            dry_run,
        }
    }

    #[test]
    fn substituted_recipes_keep_secret_placeholders() {
        let checkout = tempfile::tempdir().unwrap();
        let dockerfile = checkout.path().join("Dockerfile");
        fs::write(&dockerfile, BUILD_FILE).unwrap();
        let repository = repository(checkout.path());
        let expected = "FROM node\nENTRYPOINT [\"srv\",\"--key\",\"$apiKey\",\"--port\",\"9000\"]\n";

        temp_env::with_vars(
            [("API_KEY", Some("TOPSECRET")), ("apiKey", None), ("port", None), ("PORT", None)],
            || {
                let printed = inject_entry("srv", &repository, options(true)).unwrap().unwrap();
                assert_eq!(printed, expected);
                assert_eq!(fs::read_to_string(&dockerfile).unwrap(), BUILD_FILE);

                inject_entry("srv", &repository, options(false)).unwrap();
                let written = fs::read_to_string(&dockerfile).unwrap();
                assert!(!written.contains("TOPSECRET"), "{written}");
                assert_eq!(written, expected);
            },
        );
    }

    #[test]
    fn refuses_entries_that_share_a_build_file() {
        let checkout = tempfile::tempdir().unwrap();
        let shared = repository(checkout.path());
        let mut elsewhere = shared.clone();
        elsewhere.dockerfile = "Dockerfile.alt".into();
        let mut disabled = shared.clone();
        disabled.disabled = true;

        let hub = Hub {
            repositories: BTreeMap::from([
                ("first".to_string(), shared.clone()),
                ("second".to_string(), shared),
            ]),
        };
        let error = ensure_distinct_build_files(&hub, None, Platform::Docker).unwrap_err();
        assert!(error.to_string().contains("descriptors 'first' and 'second' both rewrite"), "{error}");
        assert!(ensure_distinct_build_files(&hub, Some("second"), Platform::Docker).is_ok());

        let hub = Hub {
            repositories: BTreeMap::from([
                ("first".to_string(), hub.repositories["first"].clone()),
                ("alternate".to_string(), elsewhere),
                ("retired".to_string(), disabled),
            ]),
        };
        assert!(ensure_distinct_build_files(&hub, None, Platform::Docker).is_ok());
    }

    #[test]
    fn property_lookup_falls_back_to_upper_snake_case() {
        temp_env::with_vars([("API_KEY", Some("from-env")), ("region", Some("eu"))], || {
            assert_eq!(property_from_environment("apiKey").as_deref(), Some("from-env"));
            assert_eq!(property_from_environment("region").as_deref(), Some("eu"));
            assert_eq!(property_from_environment("missingValue"), None);
        });
    }
}
