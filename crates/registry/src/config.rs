use std::{env, path::PathBuf};

use mcp_hub_util::expand_tilde;

pub const CONFIG_PATH_ENV: &str = "MCP_HUB_CONFIG_PATH";
pub const DEFAULT_HUB_DIR: &str = "hub";

/// Hub directory: the explicit flag, then `MCP_HUB_CONFIG_PATH`, then `./hub`.
pub fn hub_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit
        && !path.trim().is_empty()
    {
        return expand_tilde(path);
    }
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }
    PathBuf::from(DEFAULT_HUB_DIR)
}
