//! Replace-by-rename file writes.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::debug;

/// Writes `content` next to `path` and renames it into place.
///
/// Readers never observe a partially written file. The temporary file shares the
/// target's directory so the rename stays on one filesystem.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temporary_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|extension| extension.to_str()).unwrap_or("mcp-hub")
    ));
    fs::write(&temporary_path, content).with_context(|| format!("write temporary file {}", temporary_path.display()))?;
    if let Err(error) = fs::rename(&temporary_path, path) {
        let _ = fs::remove_file(&temporary_path);
        return Err(error).with_context(|| format!("persist {} -> {}", temporary_path.display(), path.display()));
    }
    debug!(path = %path.display(), bytes = content.len(), "wrote file atomically");
    Ok(())
}
