use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Strips version-pinned self-references (`name==1.2.3`) from the installed
/// entry scripts; a pinned reference would force an environment refresh on
/// every version bump. Returns the names of the scripts that were rewritten.
///
/// Scripts without a match are left byte-for-byte untouched, so a second
/// pass is a no-op. A missing script directory yields an empty result.
pub fn normalize(product: &str, bindir: &Path) -> Result<Vec<String>> {
    if !bindir.exists() {
        return Ok(Vec::new());
    }

    let pattern = Regex::new(&format!("{}==[0-9.]+", regex::escape(product)))
        .with_context(|| format!("invalid entry-script pattern for product `{product}`"))?;

    let mut scripts: Vec<_> = fs::read_dir(bindir)
        .with_context(|| format!("failed to read {}", bindir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", bindir.display()))?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    scripts.sort();

    let mut rewritten = Vec::new();
    for script in scripts {
        if !script.is_file() {
            continue;
        }

        // Compiled launchers are not text scripts; skip anything unreadable.
        let Ok(content) = fs::read_to_string(&script) else {
            continue;
        };

        if !pattern.is_match(&content) {
            continue;
        }

        let updated = pattern.replace_all(&content, NoExpand(product));
        fs::write(&script, updated.as_bytes())
            .with_context(|| format!("failed to rewrite {}", script.display()))?;

        if let Some(name) = script.file_name() {
            rewritten.push(name.to_string_lossy().to_string());
        }
    }

    if !rewritten.is_empty() {
        debug!(
            "removed version spec from entry script(s): {}",
            rewritten.join(", ")
        );
    }

    Ok(rewritten)
}
