use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::info;

use crate::config::Config;
use crate::editable;
use crate::manifest::Manifest;
use crate::process::Cmd;
use crate::scripts;
use crate::workspace;

pub const SETUP_FILE: &str = "setup.py";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

const BUILD_TOOL: &str = "tox";

/// Whether the environment must be rebuilt before use. Fails open: a
/// missing environment root is always stale. Otherwise the environment is
/// stale iff a dependency declaration file is strictly newer than the root.
///
/// Evaluated from the filesystem on every call; declaration files can
/// change between runs.
pub fn is_stale(repo: &Path, envdir: &Path) -> Result<bool> {
    let Some(env_mtime) = mtime(envdir)? else {
        return Ok(true);
    };

    let mut newest = mtime(&repo.join(SETUP_FILE))?;
    if let Some(requirements_mtime) = mtime(&repo.join(REQUIREMENTS_FILE))? {
        newest = Some(match newest {
            Some(current) => current.max(requirements_mtime),
            None => requirements_mtime,
        });
    }

    Ok(newest.is_some_and(|declared| declared > env_mtime))
}

/// Creates or refreshes the named environments with a single invocation of
/// the underlying build tool, then normalizes entry scripts and re-links
/// editable dependencies for each environment that was rebuilt.
///
/// `recreate` removes the environment roots first; a plain redevelop
/// reinstalls on top of them, which can leave removed dependencies behind.
/// Any nonzero exit from the tool fails the whole batch.
pub fn synchronize(
    manifest: &Manifest,
    envs: &[String],
    recreate: bool,
    config: &Config,
    run_path: &str,
) -> Result<()> {
    let mut argv = vec![
        BUILD_TOOL.to_string(),
        "-c".to_string(),
        manifest.path().display().to_string(),
        "-e".to_string(),
        envs.join(","),
        "--notest".to_string(),
    ];
    if recreate {
        argv.push("-r".to_string());
    }

    info!(
        "{} test environment(s): {}",
        if recreate { "recreating" } else { "building" },
        envs.join(", ")
    );

    Cmd::new(argv)
        .cwd(manifest.repo())
        .env("PATH", run_path)
        .run()
        .context("failed to build test environments")?;

    // Normalize before re-linking: the editable reinstall can write the
    // same version pin back, and its logging must see the final scripts.
    let product = workspace::product_name(manifest.repo());
    for env in envs {
        scripts::normalize(&product, &manifest.bindir(env))?;
        editable::link_editable(manifest, env, config, run_path)?;
    }

    Ok(())
}

fn mtime(path: &Path) -> Result<Option<SystemTime>> {
    if !path.exists() {
        return Ok(None);
    }

    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let modified = metadata
        .modified()
        .with_context(|| format!("no modification time for {}", path.display()))?;

    Ok(Some(modified))
}
