use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info};

use crate::config::Config;
use crate::manifest::Manifest;
use crate::process::Cmd;
use crate::workspace;

/// Declared runtime dependency names of the current product, as recorded by
/// the environment's installed package metadata. Introspecting the install
/// (rather than re-parsing source files) reflects what the installer
/// actually resolved.
pub fn declared_dependencies(
    manifest: &Manifest,
    env: &str,
    product: &str,
    run_path: &str,
) -> Result<Vec<String>> {
    let python = manifest.bin(env, "python");
    let snippet = format!(
        "import pkg_resources; \
         print(' '.join(sorted(r.key for r in \
         pkg_resources.get_distribution('{product}').requires())))"
    );

    let output = Cmd::new([python.display().to_string(), "-c".to_string(), snippet])
        .cwd(manifest.repo())
        .env("PATH", run_path)
        .read()
        .with_context(|| {
            format!("failed to read installed dependencies of {product} in {env}")
        })?;

    Ok(output.split_whitespace().map(str::to_string).collect())
}

/// Reinstalls the configured sibling products in editable mode so local
/// source edits take effect without a rebuild. Acts only on products that
/// are configured, checked out in the workspace, and actually declared as
/// dependencies of the current product. A failure on one product is logged
/// and does not block the remaining products.
pub fn link_editable(
    manifest: &Manifest,
    env: &str,
    config: &Config,
    run_path: &str,
) -> Result<()> {
    let configured = config.editable_product_dependencies();
    if configured.is_empty() {
        return Ok(());
    }

    let repo = manifest.repo();
    let workspace_dir = workspace::workspace_path(repo)?;
    let product = workspace::product_name(repo);

    let requested = config.expand_product_groups(&configured);
    let declared: HashSet<String> = declared_dependencies(manifest, env, &product, run_path)?
        .into_iter()
        .collect();
    let available: HashSet<String> = workspace::product_repos(&workspace_dir)?
        .iter()
        .map(|path| workspace::product_name(path))
        .collect();

    let pip = manifest.bin(env, "pip");
    for lib in select_editable(&requested, &available, &declared) {
        info!("installing {lib} in editable mode");
        if let Err(err) = relink(&pip, &lib, &workspace_dir, repo, run_path) {
            error!("failed to install {lib} in editable mode: {err:#}");
        }
    }

    Ok(())
}

/// The requested products that are both checked out in the workspace and
/// declared as dependencies. Set intersection, kept in requested order.
fn select_editable(
    requested: &[String],
    available: &HashSet<String>,
    declared: &HashSet<String>,
) -> Vec<String> {
    requested
        .iter()
        .filter(|name| available.contains(*name) && declared.contains(*name))
        .cloned()
        .collect()
}

fn relink(
    pip: &Path,
    lib: &str,
    workspace_dir: &Path,
    repo: &Path,
    run_path: &str,
) -> Result<()> {
    // Remove the non-editable copy first; an installer that sees the
    // requirement already satisfied would skip the editable install.
    Cmd::new([
        pip.display().to_string(),
        "uninstall".to_string(),
        lib.to_string(),
        "-y".to_string(),
    ])
    .cwd(repo)
    .env("PATH", run_path)
    .run_silent(false)?;

    let lib_path = workspace::product_path(workspace_dir, lib);
    Cmd::new([
        pip.display().to_string(),
        "install".to_string(),
        "--editable".to_string(),
        lib_path.display().to_string(),
    ])
    .cwd(repo)
    .env("PATH", run_path)
    .run_silent(true)
}

#[cfg(test)]
mod tests {
    use super::select_editable;
    use std::collections::HashSet;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn list(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn selects_the_three_way_intersection() {
        let selected = select_editable(
            &list(&["liba", "libb"]),
            &set(&["liba"]),
            &set(&["liba", "libc"]),
        );
        assert_eq!(selected, vec!["liba"]);
    }

    #[test]
    fn selection_is_independent_of_input_ordering() {
        let forward = select_editable(
            &list(&["liba", "libb", "libc"]),
            &set(&["libc", "liba", "libb"]),
            &set(&["libb", "libc", "liba"]),
        );
        let reversed = select_editable(
            &list(&["liba", "libb", "libc"]),
            &set(&["liba", "libb", "libc"]),
            &set(&["liba", "libc", "libb"]),
        );
        assert_eq!(forward, reversed);
        assert_eq!(forward, vec!["liba", "libb", "libc"]);
    }

    #[test]
    fn missing_sibling_or_undeclared_dependency_is_skipped() {
        let selected = select_editable(
            &list(&["liba", "libb", "libc"]),
            &set(&["liba", "libb"]),
            &set(&["liba", "libc"]),
        );
        assert_eq!(selected, vec!["liba"]);
    }

    #[test]
    fn empty_request_selects_nothing() {
        let selected = select_editable(&[], &set(&["liba"]), &set(&["liba"]));
        assert!(selected.is_empty());
    }
}
