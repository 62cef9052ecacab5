use anyhow::{Result, bail};
use std::path::Path;

use crate::editable;
use crate::manifest::Manifest;
use crate::process::Cmd;
use crate::workspace;

/// Prints name, installed version, and install location for each of the
/// product's declared dependencies inside the environment. A dependency
/// that is not installed gets its own line; any other per-dependency
/// introspection error is printed inline and reporting continues.
pub fn report(manifest: &Manifest, env: &str, run_path: &str) -> Result<()> {
    let python = manifest.bin(env, "python");
    if !python.exists() {
        bail!(
            "test environment {env} is not installed; \
             run without --dependencies to install it first"
        );
    }

    let repo = manifest.repo();
    let product = workspace::product_name(repo);
    let mut libs = editable::declared_dependencies(manifest, env, &product, run_path)?;
    libs.sort();

    println!("Product dependencies in {env}:");
    for lib in libs {
        match installed_distribution(&python, &lib, repo, run_path) {
            Ok(Some((version, location))) => {
                let location = render_location(&location, repo);
                println!("  {lib:<25} {version:<10}  {location}");
            }
            Ok(None) => println!("  {lib} is not installed"),
            Err(err) => println!("  {err:#}"),
        }
    }

    Ok(())
}

/// Version and install location of a distribution inside the environment,
/// or `None` when the distribution is not installed.
fn installed_distribution(
    python: &Path,
    lib: &str,
    repo: &Path,
    run_path: &str,
) -> Result<Option<(String, String)>> {
    let snippet = format!(
        "import pkg_resources; \
         d = pkg_resources.get_distribution('{lib}'); \
         print(d.version); print(d.location)"
    );

    let output = Cmd::new([python.display().to_string(), "-c".to_string(), snippet])
        .cwd(repo)
        .env("PATH", run_path)
        .output()?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let version = lines.next().unwrap_or("").trim().to_string();
        let location = lines.next().unwrap_or("").trim().to_string();
        return Ok(Some((version, location)));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("DistributionNotFound") {
        return Ok(None);
    }

    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("introspection failed")
        .trim()
        .to_string();
    bail!("{lib}: {detail}")
}

/// Renders an install location the way a developer reads it: inside the
/// checkout relative to its root, inside a sibling product as a `../` path,
/// anywhere else in full.
fn render_location(location: &str, repo: &Path) -> String {
    let path = Path::new(location);

    if let Ok(stripped) = path.strip_prefix(repo) {
        if stripped.as_os_str().is_empty() {
            return ".".to_string();
        }
        return stripped.display().to_string();
    }

    if let Some(workspace_dir) = repo.parent() {
        if let Ok(stripped) = path.strip_prefix(workspace_dir) {
            return Path::new("..").join(stripped).display().to_string();
        }
    }

    location.to_string()
}

#[cfg(test)]
mod tests {
    use super::render_location;
    use std::path::Path;

    #[test]
    fn location_inside_the_checkout_is_relative() {
        let repo = Path::new("/ws/mytool");
        assert_eq!(render_location("/ws/mytool/src", repo), "src");
        assert_eq!(render_location("/ws/mytool", repo), ".");
    }

    #[test]
    fn location_in_a_sibling_product_uses_a_parent_path() {
        let repo = Path::new("/ws/mytool");
        assert_eq!(render_location("/ws/liba/src", repo), "../liba/src");
    }

    #[test]
    fn location_outside_the_workspace_is_rendered_in_full() {
        let repo = Path::new("/ws/mytool");
        assert_eq!(
            render_location("/usr/lib/python2.7/site-packages", repo),
            "/usr/lib/python2.7/site-packages"
        );
    }
}
