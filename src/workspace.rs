use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

/// Walks from `start` toward the filesystem root looking for a `.git`
/// entry; the directory containing it is the product checkout.
pub fn repo_path(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        dir = current.parent();
    }
    None
}

/// The product checkout the current directory belongs to.
pub fn repo_check() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    match repo_path(&cwd) {
        Some(repo) => Ok(repo),
        None => bail!("this command must be run from within a product checkout"),
    }
}

/// The workspace directory holding the product checkouts as siblings.
pub fn workspace_path(repo: &Path) -> Result<PathBuf> {
    repo.parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("checkout {} has no parent directory", repo.display()))
}

pub fn product_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    base.strip_suffix(".git").unwrap_or(&base).to_string()
}

pub fn product_path(workspace: &Path, name: &str) -> PathBuf {
    workspace.join(name)
}

/// Product checkouts available in the workspace, sorted by path.
pub fn product_repos(workspace: &Path) -> Result<Vec<PathBuf>> {
    let mut repos = Vec::new();
    for entry in fs::read_dir(workspace)
        .with_context(|| format!("failed to read {}", workspace.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read {}", workspace.display()))?;
        let path = entry.path();
        if path.is_dir() && path.join(".git").exists() {
            repos.push(path);
        }
    }
    repos.sort();
    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_name_strips_git_suffix() {
        assert_eq!(product_name(Path::new("/ws/mytool")), "mytool");
        assert_eq!(product_name(Path::new("/ws/mytool.git")), "mytool");
    }

    #[test]
    fn repo_path_walks_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = dir.path().join("product");
        let nested = repo.join("src").join("deep");
        fs::create_dir_all(repo.join(".git")).expect("create .git");
        fs::create_dir_all(&nested).expect("create nested dirs");

        assert_eq!(repo_path(&nested), Some(repo.clone()));
        assert_eq!(repo_path(&repo), Some(repo));
    }

    #[test]
    fn repo_path_is_none_outside_a_checkout() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(repo_path(dir.path()), None);
    }

    #[test]
    fn product_repos_lists_only_checkouts() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("liba").join(".git")).expect("liba");
        fs::create_dir_all(dir.path().join("libb").join(".git")).expect("libb");
        fs::create_dir_all(dir.path().join("scratch")).expect("scratch");
        fs::write(dir.path().join("notes.txt"), "x").expect("file");

        let repos = product_repos(dir.path()).expect("list repos");
        let names: Vec<String> = repos.iter().map(|path| product_name(path)).collect();
        assert_eq!(names, vec!["liba", "libb"]);
    }
}
