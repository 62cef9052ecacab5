use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "tox.ini";

/// Structured view of the environment manifest: the declared environment
/// names, the commands each environment runs, and where the underlying
/// build tool keeps each environment on disk.
#[derive(Debug, Clone)]
pub struct Manifest {
    repo: PathBuf,
    path: PathBuf,
    envlist: Vec<String>,
    sections: HashMap<String, HashMap<String, String>>,
}

impl Manifest {
    pub fn load(repo: &Path) -> Result<Self> {
        let path = repo.join(MANIFEST_FILE);
        if !path.exists() {
            bail!("no {} found in {}", MANIFEST_FILE, repo.display());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(repo.to_path_buf(), path, &raw)
    }

    fn parse(repo: PathBuf, path: PathBuf, raw: &str) -> Result<Self> {
        let sections = parse_sections(raw);
        let envlist = sections
            .get("tox")
            .and_then(|section| section.get("envlist"))
            .map(|value| split_list(value))
            .unwrap_or_default();

        if envlist.is_empty() {
            bail!("no envlist declared in {}", path.display());
        }

        Ok(Self {
            repo,
            path,
            envlist,
            sections,
        })
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared environment names, in manifest order.
    pub fn envlist(&self) -> &[String] {
        &self.envlist
    }

    /// Commands for the environment, one per non-empty line, from
    /// `[testenv:<name>]` with `[testenv]` as the fallback.
    pub fn commands(&self, env: &str) -> Vec<String> {
        let section = format!("testenv:{env}");
        let value = self
            .sections
            .get(&section)
            .and_then(|entries| entries.get("commands"))
            .or_else(|| {
                self.sections
                    .get("testenv")
                    .and_then(|entries| entries.get("commands"))
            });

        match value {
            Some(raw) => raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Root directory of the environment, owned by the underlying tool.
    pub fn envdir(&self, env: &str) -> PathBuf {
        self.repo.join(".tox").join(env)
    }

    /// Directory holding the environment's installed entry scripts.
    pub fn bindir(&self, env: &str) -> PathBuf {
        self.envdir(env).join("bin")
    }

    /// Path of a named executable inside the environment.
    pub fn bin(&self, env: &str, executable: &str) -> PathBuf {
        self.bindir(env).join(executable)
    }
}

/// Minimal INI subset: `[section]` headers, `key = value` pairs, and
/// indented continuation lines appended to the previous key's value. A
/// blank line ends a continuation.
fn parse_sections(raw: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current_section: Option<String> = None;
    let mut current_key: Option<String> = None;

    for line in raw.lines() {
        let line = line.trim_end();

        if line.trim_start().starts_with(['#', ';']) {
            continue;
        }

        if line.is_empty() {
            current_key = None;
            continue;
        }

        if let Some(name) = line
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current_section = Some(name);
            current_key = None;
            continue;
        }

        let Some(section) = current_section.clone() else {
            continue;
        };

        if line.starts_with([' ', '\t']) {
            if let Some(key) = &current_key {
                if let Some(value) = sections
                    .get_mut(&section)
                    .and_then(|entries| entries.get_mut(key))
                {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(line.trim());
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_string();
            sections
                .entry(section)
                .or_default()
                .insert(key.clone(), value.trim().to_string());
            current_key = Some(key);
        }
    }

    sections
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
