use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::error;

use crate::cli::Cli;
use crate::config::Config;
use crate::envs;
use crate::manifest::Manifest;
use crate::process::Cmd;
use crate::report;
use crate::workspace;

/// Placeholder the manifest's command lines use for test-runner arguments.
const PYTEST_ARGS_PLACEHOLDER: &str = "{env:PYTESTARGS:}";

pub fn run(cli: Cli) -> Result<()> {
    let repo = workspace::repo_check()?;
    let manifest = Manifest::load(&repo)?;
    let workspace_dir = workspace::workspace_path(&repo)?;
    let config = Config::load(&workspace_dir)?;

    let run_path = clean_run_path(
        &env::var("PATH").unwrap_or_default(),
        env::var("VIRTUAL_ENV").ok().as_deref(),
    );

    let (mut env_names, files) = partition_env_or_file(&cli.env_or_file);
    if env_names.is_empty() {
        env_names = manifest.envlist().to_vec();
    }

    if cli.dependencies {
        for env_name in &env_names {
            report::report(&manifest, env_name, &run_path)?;
        }
        return Ok(());
    }

    let to_sync = if cli.redevelop || cli.recreate {
        env_names.clone()
    } else {
        stale_environments(&manifest, &env_names)?
    };

    if !to_sync.is_empty() {
        envs::synchronize(&manifest, &to_sync, cli.recreate, &config, &run_path)?;
    }

    let pytest_args = assemble_pytest_args(cli.show_output, cli.match_test.as_deref(), &files);

    for (index, env_name) in env_names.iter().enumerate() {
        if env_names.len() > 1 {
            if index > 0 {
                println!();
            }
            println!("{env_name}");
        }
        run_env_commands(&manifest, env_name, &pytest_args, &run_path)?;
    }

    Ok(())
}

/// The subset of the requested environments whose installs are missing or
/// older than the dependency declarations.
fn stale_environments(manifest: &Manifest, env_names: &[String]) -> Result<Vec<String>> {
    let mut stale = Vec::new();
    for env_name in env_names {
        if envs::is_stale(manifest.repo(), &manifest.envdir(env_name))? {
            stale.push(env_name.clone());
        }
    }
    Ok(stale)
}

/// Runs the environment's manifest commands in order. Command words resolve
/// inside the environment's script directory; a missing executable is
/// logged and skipped without failing the remaining commands.
fn run_env_commands(
    manifest: &Manifest,
    env_name: &str,
    pytest_args: &[String],
    run_path: &str,
) -> Result<()> {
    let envdir = manifest.envdir(env_name);
    let bindir = manifest.bindir(env_name);

    // The structured equivalent of sourcing the environment's activate
    // script: its bin directory leads PATH and VIRTUAL_ENV points at it.
    let env_path = env::join_paths(
        std::iter::once(bindir.clone()).chain(env::split_paths(run_path)),
    )
    .context("failed to assemble environment PATH")?
    .to_string_lossy()
    .to_string();

    for command in manifest.commands(env_name) {
        let argv = command_argv(&command, pytest_args);
        let Some(program) = argv.first() else {
            continue;
        };

        let program_path = bindir.join(program);
        if !program_path.exists() {
            error!("{} does not exist", program_path.display());
            continue;
        }

        let mut full_argv = vec![program_path.display().to_string()];
        full_argv.extend(argv[1..].iter().cloned());

        Cmd::new(full_argv)
            .cwd(manifest.repo())
            .env("PATH", &env_path)
            .env("VIRTUAL_ENV", envdir.display().to_string())
            .run()?;
    }

    Ok(())
}

/// Splits the positional arguments into environment names and test files:
/// an argument naming an existing path is a test file (absolutized for the
/// runner), anything else is an environment name.
fn partition_env_or_file(args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut env_names = Vec::new();
    let mut files = Vec::new();

    for arg in args {
        let path = Path::new(arg);
        if path.exists() {
            let absolute = fs::canonicalize(path)
                .map(|abs| abs.display().to_string())
                .unwrap_or_else(|_| arg.clone());
            files.push(absolute);
        } else {
            env_names.push(arg.clone());
        }
    }

    (env_names, files)
}

/// Test-runner arguments assembled from the CLI flags and file arguments,
/// substituted for the manifest's placeholder.
fn assemble_pytest_args(
    show_output: bool,
    match_test: Option<&str>,
    files: &[String],
) -> Vec<String> {
    let mut args = Vec::new();
    if show_output {
        args.push("-s".to_string());
    }
    if let Some(pattern) = match_test {
        args.push("-k".to_string());
        args.push(pattern.to_string());
    }
    args.extend(files.iter().cloned());
    args
}

/// Splits a manifest command line into an argument vector, expanding the
/// test-runner placeholder in place.
fn command_argv(command: &str, pytest_args: &[String]) -> Vec<String> {
    let mut argv = Vec::new();
    for word in command.split_whitespace() {
        if word == PYTEST_ARGS_PLACEHOLDER {
            argv.extend(pytest_args.iter().cloned());
        } else {
            argv.push(word.to_string());
        }
    }
    argv
}

/// PATH for child processes. When a virtualenv is active, its entries (and
/// dead entries) are dropped so the venv's interpreter cannot shadow the
/// ones the build tool installs.
fn clean_run_path(path: &str, virtual_env: Option<&str>) -> String {
    let Some(venv) = virtual_env.filter(|value| !value.is_empty()) else {
        return path.to_string();
    };

    let venv = Path::new(venv);
    let kept: Vec<PathBuf> = env::split_paths(path)
        .filter(|entry| entry.exists() && !entry.starts_with(venv))
        .collect();

    env::join_paths(kept)
        .ok()
        .map(|joined| joined.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_expands_to_runner_arguments() {
        let args = vec!["-s".to_string(), "-k".to_string(), "smoke".to_string()];
        assert_eq!(
            command_argv("py.test {env:PYTESTARGS:}", &args),
            vec!["py.test", "-s", "-k", "smoke"]
        );
        assert_eq!(
            command_argv("py.test {env:PYTESTARGS:}", &[]),
            vec!["py.test"]
        );
        assert_eq!(
            command_argv("flake8 src", &args),
            vec!["flake8", "src"]
        );
    }

    #[test]
    fn runner_arguments_follow_flag_order() {
        let args = assemble_pytest_args(
            true,
            Some("smoke"),
            &["/ws/mytool/tests/test_api.py".to_string()],
        );
        assert_eq!(args, vec!["-s", "-k", "smoke", "/ws/mytool/tests/test_api.py"]);

        assert!(assemble_pytest_args(false, None, &[]).is_empty());
    }

    #[test]
    fn existing_paths_are_collected_as_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("test_api.py");
        fs::write(&file, "").expect("write file");

        let (env_names, files) = partition_env_or_file(&[
            "py27".to_string(),
            file.display().to_string(),
        ]);
        assert_eq!(env_names, vec!["py27"]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("test_api.py"));
    }

    #[test]
    fn run_path_is_untouched_without_an_active_venv() {
        assert_eq!(clean_run_path("/usr/bin:/bin", None), "/usr/bin:/bin");
    }

    #[test]
    fn venv_entries_and_dead_entries_are_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let venv = dir.path().join("venv");
        let venv_bin = venv.join("bin");
        let system_bin = dir.path().join("system");
        fs::create_dir_all(&venv_bin).expect("create venv bin");
        fs::create_dir_all(&system_bin).expect("create system bin");

        let path = format!(
            "{}:{}:{}",
            venv_bin.display(),
            system_bin.display(),
            dir.path().join("gone").display()
        );
        let venv = venv.display().to_string();
        let cleaned = clean_run_path(&path, Some(venv.as_str()));

        assert_eq!(cleaned, system_bin.display().to_string());
    }
}
