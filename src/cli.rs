use anyhow::Result;
use clap::Parser;

use crate::commands;
use crate::telemetry;

#[derive(Debug, Parser)]
#[command(
    version = env!("VERSION"),
    about = "Workspace test environment executor",
    long_about = None,
    long_version = concat!(
        "version ",
        env!("VERSION"),
        "\n",
        "  commit: ",
        env!("COMMIT"),
        "\n",
        "  built at: ",
        env!("DATE"),
        "\n",
        "  rust version: ",
        env!("RUSTC_VERSION"),
        "\n",
        "  platform: ",
        env!("OS"),
        "/",
        env!("ARCH")
    )
)]
pub struct Cli {
    /// Test environments to act on, or test files to hand to the test
    /// runner. Defaults to the manifest's envlist.
    #[arg(value_name = "env_or_file")]
    pub env_or_file: Vec<String>,

    /// Show where product dependencies are installed from, and their versions
    #[arg(
        short = 'd',
        long,
        conflicts_with_all = ["redevelop", "recreate"]
    )]
    pub dependencies: bool,

    /// Reinstall the test environments on top of the existing ones
    #[arg(short = 'r', long, conflicts_with = "recreate")]
    pub redevelop: bool,

    /// Remove the test environments first and rebuild them from scratch
    #[arg(short = 'R', long)]
    pub recreate: bool,

    /// Show test output
    #[arg(short = 's', long = "show-output")]
    pub show_output: bool,

    /// Only run tests whose names contain the pattern
    #[arg(short = 'k', value_name = "NAME_PATTERN")]
    pub match_test: Option<String>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging()?;
    commands::run(cli)
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn mode_flags_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["wtx", "-d", "-r"]).is_err());
        assert!(Cli::try_parse_from(["wtx", "-d", "-R"]).is_err());
        assert!(Cli::try_parse_from(["wtx", "-r", "-R"]).is_err());
    }

    #[test]
    fn parses_environments_and_runner_flags() {
        let cli = Cli::try_parse_from(["wtx", "py27", "py36", "-s", "-k", "smoke"])
            .expect("parse");
        assert_eq!(cli.env_or_file, vec!["py27", "py36"]);
        assert!(cli.show_output);
        assert_eq!(cli.match_test.as_deref(), Some("smoke"));
    }
}
