mod cli;
mod commands;
mod config;
mod editable;
mod envs;
mod manifest;
mod process;
mod report;
mod scripts;
mod telemetry;
mod workspace;

fn main() {
    if let Err(err) = cli::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
