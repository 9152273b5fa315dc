/// Default command: bring the script's executable up to date, then run it
///
/// Loads settings, merges them with the command line and hands the resulting
/// [`Outcome`] to the process: exec, print, open or a maintenance report.
use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::Cli;
use crate::config::ShellSettings;
use crate::fs::LocalFileSystem;
use crate::merger::RunConfig;
use crate::script::{executor, Outcome, Session, SwiftBuilder};

pub fn run(cli: Cli) -> Result<()> {
    let settings = ShellSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let config = RunConfig::merge(cli, settings)?;
    debug!(?config, "merged configuration");

    let builder = SwiftBuilder::locate(config.swift.clone(), config.silent);
    let outcome = Session::new(&config, &LocalFileSystem, &builder).run()?;

    match outcome {
        Outcome::Execute {
            executable,
            arguments,
        } => Err(executor::replace_process(&executable, &arguments)),
        Outcome::Print { executable } => {
            println!("{}", executable.display());
            Ok(())
        }
        Outcome::Open { manifest } => executor::open_manifest(&manifest),
        Outcome::Maintenance(report) => {
            println!("{}", report);
            Ok(())
        }
    }
}
