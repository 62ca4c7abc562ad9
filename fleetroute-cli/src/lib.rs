//! Command-line interface for the fleetroute engine.
//!
//! `fleetroute optimize` partitions a JSON file of stops among a number of
//! buses and prints the ordered routes. `fleetroute network` inspects or
//! refreshes the cached road network the optimiser routes over.
#![forbid(unsafe_code)]

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;

mod error;
mod network;
mod optimize;

pub use error::CliError;
use network::{NetworkAction, run_network};
use optimize::{OptimizeCommand, run_optimize};

pub(crate) const ARG_OPTIMIZE_STOPS: &str = "stops";
pub(crate) const ARG_OPTIMIZE_BUSES: &str = "buses";
pub(crate) const ARG_REGION: &str = "region";
pub(crate) const ARG_CACHE_DIR: &str = "cache-dir";
pub(crate) const ARG_OSM_PBF: &str = "osm-pbf";
pub(crate) const ARG_OVERPASS_URL: &str = "overpass-url";
pub(crate) const ENV_OPTIMIZE_STOPS: &str = "FLEETROUTE_CMDS_OPTIMIZE_STOPS_PATH";
pub(crate) const ENV_OPTIMIZE_BUSES: &str = "FLEETROUTE_CMDS_OPTIMIZE_BUSES";

/// Run the fleetroute CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when argument parsing, configuration, input loading,
/// the road network or the optimiser fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Optimize(command) => run_optimize(command),
        Command::Network { action } => run_network(action),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "fleetroute",
    about = "Bus route optimisation over a cached OpenStreetMap road network",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Partition stops among buses and order each route by drive time.
    Optimize(OptimizeCommand),
    /// Inspect or refresh the cached road network.
    Network {
        #[command(subcommand)]
        action: NetworkAction,
    },
}

/// Fail unless `path` names an existing regular file.
pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match fleetroute_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Pretty-print `value` as JSON followed by a newline.
pub(crate) fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
