//! Optimize command implementation for the fleetroute CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use fleetroute_core::{OptimizationResponse, RouteOptimizer, StopRecord, StraightLineNetwork};
use fleetroute_fs::open_utf8_file;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};

use crate::network::{DefaultSourceBuilder, NetworkConfig, SourceBuilder, build_provider};
use crate::{
    ARG_CACHE_DIR, ARG_OPTIMIZE_BUSES, ARG_OPTIMIZE_STOPS, ARG_OSM_PBF, ARG_OVERPASS_URL,
    ARG_REGION, CliError, ENV_OPTIMIZE_BUSES, ENV_OPTIMIZE_STOPS, require_existing, write_json,
};

/// The `optimize` subcommand: layered configuration plus per-run switches.
#[derive(Debug, Clone, Parser)]
#[command(
    long_about = "Partition the stops in a JSON file among the requested \
                 number of buses and order each route by drive time over \
                 the cached road network. The stops file holds an array of \
                 stop records.",
    about = "Optimise bus routes for a set of stops"
)]
pub(crate) struct OptimizeCommand {
    #[command(flatten)]
    pub(crate) args: OptimizeArgs,
    /// Cost legs by great-circle distance without loading a road network.
    #[arg(long)]
    pub(crate) offline: bool,
    /// Ignore the cached graph and download a fresh one first.
    #[arg(long, conflicts_with = "offline")]
    pub(crate) force_download: bool,
}

/// Layered arguments for the `optimize` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[ortho_config(prefix = "FLEETROUTE")]
pub(crate) struct OptimizeArgs {
    /// Path to a JSON array of stop records.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) stops_path: Option<Utf8PathBuf>,
    /// Number of buses to plan routes for.
    #[arg(long = ARG_OPTIMIZE_BUSES, value_name = "count")]
    #[serde(default)]
    pub(crate) buses: Option<usize>,
    /// Place name resolved by the map source.
    #[arg(long = ARG_REGION, value_name = "name")]
    #[serde(default)]
    pub(crate) region: Option<String>,
    /// Directory holding cached graphs.
    #[arg(long = ARG_CACHE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) cache_dir: Option<Utf8PathBuf>,
    /// Read roads from a local `.osm.pbf` extract instead of downloading.
    #[arg(long = ARG_OSM_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Overpass interpreter endpoint.
    #[arg(long = ARG_OVERPASS_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) overpass_url: Option<String>,
}

impl OptimizeArgs {
    pub(crate) fn into_config(self) -> Result<OptimizeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        OptimizeConfig::try_from(merged)
    }
}

/// Resolved `optimize` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OptimizeConfig {
    /// Path to the JSON stops file.
    pub(crate) stops_path: Utf8PathBuf,
    /// Number of buses, at least one.
    pub(crate) buses: usize,
    /// Road network selection.
    pub(crate) network: NetworkConfig,
}

impl OptimizeConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.stops_path, ARG_OPTIMIZE_STOPS)?;
        self.network.validate_sources()
    }
}

impl TryFrom<OptimizeArgs> for OptimizeConfig {
    type Error = CliError;

    fn try_from(args: OptimizeArgs) -> Result<Self, Self::Error> {
        let stops_path = args.stops_path.ok_or(CliError::MissingArgument {
            field: ARG_OPTIMIZE_STOPS,
            env: ENV_OPTIMIZE_STOPS,
        })?;
        let buses = args.buses.ok_or(CliError::MissingArgument {
            field: ARG_OPTIMIZE_BUSES,
            env: ENV_OPTIMIZE_BUSES,
        })?;
        if buses < 1 {
            return Err(CliError::InvalidBusCount { requested: buses });
        }
        let network =
            NetworkConfig::resolve(args.region, args.cache_dir, args.osm_pbf, args.overpass_url);
        Ok(Self {
            stops_path,
            buses,
            network,
        })
    }
}

pub(crate) fn run_optimize(command: OptimizeCommand) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_optimize_with(command, &DefaultSourceBuilder, &mut stdout)
}

pub(crate) fn run_optimize_with(
    command: OptimizeCommand,
    builder: &dyn SourceBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let response = execute_optimize(command, builder)?;
    write_json(writer, &response)
}

fn execute_optimize(
    command: OptimizeCommand,
    builder: &dyn SourceBuilder,
) -> Result<OptimizationResponse, CliError> {
    let config = command.args.into_config()?;
    config.validate_sources()?;
    let stops = load_stops(&config.stops_path)?;

    if command.offline {
        info!("optimising {} stops offline", stops.len());
        return Ok(RouteOptimizer::new(StraightLineNetwork).respond(&stops, config.buses)?);
    }

    let provider = build_provider(&config.network, builder)?;
    if command.force_download {
        provider.refresh()?;
    }
    Ok(RouteOptimizer::new(&provider).respond(&stops, config.buses)?)
}

/// Loads and validates a JSON array of [`StopRecord`]s.
pub(crate) fn load_stops(path: &Utf8Path) -> Result<Vec<StopRecord>, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::OpenStops {
        path: path.to_path_buf(),
        source,
    })?;
    let stops: Vec<StopRecord> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseStops {
            path: path.to_path_buf(),
            source,
        })?;
    if stops.is_empty() {
        return Err(CliError::NoStops {
            path: path.to_path_buf(),
        });
    }
    for (index, stop) in stops.iter().enumerate() {
        stop.validate().map_err(|source| CliError::InvalidStop {
            path: path.to_path_buf(),
            index,
            source,
        })?;
    }
    Ok(stops)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<OptimizeConfig, CliError> {
    let merged = OptimizeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    OptimizeConfig::try_from(merged)
}
