//! `network` subcommands and the road-network wiring shared with `optimize`.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use fleetroute_core::{
    DEFAULT_CACHE_DIR, DEFAULT_REGION, RoadNetworkConfig, RoadNetworkProvider, RoadNetworkSource,
};
use fleetroute_data::overpass::DEFAULT_OVERPASS_URL;
use fleetroute_data::{OverpassSource, OverpassSourceConfig, PbfSource};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::{
    ARG_CACHE_DIR, ARG_OSM_PBF, ARG_OVERPASS_URL, ARG_REGION, CliError, require_existing,
    write_json,
};

/// Actions on the cached road network.
#[derive(Debug, Subcommand)]
pub(crate) enum NetworkAction {
    /// Print node/edge counts, loading or downloading the graph if needed.
    Stats(NetworkArgs),
    /// Download a fresh graph, replace the cache and print its stats.
    Refresh(NetworkArgs),
}

/// CLI arguments selecting a road network.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[ortho_config(prefix = "FLEETROUTE")]
pub(crate) struct NetworkArgs {
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

impl NetworkArgs {
    pub(crate) fn into_config(self) -> Result<NetworkConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(NetworkConfig::from(merged))
    }
}

/// Resolved road-network selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NetworkConfig {
    /// Region and cache location.
    pub(crate) road: RoadNetworkConfig,
    /// Local extract replacing the Overpass download.
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Overpass interpreter endpoint.
    pub(crate) overpass_url: String,
}

impl NetworkConfig {
    pub(crate) fn resolve(
        region: Option<String>,
        cache_dir: Option<Utf8PathBuf>,
        osm_pbf: Option<Utf8PathBuf>,
        overpass_url: Option<String>,
    ) -> Self {
        let road = RoadNetworkConfig::new(region.unwrap_or_else(|| DEFAULT_REGION.to_owned()))
            .with_cache_dir(cache_dir.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CACHE_DIR)));
        Self {
            road,
            osm_pbf,
            overpass_url: overpass_url.unwrap_or_else(|| DEFAULT_OVERPASS_URL.to_owned()),
        }
    }

    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        self.osm_pbf
            .as_deref()
            .map_or(Ok(()), |path| require_existing(path, ARG_OSM_PBF))
    }
}

impl From<NetworkArgs> for NetworkConfig {
    fn from(args: NetworkArgs) -> Self {
        Self::resolve(args.region, args.cache_dir, args.osm_pbf, args.overpass_url)
    }
}

/// Road-network provider as wired by the CLI.
pub(crate) type Provider = RoadNetworkProvider<Box<dyn RoadNetworkSource>>;

/// Builds the map source for the current invocation.
pub(crate) trait SourceBuilder {
    fn build(&self, config: &NetworkConfig) -> Result<Box<dyn RoadNetworkSource>, CliError>;
}

pub(crate) struct DefaultSourceBuilder;

impl SourceBuilder for DefaultSourceBuilder {
    fn build(&self, config: &NetworkConfig) -> Result<Box<dyn RoadNetworkSource>, CliError> {
        if let Some(path) = &config.osm_pbf {
            info!("using road network extract {path}");
            return Ok(Box::new(PbfSource::new(path.clone())));
        }
        let source = OverpassSource::with_config(OverpassSourceConfig::new(
            config.overpass_url.clone(),
        ))
        .map_err(|source| CliError::BuildSource {
            endpoint: config.overpass_url.clone(),
            source,
        })?;
        Ok(Box::new(source))
    }
}

/// Provider for `config`, with nothing loaded yet.
pub(crate) fn build_provider(
    config: &NetworkConfig,
    builder: &dyn SourceBuilder,
) -> Result<Provider, CliError> {
    config.validate_sources()?;
    let source = builder.build(config)?;
    Ok(RoadNetworkProvider::new(config.road.clone(), source))
}

pub(crate) fn run_network(action: NetworkAction) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_network_with(action, &DefaultSourceBuilder, &mut stdout)
}

pub(crate) fn run_network_with(
    action: NetworkAction,
    builder: &dyn SourceBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let (args, refresh) = match action {
        NetworkAction::Stats(args) => (args, false),
        NetworkAction::Refresh(args) => (args, true),
    };
    let provider = build_provider(&args.into_config()?, builder)?;
    if refresh {
        provider.refresh()?;
    }
    let stats = provider.stats()?;
    write_json(writer, &stats)
}

#[cfg(test)]
pub(crate) fn network_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<NetworkConfig, CliError> {
    let merged = NetworkArgs::merge_from_layers(layers).map_err(CliError::from)?;
    Ok(NetworkConfig::from(merged))
}
