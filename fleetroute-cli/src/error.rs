//! Error types emitted by the fleetroute CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use fleetroute_core::{OptimizeError, RoadNetworkError, StopRecordError};
use fleetroute_data::SourceBuildError;
use thiserror::Error;

/// Errors emitted by the fleetroute CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Name of the missing option.
        field: &'static str,
        /// Environment variable that can supply the option.
        env: &'static str,
    },
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        /// Name of the option referencing the path.
        field: &'static str,
        /// Path that was not found.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Name of the option referencing the path.
        field: &'static str,
        /// Path that could not be inspected.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Fewer than one vehicle was requested.
    #[error("--buses must be at least 1, got {requested}")]
    InvalidBusCount {
        /// Number of vehicles requested.
        requested: usize,
    },
    /// Opening the stops file failed.
    #[error("failed to open stops at {path:?}: {source}")]
    OpenStops {
        /// Path to the stops file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The stops file was not a JSON array of stop records.
    #[error("failed to parse stops JSON at {path:?}: {source}")]
    ParseStops {
        /// Path to the stops file.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A stop record failed validation.
    #[error("stop #{index} in {path:?} is invalid: {source}")]
    InvalidStop {
        /// Path to the stops file.
        path: Utf8PathBuf,
        /// Zero-based index of the offending stop.
        index: usize,
        /// Validation error for the stop.
        #[source]
        source: StopRecordError,
    },
    /// The stops file held no stops.
    #[error("no stops provided in {path:?}")]
    NoStops {
        /// Path to the stops file.
        path: Utf8PathBuf,
    },
    /// Constructing the Overpass source failed.
    #[error("failed to build road network source for {endpoint:?}: {source}")]
    BuildSource {
        /// Overpass endpoint URL.
        endpoint: String,
        /// Underlying source construction error.
        #[source]
        source: SourceBuildError,
    },
    /// Loading or refreshing the road network failed.
    #[error(transparent)]
    Network(#[from] RoadNetworkError),
    /// The optimiser rejected the request.
    #[error("optimisation failed: {0}")]
    Optimize(#[from] OptimizeError),
    /// Serialising command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
