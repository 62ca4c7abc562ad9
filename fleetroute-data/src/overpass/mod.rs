//! Road network download from public OpenStreetMap services.
//!
//! [`OverpassSource`] geocodes the configured region with Nominatim, asks the
//! Overpass interpreter for the drivable ways inside it, and assembles the
//! result into a [`RoadGraph`].
//!
//! # Architecture
//!
//! [`RoadNetworkSource`] is synchronous so the core stays embeddable in
//! synchronous callers. The source owns a Tokio runtime and blocks on the
//! async HTTP calls, using the caller's runtime instead when it is already
//! inside a multi-threaded one.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use fleetroute_core::RoadNetworkSource;
//! use fleetroute_data::overpass::{OverpassSource, OverpassSourceConfig};
//!
//! let config = OverpassSourceConfig::default()
//!     .with_timeout(Duration::from_secs(300))
//!     .with_user_agent("school-buses/1.0");
//! let source = OverpassSource::with_config(config)?;
//! let graph = source.fetch("Irvine, California, USA")?;
//! println!("{} nodes", graph.node_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use fleetroute_core::{NetworkSourceError, RoadGraph, RoadNetworkSource};
use log::{debug, info, warn};
use reqwest::Client;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

mod query;
mod types;

pub use query::{QueryScope, drive_network_query};
pub use types::{BoundingBox, OverpassElement, OverpassResponse, Place};

use crate::osm::RoadNetworkAssembler;

/// Default user agent; Nominatim rejects anonymous clients.
pub const DEFAULT_USER_AGENT: &str = "fleetroute/0.1";

/// Public Nominatim endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/";

/// Public Overpass interpreter endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Failure to construct an [`OverpassSource`].
#[derive(Debug, Error)]
pub enum SourceBuildError {
    /// An endpoint is not a valid absolute URL.
    #[error("invalid endpoint URL {url}")]
    InvalidUrl {
        /// Offending value.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
    /// The Tokio runtime could not be built.
    #[error("failed to build Tokio runtime")]
    Runtime(#[source] std::io::Error),
}

/// Configuration for [`OverpassSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassSourceConfig {
    /// Overpass interpreter URL.
    pub overpass_url: String,
    /// Nominatim base URL.
    pub nominatim_url: String,
    /// Request timeout, also passed to Overpass as the query timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for OverpassSourceConfig {
    fn default() -> Self {
        Self {
            overpass_url: DEFAULT_OVERPASS_URL.to_owned(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl OverpassSourceConfig {
    /// Configuration using the given Overpass interpreter.
    #[must_use]
    pub fn new(overpass_url: impl Into<String>) -> Self {
        Self {
            overpass_url: overpass_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the Nominatim base URL.
    #[must_use]
    pub fn with_nominatim_url(mut self, url: impl Into<String>) -> Self {
        self.nominatim_url = url.into();
        self
    }
}

/// [`RoadNetworkSource`] backed by Nominatim and Overpass.
pub struct OverpassSource {
    client: Client,
    config: OverpassSourceConfig,
    search_url: Url,
    overpass_url: Url,
    runtime: Runtime,
}

impl std::fmt::Debug for OverpassSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverpassSource")
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish_non_exhaustive()
    }
}

fn parse_url(raw: &str) -> Result<Url, SourceBuildError> {
    Url::parse(raw).map_err(|source| SourceBuildError::InvalidUrl {
        url: raw.to_owned(),
        source,
    })
}

impl OverpassSource {
    /// Source using the public endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn new() -> Result<Self, SourceBuildError> {
        Self::with_config(OverpassSourceConfig::default())
    }

    /// Source with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed endpoint URLs, or if the HTTP client or
    /// Tokio runtime fails to build.
    pub fn with_config(config: OverpassSourceConfig) -> Result<Self, SourceBuildError> {
        let nominatim = parse_url(&config.nominatim_url)?;
        let search_url = nominatim
            .join("search")
            .map_err(|source| SourceBuildError::InvalidUrl {
                url: config.nominatim_url.clone(),
                source,
            })?;
        let overpass_url = parse_url(&config.overpass_url)?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(SourceBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SourceBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            search_url,
            overpass_url,
            runtime,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &OverpassSourceConfig {
        &self.config
    }

    async fn geocode(&self, region: &str) -> Result<Place, NetworkSourceError> {
        let url = self.search_url.as_str();
        debug!("geocoding {region} via {url}");
        let places: Vec<Place> = self
            .client
            .get(self.search_url.clone())
            .query(&[("q", region), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .json()
            .await
            .map_err(|err| NetworkSourceError::Parse {
                message: format!("Nominatim response: {err}"),
            })?;
        places.into_iter().next().ok_or_else(|| NetworkSourceError::Geocode {
            query: region.to_owned(),
        })
    }

    async fn download(&self, query: String) -> Result<OverpassResponse, NetworkSourceError> {
        let url = self.overpass_url.as_str();
        self.client
            .post(self.overpass_url.clone())
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .json()
            .await
            .map_err(|err| NetworkSourceError::Parse {
                message: format!("Overpass response: {err}"),
            })
    }

    async fn fetch_async(&self, region: &str) -> Result<RoadGraph, NetworkSourceError> {
        let place = self.geocode(region).await?;
        info!(
            "{region} resolved to {} {} ({})",
            place.osm_type, place.osm_id, place.display_name
        );
        let scope = QueryScope::for_place(&place).ok_or_else(|| NetworkSourceError::Parse {
            message: format!("unusable bounding box for {region}: {:?}", place.boundingbox),
        })?;
        let query = drive_network_query(scope, self.config.timeout.as_secs());
        let response = self.download(query).await?;
        if let Some(remark) = &response.remark {
            warn!("Overpass remark for {region}: {remark}");
        }
        assemble(region, response)
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> NetworkSourceError {
        if error.is_timeout() {
            return NetworkSourceError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return NetworkSourceError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        NetworkSourceError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

/// Build the graph for `region` from an Overpass response.
///
/// # Errors
///
/// [`NetworkSourceError::EmptyNetwork`] when the response holds no drivable
/// way with known nodes.
pub fn assemble(region: &str, response: OverpassResponse) -> Result<RoadGraph, NetworkSourceError> {
    let mut assembler = RoadNetworkAssembler::default();
    for element in response.elements {
        match element {
            OverpassElement::Node { id, lat, lon } => {
                assembler.add_node(id, lat, lon);
            }
            OverpassElement::Way { id, nodes, tags } => {
                assembler.add_way(id, nodes, &tags);
            }
            OverpassElement::Other => {}
        }
    }
    assembler.finish(region)
}

impl RoadNetworkSource for OverpassSource {
    fn fetch(&self, region: &str) -> Result<RoadGraph, NetworkSourceError> {
        let future = self.fetch_async(region);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}
