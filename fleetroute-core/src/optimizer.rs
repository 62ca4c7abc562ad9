//! End-to-end route optimisation: cluster, sequence, assemble.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::{ClusterError, ClusteringStrategy, KMeans, StopClusterer};
use crate::provider::{RoadNetwork, RoadNetworkError};
use crate::route::Route;
use crate::sequence::RouteSequencer;
use crate::stop::{StopPoint, StopRecord};

/// Failure of [`RouteOptimizer::optimize`].
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// The vehicle count was not usable.
    #[error("invalid argument: {0}")]
    InvalidArgument(ClusterError),
    /// The clustering strategy failed on valid input.
    #[error(transparent)]
    Clustering(ClusterError),
    /// The road network could not be made available.
    #[error(transparent)]
    Network(#[from] RoadNetworkError),
}

impl From<ClusterError> for OptimizeError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::InvalidClusterCount { .. } => Self::InvalidArgument(err),
            _ => Self::Clustering(err),
        }
    }
}

/// Optimisation result as returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResponse {
    /// One route per vehicle, ordered by `bus_index`.
    pub routes: Vec<Route>,
    /// Number of vehicles requested.
    pub num_buses: usize,
    /// Number of stops considered.
    pub num_stops: usize,
}

/// Turns stop records into one ordered route per vehicle.
///
/// # Examples
/// ```
/// use fleetroute_core::{RouteOptimizer, StopRecord, StraightLineNetwork};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let stops = vec![
///     StopRecord::new("1", "Harbor", 33.60, -117.80)?,
///     StopRecord::new("2", "Culver", 33.61, -117.81)?,
/// ];
/// let routes = RouteOptimizer::new(StraightLineNetwork).optimize(&stops, 1)?;
/// assert_eq!(routes[0].stop_ids, ["1", "2"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RouteOptimizer<N, S = KMeans> {
    network: N,
    clusterer: StopClusterer<S>,
}

impl<N: RoadNetwork> RouteOptimizer<N> {
    /// Optimiser using the default k-means clustering.
    #[must_use]
    pub fn new(network: N) -> Self {
        Self::with_clusterer(network, StopClusterer::default())
    }
}

impl<N: RoadNetwork, S: ClusteringStrategy> RouteOptimizer<N, S> {
    /// Optimiser with an explicit clusterer.
    #[must_use]
    pub const fn with_clusterer(network: N, clusterer: StopClusterer<S>) -> Self {
        Self { network, clusterer }
    }

    /// Road network used for travel costs.
    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }

    /// Partition `stops` across `num_buses` vehicles and order each group.
    ///
    /// Returns exactly `num_buses` routes indexed `0..num_buses`. The road
    /// network is prepared once, and only when some group has more than one
    /// stop to order.
    ///
    /// # Errors
    ///
    /// [`OptimizeError::InvalidArgument`] when `num_buses` is zero, before
    /// any work is done. [`OptimizeError::Clustering`] when the clustering
    /// strategy fails. [`OptimizeError::Network`] when the road network has
    /// to be downloaded and the download fails.
    pub fn optimize(&self, stops: &[StopRecord], num_buses: usize) -> Result<Vec<Route>, OptimizeError> {
        let points: Vec<StopPoint> = stops.iter().map(StopPoint::from).collect();
        let assignment = self.clusterer.cluster(&points, num_buses)?;
        info!(
            "clustered {} stops into {num_buses} groups of sizes {:?}",
            points.len(),
            assignment.sizes()
        );

        if assignment.groups().iter().any(|g| g.len() > 1) {
            self.network.prepare()?;
        }

        let sequencer = RouteSequencer::new(&self.network);
        let routes = assignment
            .into_groups()
            .into_iter()
            .enumerate()
            .map(|(bus_index, group)| {
                let ordered = sequencer.order(group);
                debug!("bus {bus_index}: {} stops", ordered.len());
                Route::from_stops(bus_index, &ordered)
            })
            .collect();
        Ok(routes)
    }

    /// [`Self::optimize`] wrapped in the API response envelope.
    ///
    /// # Errors
    /// Fails exactly when [`Self::optimize`] does.
    pub fn respond(&self, stops: &[StopRecord], num_buses: usize) -> Result<OptimizationResponse, OptimizeError> {
        let routes = self.optimize(stops, num_buses)?;
        Ok(OptimizationResponse {
            routes,
            num_buses,
            num_stops: stops.len(),
        })
    }
}
