//! Partition stops into one group per vehicle.
//!
//! [`StopClusterer`] delegates labelling to a [`ClusteringStrategy`] and then
//! enforces the group contract: exactly `k` groups, each stop in exactly one
//! group, and no empty group whenever there are at least `k` stops.
//! [`KMeans`] is the default strategy.

use std::collections::HashMap;

use linfa::prelude::*;
use linfa_clustering::KMeans as LinfaKMeans;
use log::info;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::stop::StopPoint;

/// Assigns 2-D points to clusters.
///
/// Points are `[latitude, longitude]` pairs treated as Euclidean coordinates,
/// which is adequate within a single metropolitan area.
pub trait ClusteringStrategy {
    /// Label every point with a cluster index in `0..k`. Called with
    /// `k >= 1` and a non-empty slice. Implementations must be deterministic.
    ///
    /// # Errors
    /// Returns [`ClusterError::Strategy`] when the underlying algorithm
    /// cannot produce a labelling.
    fn assign(&self, points: &[[f64; 2]], k: usize) -> Result<Vec<usize>, ClusterError>;
}

impl<T: ClusteringStrategy + ?Sized> ClusteringStrategy for &T {
    fn assign(&self, points: &[[f64; 2]], k: usize) -> Result<Vec<usize>, ClusterError> {
        (**self).assign(points, k)
    }
}

/// Tuning for [`KMeans`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansConfig {
    /// Seed for centroid initialisation.
    pub seed: u64,
    /// Independent runs; the labelling with the lowest inertia wins.
    pub n_init: usize,
    /// Iteration cap per run.
    pub max_iterations: u64,
    /// A run stops once its centroids move less than this distance.
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

/// Seeded k-means with k-means++ initialisation, fitted by `linfa-clustering`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KMeans {
    config: KMeansConfig,
}

impl KMeans {
    /// Strategy with explicit tuning.
    #[must_use]
    pub const fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    /// Active tuning.
    #[must_use]
    pub const fn config(&self) -> &KMeansConfig {
        &self.config
    }

    fn fit_predict(&self, points: &[[f64; 2]], k: usize) -> Result<Vec<usize>, ClusterError> {
        let dataset = DatasetBase::from(Array2::from(points.to_vec()));
        let rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let model = LinfaKMeans::params_with_rng(k, rng)
            .n_runs(self.config.n_init.max(1))
            .max_n_iterations(self.config.max_iterations)
            .tolerance(self.config.tolerance)
            .fit(&dataset)
            .map_err(|err| ClusterError::Strategy {
                reason: err.to_string(),
            })?;
        let labels: Array1<usize> = model.predict(dataset.records());
        Ok(labels.to_vec())
    }
}

impl ClusteringStrategy for KMeans {
    fn assign(&self, points: &[[f64; 2]], k: usize) -> Result<Vec<usize>, ClusterError> {
        if k <= 1 {
            return Ok(vec![0; points.len()]);
        }
        if points.len() <= k {
            return Ok((0..points.len()).collect());
        }
        // k-means++ cannot seed more centroids than there are distinct points.
        let (distinct, labels) = label_distinct(points);
        if distinct <= k {
            return Ok(labels);
        }
        self.fit_predict(points, k)
    }
}

/// Number of distinct points and each point's index among them, in order of
/// first appearance.
fn label_distinct(points: &[[f64; 2]]) -> (usize, Vec<usize>) {
    let mut seen: HashMap<[u64; 2], usize> = HashMap::new();
    let labels = points
        .iter()
        .map(|&[lat, lng]| {
            let next = seen.len();
            *seen.entry([lat.to_bits(), lng.to_bits()]).or_insert(next)
        })
        .collect();
    (seen.len(), labels)
}

/// Error returned by [`StopClusterer::cluster`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// Fewer than one cluster was requested.
    #[error("cluster count must be at least 1, got {requested}")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
    },
    /// The clustering algorithm failed.
    #[error("clustering failed: {reason}")]
    Strategy {
        /// Message reported by the algorithm.
        reason: String,
    },
    /// The strategy labelled a different number of points than it was given.
    #[error("strategy returned {found} labels for {expected} points")]
    LabelCount {
        /// Number of points passed to the strategy.
        expected: usize,
        /// Number of labels returned.
        found: usize,
    },
    /// The strategy produced a label outside `0..clusters`.
    #[error("strategy returned label {label} for {clusters} clusters")]
    LabelOutOfRange {
        /// Offending label.
        label: usize,
        /// Requested number of clusters.
        clusters: usize,
    },
}

/// Stops grouped by cluster index.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    groups: Vec<Vec<StopPoint>>,
}

impl ClusterAssignment {
    /// Groups indexed by cluster.
    #[must_use]
    pub fn groups(&self) -> &[Vec<StopPoint>] {
        &self.groups
    }

    /// Consume the assignment, yielding its groups.
    #[must_use]
    pub fn into_groups(self) -> Vec<Vec<StopPoint>> {
        self.groups
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups. Never true for a successful
    /// [`StopClusterer::cluster`] call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Stop count of every group.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }
}

/// Partitions stops into `k` groups.
///
/// # Examples
/// ```
/// use fleetroute_core::{StopClusterer, StopPoint};
///
/// # fn main() -> Result<(), fleetroute_core::ClusterError> {
/// let stops = vec![
///     StopPoint::new("a", "A", 33.60, -117.80),
///     StopPoint::new("b", "B", 34.05, -118.24),
/// ];
/// let assignment = StopClusterer::default().cluster(&stops, 2)?;
/// assert_eq!(assignment.sizes(), vec![1, 1]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StopClusterer<S = KMeans> {
    strategy: S,
}

impl Default for StopClusterer<KMeans> {
    fn default() -> Self {
        Self::new(KMeans::default())
    }
}

impl<S: ClusteringStrategy> StopClusterer<S> {
    /// Clusterer using `strategy`.
    #[must_use]
    pub const fn new(strategy: S) -> Self {
        Self { strategy }
    }

    /// Group `stops` into exactly `k` clusters.
    ///
    /// Returns `k` empty groups for an empty stop list. When the strategy
    /// leaves a group empty although `stops.len() >= k`, the stops are
    /// flattened in group order and dealt round-robin so that group `i`
    /// receives stops `i, i + k, i + 2k, …`.
    ///
    /// # Errors
    /// Returns [`ClusterError::InvalidClusterCount`] when `k` is zero. Any
    /// other variant reports a strategy failure or a malformed labelling.
    pub fn cluster(&self, stops: &[StopPoint], k: usize) -> Result<ClusterAssignment, ClusterError> {
        if k == 0 {
            return Err(ClusterError::InvalidClusterCount { requested: k });
        }
        let mut groups = vec![Vec::new(); k];
        if stops.is_empty() {
            return Ok(ClusterAssignment { groups });
        }

        let points: Vec<[f64; 2]> = stops
            .iter()
            .map(|s| [s.latitude(), s.longitude()])
            .collect();
        let labels = self.strategy.assign(&points, k)?;
        if labels.len() != stops.len() {
            return Err(ClusterError::LabelCount {
                expected: stops.len(),
                found: labels.len(),
            });
        }
        for (stop, label) in stops.iter().zip(labels) {
            let group = groups.get_mut(label).ok_or(ClusterError::LabelOutOfRange {
                label,
                clusters: k,
            })?;
            group.push(stop.clone());
        }

        let empty = groups.iter().filter(|g| g.is_empty()).count();
        if empty > 0 && stops.len() >= k {
            info!(
                "clustering left {empty} of {k} groups empty; redistributing {} stops round-robin",
                stops.len()
            );
            groups = deal_round_robin(groups, k);
        }
        Ok(ClusterAssignment { groups })
    }
}

fn deal_round_robin(groups: Vec<Vec<StopPoint>>, k: usize) -> Vec<Vec<StopPoint>> {
    let mut dealt: Vec<Vec<StopPoint>> = vec![Vec::new(); k];
    let stops = groups.into_iter().flatten();
    for (stop, slot) in stops.zip((0..k).cycle()) {
        if let Some(group) = dealt.get_mut(slot) {
            group.push(stop);
        }
    }
    dealt
}
