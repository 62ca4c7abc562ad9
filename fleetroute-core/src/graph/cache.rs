//! On-disk cache format for road graphs.
//!
//! A cache file holds a fixed header (`FRRG` magic and a little-endian `u16`
//! format version) followed by a `bincode` payload with the region name, the
//! projection and the node and edge lists. Lookup structures are rebuilt on
//! load.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Edge, GraphError, Node, RoadGraph};
use crate::projection::UtmProjection;

/// File identifier for cached road graphs.
pub(crate) const GRAPH_CACHE_MAGIC: [u8; 4] = *b"FRRG";

/// Current cache format version.
pub(crate) const GRAPH_CACHE_VERSION: u16 = 1;

const HEADER_LEN: usize = 6;

#[derive(Serialize)]
struct GraphBodyRef<'a> {
    region: &'a str,
    projection: UtmProjection,
    nodes: &'a [Node],
    edges: &'a [Edge],
}

#[derive(Deserialize)]
struct GraphBody {
    region: String,
    projection: UtmProjection,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// Error raised while reading or writing a graph cache file.
#[derive(Debug, Error)]
pub enum GraphCacheError {
    /// Reading or writing the file failed.
    #[error("graph cache I/O failed for {path}: {source}")]
    Io {
        /// Cache file location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file ended before the header was complete.
    #[error("graph cache {path} is truncated")]
    Truncated {
        /// Cache file location.
        path: Utf8PathBuf,
    },
    /// The header did not start with the expected magic bytes.
    #[error("invalid graph cache magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected byte sequence.
        expected: [u8; 4],
        /// Bytes read from the file.
        found: [u8; 4],
    },
    /// The file was written by an incompatible format version.
    #[error("unsupported graph cache version {found}; supported version is {supported}")]
    UnsupportedVersion {
        /// Version in the file header.
        found: u16,
        /// Version this build reads.
        supported: u16,
    },
    /// The payload could not be decoded.
    #[error("failed to decode graph cache {path}: {source}")]
    Decode {
        /// Cache file location.
        path: Utf8PathBuf,
        /// Decoder error returned by `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The graph could not be encoded.
    #[error("failed to encode graph cache for {path}: {source}")]
    Encode {
        /// Destination file location.
        path: Utf8PathBuf,
        /// Encoder error returned by `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The cache belongs to another region.
    #[error("graph cache was built for {found:?}, expected {expected:?}")]
    RegionMismatch {
        /// Region the caller asked for.
        expected: String,
        /// Region recorded in the file.
        found: String,
    },
    /// The decoded nodes and edges do not form a valid graph.
    #[error("graph cache {path} holds an invalid graph: {source}")]
    Invalid {
        /// Cache file location.
        path: Utf8PathBuf,
        /// Validation failure.
        #[source]
        source: GraphError,
    },
}

/// Persist `graph` for `region`, atomically replacing any existing file and
/// creating missing parent directories.
///
/// # Errors
/// Returns [`GraphCacheError::Encode`] when serialisation fails and
/// [`GraphCacheError::Io`] when the file cannot be written.
#[expect(
    clippy::little_endian_bytes,
    reason = "the cache header stores its version little-endian"
)]
pub fn write_graph_cache(
    path: &Utf8Path,
    region: &str,
    graph: &RoadGraph,
) -> Result<(), GraphCacheError> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + graph.node_count() * 40);
    bytes.extend_from_slice(&GRAPH_CACHE_MAGIC);
    bytes.extend_from_slice(&GRAPH_CACHE_VERSION.to_le_bytes());
    let body = GraphBodyRef {
        region,
        projection: graph.projection(),
        nodes: graph.nodes(),
        edges: graph.edges(),
    };
    bincode::serialize_into(&mut bytes, &body).map_err(|source| GraphCacheError::Encode {
        path: path.to_owned(),
        source,
    })?;
    fleetroute_fs::write_atomic(path, &bytes).map_err(|source| GraphCacheError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Load the graph cached for `region`.
///
/// # Errors
/// Returns [`GraphCacheError`] when the file cannot be read, carries a
/// foreign header or version, fails to decode, belongs to another region or
/// holds an invalid graph.
#[expect(
    clippy::little_endian_bytes,
    reason = "the cache header stores its version little-endian"
)]
pub fn load_graph_cache(path: &Utf8Path, region: &str) -> Result<RoadGraph, GraphCacheError> {
    let bytes = fleetroute_fs::read_bytes(path).map_err(|source| GraphCacheError::Io {
        path: path.to_owned(),
        source,
    })?;
    let (header, payload) = bytes
        .split_at_checked(HEADER_LEN)
        .ok_or_else(|| GraphCacheError::Truncated {
            path: path.to_owned(),
        })?;
    let (magic, version) = header.split_at(4);
    let found: [u8; 4] = magic.try_into().map_err(|_| GraphCacheError::Truncated {
        path: path.to_owned(),
    })?;
    if found != GRAPH_CACHE_MAGIC {
        return Err(GraphCacheError::InvalidMagic {
            expected: GRAPH_CACHE_MAGIC,
            found,
        });
    }
    let version_bytes: [u8; 2] = version.try_into().map_err(|_| GraphCacheError::Truncated {
        path: path.to_owned(),
    })?;
    let found_version = u16::from_le_bytes(version_bytes);
    if found_version != GRAPH_CACHE_VERSION {
        return Err(GraphCacheError::UnsupportedVersion {
            found: found_version,
            supported: GRAPH_CACHE_VERSION,
        });
    }

    let body: GraphBody =
        bincode::deserialize(payload).map_err(|source| GraphCacheError::Decode {
            path: path.to_owned(),
            source,
        })?;
    if body.region != region {
        return Err(GraphCacheError::RegionMismatch {
            expected: region.to_owned(),
            found: body.region,
        });
    }
    RoadGraph::from_parts(body.projection, body.nodes, body.edges).map_err(|source| {
        GraphCacheError::Invalid {
            path: path.to_owned(),
            source,
        }
    })
}
