//! Request/response boundary for hosts that call the engine across a
//! process or thread boundary.
//!
//! Everything on the wire is plain data: a network id is its raw `u64`, a
//! location carries its dimension by name, and categories and storage types
//! are referenced by registry name. The transport is the host's choice.
//! Two codecs are provided: JSON for debugging and tooling, and a compact
//! binary form via `bitcode`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::discovery::NodeRole;
use crate::engine::ConduitEngine;
use crate::id::{CategoryId, NetworkId};
use crate::network::{NetworkError, NetworkSummary};
use crate::spatial::NodeLocation;
use crate::world::World;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A node location with its dimension given by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLocation {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub dimension: String,
}

impl WireLocation {
    pub fn new(dimension: &str, x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            dimension: dimension.to_string(),
        }
    }

    pub fn resolve<W: World + ?Sized>(&self, world: &W) -> Result<NodeLocation, ProtocolError> {
        let dimension = world
            .dimension_id(&self.dimension)
            .ok_or_else(|| ProtocolError::UnknownDimension(self.dimension.clone()))?;
        Ok(NodeLocation::new(dimension, self.x, self.y, self.z))
    }

    pub fn from_location<W: World + ?Sized>(
        world: &W,
        location: NodeLocation,
    ) -> Result<Self, ProtocolError> {
        let dimension = world
            .dimension_name(location.dimension)
            .ok_or(ProtocolError::UnmappedDimension(location.dimension.0))?;
        Ok(Self::new(dimension, location.x, location.y, location.z))
    }
}

/// [`NetworkSummary`] with names in place of ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSummary {
    pub id: u64,
    pub category: String,
    pub dimension: String,
    pub conduits: usize,
    pub consumers: usize,
    pub generators: usize,
    pub queued: usize,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkRequest {
    Establish {
        category: String,
        location: WireLocation,
    },
    Get {
        category: String,
        location: WireLocation,
    },
    GetOrEstablish {
        category: String,
        location: WireLocation,
    },
    GetAllWith {
        location: WireLocation,
    },
    IsPartOfNetwork {
        network: u64,
        location: WireLocation,
        role: NodeRole,
    },
    Destroy {
        network: u64,
    },
    QueueSend {
        network: u64,
        source: WireLocation,
        storage_type: String,
        amount: i64,
    },
    Summary {
        network: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkResponse {
    /// Result of `Establish`, `Get`, and `GetOrEstablish`.
    Network(Option<u64>),
    Networks(Vec<u64>),
    Membership(bool),
    Destroyed(bool),
    Queued,
    Summary(Option<WireSummary>),
    /// The request was rejected. Nothing was changed.
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown dimension {0:?}")]
    UnknownDimension(String),
    #[error("dimension {0} has no wire name")]
    UnmappedDimension(u32),
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("category {0} has no registered name")]
    UnmappedCategory(u32),
    #[error("unknown storage type {0:?}")]
    UnknownStorageType(String),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("json codec failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

impl ConduitEngine {
    /// Serve one request. Failures become [`NetworkResponse::Error`].
    pub fn handle<W: World + ?Sized>(&mut self, world: &W, request: NetworkRequest) -> NetworkResponse {
        match self.try_handle(world, request) {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "request rejected");
                NetworkResponse::Error(err.to_string())
            }
        }
    }

    /// Serve one request, surfacing failures as [`ProtocolError`].
    pub fn try_handle<W: World + ?Sized>(
        &mut self,
        world: &W,
        request: NetworkRequest,
    ) -> Result<NetworkResponse, ProtocolError> {
        let response = match request {
            NetworkRequest::Establish { category, location } => {
                let category = self.category_by_name(&category)?;
                let location = location.resolve(world)?;
                NetworkResponse::Network(self.establish(world, category, location).map(NetworkId::to_raw))
            }
            NetworkRequest::Get { category, location } => {
                let category = self.category_by_name(&category)?;
                let location = location.resolve(world)?;
                NetworkResponse::Network(self.get(world, category, location).map(NetworkId::to_raw))
            }
            NetworkRequest::GetOrEstablish { category, location } => {
                let category = self.category_by_name(&category)?;
                let location = location.resolve(world)?;
                NetworkResponse::Network(
                    self.get_or_establish(world, category, location)
                        .map(NetworkId::to_raw),
                )
            }
            NetworkRequest::GetAllWith { location } => {
                let location = location.resolve(world)?;
                NetworkResponse::Networks(
                    self.get_all_with(location)
                        .into_iter()
                        .map(NetworkId::to_raw)
                        .collect(),
                )
            }
            NetworkRequest::IsPartOfNetwork {
                network,
                location,
                role,
            } => {
                let location = location.resolve(world)?;
                let member = self.is_part_of_network(NetworkId::from_raw(network), location, role)?;
                NetworkResponse::Membership(member)
            }
            NetworkRequest::Destroy { network } => {
                NetworkResponse::Destroyed(self.destroy(NetworkId::from_raw(network)))
            }
            NetworkRequest::QueueSend {
                network,
                source,
                storage_type,
                amount,
            } => {
                let source = source.resolve(world)?;
                let storage_type = self
                    .resources()
                    .storage_type_id(&storage_type)
                    .ok_or(ProtocolError::UnknownStorageType(storage_type))?;
                self.queue_send(NetworkId::from_raw(network), source, storage_type, amount)?;
                NetworkResponse::Queued
            }
            NetworkRequest::Summary { network } => {
                let summary = match self.summary(NetworkId::from_raw(network)) {
                    Some(summary) => Some(self.wire_summary(world, summary)?),
                    None => None,
                };
                NetworkResponse::Summary(summary)
            }
        };
        Ok(response)
    }

    fn category_by_name(&self, name: &str) -> Result<CategoryId, ProtocolError> {
        self.resources()
            .category_id(name)
            .ok_or_else(|| ProtocolError::UnknownCategory(name.to_string()))
    }

    fn wire_summary<W: World + ?Sized>(
        &self,
        world: &W,
        summary: NetworkSummary,
    ) -> Result<WireSummary, ProtocolError> {
        let category = self
            .resources()
            .get_category(summary.category)
            .map(|c| c.name.clone())
            .ok_or(ProtocolError::UnmappedCategory(summary.category.0))?;
        let dimension = world
            .dimension_name(summary.dimension)
            .ok_or(ProtocolError::UnmappedDimension(summary.dimension.0))?
            .to_string();
        Ok(WireSummary {
            id: summary.id,
            category,
            dimension,
            conduits: summary.conduits,
            consumers: summary.consumers,
            generators: summary.generators,
            queued: summary.queued,
            running: summary.running,
        })
    }
}

// ---------------------------------------------------------------------------
// Codecs
// ---------------------------------------------------------------------------

pub fn encode_json<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_binary<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bitcode::serialize(value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

pub fn decode_binary<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    bitcode::deserialize(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}
