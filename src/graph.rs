// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::borrow::Cow;
use std::collections::btree_map::{BTreeMap, Entry};
use std::io;
use std::sync::Arc;

use crate::{earth_distance, KDTree, Mode, RoutingEdge, RoutingNode};

/// Failure of the storage backing a [RoutingGraph].
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// There is no routing data for the requested region.
    #[error("graph data unavailable: {0}")]
    Unavailable(String),

    /// The routing data exists, but can't be interpreted (e.g. unexpected schema).
    #[error("graph data corrupted: {0}")]
    Corrupted(String),

    #[error("io: {0}")]
    Io(#[from] Arc<io::Error>),
}

impl From<io::Error> for GraphError {
    fn from(e: io::Error) -> Self {
        GraphError::Io(Arc::new(e))
    }
}

/// Read-only access to a routing graph, as needed by [find_route](crate::find_route).
///
/// Implementations may perform blocking I/O; callers are responsible for running
/// route searches off any interactive thread. Any memoization (e.g. of nearest-node
/// queries) belongs in the implementation.
pub trait RoutingGraph {
    /// Retrieves a [RoutingNode] with the provided id.
    fn get_node(&self, id: i64) -> Result<Option<RoutingNode>, GraphError>;

    /// Returns all edges incident to a node. An edge with `edge.to == node_id` is
    /// traversed against its natural direction, using its `reverse_cost`.
    fn get_edges_from(&self, node_id: i64) -> Result<Cow<'_, [RoutingEdge]>, GraphError>;

    /// Finds the closest [RoutingNode] to the given position,
    /// no further than `max_distance` meters away.
    fn find_nearest_node(
        &self,
        lat: f64,
        lon: f64,
        max_distance: f64,
    ) -> Result<Option<RoutingNode>, GraphError>;

    /// Mode whose cost model priced all edges, or `None` if that isn't known.
    /// Searches in any other mode fail with
    /// [RouteError::ModeMismatch](crate::RouteError::ModeMismatch).
    fn pricing_mode(&self) -> Option<Mode> {
        None
    }
}

/// Represents a trail network as a set of [RoutingNodes](RoutingNode)
/// and [RoutingEdges](RoutingEdge) between them, fully held in memory.
///
/// Every edge is stored with both of its endpoints, so that it can be
/// found when traversing it in either direction.
#[derive(Debug, Default, Clone)]
pub struct MemoryGraph {
    nodes: BTreeMap<i64, (RoutingNode, Vec<RoutingEdge>)>,
    index: Option<KDTree>,
    priced_for: Option<Mode>,
}

impl MemoryGraph {
    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of distinct edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|(&id, (_, edges))| edges.iter().filter(|e| e.from == id).count())
            .sum()
    }

    /// Returns an iterator over all [RoutingNodes](RoutingNode) in the graph.
    pub fn iter(&self) -> impl Iterator<Item = &RoutingNode> {
        self.nodes.values().map(|(node, _)| node)
    }

    /// Retrieves a [RoutingNode] with the provided id.
    pub fn node(&self, id: i64) -> Option<RoutingNode> {
        self.nodes.get(&id).map(|&(node, _)| node)
    }

    /// Gets all [RoutingEdges](RoutingEdge) incident to a node with a given id.
    pub fn edges(&self, id: i64) -> &[RoutingEdge] {
        self.nodes
            .get(&id)
            .map(|(_, e)| e.as_slice())
            .unwrap_or_default()
    }

    /// Finds an edge connecting two nodes, in any orientation.
    pub fn edge_between(&self, a: i64, b: i64) -> Option<&RoutingEdge> {
        self.edges(a)
            .iter()
            .find(|e| (e.from == a && e.to == b) || (e.from == b && e.to == a))
    }

    /// Creates or updates a [RoutingNode] with `node.id`.
    ///
    /// All incident edges are preserved, even though their `distance` might
    /// no longer match the node position. Drops the nearest-node index.
    pub fn set_node(&mut self, node: RoutingNode) {
        self.index = None;
        match self.nodes.entry(node.id) {
            Entry::Vacant(e) => {
                e.insert((node, Vec::default()));
            }
            Entry::Occupied(mut e) => {
                e.get_mut().0 = node;
            }
        }
    }

    /// Deletes a [RoutingNode] with a given `id`, together with all incident edges.
    /// Returns false if no such node existed.
    pub fn delete_node(&mut self, id: i64) -> bool {
        let Some((_, edges)) = self.nodes.remove(&id) else {
            return false;
        };

        self.index = None;
        for edge in edges {
            if let Some(other) = edge.other_end(id) {
                if let Some((_, other_edges)) = self.nodes.get_mut(&other) {
                    other_edges.retain(|e| e.other_end(other) != Some(id));
                }
            }
        }
        true
    }

    /// Adds an edge between two existing nodes. Returns false (and doesn't add the edge)
    /// if either endpoint doesn't exist or any of its costs is negative or NaN.
    pub fn add_edge(&mut self, edge: RoutingEdge) -> bool {
        if !self.nodes.contains_key(&edge.from) || !self.nodes.contains_key(&edge.to) {
            return false;
        }
        if !(edge.cost >= 0.0 && edge.reverse_cost >= 0.0) {
            return false;
        }

        if edge.from != edge.to {
            if let Some((_, edges)) = self.nodes.get_mut(&edge.to) {
                edges.push(edge.clone());
            }
        }
        if let Some((_, edges)) = self.nodes.get_mut(&edge.from) {
            edges.push(edge);
        }
        true
    }

    /// Declares which mode's cost model priced the edges of this graph.
    /// Set automatically by the [osm](crate::osm) loader.
    pub fn set_pricing_mode(&mut self, mode: Option<Mode>) {
        self.priced_for = mode;
    }

    /// Builds a [KDTree] over all nodes, used by subsequent nearest-node lookups
    /// until the graph is modified.
    pub fn reindex(&mut self) {
        self.index = KDTree::from_iter(self.iter().cloned());
    }

    /// Finds the closest [RoutingNode] to the given position, together with its distance.
    ///
    /// Without a prior call to [MemoryGraph::reindex], this function requires computing
    /// the distance to every node in the graph and is not suitable for large graphs.
    pub fn nearest_node(&self, lat: f64, lon: f64) -> Option<(RoutingNode, f64)> {
        if let Some(ref index) = self.index {
            return Some(index.find_nearest_node(lat, lon));
        }

        self.iter()
            .map(|&nd| (nd, earth_distance(lat, lon, nd.lat, nd.lon)))
            .min_by(|(_, a_dist), (_, b_dist)| a_dist.total_cmp(b_dist))
    }
}

impl RoutingGraph for MemoryGraph {
    fn get_node(&self, id: i64) -> Result<Option<RoutingNode>, GraphError> {
        Ok(self.node(id))
    }

    fn get_edges_from(&self, node_id: i64) -> Result<Cow<'_, [RoutingEdge]>, GraphError> {
        Ok(Cow::Borrowed(self.edges(node_id)))
    }

    fn find_nearest_node(
        &self,
        lat: f64,
        lon: f64,
        max_distance: f64,
    ) -> Result<Option<RoutingNode>, GraphError> {
        Ok(self
            .nearest_node(lat, lon)
            .filter(|&(_, dist)| dist <= max_distance)
            .map(|(nd, _)| nd))
    }

    fn pricing_mode(&self) -> Option<Mode> {
        self.priced_for
    }
}
