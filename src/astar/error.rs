// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::{Coordinate, GraphError, Mode};

/// Recommended number of allowed node expansions per waypoint segment in
/// [find_route](crate::find_route) before [RouteError::StepLimitExceeded] is returned.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Maximum distance, in meters, between a requested waypoint and the graph node it snaps to.
pub const DEFAULT_SNAP_RADIUS: f64 = 500.0;

/// First or last point of a route request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Error conditions which may occur during [find_route](crate::find_route) or
/// [find_segment](crate::find_segment).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    /// The start or end point has no graph node within the snap radius.
    #[error("no path near the {endpoint} point {coordinate}")]
    UnreachableEndpoint {
        endpoint: Endpoint,
        coordinate: Coordinate,
    },

    /// A via point has no graph node within the snap radius, or can't be reached
    /// from the waypoints before it. A route whose waypoints up to the last via point
    /// are connected, but whose end point can't be reached, fails with
    /// [RouteError::NoRoute] instead.
    #[error("via point #{index} {coordinate} can't be reached")]
    UnreachableViaPoint { index: usize, coordinate: Coordinate },

    /// The search has exhausted all reachable nodes without finding the target.
    /// `closest_approach` is the smallest crow-flies distance (in meters) between
    /// any explored node and the target.
    #[error("no route found after exploring {nodes_explored} nodes (closest approach: {closest_approach:.0} m)")]
    NoRoute {
        nodes_explored: usize,
        closest_approach: f64,
    },

    /// Route search has exceeded its limit of node expansions.
    /// Either the points are really far apart, or no route exists; retrying
    /// with a shorter segment may help.
    #[error("step limit exceeded after expanding {nodes_expanded} nodes (closest approach: {closest_approach:.0} m)")]
    StepLimitExceeded {
        nodes_expanded: usize,
        closest_approach: f64,
    },

    /// The caller has requested cancellation between waypoint segments.
    #[error("route search cancelled after {completed_segments} segment(s)")]
    Cancelled { completed_segments: usize },

    /// The graph was priced with a different mode's cost model than the one requested.
    #[error("graph is priced for {graph}, can't route for {requested}")]
    ModeMismatch { graph: Mode, requested: Mode },

    /// The start or end node of a segment doesn't exist in the graph.
    #[error("invalid node: {0}")]
    InvalidReference(i64),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
