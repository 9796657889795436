// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Offline hiking and cycling navigation over locally stored trail graphs.
//!
//! The crate finds optimal routes with A* over any [RoutingGraph] through an ordered list of
//! waypoints, prices edges with a terrain-aware [cost model](Mode), turns computed routes into
//! [turn-by-turn instructions](generate_instructions), and provides the geospatial plumbing
//! an offline map needs: [Web-Mercator tile addressing](TileCoordinate) and a compact
//! [binary GPS track format](track).
//!
//! # Example
//!
//! ```no_run
//! let mut g = trailroute::MemoryGraph::default();
//! let osm_options = trailroute::osm::Options {
//!     mode: trailroute::Mode::Hiking,
//!     file_format: trailroute::osm::FileFormat::Xml,
//!     bbox: [0.0; 4],
//! };
//! trailroute::osm::add_features_from_file(&mut g, &osm_options, "path/to/region.osm")
//!     .expect("failed to load region.osm");
//! g.reindex();
//!
//! let route = trailroute::find_route(
//!     &g,
//!     trailroute::Coordinate::new(46.5580, 7.8350),
//!     trailroute::Coordinate::new(46.5710, 7.8490),
//!     &[],
//!     trailroute::Mode::Hiking,
//!     &trailroute::SearchOptions::default(),
//! )
//! .expect("failed to find route");
//!
//! for instruction in trailroute::generate_instructions(&route) {
//!     println!("{}", instruction.description);
//! }
//! ```

mod astar;
pub mod c;
mod cost;
mod distance;
mod graph;
mod instructions;
mod kd;
pub mod osm;
pub mod tile;
pub mod track;

pub use astar::{
    find_route, find_segment, ComputedRoute, Endpoint, RouteError, SearchOptions, SegmentPath,
    TraversedEdge, DEFAULT_SNAP_RADIUS, DEFAULT_STEP_LIMIT,
};
pub use cost::{EdgeAttributes, Mode, ModeProfile, COST_MODEL_VERSION};
pub use distance::{
    bearing, earth_distance, normalize_bearing_delta, CardinalDirection, EARTH_RADIUS,
};
pub use graph::{GraphError, MemoryGraph, RoutingGraph};
pub use instructions::{classify_turn, generate_instructions, TurnDirection, TurnInstruction};
pub use kd::KDTree;
pub use tile::TileCoordinate;

/// A WGS84 position in degrees, with an optional altitude in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
    pub altitude: Option<f64>,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            altitude: None,
        }
    }

    pub const fn with_altitude(lat: f64, lon: f64, altitude: f64) -> Self {
        Self {
            lat,
            lon,
            altitude: Some(altitude),
        }
    }

    /// Great-circle distance to another coordinate, in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        earth_distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Initial bearing towards another coordinate, in degrees `[0, 360)`.
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        bearing(self.lat, self.lon, other.lat, other.lon)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Represents a vertex of a [RoutingGraph].
///
/// Identifiers are stable and unique within a region's graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
}

impl RoutingNode {
    pub const fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            elevation: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
            altitude: self.elevation,
        }
    }
}

/// Represents a directed connection between two [RoutingNodes](RoutingNode).
///
/// A physical way traversable in both directions is a single edge with both
/// `cost` and `reverse_cost` finite; `elevation_gain` and `elevation_loss` are always
/// measured in the natural (`from` → `to`) direction. A non-finite cost marks that
/// direction as impassable.
///
/// Both costs must be non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingEdge {
    pub from: i64,
    pub to: i64,

    /// Physical length, in meters.
    pub distance: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,

    /// OSM `surface` tag.
    pub surface: Option<String>,
    /// OSM `sac_scale` tag.
    pub difficulty: Option<String>,
    /// OSM `highway` tag.
    pub highway: Option<String>,
    pub name: Option<String>,
    /// Identifier of the feature this edge was derived from, e.g. an OSM way id.
    pub source_id: Option<i64>,

    /// Traversal cost from `from` to `to`, in seconds.
    pub cost: f64,
    /// Traversal cost from `to` to `from`, in seconds.
    pub reverse_cost: f64,
    pub oneway: bool,
}

impl RoutingEdge {
    /// Creates an edge between two nodes without any terrain attributes.
    /// Costs must be filled in by the caller, or with [RoutingEdge::priced].
    pub fn new(from: i64, to: i64, distance: f64) -> Self {
        Self {
            from,
            to,
            distance,
            elevation_gain: 0.0,
            elevation_loss: 0.0,
            surface: None,
            difficulty: None,
            highway: None,
            name: None,
            source_id: None,
            cost: distance,
            reverse_cost: distance,
            oneway: false,
        }
    }

    /// Recomputes `cost` and `reverse_cost` from the edge attributes with the
    /// provided [Mode]. One-way edges get an infinite `reverse_cost`.
    pub fn priced(mut self, mode: Mode) -> Self {
        let (forward, reverse) = mode.price(&self.attributes());
        self.cost = forward;
        self.reverse_cost = if self.oneway { f64::INFINITY } else { reverse };
        self
    }

    /// Borrows the physical and terrain attributes of this edge.
    pub fn attributes(&self) -> EdgeAttributes<'_> {
        EdgeAttributes {
            distance: self.distance,
            elevation_gain: self.elevation_gain,
            elevation_loss: self.elevation_loss,
            surface: self.surface.as_deref(),
            difficulty: self.difficulty.as_deref(),
            highway: self.highway.as_deref(),
        }
    }

    /// Returns the node on the other end of this edge, or `None`
    /// if `node_id` is not one of the endpoints.
    pub fn other_end(&self, node_id: i64) -> Option<i64> {
        if node_id == self.from {
            Some(self.to)
        } else if node_id == self.to {
            Some(self.from)
        } else {
            None
        }
    }

    /// Cost of traversing the edge, in natural (`reversed == false`) or reverse direction.
    pub fn cost_in(&self, reversed: bool) -> f64 {
        if reversed {
            self.reverse_cost
        } else {
            self.cost
        }
    }

    /// Elevation gained when traversing the edge in the given direction.
    pub fn gain_in(&self, reversed: bool) -> f64 {
        if reversed {
            self.elevation_loss
        } else {
            self.elevation_gain
        }
    }

    /// Elevation lost when traversing the edge in the given direction.
    pub fn loss_in(&self, reversed: bool) -> f64 {
        if reversed {
            self.elevation_gain
        } else {
            self.elevation_loss
        }
    }
}
