// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, Ordering};

use super::{find_segment, Endpoint, SegmentPath, TraversedEdge};
use crate::{
    Coordinate, Mode, RouteError, RoutingGraph, RoutingNode, DEFAULT_SNAP_RADIUS,
    DEFAULT_STEP_LIMIT,
};

/// Additional controls for [find_route].
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions<'a> {
    /// Maximum distance (in meters) between a requested point and the node it snaps to.
    pub snap_radius: f64,

    /// Maximum number of node expansions per segment between two consecutive waypoints.
    pub step_limit: usize,

    /// Checked before every segment; once set, the search stops with [RouteError::Cancelled].
    pub cancel: Option<&'a AtomicBool>,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            snap_radius: DEFAULT_SNAP_RADIUS,
            step_limit: DEFAULT_STEP_LIMIT,
            cancel: None,
        }
    }
}

/// Route through an ordered list of waypoints, as returned by [find_route].
///
/// `nodes`, `edges` and `coordinates` describe one continuous path:
/// `edges[i]` leads from `nodes[i]` to `nodes[i + 1]`, and `coordinates[i]`
/// is the position of `nodes[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedRoute {
    pub mode: Mode,
    pub nodes: Vec<RoutingNode>,
    pub edges: Vec<TraversedEdge>,
    pub coordinates: Vec<Coordinate>,

    /// Sum of edge distances, in meters.
    pub total_distance: f64,

    /// Sum of traversal costs, in seconds.
    pub total_cost: f64,

    /// Expected travel time, in seconds.
    pub estimated_duration: f64,

    pub elevation_gain: f64,
    pub elevation_loss: f64,

    /// Intermediate points requested by the caller, in order.
    pub via_points: Vec<Coordinate>,
}

impl ComputedRoute {
    fn new(mode: Mode, via_points: Vec<Coordinate>) -> Self {
        Self {
            mode,
            nodes: Vec::default(),
            edges: Vec::default(),
            coordinates: Vec::default(),
            total_distance: 0.0,
            total_cost: 0.0,
            estimated_duration: 0.0,
            elevation_gain: 0.0,
            elevation_loss: 0.0,
            via_points,
        }
    }

    /// Appends a segment starting at the current last node,
    /// without duplicating the junction node.
    fn extend(&mut self, segment: SegmentPath) {
        let skip = match (self.nodes.last(), segment.nodes.first()) {
            (Some(last), Some(first)) if last.id == first.id => 1,
            _ => 0,
        };

        for node in segment.nodes.into_iter().skip(skip) {
            self.coordinates.push(node.coordinate());
            self.nodes.push(node);
        }

        for edge in segment.edges {
            self.total_distance += edge.distance();
            self.total_cost += edge.cost();
            self.elevation_gain += edge.elevation_gain();
            self.elevation_loss += edge.elevation_loss();
            self.edges.push(edge);
        }

        self.estimated_duration = if self.mode.base_speed() > 0.0 {
            self.total_cost
        } else {
            0.0
        };
    }
}

/// Finds the cheapest route from `from` through all `via` points (in order) to `to`.
///
/// Every point is first snapped to the nearest graph node within
/// [SearchOptions::snap_radius]; then [find_segment] is run between each pair of consecutive
/// snapped nodes, and the segments are joined into a single [ComputedRoute].
///
/// Cancellation (through [SearchOptions::cancel]) is only checked between segments.
/// A graph priced for a different mode is rejected before any point is snapped.
pub fn find_route<G: RoutingGraph + ?Sized>(
    g: &G,
    from: Coordinate,
    to: Coordinate,
    via: &[Coordinate],
    mode: Mode,
    options: &SearchOptions<'_>,
) -> Result<ComputedRoute, RouteError> {
    if let Some(priced) = g.pricing_mode().filter(|&m| m != mode) {
        return Err(RouteError::ModeMismatch {
            graph: priced,
            requested: mode,
        });
    }

    let snapped = snap_waypoints(g, from, to, via, options.snap_radius)?;
    let mut route = ComputedRoute::new(mode, via.to_vec());

    for (i, pair) in snapped.windows(2).enumerate() {
        if options.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(RouteError::Cancelled {
                completed_segments: i,
            });
        }

        let segment = find_segment(g, pair[0].id, pair[1].id, mode, options.step_limit)
            .map_err(|e| attribute_to_via_point(e, i, via))?;

        log::debug!(
            "segment {}/{}: {} -> {} over {} edges",
            i + 1,
            snapped.len() - 1,
            pair[0].id,
            pair[1].id,
            segment.edges.len(),
        );
        route.extend(segment);
    }

    Ok(route)
}

/// Snaps all requested points to graph nodes, in the order start, via..., end.
fn snap_waypoints<G: RoutingGraph + ?Sized>(
    g: &G,
    from: Coordinate,
    to: Coordinate,
    via: &[Coordinate],
    radius: f64,
) -> Result<Vec<RoutingNode>, RouteError> {
    let mut snapped = Vec::with_capacity(via.len() + 2);

    snapped.push(
        snap(g, from, radius)?.ok_or(RouteError::UnreachableEndpoint {
            endpoint: Endpoint::Start,
            coordinate: from,
        })?,
    );

    for (index, &coordinate) in via.iter().enumerate() {
        snapped.push(
            snap(g, coordinate, radius)?
                .ok_or(RouteError::UnreachableViaPoint { index, coordinate })?,
        );
    }

    snapped.push(snap(g, to, radius)?.ok_or(RouteError::UnreachableEndpoint {
        endpoint: Endpoint::End,
        coordinate: to,
    })?);

    Ok(snapped)
}

fn snap<G: RoutingGraph + ?Sized>(
    g: &G,
    at: Coordinate,
    radius: f64,
) -> Result<Option<RoutingNode>, RouteError> {
    let node = g.find_nearest_node(at.lat, at.lon, radius)?;
    log::trace!("snapped {at} to {:?}", node.map(|n| n.id));
    Ok(node)
}

/// Converts a failure to connect two waypoints into an [RouteError::UnreachableViaPoint],
/// if the segment ends at a via point. Segment `i` leads from waypoint `i` to waypoint `i + 1`,
/// where waypoint 0 is the start and waypoint `k + 1` is `via[k]`.
///
/// All earlier segments have succeeded, so the segment's own start is connected to
/// the rest of the route. A failure of the last segment is left as [RouteError::NoRoute].
fn attribute_to_via_point(e: RouteError, segment: usize, via: &[Coordinate]) -> RouteError {
    if !matches!(e, RouteError::NoRoute { .. }) || segment >= via.len() {
        return e;
    }

    log::debug!("via point #{segment} is disconnected: {e}");
    RouteError::UnreachableViaPoint {
        index: segment,
        coordinate: via[segment],
    }
}
