// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashSet;

use crate::{earth_distance, MemoryGraph, Mode, RoutingEdge, RoutingGraph, RoutingNode};

use super::{model, FeatureReader, Options};

const MAX_NODE_ID: i64 = 0x0008_0000_0000_0000;

/// Helper object used for storing state related to converting [OSM features](super::model::Feature)
/// into a [MemoryGraph].
pub(super) struct GraphBuilder<'a> {
    g: &'a mut MemoryGraph,
    options: &'a Options,
    unused_nodes: HashSet<i64>,
    ignore_bbox: bool,
    ways: usize,
}

impl<'a> GraphBuilder<'a> {
    /// Create a new, empty graph builder.
    pub(super) fn new(g: &'a mut MemoryGraph, options: &'a Options) -> Self {
        let ignore_bbox =
            options.bbox.iter().all(|&x| x == 0.0) || options.bbox.iter().any(|x| !x.is_finite());

        if ignore_bbox && options.bbox.iter().any(|x| !x.is_finite()) {
            log::warn!("ignoring invalid bounding box {:?}", options.bbox);
        }

        // Edges priced by different modes leave the pricing mode unknown
        let priced_for =
            (g.is_empty() || g.pricing_mode() == Some(options.mode)).then_some(options.mode);
        g.set_pricing_mode(priced_for);

        Self {
            g,
            options,
            unused_nodes: HashSet::default(),
            ignore_bbox,
            ways: 0,
        }
    }

    /// Add all features from the provided [FeatureReader].
    pub(super) fn add_features<F: FeatureReader>(
        &mut self,
        mut features: F,
    ) -> Result<(), F::Error> {
        while let Some(f) = features.next()? {
            self.add_feature(f);
        }
        self.cleanup();
        Ok(())
    }

    /// Removes nodes which are not part of any routable way,
    /// so that waypoints never snap to them.
    fn cleanup(&mut self) {
        for &id in &self.unused_nodes {
            self.g.delete_node(id);
        }

        log::debug!(
            "loaded {} {} ways: graph has {} nodes and {} edges",
            self.ways,
            self.options.mode,
            self.g.len(),
            self.g.edge_count(),
        );
    }

    fn add_feature(&mut self, f: model::Feature) {
        match f {
            model::Feature::Node(n) => self.add_node(n),
            model::Feature::Way(w) => self.add_way(w),
        }
    }

    fn add_node(&mut self, n: model::Node) {
        if !Self::is_valid_node_id(n.id) {
            log::warn!("skipping node {} with an out-of-range id", n.id);
            return;
        }

        if self.is_in_bbox(n.lat, n.lon) {
            let mut node = RoutingNode::new(n.id, n.lat, n.lon);
            node.elevation = n.tags.get("ele").and_then(|v| parse_elevation(v));
            self.g.set_node(node);
            self.unused_nodes.insert(n.id);
        }
    }

    fn is_valid_node_id(id: i64) -> bool {
        id != 0 && id < MAX_NODE_ID
    }

    fn is_in_bbox(&self, lat: f64, lon: f64) -> bool {
        if self.ignore_bbox {
            return true;
        }
        let [min_lon, min_lat, max_lon, max_lat] = self.options.bbox;
        lat >= min_lat && lat <= max_lat && lon >= min_lon && lon <= max_lon
    }

    fn add_way(&mut self, w: model::Way) {
        if !is_routable(&w, self.options.mode) {
            return;
        }

        let mut nodes = self.get_way_nodes(&w);
        if nodes.is_empty() {
            return;
        }

        let oneway = match way_direction(&w, self.options.mode) {
            Direction::Both => false,
            Direction::Forward => true,
            Direction::Backward => {
                nodes.reverse();
                true
            }
        };

        self.create_edges(&w, &nodes, oneway);
        for node_id in &nodes {
            self.unused_nodes.remove(node_id);
        }
        self.ways += 1;
    }

    fn get_way_nodes(&self, w: &model::Way) -> Vec<i64> {
        // Remove references to unknown nodes
        let nodes: Vec<i64> = w
            .nodes
            .iter()
            .cloned()
            .filter(|&node_id| self.g.node(node_id).is_some())
            .collect();

        if nodes.len() < 2 {
            log::trace!("way {} has less than 2 known nodes", w.id);
            vec![]
        } else {
            nodes
        }
    }

    fn create_edges(&mut self, w: &model::Way, nodes: &[i64], oneway: bool) {
        debug_assert!(nodes.len() >= 2);

        for pair in nodes.windows(2) {
            if pair[0] == pair[1] {
                continue;
            }

            let (Some(left), Some(right)) = (self.g.node(pair[0]), self.g.node(pair[1])) else {
                continue;
            };

            let mut edge = RoutingEdge::new(
                left.id,
                right.id,
                earth_distance(left.lat, left.lon, right.lat, right.lon),
            );

            if let (Some(a), Some(b)) = (left.elevation, right.elevation) {
                if b > a {
                    edge.elevation_gain = b - a;
                } else {
                    edge.elevation_loss = a - b;
                }
            }

            edge.surface = w.tag("surface").map(str::to_string);
            edge.difficulty = w.tag("sac_scale").map(str::to_string);
            edge.highway = w.tag("highway").map(str::to_string);
            edge.name = w.tag("name").map(str::to_string);
            edge.source_id = Some(w.id);
            edge.oneway = oneway;

            self.g.add_edge(edge.priced(self.options.mode));
        }
    }
}

/// Parses an OSM `ele` value, like `1250`, `1250.5` or `1250 m`.
fn parse_elevation(value: &str) -> Option<f64> {
    value
        .trim()
        .trim_end_matches('m')
        .trim_end()
        .parse::<f64>()
        .ok()
        .filter(|ele| ele.is_finite())
}

/// Returns [access tags](https://wiki.openstreetmap.org/wiki/Key:access) applicable
/// to the given mode, from the least to the most specific.
fn access_keys(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::Hiking => &["access", "foot"],
        Mode::Cycling => &["access", "vehicle", "bicycle"],
    }
}

/// Checks if a way can be traversed in the given mode, by considering its `highway`
/// classification and the most specific access tag.
fn is_routable(w: &model::Way, mode: Mode) -> bool {
    let Some(highway) = w.tag("highway") else {
        return false;
    };

    if !mode.allows_highway(Some(highway)) {
        return false;
    }

    if w.tag("area") == Some("yes") {
        return false;
    }

    match access_keys(mode).iter().rev().find_map(|&key| w.tag(key)) {
        Some("no") | Some("private") => false,
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Both,
    Forward,
    Backward,
}

/// Figures out in which direction a way can be traversed.
///
/// On foot, only `oneway:foot` is considered, except on paths, footways and steps, where
/// the generic `oneway` also applies. On a bicycle, `oneway:bicycle` takes precedence over
/// `oneway`, and roundabouts default to being one-way.
fn way_direction(w: &model::Way, mode: Mode) -> Direction {
    let mut direction = Direction::Both;

    let oneway = match mode {
        Mode::Hiking => w.tag("oneway:foot").or_else(|| match w.tag("highway") {
            Some("footway") | Some("path") | Some("steps") => w.tag("oneway"),
            _ => None,
        }),

        Mode::Cycling => {
            if matches!(w.tag("junction"), Some("roundabout") | Some("circular")) {
                direction = Direction::Forward;
            }
            w.tag("oneway:bicycle").or_else(|| w.tag("oneway"))
        }
    };

    match oneway.unwrap_or("") {
        "yes" | "true" | "1" => Direction::Forward,
        "-1" | "reverse" => Direction::Backward,
        "no" => Direction::Both,
        _ => direction,
    }
}
