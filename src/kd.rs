// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::{earth_distance, RoutingNode};

/// KDTree implements the [k-d tree data structure](https://en.wikipedia.org/wiki/K-d_tree),
/// used to speed up snapping waypoints to the nearest [RoutingNode] on large graphs.
///
/// This implementation splits on plain latitude/longitude values, even though the distance
/// function used is [earth_distance]. Results may be suboptimal close to the antimeridian
/// (180°/-180° longitude) or the poles, which is acceptable for regional trail graphs.
#[derive(Debug, Clone)]
pub struct KDTree {
    pivot: RoutingNode,
    left: Option<Box<KDTree>>,
    right: Option<Box<KDTree>>,
}

impl KDTree {
    /// Finds the closest [RoutingNode] to the given position,
    /// returning it together with its distance in meters.
    pub fn find_nearest_node(&self, lat: f64, lon: f64) -> (RoutingNode, f64) {
        self.find_nearest_node_impl(lat, lon, false)
    }

    fn find_nearest_node_impl(&self, lat: f64, lon: f64, lon_divides: bool) -> (RoutingNode, f64) {
        let mut best = self.pivot;
        let mut best_dist = earth_distance(lat, lon, best.lat, best.lon);

        let first_left = if lon_divides {
            lon < best.lon
        } else {
            lat < best.lat
        };
        let (first, second) = if first_left {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        };

        if let Some(ref branch) = first {
            let (alt, alt_dist) = branch.find_nearest_node_impl(lat, lon, !lon_divides);
            if alt_dist < best_dist {
                best = alt;
                best_dist = alt_dist;
            }
        }

        if let Some(ref branch) = second {
            // A closer node is possible in the second branch if and only if
            // the splitting axis is closer than the current best candidate.
            let (axis_lat, axis_lon) = if lon_divides {
                (lat, self.pivot.lon)
            } else {
                (self.pivot.lat, lon)
            };
            let dist_to_axis = earth_distance(lat, lon, axis_lat, axis_lon);

            if dist_to_axis < best_dist {
                let (alt, alt_dist) = branch.find_nearest_node_impl(lat, lon, !lon_divides);
                if alt_dist < best_dist {
                    best = alt;
                    best_dist = alt_dist;
                }
            }
        }

        (best, best_dist)
    }

    /// Builds a k-d tree from an iterable of [RoutingNodes](RoutingNode).
    /// Returns `None` if there are no nodes.
    pub fn from_iter<I: IntoIterator<Item = RoutingNode>>(nodes: I) -> Option<Self> {
        let mut nodes = nodes.into_iter().collect::<Vec<_>>();
        Self::build(nodes.as_mut_slice())
    }

    /// Builds a k-d tree from a mutable slice of [RoutingNodes](RoutingNode). Nodes will be
    /// reordered in the slice to facilitate building the tree.
    pub fn build(nodes: &mut [RoutingNode]) -> Option<Self> {
        Self::build_impl(nodes, false)
    }

    fn build_impl(nodes: &mut [RoutingNode], lon_divides: bool) -> Option<Self> {
        match nodes.len() {
            0 => None,
            1 => Some(Self {
                pivot: nodes[0],
                left: None,
                right: None,
            }),
            _ => {
                if lon_divides {
                    nodes.sort_by(|a, b| a.lon.total_cmp(&b.lon));
                } else {
                    nodes.sort_by(|a, b| a.lat.total_cmp(&b.lat));
                }
                let median = nodes.len() / 2;
                let pivot = nodes[median];
                let (left, right_and_pivot) = nodes.split_at_mut(median);
                let right = &mut right_and_pivot[1..];
                Some(Self {
                    pivot,
                    left: Self::build_impl(left, !lon_divides).map(Box::new),
                    right: Self::build_impl(right, !lon_divides).map(Box::new),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kd_tree() {
        let tree = KDTree::build(&mut [
            RoutingNode::new(1, 0.01, 0.01),
            RoutingNode::new(2, 0.01, 0.05),
            RoutingNode::new(3, 0.03, 0.09),
            RoutingNode::new(4, 0.04, 0.03),
            RoutingNode::new(5, 0.04, 0.07),
            RoutingNode::new(6, 0.07, 0.03),
            RoutingNode::new(7, 0.07, 0.01),
            RoutingNode::new(8, 0.08, 0.05),
            RoutingNode::new(9, 0.08, 0.09),
        ])
        .expect("k-d tree from non-empty slice must not be empty");

        assert_eq!(tree.find_nearest_node(0.02, 0.02).0.id, 1);
        assert_eq!(tree.find_nearest_node(0.05, 0.03).0.id, 4);
        assert_eq!(tree.find_nearest_node(0.05, 0.08).0.id, 5);
        assert_eq!(tree.find_nearest_node(0.09, 0.06).0.id, 8);
    }

    #[test]
    fn kd_tree_reports_distance() {
        let tree = KDTree::from_iter([RoutingNode::new(1, 0.0, 0.0)]).unwrap();
        let (node, dist) = tree.find_nearest_node(0.0, 0.0);
        assert_eq!(node.id, 1);
        assert_eq!(dist, 0.0);
        assert!(KDTree::from_iter([]).is_none());
    }
}
