// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::{earth_distance, Mode, RouteError, RoutingEdge, RoutingGraph, RoutingNode};

/// An edge of a computed path, together with the direction it was traversed in.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversedEdge {
    pub edge: RoutingEdge,

    /// True if the edge was traversed from `edge.to` to `edge.from`.
    pub reversed: bool,
}

impl TraversedEdge {
    /// Node at which the traversal starts.
    pub fn start(&self) -> i64 {
        if self.reversed {
            self.edge.to
        } else {
            self.edge.from
        }
    }

    /// Node at which the traversal ends.
    pub fn end(&self) -> i64 {
        if self.reversed {
            self.edge.from
        } else {
            self.edge.to
        }
    }

    pub fn distance(&self) -> f64 {
        self.edge.distance
    }

    pub fn cost(&self) -> f64 {
        self.edge.cost_in(self.reversed)
    }

    pub fn elevation_gain(&self) -> f64 {
        self.edge.gain_in(self.reversed)
    }

    pub fn elevation_loss(&self) -> f64 {
        self.edge.loss_in(self.reversed)
    }

    pub fn name(&self) -> Option<&str> {
        self.edge.name.as_deref()
    }
}

/// Result of a single A* solve between two nodes: `nodes.len() == edges.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPath {
    pub nodes: Vec<RoutingNode>,
    pub edges: Vec<TraversedEdge>,
}

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    at: i64,
    cost: f64,
    score: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NOTE: We revert the order of comparison,
        // as lower scores are considered better ("higher"),
        // and Rust's BinaryHeap is a max-heap.
        // Ties are broken in favor of items further along the path.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.cost.total_cmp(&other.cost))
    }
}

#[derive(Debug, Clone)]
struct CameFrom {
    node: i64,
    edge: RoutingEdge,
    reversed: bool,
}

fn reconstruct_path(
    came_from: &HashMap<i64, CameFrom>,
    nodes: &HashMap<i64, RoutingNode>,
    last: RoutingNode,
) -> SegmentPath {
    let mut path_nodes = vec![last];
    let mut path_edges = Vec::default();
    let mut at = last.id;

    while let Some(step) = came_from.get(&at) {
        path_edges.push(TraversedEdge {
            edge: step.edge.clone(),
            reversed: step.reversed,
        });
        path_nodes.push(nodes[&step.node]);
        at = step.node;
    }

    path_nodes.reverse();
    path_edges.reverse();
    SegmentPath {
        nodes: path_nodes,
        edges: path_edges,
    }
}

/// Uses the [A* algorithm](https://en.wikipedia.org/wiki/A*_search_algorithm)
/// to find the cheapest path between two nodes of the provided graph for a given [Mode].
///
/// Edges are traversed against their natural direction (using `reverse_cost`) when
/// reached from their `to` node. Edges with a non-finite cost in the traversed
/// direction, and edges the mode can't pass, are never used.
///
/// The heuristic is the crow-flies distance to the target converted into a time with
/// the base speed of the mode which priced the graph. If [RoutingGraph::pricing_mode]
/// isn't known, the fastest base speed of all modes is used instead. Searching a graph
/// priced for a different mode fails with [RouteError::ModeMismatch].
///
/// `step_limit` limits how many nodes may be expanded during the search
/// before returning [RouteError::StepLimitExceeded]. Concluding that no route exists
/// requires expanding all nodes accessible from the start, which may be very time-consuming
/// on large graphs. The recommended value is [DEFAULT_STEP_LIMIT](crate::DEFAULT_STEP_LIMIT).
pub fn find_segment<G: RoutingGraph + ?Sized>(
    g: &G,
    from_id: i64,
    to_id: i64,
    mode: Mode,
    step_limit: usize,
) -> Result<SegmentPath, RouteError> {
    let priced_for = match g.pricing_mode() {
        Some(priced) if priced != mode => {
            return Err(RouteError::ModeMismatch {
                graph: priced,
                requested: mode,
            })
        }
        priced => priced,
    };
    let min_cost = |distance: f64| match priced_for {
        Some(m) => m.min_cost(distance),
        None => Mode::min_cost_any(distance),
    };

    let to_node = g
        .get_node(to_id)?
        .ok_or(RouteError::InvalidReference(to_id))?;
    let from_node = g
        .get_node(from_id)?
        .ok_or(RouteError::InvalidReference(from_id))?;

    let remaining = |n: &RoutingNode| earth_distance(n.lat, n.lon, to_node.lat, to_node.lon);

    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::default();
    let mut came_from: HashMap<i64, CameFrom> = HashMap::default();
    let mut known_costs: HashMap<i64, f64> = HashMap::default();
    let mut nodes: HashMap<i64, RoutingNode> = HashMap::default();
    let mut closed: HashSet<i64> = HashSet::default();
    let mut steps: usize = 0;
    let mut closest_approach = remaining(&from_node);

    queue.push(QueueItem {
        at: from_id,
        cost: 0.0,
        score: min_cost(closest_approach),
    });
    known_costs.insert(from_id, 0.0);
    nodes.insert(from_id, from_node);

    while let Some(item) = queue.pop() {
        // Multiple items may be queued for the same node; only the first one popped counts.
        if closed.contains(&item.at) {
            continue;
        }
        if item.cost > known_costs.get(&item.at).cloned().unwrap_or(f64::INFINITY) {
            continue;
        }

        if item.at == to_id {
            log::trace!("segment {from_id} -> {to_id}: found after {steps} expansions");
            return Ok(reconstruct_path(&came_from, &nodes, to_node));
        }

        closed.insert(item.at);
        steps += 1;
        if steps > step_limit {
            return Err(RouteError::StepLimitExceeded {
                nodes_expanded: step_limit,
                closest_approach,
            });
        }

        closest_approach = closest_approach.min(remaining(&nodes[&item.at]));

        for edge in g.get_edges_from(item.at)?.iter() {
            let (neighbor_id, reversed) = if edge.from == item.at {
                (edge.to, false)
            } else if edge.to == item.at {
                (edge.from, true)
            } else {
                continue;
            };

            if closed.contains(&neighbor_id) || !mode.is_passable(edge) {
                continue;
            }

            let edge_cost = edge.cost_in(reversed);
            if !edge_cost.is_finite() || edge_cost < 0.0 {
                continue;
            }

            // Check if this is the cheapest way to the neighbor
            let neighbor_cost = item.cost + edge_cost;
            if neighbor_cost
                >= known_costs
                    .get(&neighbor_id)
                    .cloned()
                    .unwrap_or(f64::INFINITY)
            {
                continue;
            }

            // Edges may refer to nodes outside of the graph; those are silently ignored
            let neighbor = match nodes.get(&neighbor_id) {
                Some(&n) => n,
                None => match g.get_node(neighbor_id)? {
                    Some(n) => n,
                    None => continue,
                },
            };

            came_from.insert(
                neighbor_id,
                CameFrom {
                    node: item.at,
                    edge: edge.clone(),
                    reversed,
                },
            );
            known_costs.insert(neighbor_id, neighbor_cost);
            nodes.insert(neighbor_id, neighbor);
            queue.push(QueueItem {
                at: neighbor_id,
                cost: neighbor_cost,
                score: neighbor_cost + min_cost(remaining(&neighbor)),
            });
        }
    }

    Err(RouteError::NoRoute {
        nodes_explored: steps,
        closest_approach,
    })
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use crate::{GraphError, MemoryGraph};

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!(
                (($a - $b).abs() < 1e-6),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    /// About 111 meters per 0.001° of latitude at the equator.
    const STEP: f64 = 0.001;

    fn node(id: i64, row: f64, col: f64) -> RoutingNode {
        RoutingNode::new(id, row * STEP, col * STEP)
    }

    fn path_edge(g: &MemoryGraph, from: i64, to: i64, surface: &str, mode: Mode) -> RoutingEdge {
        let a = g.node(from).unwrap();
        let b = g.node(to).unwrap();
        let mut e = RoutingEdge::new(from, to, earth_distance(a.lat, a.lon, b.lat, b.lon));
        e.surface = Some(surface.to_string());
        e.highway = Some("path".to_string());
        e.priced(mode)
    }

    fn ids(path: &SegmentPath) -> Vec<i64> {
        path.nodes.iter().map(|n| n.id).collect()
    }

    //  1 ─asphalt─ 2 ─asphalt─ 3
    //  │           │           │
    // mud      compacted    asphalt
    //  │           │           │
    //  4 ─ gravel─ 5 ─ mud ─── 6
    fn grid(mode: Mode) -> MemoryGraph {
        let mut g = MemoryGraph::default();
        g.set_node(node(1, 1.0, 0.0));
        g.set_node(node(2, 1.0, 1.0));
        g.set_node(node(3, 1.0, 2.0));
        g.set_node(node(4, 0.0, 0.0));
        g.set_node(node(5, 0.0, 1.0));
        g.set_node(node(6, 0.0, 2.0));
        for (from, to, surface) in [
            (1, 2, "asphalt"),
            (2, 3, "asphalt"),
            (1, 4, "mud"),
            (2, 5, "compacted"),
            (3, 6, "asphalt"),
            (4, 5, "gravel"),
            (5, 6, "mud"),
        ] {
            let e = path_edge(&g, from, to, surface, mode);
            assert!(g.add_edge(e));
        }
        g
    }

    /// Cheapest cost between two nodes by enumerating all simple paths.
    fn brute_force(g: &MemoryGraph, from: i64, to: i64, mode: Mode) -> f64 {
        fn walk(
            g: &MemoryGraph,
            at: i64,
            to: i64,
            mode: Mode,
            visited: &mut Vec<i64>,
            cost: f64,
            best: &mut f64,
        ) {
            if at == to {
                *best = best.min(cost);
                return;
            }
            for e in g.edges(at) {
                let reversed = e.from != at;
                let next = e.other_end(at).unwrap();
                let c = e.cost_in(reversed);
                if visited.contains(&next) || !c.is_finite() || !mode.is_passable(e) {
                    continue;
                }
                visited.push(next);
                walk(g, next, to, mode, visited, cost + c, best);
                visited.pop();
            }
        }

        let mut best = f64::INFINITY;
        walk(g, from, to, mode, &mut vec![from], 0.0, &mut best);
        best
    }

    #[test]
    fn optimal_on_grid() {
        for mode in Mode::ALL {
            let g = grid(mode);
            for from in 1..=6 {
                for to in 1..=6 {
                    let path = find_segment(&g, from, to, mode, 1_000).unwrap();
                    let cost: f64 = path.edges.iter().map(|e| e.cost()).sum();
                    assert_almost_eq!(cost, brute_force(&g, from, to, mode));
                    assert_eq!(path.nodes.first().map(|n| n.id), Some(from));
                    assert_eq!(path.nodes.last().map(|n| n.id), Some(to));
                    assert_eq!(path.nodes.len(), path.edges.len() + 1);
                }
            }
        }
    }

    #[test]
    fn prefers_paved_detour_when_cycling() {
        // 4 -> 6: gravel and mud along the bottom row, or a longer detour over
        // compacted and asphalt through 2 and 3. Hiking takes the direct route,
        // cycling avoids the mud.
        let hiking = find_segment(&grid(Mode::Hiking), 4, 6, Mode::Hiking, 1_000).unwrap();
        assert_eq!(ids(&hiking), vec![4, 5, 6]);

        let cycling = find_segment(&grid(Mode::Cycling), 4, 6, Mode::Cycling, 1_000).unwrap();
        assert_eq!(ids(&cycling), vec![4, 5, 2, 3, 6]);
    }

    #[test]
    fn heuristic_is_admissible() {
        for mode in Mode::ALL {
            let g = grid(mode);
            for a in g.iter() {
                for b in g.iter() {
                    let crow_flies = earth_distance(a.lat, a.lon, b.lat, b.lon);
                    let actual = brute_force(&g, a.id, b.id, mode);
                    assert!(mode.min_cost(crow_flies) <= actual + 1e-9);
                }
            }
        }
    }

    //       4
    //     ╱   ╲
    // asphalt  asphalt
    //   ╱        ╲
    //  1 ─gravel─ 2 ─gravel─ 3
    fn diamond(mode: Mode) -> MemoryGraph {
        let mut g = MemoryGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 0.0, 1.0));
        g.set_node(node(3, 0.0, 2.0));
        g.set_node(node(4, 1.0, 1.0));
        for (from, to, surface) in [
            (1, 2, "gravel"),
            (2, 3, "gravel"),
            (1, 4, "asphalt"),
            (4, 3, "asphalt"),
        ] {
            let e = path_edge(&g, from, to, surface, mode);
            assert!(g.add_edge(e));
        }
        g
    }

    #[test]
    fn optimal_without_known_pricing_mode() {
        // Costs are cycling costs, where the paved detour is cheaper. A heuristic
        // based on the walking speed would overestimate them and pick the gravel.
        let g = diamond(Mode::Cycling);
        assert_eq!(g.pricing_mode(), None);

        let path = find_segment(&g, 1, 3, Mode::Hiking, 100).unwrap();
        assert_eq!(ids(&path), vec![1, 4, 3]);
        let cost: f64 = path.edges.iter().map(|e| e.cost()).sum();
        assert_almost_eq!(cost, brute_force(&g, 1, 3, Mode::Hiking));
    }

    #[test]
    fn rejects_other_pricing_mode() {
        let mut g = diamond(Mode::Cycling);
        g.set_pricing_mode(Some(Mode::Cycling));

        assert!(matches!(
            find_segment(&g, 1, 3, Mode::Hiking, 100),
            Err(RouteError::ModeMismatch {
                graph: Mode::Cycling,
                requested: Mode::Hiking,
            })
        ));

        let path = find_segment(&g, 1, 3, Mode::Cycling, 100).unwrap();
        assert_eq!(ids(&path), vec![1, 4, 3]);
    }

    /// Wraps a [MemoryGraph], but can't read the edges of one node.
    struct CorruptedGraph {
        g: MemoryGraph,
        corrupted: i64,
    }

    impl RoutingGraph for CorruptedGraph {
        fn get_node(&self, id: i64) -> Result<Option<RoutingNode>, GraphError> {
            self.g.get_node(id)
        }

        fn get_edges_from(&self, node_id: i64) -> Result<Cow<'_, [RoutingEdge]>, GraphError> {
            if node_id == self.corrupted {
                Err(GraphError::Corrupted(format!("edges of node {node_id}")))
            } else {
                self.g.get_edges_from(node_id)
            }
        }

        fn find_nearest_node(
            &self,
            lat: f64,
            lon: f64,
            max_distance: f64,
        ) -> Result<Option<RoutingNode>, GraphError> {
            self.g.find_nearest_node(lat, lon, max_distance)
        }
    }

    #[test]
    fn graph_errors_stop_the_search() {
        let g = CorruptedGraph {
            g: grid(Mode::Hiking),
            corrupted: 1,
        };
        assert!(matches!(
            find_segment(&g, 1, 6, Mode::Hiking, 1_000),
            Err(RouteError::Graph(GraphError::Corrupted(_)))
        ));

        // The corrupted node is never expanded if it's the target
        assert!(find_segment(&g, 6, 1, Mode::Hiking, 1_000).is_ok());
    }

    #[test]
    fn reversed_edge_swaps_gain_and_loss() {
        let mut g = MemoryGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 1.0, 0.0));
        let mut e = RoutingEdge::new(1, 2, 120.0);
        e.elevation_gain = 30.0;
        e.elevation_loss = 5.0;
        e.cost = 200.0;
        e.reverse_cost = 150.0;
        assert!(g.add_edge(e));

        let up = find_segment(&g, 1, 2, Mode::Hiking, 10).unwrap();
        assert_eq!(up.edges.len(), 1);
        assert!(!up.edges[0].reversed);
        assert_eq!(up.edges[0].cost(), 200.0);
        assert_eq!(up.edges[0].elevation_gain(), 30.0);
        assert_eq!(up.edges[0].elevation_loss(), 5.0);
        assert_eq!((up.edges[0].start(), up.edges[0].end()), (1, 2));

        let down = find_segment(&g, 2, 1, Mode::Hiking, 10).unwrap();
        assert!(down.edges[0].reversed);
        assert_eq!(down.edges[0].cost(), 150.0);
        assert_eq!(down.edges[0].elevation_gain(), 5.0);
        assert_eq!(down.edges[0].elevation_loss(), 30.0);
        assert_eq!((down.edges[0].start(), down.edges[0].end()), (2, 1));
    }

    #[test]
    fn respects_one_way_edges() {
        let mut g = MemoryGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 1.0, 0.0));
        let mut e = RoutingEdge::new(1, 2, 120.0);
        e.oneway = true;
        assert!(g.add_edge(e.priced(Mode::Hiking)));

        assert!(find_segment(&g, 1, 2, Mode::Hiking, 10).is_ok());
        assert!(matches!(
            find_segment(&g, 2, 1, Mode::Hiking, 10),
            Err(RouteError::NoRoute {
                nodes_explored: 1,
                ..
            })
        ));
    }

    #[test]
    fn cycling_never_uses_steps() {
        // 1 ─steps─ 2, and nothing else
        let mut g = MemoryGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 0.0, 1.0));
        let mut e = RoutingEdge::new(1, 2, 111.0);
        e.highway = Some("steps".to_string());
        e.cost = 100.0;
        e.reverse_cost = 100.0;
        assert!(g.add_edge(e));

        assert!(find_segment(&g, 1, 2, Mode::Hiking, 10).is_ok());
        assert!(matches!(
            find_segment(&g, 1, 2, Mode::Cycling, 10),
            Err(RouteError::NoRoute { .. })
        ));
    }

    #[test]
    fn no_route_reports_diagnostics() {
        // Two islands: 1-2-3 and 4-5, 5 is 1 step away from 3.
        let mut g = MemoryGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 0.0, 1.0));
        g.set_node(node(3, 0.0, 2.0));
        g.set_node(node(4, 0.0, 4.0));
        g.set_node(node(5, 0.0, 3.0));
        for (from, to) in [(1, 2), (2, 3), (4, 5)] {
            let e = path_edge(&g, from, to, "asphalt", Mode::Hiking);
            assert!(g.add_edge(e));
        }

        match find_segment(&g, 1, 4, Mode::Hiking, 1_000) {
            Err(RouteError::NoRoute {
                nodes_explored,
                closest_approach,
            }) => {
                assert_eq!(nodes_explored, 3);
                let n3 = g.node(3).unwrap();
                let n4 = g.node(4).unwrap();
                assert_almost_eq!(
                    closest_approach,
                    earth_distance(n3.lat, n3.lon, n4.lat, n4.lon)
                );
            }
            other => panic!("expected NoRoute, got {other:?}"),
        }
    }

    #[test]
    fn step_limit() {
        let g = grid(Mode::Hiking);
        assert!(matches!(
            find_segment(&g, 1, 6, Mode::Hiking, 1),
            Err(RouteError::StepLimitExceeded {
                nodes_expanded: 1,
                ..
            })
        ));
    }

    #[test]
    fn invalid_reference() {
        let g = grid(Mode::Hiking);
        assert!(matches!(
            find_segment(&g, 1, 42, Mode::Hiking, 10),
            Err(RouteError::InvalidReference(42))
        ));
    }

    #[test]
    fn same_start_and_end() {
        let g = grid(Mode::Hiking);
        let path = find_segment(&g, 3, 3, Mode::Hiking, 10).unwrap();
        assert_eq!(ids(&path), vec![3]);
        assert!(path.edges.is_empty());
    }

    #[test]
    fn deterministic() {
        let g = grid(Mode::Cycling);
        let a = find_segment(&g, 1, 6, Mode::Cycling, 1_000).unwrap();
        let b = find_segment(&g, 1, 6, Mode::Cycling, 1_000).unwrap();
        assert_eq!(a, b);
    }
}
