// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::{bearing, normalize_bearing_delta, CardinalDirection, ComputedRoute, Coordinate};

/// Turns with an absolute bearing change below this angle (in degrees) are straight.
const STRAIGHT_LIMIT: f64 = 20.0;

/// Turns with an absolute bearing change below this angle (in degrees) are regular turns.
const TURN_LIMIT: f64 = 120.0;

/// Turns with an absolute bearing change below this angle (in degrees) are sharp turns;
/// anything above is a U-turn.
const SHARP_TURN_LIMIT: f64 = 160.0;

/// Kind of maneuver of a [TurnInstruction].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnDirection {
    Start,
    Straight,
    Left,
    Right,
    SharpLeft,
    SharpRight,
    UTurn,
    Arrive,
}

impl TurnDirection {
    fn verb(self) -> &'static str {
        match self {
            Self::Start => "Head",
            Self::Straight => "Continue straight",
            Self::Left => "Turn left",
            Self::Right => "Turn right",
            Self::SharpLeft => "Turn sharp left",
            Self::SharpRight => "Turn sharp right",
            Self::UTurn => "Make a U-turn",
            Self::Arrive => "Arrive at destination",
        }
    }
}

/// A single maneuver along a [ComputedRoute].
#[derive(Debug, Clone, PartialEq)]
pub struct TurnInstruction {
    pub coordinate: Coordinate,
    pub direction: TurnDirection,

    /// Bearing when leaving the maneuver point, in degrees `[0, 360)`.
    /// For [TurnDirection::Arrive], the bearing of the final approach.
    pub bearing: f64,

    /// Meters travelled since the previous instruction.
    pub distance_from_previous: f64,

    /// Meters travelled since the start of the route.
    pub cumulative_distance: f64,

    /// Name of the way taken after the maneuver.
    pub name: Option<String>,

    pub description: String,
}

/// Classifies a signed bearing change (positive = clockwise) into a [TurnDirection].
pub fn classify_turn(delta: f64) -> TurnDirection {
    let angle = delta.abs();
    if angle < STRAIGHT_LIMIT {
        TurnDirection::Straight
    } else if angle < TURN_LIMIT {
        if delta > 0.0 {
            TurnDirection::Right
        } else {
            TurnDirection::Left
        }
    } else if angle < SHARP_TURN_LIMIT {
        if delta > 0.0 {
            TurnDirection::SharpRight
        } else {
            TurnDirection::SharpLeft
        }
    } else {
        TurnDirection::UTurn
    }
}

/// Converts a [ComputedRoute] into turn-by-turn instructions.
///
/// The list starts with a [TurnDirection::Start] and ends with a [TurnDirection::Arrive]
/// instruction. In between, an instruction is emitted at every junction where the route
/// turns, or where the way name changes. Distances of merged straight stretches accumulate
/// into the next emitted instruction.
///
/// Routes with fewer than two nodes or without edges produce no instructions.
pub fn generate_instructions(route: &ComputedRoute) -> Vec<TurnInstruction> {
    let nodes = &route.nodes;
    let edges = &route.edges;
    if nodes.len() < 2 || edges.is_empty() || nodes.len() != edges.len() + 1 {
        return Vec::default();
    }

    let bearing_between = |a: usize, b: usize| {
        bearing(nodes[a].lat, nodes[a].lon, nodes[b].lat, nodes[b].lon)
    };

    let mut instructions = Vec::default();
    let mut cumulative = 0.0;
    let mut since_previous = 0.0;

    let first_name = edges[0].name();
    let initial_bearing = bearing_between(0, 1);
    instructions.push(TurnInstruction {
        coordinate: nodes[0].coordinate(),
        direction: TurnDirection::Start,
        bearing: initial_bearing,
        distance_from_previous: 0.0,
        cumulative_distance: 0.0,
        name: first_name.map(str::to_string),
        description: describe_start(initial_bearing, first_name),
    });

    for i in 1..nodes.len() - 1 {
        let travelled = edges[i - 1].distance();
        cumulative += travelled;
        since_previous += travelled;

        let incoming = bearing_between(i - 1, i);
        let outgoing = bearing_between(i, i + 1);
        let direction = classify_turn(normalize_bearing_delta(outgoing - incoming));

        let name = edges[i].name();
        if direction == TurnDirection::Straight && name == edges[i - 1].name() {
            continue;
        }

        instructions.push(TurnInstruction {
            coordinate: nodes[i].coordinate(),
            direction,
            bearing: outgoing,
            distance_from_previous: since_previous,
            cumulative_distance: cumulative,
            name: name.map(str::to_string),
            description: describe_turn(direction, name),
        });
        since_previous = 0.0;
    }

    let last = nodes.len() - 1;
    let travelled = edges[last - 1].distance();
    cumulative += travelled;
    since_previous += travelled;
    instructions.push(TurnInstruction {
        coordinate: nodes[last].coordinate(),
        direction: TurnDirection::Arrive,
        bearing: bearing_between(last - 1, last),
        distance_from_previous: since_previous,
        cumulative_distance: cumulative,
        name: None,
        description: TurnDirection::Arrive.verb().to_string(),
    });

    instructions
}

fn describe_start(bearing: f64, name: Option<&str>) -> String {
    let heading = CardinalDirection::from_bearing(bearing);
    match name {
        Some(name) => format!("Head {heading} on {name}"),
        None => format!("Head {heading}"),
    }
}

fn describe_turn(direction: TurnDirection, name: Option<&str>) -> String {
    match (direction, name) {
        (TurnDirection::Straight, Some(name)) => format!("Continue onto {name}"),
        (_, Some(name)) => format!("{} onto {name}", direction.verb()),
        (_, None) => direction.verb().to_string(),
    }
}
