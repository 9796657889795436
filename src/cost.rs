// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::RoutingEdge;

/// Version of the cost model constants and composition order.
///
/// Two implementations produce identical routes only if they agree on this number.
/// Any change to a constant in this module, or to the order of operations in
/// [Mode::edge_cost], must bump it.
pub const COST_MODEL_VERSION: u32 = 1;

/// Descent grades (in percent) at which the descent multiplier steps up,
/// paired with the multiplier applied *below* that grade.
const DESCENT_STEPS: [(f64, f64); 3] = [(5.0, 1.0), (15.0, 1.1), (25.0, 1.3)];

/// Descent multiplier for grades at or above the last [DESCENT_STEPS] threshold.
const SEVERE_DESCENT_FACTOR: f64 = 1.6;

/// Activity for which routes are computed. The set of modes is closed;
/// every mode shares the same cost composition and differs only in its [ModeProfile].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Hiking,
    Cycling,
}

/// Multiplier for edges with a specific tag value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factor<'a> {
    /// Value of the tag, e.g. "gravel" for `surface=gravel`.
    pub value: &'a str,

    /// Multiplier of the traversal time. Must be finite and not less than one,
    /// otherwise the search heuristic stops being admissible.
    pub factor: f64,
}

/// Constant table describing how a [Mode] moves over terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProfile<'a> {
    pub name: &'a str,

    /// Speed on flat, paved, easy terrain, in meters per second.
    pub base_speed: f64,

    /// Seconds added per meter of elevation gained.
    pub climb_penalty: f64,

    /// Multipliers for the OSM `surface` tag.
    pub surfaces: &'a [Factor<'a>],

    /// Multiplier used when the surface is missing or not present in [ModeProfile::surfaces].
    pub default_surface: f64,

    /// Multipliers for the OSM `sac_scale` tag. `None` if the mode ignores trail difficulty.
    /// Unknown or missing values get a multiplier of one.
    pub difficulties: Option<&'a [Factor<'a>]>,

    /// OSM `highway` values which can be traversed. Edges without a `highway`
    /// classification are always passable.
    pub passable: &'a [&'a str],
}

/// Physical and terrain attributes of an edge, as seen when traversing it
/// in its natural direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeAttributes<'a> {
    pub distance: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub surface: Option<&'a str>,
    pub difficulty: Option<&'a str>,
    pub highway: Option<&'a str>,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Hiking, Mode::Cycling];

    pub fn profile(self) -> &'static ModeProfile<'static> {
        match self {
            Mode::Hiking => &HIKING_PROFILE,
            Mode::Cycling => &CYCLING_PROFILE,
        }
    }

    pub fn base_speed(self) -> f64 {
        self.profile().base_speed
    }

    /// Checks whether a way with the given `highway` classification may be used at all.
    ///
    /// Cycling never uses `highway=steps`; such edges are excluded from the search
    /// rather than penalized.
    pub fn allows_highway(self, highway: Option<&str>) -> bool {
        match highway {
            None => true,
            Some(h) => self.profile().passable.contains(&h),
        }
    }

    /// The passability rule used by the route search.
    pub fn is_passable(self, edge: &RoutingEdge) -> bool {
        self.allows_highway(edge.highway.as_deref())
    }

    /// Computes the traversal cost (in seconds) of an edge, in its natural direction
    /// (`reversed == false`) or against it. Returns [f64::INFINITY] for impassable edges.
    ///
    /// The composition order is fixed, as floating-point results depend on it:
    /// 1. `t = distance / base_speed`
    /// 2. `t = t * surface`
    /// 3. `t = t * difficulty` (only if the mode has a difficulty table)
    /// 4. `t = t * descent(grade)`
    /// 5. `t = t + gain * climb_penalty`
    pub fn edge_cost(self, attrs: &EdgeAttributes<'_>, reversed: bool) -> f64 {
        if !self.allows_highway(attrs.highway) {
            return f64::INFINITY;
        }

        let p = self.profile();
        let (gain, loss) = if reversed {
            (attrs.elevation_loss, attrs.elevation_gain)
        } else {
            (attrs.elevation_gain, attrs.elevation_loss)
        };

        let mut t = attrs.distance / p.base_speed;
        t *= p.surface_factor(attrs.surface);
        if let Some(difficulty) = p.difficulty_factor(attrs.difficulty) {
            t *= difficulty;
        }
        t *= descent_factor(descent_grade(attrs.distance, loss));
        t += gain.max(0.0) * p.climb_penalty;
        t
    }

    /// Computes forward and reverse costs of an edge with the given attributes.
    pub fn price(self, attrs: &EdgeAttributes<'_>) -> (f64, f64) {
        (self.edge_cost(attrs, false), self.edge_cost(attrs, true))
    }

    /// Lower bound of the cost of travelling `distance` meters in this mode.
    /// All multipliers are at least one and all penalties non-negative,
    /// so this never overestimates.
    pub fn min_cost(self, distance: f64) -> f64 {
        distance / self.base_speed()
    }

    /// Lower bound of the cost of travelling `distance` meters,
    /// whichever mode priced the edges.
    pub fn min_cost_any(distance: f64) -> f64 {
        Mode::ALL
            .iter()
            .map(|m| m.min_cost(distance))
            .fold(f64::INFINITY, f64::min)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.profile().name)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hiking" | "foot" | "walking" => Ok(Mode::Hiking),
            "cycling" | "bicycle" | "bike" => Ok(Mode::Cycling),
            _ => Err(format!("unknown mode: {s:?} (expected hiking or cycling)")),
        }
    }
}

impl<'a> ModeProfile<'a> {
    /// Looks up the surface multiplier, falling back to [ModeProfile::default_surface].
    pub fn surface_factor(&self, surface: Option<&str>) -> f64 {
        surface
            .and_then(|s| lookup(self.surfaces, s))
            .unwrap_or(self.default_surface)
    }

    /// Looks up the difficulty multiplier. Returns `None` for modes
    /// without a difficulty table, and `Some(1.0)` for unknown classifications.
    pub fn difficulty_factor(&self, difficulty: Option<&str>) -> Option<f64> {
        self.difficulties
            .map(|table| difficulty.and_then(|d| lookup(table, d)).unwrap_or(1.0))
    }
}

fn lookup(table: &[Factor<'_>], value: &str) -> Option<f64> {
    table.iter().find(|f| f.value == value).map(|f| f.factor)
}

/// Descent grade in percent; zero for degenerate (zero-length) edges.
fn descent_grade(distance: f64, loss: f64) -> f64 {
    if distance > 0.0 && loss > 0.0 {
        loss / distance * 100.0
    } else {
        0.0
    }
}

/// Step function of the descent grade: steep descents need careful footing
/// and are slower, not faster.
fn descent_factor(grade: f64) -> f64 {
    DESCENT_STEPS
        .iter()
        .find(|&&(threshold, _)| grade < threshold)
        .map(|&(_, factor)| factor)
        .unwrap_or(SEVERE_DESCENT_FACTOR)
}

/// Walking on trails. Climbing follows Naismith's rule (one hour per 600 m of ascent).
pub const HIKING_PROFILE: ModeProfile = ModeProfile {
    name: "hiking",
    base_speed: 1.33,
    climb_penalty: 6.0,
    surfaces: &[
        Factor { value: "asphalt", factor: 1.0 },
        Factor { value: "paved", factor: 1.0 },
        Factor { value: "concrete", factor: 1.0 },
        Factor { value: "paving_stones", factor: 1.0 },
        Factor { value: "sett", factor: 1.0 },
        Factor { value: "compacted", factor: 1.05 },
        Factor { value: "fine_gravel", factor: 1.05 },
        Factor { value: "gravel", factor: 1.1 },
        Factor { value: "unpaved", factor: 1.1 },
        Factor { value: "dirt", factor: 1.1 },
        Factor { value: "earth", factor: 1.1 },
        Factor { value: "ground", factor: 1.1 },
        Factor { value: "wood", factor: 1.1 },
        Factor { value: "grass", factor: 1.2 },
        Factor { value: "pebblestone", factor: 1.2 },
        Factor { value: "rock", factor: 1.3 },
        Factor { value: "scree", factor: 1.5 },
        Factor { value: "sand", factor: 1.5 },
        Factor { value: "mud", factor: 1.5 },
        Factor { value: "snow", factor: 1.8 },
        Factor { value: "ice", factor: 2.0 },
    ],
    default_surface: 1.1,
    difficulties: Some(&[
        Factor { value: "hiking", factor: 1.0 },
        Factor { value: "mountain_hiking", factor: 1.2 },
        Factor { value: "demanding_mountain_hiking", factor: 1.5 },
        Factor { value: "alpine_hiking", factor: 2.0 },
        Factor { value: "demanding_alpine_hiking", factor: 3.0 },
        Factor { value: "difficult_alpine_hiking", factor: 5.0 },
    ]),
    passable: &[
        "path",
        "footway",
        "track",
        "bridleway",
        "steps",
        "pedestrian",
        "cycleway",
        "living_street",
        "residential",
        "service",
        "unclassified",
        "tertiary",
        "tertiary_link",
        "secondary",
        "secondary_link",
        "road",
    ],
};

/// Touring on a bicycle. Soft and loose surfaces slow a bike far more than a hiker.
pub const CYCLING_PROFILE: ModeProfile = ModeProfile {
    name: "cycling",
    base_speed: 4.17,
    climb_penalty: 3.0,
    surfaces: &[
        Factor { value: "asphalt", factor: 1.0 },
        Factor { value: "paved", factor: 1.0 },
        Factor { value: "concrete", factor: 1.0 },
        Factor { value: "paving_stones", factor: 1.2 },
        Factor { value: "sett", factor: 1.5 },
        Factor { value: "compacted", factor: 1.3 },
        Factor { value: "fine_gravel", factor: 1.4 },
        Factor { value: "wood", factor: 1.5 },
        Factor { value: "gravel", factor: 1.8 },
        Factor { value: "unpaved", factor: 1.8 },
        Factor { value: "dirt", factor: 2.0 },
        Factor { value: "earth", factor: 2.0 },
        Factor { value: "ground", factor: 2.0 },
        Factor { value: "grass", factor: 2.5 },
        Factor { value: "pebblestone", factor: 2.5 },
        Factor { value: "rock", factor: 3.0 },
        Factor { value: "scree", factor: 4.0 },
        Factor { value: "sand", factor: 4.0 },
        Factor { value: "mud", factor: 4.0 },
        Factor { value: "snow", factor: 5.0 },
        Factor { value: "ice", factor: 5.0 },
    ],
    default_surface: 1.5,
    difficulties: None,
    passable: &[
        "cycleway",
        "path",
        "track",
        "bridleway",
        "living_street",
        "residential",
        "service",
        "unclassified",
        "tertiary",
        "tertiary_link",
        "secondary",
        "secondary_link",
        "primary",
        "primary_link",
        "road",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!(
                (($a - $b).abs() < 1e-9),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    fn flat(distance: f64, surface: Option<&'static str>) -> EdgeAttributes<'static> {
        EdgeAttributes {
            distance,
            elevation_gain: 0.0,
            elevation_loss: 0.0,
            surface,
            difficulty: None,
            highway: Some("path"),
        }
    }

    #[test]
    fn base_time() {
        assert_almost_eq!(
            Mode::Hiking.edge_cost(&flat(100.0, Some("asphalt")), false),
            100.0 / 1.33
        );
        assert_almost_eq!(
            Mode::Cycling.edge_cost(&flat(100.0, Some("asphalt")), false),
            100.0 / 4.17
        );
    }

    #[test]
    fn surface_factors() {
        let hiking_gravel = Mode::Hiking.edge_cost(&flat(100.0, Some("gravel")), false);
        let cycling_gravel = Mode::Cycling.edge_cost(&flat(100.0, Some("gravel")), false);
        assert_almost_eq!(hiking_gravel, 100.0 / 1.33 * 1.1);
        assert_almost_eq!(cycling_gravel, 100.0 / 4.17 * 1.8);

        // Missing and unknown surfaces use the default
        assert_almost_eq!(
            Mode::Hiking.edge_cost(&flat(100.0, None), false),
            100.0 / 1.33 * 1.1
        );
        assert_almost_eq!(
            Mode::Cycling.edge_cost(&flat(100.0, Some("chocolate")), false),
            100.0 / 4.17 * 1.5
        );
    }

    #[test]
    fn difficulty_only_for_hiking() {
        let attrs = EdgeAttributes {
            difficulty: Some("difficult_alpine_hiking"),
            ..flat(100.0, Some("asphalt"))
        };
        assert_almost_eq!(Mode::Hiking.edge_cost(&attrs, false), 100.0 / 1.33 * 5.0);
        assert_almost_eq!(Mode::Cycling.edge_cost(&attrs, false), 100.0 / 4.17);

        let unknown = EdgeAttributes {
            difficulty: Some("T7"),
            ..flat(100.0, Some("asphalt"))
        };
        assert_almost_eq!(Mode::Hiking.edge_cost(&unknown, false), 100.0 / 1.33);
    }

    #[test]
    fn climb_is_additive() {
        let attrs = EdgeAttributes {
            elevation_gain: 10.0,
            ..flat(100.0, Some("asphalt"))
        };
        assert_almost_eq!(Mode::Hiking.edge_cost(&attrs, false), 100.0 / 1.33 + 60.0);
        assert_almost_eq!(Mode::Cycling.edge_cost(&attrs, false), 100.0 / 4.17 + 30.0);
    }

    #[test]
    fn descent_steps() {
        assert_eq!(descent_factor(0.0), 1.0);
        assert_eq!(descent_factor(4.99), 1.0);
        assert_eq!(descent_factor(5.0), 1.1);
        assert_eq!(descent_factor(14.99), 1.1);
        assert_eq!(descent_factor(15.0), 1.3);
        assert_eq!(descent_factor(24.99), 1.3);
        assert_eq!(descent_factor(25.0), 1.6);
        assert_eq!(descent_factor(80.0), 1.6);
    }

    #[test]
    fn direction_swaps_gain_and_loss() {
        // 100 m with 30 m of ascent: forward climbs, reverse descends at 30%
        let attrs = EdgeAttributes {
            elevation_gain: 30.0,
            ..flat(100.0, Some("asphalt"))
        };
        let (forward, reverse) = Mode::Hiking.price(&attrs);
        assert_almost_eq!(forward, 100.0 / 1.33 + 180.0);
        assert_almost_eq!(reverse, 100.0 / 1.33 * 1.6);
    }

    #[test]
    fn composition_order() {
        let attrs = EdgeAttributes {
            distance: 250.0,
            elevation_gain: 12.0,
            elevation_loss: 20.0,
            surface: Some("rock"),
            difficulty: Some("alpine_hiking"),
            highway: Some("path"),
        };
        let expected = ((((250.0 / 1.33) * 1.3) * 2.0) * 1.1) + 12.0 * 6.0;
        assert_eq!(Mode::Hiking.edge_cost(&attrs, false), expected);
    }

    #[test]
    fn min_cost_any_bounds_every_mode() {
        assert_almost_eq!(Mode::min_cost_any(417.0), 100.0);
        for mode in Mode::ALL {
            for surface in [None, Some("asphalt"), Some("gravel"), Some("ice")] {
                let cost = mode.edge_cost(&flat(417.0, surface), false);
                assert!(Mode::min_cost_any(417.0) <= cost);
            }
        }
    }

    #[test]
    fn steps_impassable_for_cycling() {
        let steps = EdgeAttributes {
            highway: Some("steps"),
            ..flat(20.0, None)
        };
        assert!(Mode::Hiking.edge_cost(&steps, false).is_finite());
        assert_eq!(Mode::Cycling.price(&steps), (f64::INFINITY, f64::INFINITY));

        let motorway = EdgeAttributes {
            highway: Some("motorway"),
            ..flat(20.0, None)
        };
        assert!(Mode::Hiking.edge_cost(&motorway, false).is_infinite());

        let unclassified = EdgeAttributes {
            highway: None,
            ..flat(20.0, None)
        };
        assert!(Mode::Cycling.edge_cost(&unclassified, false).is_finite());
    }

    #[test]
    fn factors_never_speed_up() {
        for mode in Mode::ALL {
            let p = mode.profile();
            assert!(p.base_speed > 0.0);
            assert!(p.climb_penalty >= 0.0);
            assert!(p.default_surface >= 1.0);
            assert!(p.surfaces.iter().all(|f| f.factor >= 1.0));
            assert!(p
                .difficulties
                .unwrap_or_default()
                .iter()
                .all(|f| f.factor >= 1.0 && f.factor <= 5.0));
        }
    }

    #[test]
    fn parse_mode() {
        assert_eq!("hiking".parse::<Mode>(), Ok(Mode::Hiking));
        assert_eq!("bike".parse::<Mode>(), Ok(Mode::Cycling));
        assert!("canoe".parse::<Mode>().is_err());
        assert_eq!(Mode::Cycling.to_string(), "cycling");
    }
}
