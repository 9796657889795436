// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::{json, Value};
use trailroute::{Coordinate, ComputedRoute, MemoryGraph, Mode, TurnDirection};

#[derive(Debug, thiserror::Error)]
#[error("{0}: {1}")]
struct GraphLoadError(PathBuf, #[source] trailroute::osm::Error);

#[derive(Debug, thiserror::Error)]
#[error("expected at least two lat/lon pairs, got {0} number(s)")]
struct WaypointError(usize);

#[derive(Parser)]
struct Cli {
    /// The path to the OSM file (XML, optionally gzip- or bzip2-compressed)
    osm_file: PathBuf,

    /// Activity to route for: hiking or cycling
    mode: Mode,

    /// Latitude and longitude pairs of the start point, any via points and the end point
    #[arg(required = true, num_args = 4.., allow_negative_numbers = true)]
    points: Vec<f64>,

    /// Maximum distance (in meters) between a point and the path it's snapped to
    #[arg(long, default_value_t = trailroute::DEFAULT_SNAP_RADIUS)]
    snap_radius: f64,

    /// Increase logging verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut logger = colog::default_builder();
    logger.filter_level(match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    });
    logger.init();

    let points = parse_points(&cli.points)?;
    let g = load_graph(&cli.osm_file, cli.mode)?;

    let options = trailroute::SearchOptions {
        snap_radius: cli.snap_radius,
        ..Default::default()
    };
    let (from, rest) = points.split_first().ok_or(WaypointError(0))?;
    let (to, via) = rest.split_last().ok_or(WaypointError(2))?;
    let route = trailroute::find_route(&g, *from, *to, via, cli.mode, &options)?;

    println!("{}", serde_json::to_string_pretty(&route_to_geojson(&route))?);
    Ok(())
}

fn parse_points(numbers: &[f64]) -> Result<Vec<Coordinate>, WaypointError> {
    if numbers.len() < 4 || numbers.len() % 2 != 0 {
        return Err(WaypointError(numbers.len()));
    }
    Ok(numbers
        .chunks_exact(2)
        .map(|pair| Coordinate::new(pair[0], pair[1]))
        .collect())
}

fn load_graph<P: AsRef<Path>>(path: P, mode: Mode) -> Result<MemoryGraph, GraphLoadError> {
    let mut g = MemoryGraph::default();
    let options = trailroute::osm::Options::new(mode);
    match trailroute::osm::add_features_from_file(&mut g, &options, path.as_ref()) {
        Ok(()) => {
            g.reindex();
            Ok(g)
        }
        Err(e) => Err(GraphLoadError(PathBuf::from(path.as_ref()), e)),
    }
}

fn route_to_geojson(route: &ComputedRoute) -> Value {
    let instructions: Vec<Value> = trailroute::generate_instructions(route)
        .iter()
        .map(|i| {
            json!({
                "type": direction_name(i.direction),
                "text": i.description,
                "name": i.name,
                "bearing": i.bearing.round(),
                "distance": round_to_decimeter(i.cumulative_distance),
                "coordinates": [i.coordinate.lon, i.coordinate.lat],
            })
        })
        .collect();

    let coordinates: Vec<Value> = route
        .coordinates
        .iter()
        .map(|c| match c.altitude {
            Some(alt) => json!([c.lon, c.lat, alt]),
            None => json!([c.lon, c.lat]),
        })
        .collect();

    json!({
        "type": "Feature",
        "properties": {
            "mode": route.mode.to_string(),
            "distance": round_to_decimeter(route.total_distance),
            "cost": round_to_decimeter(route.total_cost),
            "duration": route.estimated_duration.round(),
            "elevation_gain": round_to_decimeter(route.elevation_gain),
            "elevation_loss": round_to_decimeter(route.elevation_loss),
            "instructions": instructions,
        },
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates,
        },
    })
}

fn round_to_decimeter(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn direction_name(d: TurnDirection) -> &'static str {
    match d {
        TurnDirection::Start => "start",
        TurnDirection::Straight => "straight",
        TurnDirection::Left => "left",
        TurnDirection::Right => "right",
        TurnDirection::SharpLeft => "sharp_left",
        TurnDirection::SharpRight => "sharp_right",
        TurnDirection::UTurn => "u_turn",
        TurnDirection::Arrive => "arrive",
    }
}
