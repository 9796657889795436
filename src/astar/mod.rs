// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod error;
mod route;
mod search;

pub use error::{Endpoint, RouteError, DEFAULT_SNAP_RADIUS, DEFAULT_STEP_LIMIT};
pub use route::{find_route, ComputedRoute, SearchOptions};
pub use search::{find_segment, SegmentPath, TraversedEdge};
