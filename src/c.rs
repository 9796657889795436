// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use super::*;

use std::ffi::{c_char, CStr, OsStr};
use std::mem::{forget, ManuallyDrop};
use std::os::unix::ffi::OsStrExt;
use std::ptr::null_mut;
use std::slice;

use crate::tile::{TileCoordinate, TileRange};
use crate::track::TrackSample;

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_new() -> *mut MemoryGraph {
    Box::into_raw(Box::<MemoryGraph>::default())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_delete(ptr: *mut MemoryGraph) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_len(graph: *const MemoryGraph) -> usize {
    graph.as_ref().map(|g| g.len()).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_reindex(graph: *mut MemoryGraph) {
    if let Some(graph) = graph.as_mut() {
        graph.reindex();
    }
}

/// Node returned over the C ABI. Unknown elevation is represented by NaN,
/// and a missing node by an all-zero structure.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct CNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
}

impl CNode {
    pub const ZERO: Self = Self {
        id: 0,
        lat: 0.0,
        lon: 0.0,
        elevation: 0.0,
    };
}

impl From<RoutingNode> for CNode {
    fn from(n: RoutingNode) -> Self {
        Self {
            id: n.id,
            lat: n.lat,
            lon: n.lon,
            elevation: n.elevation.unwrap_or(f64::NAN),
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_get_node(graph: *const MemoryGraph, id: i64) -> CNode {
    graph
        .as_ref()
        .and_then(|g| g.node(id))
        .map(CNode::from)
        .unwrap_or(CNode::ZERO)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_find_nearest_node(
    graph: *const MemoryGraph,
    lat: f64,
    lon: f64,
    max_distance: f64,
) -> CNode {
    graph
        .as_ref()
        .and_then(|g| g.find_nearest_node(lat, lon, max_distance).ok().flatten())
        .map(CNode::from)
        .unwrap_or(CNode::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum CMode {
    Hiking = 0,
    Cycling = 1,
}

impl From<CMode> for Mode {
    fn from(value: CMode) -> Self {
        match value {
            CMode::Hiking => Mode::Hiking,
            CMode::Cycling => Mode::Cycling,
        }
    }
}

#[derive(Copy, Clone)]
#[repr(C)]
pub enum COsmFormat {
    Unknown = 0,
    Xml = 1,
    XmlGz = 2,
    XmlBz2 = 3,
}

impl From<COsmFormat> for osm::FileFormat {
    fn from(value: COsmFormat) -> Self {
        match value {
            COsmFormat::Unknown => osm::FileFormat::Unknown,
            COsmFormat::Xml => osm::FileFormat::Xml,
            COsmFormat::XmlGz => osm::FileFormat::XmlGz,
            COsmFormat::XmlBz2 => osm::FileFormat::XmlBz2,
        }
    }
}

#[repr(C)]
pub struct COsmOptions {
    pub mode: CMode,
    pub format: COsmFormat,
    pub bbox: [f64; 4],
}

impl From<&COsmOptions> for osm::Options {
    fn from(c: &COsmOptions) -> Self {
        osm::Options {
            mode: c.mode.into(),
            file_format: c.format.into(),
            bbox: c.bbox,
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_add_from_osm_file(
    graph: *mut MemoryGraph,
    c_options: *const COsmOptions,
    c_filename: *const c_char,
) -> bool {
    if c_filename.is_null() {
        return false;
    }

    if let (Some(graph), Some(c_options)) = (graph.as_mut(), c_options.as_ref()) {
        let options = osm::Options::from(c_options);
        let filename = OsStr::from_bytes(CStr::from_ptr(c_filename).to_bytes());

        match osm::add_features_from_file(graph, &options, filename) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to load {}: {e}", filename.to_string_lossy());
                false
            }
        }
    } else {
        false
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_graph_add_from_osm_memory(
    graph: *mut MemoryGraph,
    c_options: *const COsmOptions,
    content: *const u8,
    content_len: usize,
) -> bool {
    if content.is_null() {
        return false;
    }

    if let (Some(graph), Some(c_options)) = (graph.as_mut(), c_options.as_ref()) {
        let options = osm::Options::from(c_options);
        let content = slice::from_raw_parts(content, content_len);

        match osm::add_features_from_buffer(graph, &options, content) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to load OSM data from memory: {e}");
                false
            }
        }
    } else {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum CRouteResultType {
    Ok = 0,
    Unreachable = 1,
    NoRoute = 2,
    StepLimitExceeded = 3,
    InvalidReference = 4,
    GraphError = 5,
    ModeMismatch = 6,
    Cancelled = 7,
}

#[repr(C)]
pub struct CRouteResultOk {
    pub nodes: *mut i64,
    pub len: usize,
    pub capacity: usize,
    pub total_distance: f64,
    pub total_cost: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
}

/// Index of the offending point in the array passed to [trailroute_find_route].
#[derive(Clone, Copy)]
#[repr(C)]
pub struct CRouteResultUnreachable {
    pub point_index: usize,
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct CRouteResultSearch {
    pub nodes_explored: usize,
    pub closest_approach: f64,
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct CRouteResultInvalidReference {
    pub invalid_node_id: i64,
}

#[repr(C)]
pub union CRouteResultInner {
    pub ok: ManuallyDrop<CRouteResultOk>,
    pub unreachable: CRouteResultUnreachable,
    pub search: CRouteResultSearch,
    pub invalid_reference: CRouteResultInvalidReference,
    pub empty: (),
}

#[repr(C)]
pub struct CRouteResult {
    pub inner: CRouteResultInner,
    pub type_: CRouteResultType,
}

impl CRouteResult {
    fn ok(route: &ComputedRoute) -> Self {
        let mut nodes: Vec<i64> = route.nodes.iter().map(|n| n.id).collect();
        let ptr = nodes.as_mut_ptr();
        let len = nodes.len();
        let capacity = nodes.capacity();
        forget(nodes);

        CRouteResult {
            inner: CRouteResultInner {
                ok: ManuallyDrop::new(CRouteResultOk {
                    nodes: ptr,
                    len,
                    capacity,
                    total_distance: route.total_distance,
                    total_cost: route.total_cost,
                    elevation_gain: route.elevation_gain,
                    elevation_loss: route.elevation_loss,
                }),
            },
            type_: CRouteResultType::Ok,
        }
    }

    fn err(e: RouteError, points_len: usize) -> Self {
        match e {
            RouteError::UnreachableEndpoint { endpoint, .. } => {
                let point_index = match endpoint {
                    Endpoint::Start => 0,
                    Endpoint::End => points_len - 1,
                };
                Self::unreachable(point_index)
            }

            RouteError::UnreachableViaPoint { index, .. } => Self::unreachable(index + 1),

            RouteError::NoRoute {
                nodes_explored,
                closest_approach,
            } => Self::search(CRouteResultType::NoRoute, nodes_explored, closest_approach),

            RouteError::StepLimitExceeded {
                nodes_expanded,
                closest_approach,
            } => Self::search(
                CRouteResultType::StepLimitExceeded,
                nodes_expanded,
                closest_approach,
            ),

            RouteError::InvalidReference(invalid_node_id) => CRouteResult {
                inner: CRouteResultInner {
                    invalid_reference: CRouteResultInvalidReference { invalid_node_id },
                },
                type_: CRouteResultType::InvalidReference,
            },

            RouteError::ModeMismatch { .. } => Self::empty(CRouteResultType::ModeMismatch),
            RouteError::Cancelled { .. } => Self::empty(CRouteResultType::Cancelled),
            RouteError::Graph(_) => Self::empty(CRouteResultType::GraphError),
        }
    }

    fn unreachable(point_index: usize) -> Self {
        CRouteResult {
            inner: CRouteResultInner {
                unreachable: CRouteResultUnreachable { point_index },
            },
            type_: CRouteResultType::Unreachable,
        }
    }

    fn search(type_: CRouteResultType, nodes_explored: usize, closest_approach: f64) -> Self {
        CRouteResult {
            inner: CRouteResultInner {
                search: CRouteResultSearch {
                    nodes_explored,
                    closest_approach,
                },
            },
            type_,
        }
    }

    fn empty(type_: CRouteResultType) -> Self {
        CRouteResult {
            inner: CRouteResultInner { empty: () },
            type_,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct CCoordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Finds a route through `points_len` points, the first being the start and the last
/// the end of the route. Needs at least 2 points.
///
/// Zero `snap_radius` or `step_limit` select the defaults.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_find_route(
    graph: *const MemoryGraph,
    mode: CMode,
    points: *const CCoordinate,
    points_len: usize,
    snap_radius: f64,
    step_limit: usize,
) -> CRouteResult {
    let Some(graph) = graph.as_ref() else {
        return CRouteResult::empty(CRouteResultType::GraphError);
    };
    if points.is_null() || points_len < 2 {
        return CRouteResult::unreachable(0);
    }

    let points: Vec<Coordinate> = slice::from_raw_parts(points, points_len)
        .iter()
        .map(|p| Coordinate::new(p.lat, p.lon))
        .collect();
    let options = SearchOptions {
        snap_radius: if snap_radius > 0.0 { snap_radius } else { DEFAULT_SNAP_RADIUS },
        step_limit: if step_limit > 0 { step_limit } else { DEFAULT_STEP_LIMIT },
        cancel: None,
    };

    match find_route(
        graph,
        points[0],
        points[points_len - 1],
        &points[1..points_len - 1],
        mode.into(),
        &options,
    ) {
        Ok(route) => CRouteResult::ok(&route),
        Err(e) => CRouteResult::err(e, points_len),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_route_result_delete(result: CRouteResult) {
    if result.type_ == CRouteResultType::Ok {
        let ok = ManuallyDrop::into_inner(result.inner.ok);
        if !ok.nodes.is_null() {
            drop(Vec::from_raw_parts(ok.nodes, ok.len, ok.capacity));
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_earth_distance(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
) -> f64 {
    earth_distance(lat1, lon1, lat2, lon2)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_tile_from_coordinate(
    lat: f64,
    lon: f64,
    z: u8,
    out: *mut TileCoordinate,
) -> bool {
    match (TileCoordinate::from_coordinate(lat, lon, z), out.as_mut()) {
        (Ok(tile), Some(out)) => {
            *out = tile;
            true
        }
        _ => false,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_tile_from_tms(
    x: u32,
    tms_y: u32,
    z: u8,
    out: *mut TileCoordinate,
) -> bool {
    match (TileCoordinate::from_tms(x, tms_y, z), out.as_mut()) {
        (Ok(tile), Some(out)) => {
            *out = tile;
            true
        }
        _ => false,
    }
}

/// Returns the bottom-origin row of a tile, or `u32::MAX` for an invalid tile.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_tile_tms_y(tile: TileCoordinate) -> u32 {
    TileCoordinate::new(tile.x, tile.y, tile.z)
        .map(|t| t.tms_y())
        .unwrap_or(u32::MAX)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_tile_bounds(
    tile: TileCoordinate,
    out_bbox: *mut [f64; 4],
) -> bool {
    match (TileCoordinate::new(tile.x, tile.y, tile.z), out_bbox.as_mut()) {
        (Ok(tile), Some(out)) => {
            *out = tile.bounds();
            true
        }
        _ => false,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_tile_ground_resolution(lat: f64, z: u8) -> f64 {
    tile::ground_resolution(lat, z)
}

/// Counts tiles covering a bounding box across zoom levels, or returns 0 on invalid input.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_count_tiles(
    bbox: *const [f64; 4],
    min_z: u8,
    max_z: u8,
) -> u64 {
    bbox.as_ref()
        .and_then(|&bbox| tile::count_tiles(bbox, min_z, max_z).ok())
        .unwrap_or(0)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_tile_range(
    bbox: *const [f64; 4],
    z: u8,
    out: *mut TileRange,
) -> bool {
    match (bbox.as_ref(), out.as_mut()) {
        (Some(&bbox), Some(out)) => match TileRange::covering(bbox, z) {
            Ok(range) => {
                *out = range;
                true
            }
            Err(_) => false,
        },
        _ => false,
    }
}

/// Heap-allocated array handed over to C. Must be released with the matching
/// `*_delete` function.
#[repr(C)]
pub struct CArray<T> {
    pub data: *mut T,
    pub len: usize,
    pub capacity: usize,
}

impl<T> CArray<T> {
    fn from_vec(mut v: Vec<T>) -> Self {
        let array = CArray {
            data: v.as_mut_ptr(),
            len: v.len(),
            capacity: v.capacity(),
        };
        forget(v);
        array
    }

    fn null() -> Self {
        CArray {
            data: null_mut(),
            len: 0,
            capacity: 0,
        }
    }

    unsafe fn into_vec(self) -> Option<Vec<T>> {
        if self.data.is_null() {
            None
        } else {
            Some(Vec::from_raw_parts(self.data, self.len, self.capacity))
        }
    }
}

/// Encodes samples into a compressed track buffer. Returns a NULL buffer on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_track_encode(
    samples: *const TrackSample,
    samples_len: usize,
) -> CArray<u8> {
    let samples: &[TrackSample] = if samples.is_null() || samples_len == 0 {
        &[]
    } else {
        slice::from_raw_parts(samples, samples_len)
    };

    match track::encode(samples) {
        Ok(buf) => CArray::from_vec(buf),
        Err(e) => {
            log::warn!("failed to encode track: {e}");
            CArray::null()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_track_buffer_delete(buf: CArray<u8>) {
    drop(buf.into_vec());
}

/// Decodes a track buffer. Returns a NULL array if the buffer is invalid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_track_decode(
    data: *const u8,
    data_len: usize,
) -> CArray<TrackSample> {
    let data: &[u8] = if data.is_null() || data_len == 0 {
        &[]
    } else {
        slice::from_raw_parts(data, data_len)
    };

    match track::decode(data) {
        Ok(samples) => CArray::from_vec(samples),
        Err(e) => {
            log::warn!("failed to decode track: {e}");
            CArray::null()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_track_samples_delete(samples: CArray<TrackSample>) {
    drop(samples.into_vec());
}

/// Decodes a track buffer into an elevation profile. Returns a NULL array if the buffer is invalid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_track_profile(
    data: *const u8,
    data_len: usize,
) -> CArray<track::ProfilePoint> {
    let data: &[u8] = if data.is_null() || data_len == 0 {
        &[]
    } else {
        slice::from_raw_parts(data, data_len)
    };

    match track::extract_profile(data) {
        Ok(profile) => CArray::from_vec(profile),
        Err(e) => {
            log::warn!("failed to decode track: {e}");
            CArray::null()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn trailroute_track_profile_delete(profile: CArray<track::ProfilePoint>) {
    drop(profile.into_vec());
}
