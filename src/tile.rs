// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Web-Mercator tile addressing, as used by slippy maps and offline tile archives.
//!
//! Tiles are addressed with the top-origin (XYZ) row convention, where `y = 0` is the
//! northernmost row. Offline tile archives use the bottom-origin (TMS) convention,
//! see [TileCoordinate::tms_y] and [TileCoordinate::from_tms].
//!
//! Bounding boxes are `[f64; 4]` arrays with, in order: left (min lon), bottom (min lat),
//! right (max lon), top (max lat).

use std::f64::consts::PI;

use crate::Coordinate;

/// Highest supported zoom level.
pub const MAX_ZOOM: u8 = 22;

/// Latitude limit of the Web-Mercator projection, in degrees.
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Meters per pixel of a 256-pixel tile at zoom 0 on the equator.
const EQUATOR_RESOLUTION: f64 = 156_543.033_92;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TileError {
    #[error("invalid zoom level {0} (max is {MAX_ZOOM})")]
    InvalidZoom(u8),

    #[error("tile {z}/{x}/{y} is out of range")]
    OutOfRange { x: u32, y: u32, z: u8 },
}

/// Address of a single map tile.
///
/// The fields are public to allow passing tiles over the C ABI. A tile built
/// by hand may be out of range; such a tile can be checked with [TileCoordinate::is_valid],
/// and its methods never panic, but return meaningless results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(C)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

/// Number of tiles along a single axis at the given zoom level,
/// saturating past zoom level 31.
#[inline]
fn tiles_per_side(z: u8) -> u32 {
    1_u32.checked_shl(u32::from(z)).unwrap_or(u32::MAX)
}

fn check_zoom(z: u8) -> Result<(), TileError> {
    if z > MAX_ZOOM {
        Err(TileError::InvalidZoom(z))
    } else {
        Ok(())
    }
}

/// Latitude (in degrees) of the northern edge of the tile row `y`.
fn row_latitude(y: u32, z: u8) -> f64 {
    let n = f64::from(tiles_per_side(z));
    (PI * (1.0 - 2.0 * f64::from(y) / n)).sinh().atan().to_degrees()
}

/// Longitude (in degrees) of the western edge of the tile column `x`.
fn column_longitude(x: u32, z: u8) -> f64 {
    let n = f64::from(tiles_per_side(z));
    f64::from(x) / n * 360.0 - 180.0
}

/// Meters per pixel of a 256-pixel tile at the given latitude and zoom level.
pub fn ground_resolution(lat: f64, z: u8) -> f64 {
    EQUATOR_RESOLUTION * lat.to_radians().cos() / 2_f64.powi(i32::from(z))
}

impl TileCoordinate {
    /// Creates a tile address, ensuring the zoom level and both indices are valid.
    pub fn new(x: u32, y: u32, z: u8) -> Result<Self, TileError> {
        check_zoom(z)?;
        let n = tiles_per_side(z);
        if x >= n || y >= n {
            return Err(TileError::OutOfRange { x, y, z });
        }
        Ok(Self { x, y, z })
    }

    /// Checks if the zoom level and both indices are in range,
    /// as guaranteed for tiles returned by constructors.
    pub fn is_valid(&self) -> bool {
        Self::new(self.x, self.y, self.z).is_ok()
    }

    /// Returns the tile containing the provided position at the given zoom level.
    ///
    /// Latitudes beyond ±[MAX_LATITUDE] and longitudes beyond ±180° are clamped,
    /// so only an invalid zoom level results in an error.
    pub fn from_coordinate(lat: f64, lon: f64, z: u8) -> Result<Self, TileError> {
        check_zoom(z)?;
        let n = f64::from(tiles_per_side(z));
        let max = n - 1.0;

        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let lon = lon.clamp(-180.0, 180.0);

        let x = ((lon + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - lat.to_radians().tan().asinh() / PI) / 2.0 * n).floor();

        Ok(Self {
            x: x.clamp(0.0, max) as u32,
            y: y.clamp(0.0, max) as u32,
            z,
        })
    }

    /// Creates a tile address from a bottom-origin (TMS) row number.
    pub fn from_tms(x: u32, tms_y: u32, z: u8) -> Result<Self, TileError> {
        check_zoom(z)?;
        let n = tiles_per_side(z);
        if tms_y >= n {
            return Err(TileError::OutOfRange { x, y: tms_y, z });
        }
        Self::new(x, n - 1 - tms_y, z)
    }

    /// Row number of this tile in the bottom-origin (TMS) convention.
    /// The conversion is its own inverse.
    pub fn tms_y(&self) -> u32 {
        (tiles_per_side(self.z) - 1).saturating_sub(self.y)
    }

    /// Returns the bounding box of this tile: `[min_lon, min_lat, max_lon, max_lat]`.
    pub fn bounds(&self) -> [f64; 4] {
        [
            column_longitude(self.x, self.z),
            row_latitude(self.y.saturating_add(1), self.z),
            column_longitude(self.x.saturating_add(1), self.z),
            row_latitude(self.y, self.z),
        ]
    }

    /// Returns the midpoint of the tile's [bounds](TileCoordinate::bounds).
    pub fn center(&self) -> Coordinate {
        let [min_lon, min_lat, max_lon, max_lat] = self.bounds();
        Coordinate::new((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0)
    }

    /// Checks if the provided position lies within this tile's bounds (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let [min_lon, min_lat, max_lon, max_lat] = self.bounds();
        (min_lat..=max_lat).contains(&lat) && (min_lon..=max_lon).contains(&lon)
    }

    /// Returns the tile one zoom level out containing this tile,
    /// or `None` at zoom level 0.
    pub fn parent(&self) -> Option<Self> {
        if self.z == 0 {
            None
        } else {
            Some(Self {
                x: self.x / 2,
                y: self.y / 2,
                z: self.z - 1,
            })
        }
    }

    /// Returns the four tiles one zoom level in covering this tile, in the order:
    /// top-left, top-right, bottom-left, bottom-right. Returns `None` at [MAX_ZOOM]
    /// and for invalid tiles.
    pub fn children(&self) -> Option<[Self; 4]> {
        if self.z >= MAX_ZOOM || !self.is_valid() {
            return None;
        }

        let (x, y, z) = (self.x * 2, self.y * 2, self.z + 1);
        Some([
            Self { x, y, z },
            Self { x: x + 1, y, z },
            Self { x, y: y + 1, z },
            Self { x: x + 1, y: y + 1, z },
        ])
    }

    /// Returns the up-to-eight tiles adjacent to this one at the same zoom level,
    /// in row-major order. Tiles past the edges of the map are omitted.
    pub fn neighbors(&self) -> Vec<Self> {
        let n = i64::from(tiles_per_side(self.z));
        let mut result = Vec::with_capacity(8);
        for dy in -1..=1_i64 {
            for dx in -1..=1_i64 {
                if dx == 0 && dy == 0 {
                    continue;
                }

                let x = i64::from(self.x) + dx;
                let y = i64::from(self.y) + dy;
                if (0..n).contains(&x) && (0..n).contains(&y) {
                    result.push(Self {
                        x: x as u32,
                        y: y as u32,
                        z: self.z,
                    });
                }
            }
        }
        result
    }

    /// Meters per pixel at the center of this tile.
    pub fn ground_resolution(&self) -> f64 {
        ground_resolution(self.center().lat, self.z)
    }

    /// Returns the [Bing Maps quadkey](https://learn.microsoft.com/en-us/bingmaps/articles/bing-maps-tile-system)
    /// of this tile. The quadkey of the zoom 0 tile is an empty string.
    pub fn quadkey(&self) -> String {
        (1..=self.z)
            .rev()
            .map(|i| {
                let mask = 1_u32.checked_shl(u32::from(i - 1)).unwrap_or(0);
                let mut digit = b'0';
                if self.x & mask != 0 {
                    digit += 1;
                }
                if self.y & mask != 0 {
                    digit += 2;
                }
                digit as char
            })
            .collect()
    }
}

impl std::fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Inclusive rectangle of tiles at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct TileRange {
    pub z: u8,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Returns the range of tiles covering a bounding box
    /// (`[min_lon, min_lat, max_lon, max_lat]`) at the given zoom level.
    pub fn covering(bbox: [f64; 4], z: u8) -> Result<Self, TileError> {
        let [lon_a, lat_a, lon_b, lat_b] = bbox;
        let top_left = TileCoordinate::from_coordinate(lat_a.max(lat_b), lon_a.min(lon_b), z)?;
        let bottom_right = TileCoordinate::from_coordinate(lat_a.min(lat_b), lon_a.max(lon_b), z)?;
        Ok(Self {
            z,
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: bottom_right.x,
            max_y: bottom_right.y,
        })
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> u64 {
        let width = u64::from(self.max_x.saturating_sub(self.min_x)) + 1;
        let height = u64::from(self.max_y.saturating_sub(self.min_y)) + 1;
        width * height
    }

    /// Always false: a range contains at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, tile: &TileCoordinate) -> bool {
        tile.z == self.z
            && (self.min_x..=self.max_x).contains(&tile.x)
            && (self.min_y..=self.max_y).contains(&tile.y)
    }

    /// Iterates over all tiles in the range, in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = TileCoordinate> + '_ {
        (self.min_y..=self.max_y).flat_map(move |y| {
            (self.min_x..=self.max_x).map(move |x| TileCoordinate { x, y, z: self.z })
        })
    }
}

/// Counts the tiles covering a bounding box (`[min_lon, min_lat, max_lon, max_lat]`)
/// across all zoom levels from `min_z` to `max_z`, inclusive.
pub fn count_tiles(bbox: [f64; 4], min_z: u8, max_z: u8) -> Result<u64, TileError> {
    check_zoom(max_z)?;
    (min_z..=max_z).try_fold(0_u64, |total, z| {
        TileRange::covering(bbox, z).map(|range| total + range.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr, $eps:expr) => {
            assert!(
                (($a - $b).abs() < $eps),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    /// Deterministic pseudo-random generator yielding values in `[0, 1)`.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> f64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1_u64 << 53) as f64
        }
    }

    #[test]
    fn validation() {
        assert!(TileCoordinate::new(0, 0, 0).is_ok());
        assert!(TileCoordinate::new(3, 3, 2).is_ok());
        assert_eq!(
            TileCoordinate::new(4, 0, 2),
            Err(TileError::OutOfRange { x: 4, y: 0, z: 2 })
        );
        assert_eq!(TileCoordinate::new(0, 0, 23), Err(TileError::InvalidZoom(23)));
        assert_eq!(
            TileCoordinate::from_coordinate(0.0, 0.0, 30),
            Err(TileError::InvalidZoom(30))
        );
    }

    #[test]
    fn known_tiles() {
        let t = TileCoordinate::from_coordinate(46.5580, 7.8350, 14).unwrap();
        assert_eq!(t, TileCoordinate { x: 8548, y: 5792, z: 14 });
        assert_eq!(t.to_string(), "14/8548/5792");

        let t = TileCoordinate::from_coordinate(0.0, 0.0, 1).unwrap();
        assert_eq!(t, TileCoordinate { x: 1, y: 1, z: 1 });
    }

    #[test]
    fn round_trip_contains_point() {
        let mut rng = Lcg(42);
        for _ in 0..2000 {
            let lat = rng.next() * 170.0 - 85.0;
            let lon = rng.next() * 360.0 - 180.0;
            let z = (rng.next() * f64::from(MAX_ZOOM + 1)) as u8;

            let t = TileCoordinate::from_coordinate(lat, lon, z).unwrap();
            let [min_lon, min_lat, max_lon, max_lat] = t.bounds();
            assert!(
                lat >= min_lat - 1e-9 && lat <= max_lat + 1e-9,
                "{lat} not in [{min_lat}, {max_lat}] for {t}"
            );
            assert!(
                lon >= min_lon - 1e-9 && lon <= max_lon + 1e-9,
                "{lon} not in [{min_lon}, {max_lon}] for {t}"
            );
        }
    }

    #[test]
    fn clamps_at_projection_edges() {
        for z in [0, 1, 5, 12, MAX_ZOOM] {
            let n = 1_u32 << z;

            let north = TileCoordinate::from_coordinate(90.0, 0.0, z).unwrap();
            assert_eq!(north.y, 0);

            let south = TileCoordinate::from_coordinate(-90.0, 0.0, z).unwrap();
            assert_eq!(south.y, n - 1);

            let east = TileCoordinate::from_coordinate(0.0, 180.0, z).unwrap();
            assert_eq!(east.x, n - 1);

            let beyond = TileCoordinate::from_coordinate(0.0, 200.0, z).unwrap();
            assert_eq!(beyond.x, n - 1);

            let west = TileCoordinate::from_coordinate(0.0, -180.0, z).unwrap();
            assert_eq!(west.x, 0);
        }
    }

    #[test]
    fn tms_conversion() {
        let t = TileCoordinate::new(8548, 5792, 14).unwrap();
        assert_eq!(t.tms_y(), 16383 - 5792);
        assert_eq!(TileCoordinate::from_tms(t.x, t.tms_y(), t.z), Ok(t));

        let flipped = TileCoordinate::new(t.x, t.tms_y(), t.z).unwrap();
        assert_eq!(flipped.tms_y(), t.y);

        assert_eq!(TileCoordinate::new(0, 0, 0).unwrap().tms_y(), 0);
        assert_eq!(TileCoordinate::new(0, 0, 1).unwrap().tms_y(), 1);
        assert_eq!(
            TileCoordinate::from_tms(0, 2, 1),
            Err(TileError::OutOfRange { x: 0, y: 2, z: 1 })
        );
    }

    #[test]
    fn hand_built_invalid_tiles() {
        let deep = TileCoordinate { x: 0, y: 0, z: 40 };
        assert!(!deep.is_valid());
        assert_eq!(deep.tms_y(), u32::MAX - 1);
        assert!(deep.children().is_none());
        assert_eq!(deep.quadkey().len(), 40);
        assert!(!deep.neighbors().is_empty());

        let past_last_row = TileCoordinate { x: 0, y: 9, z: 2 };
        assert!(!past_last_row.is_valid());
        assert_eq!(past_last_row.tms_y(), 0);
        assert!(past_last_row.children().is_none());

        let past_last_column = TileCoordinate { x: u32::MAX, y: u32::MAX, z: 22 };
        assert!(past_last_column.bounds().iter().all(|c| c.is_finite()));

        assert!(TileCoordinate::new(3, 3, 2).unwrap().is_valid());
    }

    #[test]
    fn parent_and_children() {
        let t = TileCoordinate::new(5, 6, 3).unwrap();
        assert_eq!(t.parent(), Some(TileCoordinate { x: 2, y: 3, z: 2 }));
        assert_eq!(TileCoordinate::new(0, 0, 0).unwrap().parent(), None);

        let children = t.children().unwrap();
        assert_eq!(
            children,
            [
                TileCoordinate { x: 10, y: 12, z: 4 },
                TileCoordinate { x: 11, y: 12, z: 4 },
                TileCoordinate { x: 10, y: 13, z: 4 },
                TileCoordinate { x: 11, y: 13, z: 4 },
            ]
        );
        for child in children {
            assert_eq!(child.parent(), Some(t));
        }

        assert_eq!(TileCoordinate::new(0, 0, MAX_ZOOM).unwrap().children(), None);
    }

    #[test]
    fn neighbors() {
        let t = TileCoordinate::new(5, 6, 3).unwrap();
        let n = t.neighbors();
        assert_eq!(n.len(), 8);
        assert_eq!(n[0], TileCoordinate { x: 4, y: 5, z: 3 });
        assert_eq!(n[7], TileCoordinate { x: 6, y: 7, z: 3 });
        assert!(!n.contains(&t));

        assert_eq!(TileCoordinate::new(0, 0, 3).unwrap().neighbors().len(), 3);
        assert_eq!(TileCoordinate::new(7, 3, 3).unwrap().neighbors().len(), 5);
        assert!(TileCoordinate::new(0, 0, 0).unwrap().neighbors().is_empty());
    }

    #[test]
    fn resolution() {
        assert_almost_eq!(ground_resolution(0.0, 0), 156_543.033_92, 1e-6);
        assert_almost_eq!(ground_resolution(60.0, 0), 78_271.516_96, 1e-6);
        assert_almost_eq!(ground_resolution(0.0, 10), 152.874_056_562_5, 1e-6);

        let t = TileCoordinate::from_coordinate(46.5580, 7.8350, 14).unwrap();
        assert_almost_eq!(t.ground_resolution(), ground_resolution(t.center().lat, 14), 1e-9);
        assert!(t.ground_resolution() < ground_resolution(0.0, 14));
    }

    #[test]
    fn quadkeys() {
        assert_eq!(TileCoordinate::new(0, 0, 0).unwrap().quadkey(), "");
        assert_eq!(TileCoordinate::new(3, 5, 3).unwrap().quadkey(), "213");
        assert_eq!(TileCoordinate::new(1, 0, 1).unwrap().quadkey(), "1");
    }

    #[test]
    fn center_is_inside() {
        let t = TileCoordinate::new(8548, 5792, 14).unwrap();
        let c = t.center();
        assert!(t.contains(c.lat, c.lon));
        assert_eq!(TileCoordinate::from_coordinate(c.lat, c.lon, 14), Ok(t));
    }

    #[test]
    fn coverage() {
        let world = [-180.0, -MAX_LATITUDE, 180.0, MAX_LATITUDE];
        assert_eq!(TileRange::covering(world, 0).unwrap().len(), 1);
        assert_eq!(TileRange::covering(world, 2).unwrap().len(), 16);
        assert_eq!(count_tiles(world, 0, 3), Ok(1 + 4 + 16 + 64));

        let bbox = [7.8350, 46.5580, 7.8490, 46.5710];
        for z in 0..=16 {
            let range = TileRange::covering(bbox, z).unwrap();
            let tiles: Vec<_> = range.iter().collect();
            assert_eq!(tiles.len() as u64, range.len());
            assert!(tiles.iter().all(|t| range.contains(t)));

            let corner = TileCoordinate::from_coordinate(46.5580, 7.8350, z).unwrap();
            assert!(range.contains(&corner));
        }

        // Swapped corners cover the same range
        let swapped = [7.8490, 46.5710, 7.8350, 46.5580];
        assert_eq!(
            TileRange::covering(bbox, 12),
            TileRange::covering(swapped, 12)
        );

        assert_eq!(count_tiles(bbox, 0, 23), Err(TileError::InvalidZoom(23)));
        assert_eq!(count_tiles(bbox, 5, 4), Ok(0));
    }
}
