// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Compact binary encoding of recorded GPS tracks.
//!
//! Every sample is packed into a fixed 20-byte little-endian record:
//!
//! | Offset | Type  | Field                                       |
//! |--------|-------|---------------------------------------------|
//! | 0      | `f32` | latitude, degrees                           |
//! | 4      | `f32` | longitude, degrees                          |
//! | 8      | `f32` | altitude, meters                            |
//! | 12     | `f64` | timestamp, seconds since 2001-01-01T00:00Z  |
//!
//! Records are concatenated in sample order, and the whole buffer is compressed
//! with raw [DEFLATE](https://www.rfc-editor.org/rfc/rfc1951). The timestamp field is not
//! naturally aligned, so records are always (de)serialized byte-by-byte.
//!
//! Buffers written before compression was introduced are plain concatenated records;
//! [decode] accepts both.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::bufread::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::earth_distance;

/// Size of a single encoded [TrackSample], in bytes.
pub const SAMPLE_SIZE: usize = 20;

/// Unix time of the track timestamp epoch, 2001-01-01T00:00:00Z.
pub const REFERENCE_EPOCH_UNIX: f64 = 978_307_200.0;

/// Initial decompression buffer size, as a multiple of the compressed size.
const DECOMPRESSED_SIZE_HINT: usize = 10;

/// Decompressed buffers larger than this are rejected, and the input is
/// interpreted as uncompressed records instead.
const MAX_DECOMPRESSED_SIZE: usize = 256 << 20;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TrackError {
    /// The (decompressed) buffer length isn't a multiple of [SAMPLE_SIZE].
    #[error("invalid track buffer length {0} (expected a multiple of {SAMPLE_SIZE})")]
    InvalidLength(usize),

    #[error("io: {0}")]
    Io(#[from] Arc<io::Error>),
}

impl From<io::Error> for TrackError {
    fn from(e: io::Error) -> Self {
        TrackError::Io(Arc::new(e))
    }
}

/// A single recorded position.
///
/// Latitude, longitude and altitude are stored with single precision,
/// so [decode] returns them rounded to the nearest `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct TrackSample {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,

    /// Seconds since 2001-01-01T00:00:00Z.
    pub timestamp: f64,
}

impl TrackSample {
    pub fn new(lat: f64, lon: f64, altitude: f64, timestamp: f64) -> Self {
        Self {
            lat,
            lon,
            altitude,
            timestamp,
        }
    }

    /// Creates a sample with a timestamp expressed in seconds since the Unix epoch.
    pub fn from_unix_seconds(lat: f64, lon: f64, altitude: f64, unix_seconds: f64) -> Self {
        Self::new(lat, lon, altitude, unix_seconds - REFERENCE_EPOCH_UNIX)
    }

    /// Returns the timestamp as seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> f64 {
        self.timestamp + REFERENCE_EPOCH_UNIX
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.lat as f32).to_le_bytes());
        buf.extend_from_slice(&(self.lon as f32).to_le_bytes());
        buf.extend_from_slice(&(self.altitude as f32).to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
    }

    fn read_from(record: &[u8]) -> Self {
        Self {
            lat: f64::from(f32_at(record, 0)),
            lon: f64::from(f32_at(record, 4)),
            altitude: f64::from(f32_at(record, 8)),
            timestamp: f64_at(record, 12),
        }
    }
}

fn f32_at(record: &[u8], offset: usize) -> f32 {
    let mut b = [0; 4];
    b.copy_from_slice(&record[offset..offset + 4]);
    f32::from_le_bytes(b)
}

fn f64_at(record: &[u8], offset: usize) -> f64 {
    let mut b = [0; 8];
    b.copy_from_slice(&record[offset..offset + 8]);
    f64::from_le_bytes(b)
}

/// Packs samples into uncompressed records.
fn pack(samples: &[TrackSample]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * SAMPLE_SIZE);
    for sample in samples {
        sample.write_to(&mut buf);
    }
    buf
}

/// Parses uncompressed records.
fn unpack(buf: &[u8]) -> Result<Vec<TrackSample>, TrackError> {
    if buf.len() % SAMPLE_SIZE != 0 {
        return Err(TrackError::InvalidLength(buf.len()));
    }
    Ok(buf.chunks_exact(SAMPLE_SIZE).map(TrackSample::read_from).collect())
}

/// Attempts to decompress a buffer. Returns `None` if the input isn't a single, complete
/// DEFLATE stream of whole records.
fn inflate(compressed: &[u8]) -> Option<Vec<u8>> {
    let capacity = compressed
        .len()
        .saturating_mul(DECOMPRESSED_SIZE_HINT)
        .min(MAX_DECOMPRESSED_SIZE);
    let mut buf = Vec::with_capacity(capacity);

    let mut decoder = DeflateDecoder::new(compressed);
    let read = (&mut decoder)
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut buf);

    match read {
        Ok(n) if n <= MAX_DECOMPRESSED_SIZE
            && n % SAMPLE_SIZE == 0
            && decoder.get_ref().is_empty() =>
        {
            Some(buf)
        }
        _ => None,
    }
}

/// Encodes samples into a compressed buffer. An empty slice produces an empty buffer.
pub fn encode(samples: &[TrackSample]) -> Result<Vec<u8>, TrackError> {
    if samples.is_empty() {
        return Ok(Vec::default());
    }

    let raw = pack(samples);
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Decodes a buffer produced by [encode], or a legacy uncompressed buffer.
///
/// Fails only if the buffer isn't compressed and its length isn't a multiple of
/// [SAMPLE_SIZE].
pub fn decode(buf: &[u8]) -> Result<Vec<TrackSample>, TrackError> {
    if buf.is_empty() {
        return Ok(Vec::default());
    }

    let raw = match inflate(buf) {
        Some(decompressed) => Cow::Owned(decompressed),
        None => {
            log::debug!("track buffer of {} bytes is not compressed", buf.len());
            Cow::Borrowed(buf)
        }
    };
    unpack(&raw)
}

/// A single point of an elevation profile.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct ProfilePoint {
    /// Meters travelled since the first sample.
    pub distance: f64,
    pub elevation: f64,
}

/// Decodes a track and turns it into a distance-elevation profile.
pub fn extract_profile(buf: &[u8]) -> Result<Vec<ProfilePoint>, TrackError> {
    let samples = decode(buf)?;
    let mut distance = 0.0;
    let mut profile = Vec::with_capacity(samples.len());

    for (i, sample) in samples.iter().enumerate() {
        if i > 0 {
            let prev = &samples[i - 1];
            distance += earth_distance(prev.lat, prev.lon, sample.lat, sample.lon);
        }
        profile.push(ProfilePoint {
            distance,
            elevation: sample.altitude,
        });
    }

    Ok(profile)
}

/// Aggregate statistics of a recorded track.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackSummary {
    pub sample_count: usize,

    /// Length of the track, in meters.
    pub distance: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,

    /// Seconds between the first and last sample.
    pub duration: f64,

    /// Bounding box of all samples: `[min_lon, min_lat, max_lon, max_lat]`,
    /// or `None` for an empty track.
    pub bbox: Option<[f64; 4]>,
}

impl TrackSummary {
    pub fn of(samples: &[TrackSample]) -> Self {
        let mut summary = Self {
            sample_count: samples.len(),
            ..Default::default()
        };

        for pair in samples.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            summary.distance += earth_distance(a.lat, a.lon, b.lat, b.lon);

            let climb = b.altitude - a.altitude;
            if climb > 0.0 {
                summary.elevation_gain += climb;
            } else {
                summary.elevation_loss -= climb;
            }
        }

        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            summary.duration = last.timestamp - first.timestamp;
            summary.bbox = Some(samples.iter().fold(
                [first.lon, first.lat, first.lon, first.lat],
                |[min_lon, min_lat, max_lon, max_lat], s| {
                    [
                        min_lon.min(s.lon),
                        min_lat.min(s.lat),
                        max_lon.max(s.lon),
                        max_lat.max(s.lat),
                    ]
                },
            ));
        }

        summary
    }
}

/// Decodes a track and computes its [TrackSummary].
pub fn summarize(buf: &[u8]) -> Result<TrackSummary, TrackError> {
    decode(buf).map(|samples| TrackSummary::of(&samples))
}
