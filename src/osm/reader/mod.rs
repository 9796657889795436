// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

use graph_builder::GraphBuilder;

use crate::{MemoryGraph, Mode};

mod graph_builder;
mod model;
mod xml;

/// Format of the input OSM file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Unknown format - guess the format based on the content
    #[default]
    Unknown,

    /// Force uncompressed [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    Xml,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    XmlGz,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    XmlBz2,
}

impl FileFormat {
    /// Guesses the format of a file based on its first few bytes.
    pub fn detect(prefix: &[u8]) -> Self {
        if prefix.starts_with(&[0x1F, 0x8B]) {
            FileFormat::XmlGz
        } else if prefix.starts_with(b"BZh") {
            FileFormat::XmlBz2
        } else {
            FileFormat::Xml
        }
    }
}

/// Error conditions which may occur while loading OSM data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Additional controls for interpreting OSM data as a routing [MemoryGraph].
#[derive(Debug, Clone)]
pub struct Options {
    /// Activity for which the graph is built. Ways not usable in this mode are skipped,
    /// and edge costs are computed with this mode's cost model.
    pub mode: Mode,

    /// Format of the input data.
    pub file_format: FileFormat,

    /// Filter features by a specific bounding box. In order: left (min lon), bottom (min lat),
    /// right (max lon), top (max lat). Ignored if all values are set to zero, or at least one
    /// of them is not finite.
    pub bbox: [f64; 4],
}

impl Options {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            file_format: FileFormat::Unknown,
            bbox: [0.0; 4],
        }
    }
}

/// Internal trait for objects which can stream [osm features](model::Feature)
/// from an underlying source.
trait FeatureReader {
    type Error;
    fn next(&mut self) -> Result<Option<model::Feature>, Self::Error>;
}

/// Parse OSM features from a reader into a [MemoryGraph] as per the provided [Options].
///
/// The provided stream will be automatically wrapped in a buffered reader when needed.
pub fn add_features_from_io<R: io::Read>(
    g: &mut MemoryGraph,
    options: &Options,
    reader: R,
) -> Result<(), Error> {
    let mut b = io::BufReader::new(reader);
    let format = match options.file_format {
        FileFormat::Unknown => FileFormat::detect(b.fill_buf()?),
        format => format,
    };

    match format {
        FileFormat::Unknown | FileFormat::Xml => {
            let r = xml::Reader::from_io(b);
            GraphBuilder::new(g, options).add_features(r)?;
        }

        FileFormat::XmlGz => {
            let d = flate2::bufread::MultiGzDecoder::new(b);
            let r = xml::Reader::from_io(io::BufReader::new(d));
            GraphBuilder::new(g, options).add_features(r)?;
        }

        FileFormat::XmlBz2 => {
            let d = bzip2::bufread::MultiBzDecoder::new(b);
            let r = xml::Reader::from_io(io::BufReader::new(d));
            GraphBuilder::new(g, options).add_features(r)?;
        }
    }

    Ok(())
}

/// Parse OSM features from a file at the provided path into a [MemoryGraph] as per the provided [Options].
pub fn add_features_from_file<P: AsRef<Path>>(
    g: &mut MemoryGraph,
    options: &Options,
    path: P,
) -> Result<(), Error> {
    let f = File::open(path)?;
    add_features_from_io(g, options, f)
}

/// Parse OSM features from a static buffer into a [MemoryGraph] as per the provided [Options].
pub fn add_features_from_buffer(
    g: &mut MemoryGraph,
    options: &Options,
    data: &[u8],
) -> Result<(), Error> {
    let format = match options.file_format {
        FileFormat::Unknown => FileFormat::detect(data),
        format => format,
    };

    if format == FileFormat::Xml {
        // Fast path is available for in-memory XML data
        let r = xml::Reader::from_buffer(data);
        GraphBuilder::new(g, options).add_features(r)?;
        Ok(())
    } else {
        // Wrap the buffer in a cursor and use the IO path
        let cursor = io::Cursor::new(data);
        add_features_from_io(g, options, cursor)
    }
}
