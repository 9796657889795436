// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::io;
use std::str::from_utf8;

use quick_xml::events::{BytesStart, Event};

use super::model;
use super::FeatureReader;

/// Parser is a trait for objects which can parse XML.
///
/// This trait only exists to fix the mismatch of
/// [quick_xml::Reader::read_event] when working on buffered data
/// and [quick_xml::Reader::read_event_into] when working on IO.
pub(super) trait Parser {
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>>;
}

/// IoParser implements [Parser] over an [std::io::BufRead].
pub(super) struct IoParser<R: io::BufRead>(quick_xml::Reader<R>, Vec<u8>);

impl<R: io::BufRead> IoParser<R> {
    #[inline]
    fn new(reader: R) -> Self {
        Self(quick_xml::Reader::from_reader(reader), Vec::default())
    }
}

impl<R: io::BufRead> Parser for IoParser<R> {
    #[inline]
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>> {
        self.1.clear();
        self.0.read_event_into(&mut self.1)
    }
}

/// BufParser implements [Parser] over a slice of bytes (`&[u8]`).
pub(super) struct BufParser<'a>(quick_xml::Reader<&'a [u8]>);

impl<'a> BufParser<'a> {
    #[inline]
    fn new(data: &'a [u8]) -> Self {
        Self(quick_xml::Reader::from_reader(data))
    }
}

impl Parser for BufParser<'_> {
    #[inline]
    fn read_event<'b>(&'b mut self) -> quick_xml::Result<Event<'b>> {
        self.0.read_event()
    }
}

/// Reader reads [OSM features](model::Feature) from an XML file.
pub(super) struct Reader<P: Parser> {
    parser: P,
    eof: bool,
}

impl<P: Parser> Reader<P> {
    #[inline]
    fn new(parser: P) -> Self {
        Self { parser, eof: false }
    }
}

impl<'a> Reader<BufParser<'a>> {
    #[inline]
    pub(super) fn from_buffer(data: &'a [u8]) -> Self {
        Self::new(BufParser::new(data))
    }
}

impl<R: io::BufRead> Reader<IoParser<R>> {
    #[inline]
    pub(super) fn from_io(reader: R) -> Self {
        Self::new(IoParser::new(reader))
    }
}

impl<P: Parser> FeatureReader for Reader<P> {
    type Error = quick_xml::Error;

    fn next(&mut self) -> Result<Option<model::Feature>, Self::Error> {
        let mut f: Option<model::Feature> = None;

        while !self.eof {
            match self.parser.read_event()? {
                Event::Empty(start) => match start.local_name().as_ref() {
                    b"node" => {
                        if let Some(n) = parse_node(&start) {
                            return Ok(Some(model::Feature::Node(n)));
                        }
                    }
                    // "way" can't be self-closing
                    b"tag" => {
                        if let Some(tags) = feature_tags(&mut f) {
                            if let Some((k, v)) = parse_tag(&start) {
                                tags.insert(k, v);
                            }
                        }
                    }
                    b"nd" => {
                        if let Some(nodes) = feature_nodes(&mut f) {
                            if let Some(ref_) = parse_nd(&start) {
                                nodes.push(ref_);
                            }
                        }
                    }
                    _ => {}
                },

                Event::Start(start) => match start.local_name().as_ref() {
                    b"node" => f = parse_node(&start).map(model::Feature::Node),
                    b"way" => f = parse_way(&start).map(model::Feature::Way),
                    // "tag" and "nd" must be self-closing; relations are not needed
                    _ => {}
                },

                Event::End(end) => match end.local_name().as_ref() {
                    b"node" | b"way" => {
                        if let Some(f) = f.take() {
                            return Ok(Some(f));
                        }
                    }
                    _ => {}
                },

                Event::Eof => {
                    self.eof = true;
                }

                _ => {}
            }
        }

        Ok(f)
    }
}

fn parse_id(start: &BytesStart<'_>) -> Option<i64> {
    start
        .try_get_attribute("id")
        .ok()
        .flatten()
        .and_then(|attr| from_utf8(&attr.value).ok()?.parse().ok())
}

fn parse_node(start: &BytesStart<'_>) -> Option<model::Node> {
    let mut id: i64 = 0;
    let mut lat = f64::NAN;
    let mut lon = f64::NAN;

    for attr in start.attributes() {
        let Ok(attr) = attr else { continue };
        let value = from_utf8(&attr.value).ok();
        match attr.key.as_ref() {
            b"id" => id = value.and_then(|v| v.parse().ok()).unwrap_or(0),
            b"lat" => lat = value.and_then(|v| v.parse().ok()).unwrap_or(f64::NAN),
            b"lon" => lon = value.and_then(|v| v.parse().ok()).unwrap_or(f64::NAN),
            _ => {}
        }
    }

    if id != 0 && lat.is_finite() && lon.is_finite() {
        Some(model::Node {
            id,
            lat,
            lon,
            tags: HashMap::default(),
        })
    } else {
        log::warn!("skipping node with invalid id or position (id={id}, lat={lat}, lon={lon})");
        None
    }
}

fn parse_way(start: &BytesStart<'_>) -> Option<model::Way> {
    match parse_id(start) {
        Some(id) if id != 0 => Some(model::Way {
            id,
            nodes: Vec::default(),
            tags: HashMap::default(),
        }),
        _ => {
            log::warn!("skipping way without a valid id");
            None
        }
    }
}

fn parse_tag(start: &BytesStart<'_>) -> Option<(String, String)> {
    let mut k = None;
    let mut v = None;

    for attr in start.attributes() {
        let Ok(attr) = attr else { continue };
        match attr.key.as_ref() {
            b"k" => k = attr.unescape_value().ok().map(|s| s.into_owned()),
            b"v" => v = attr.unescape_value().ok().map(|s| s.into_owned()),
            _ => {}
        }
    }

    k.map(|k| (k, v.unwrap_or_default()))
}

fn parse_nd(start: &BytesStart<'_>) -> Option<i64> {
    let attr = start.try_get_attribute("ref").ok()??;
    match from_utf8(&attr.value).ok()?.parse() {
        Ok(0) | Err(_) => None,
        Ok(ref_) => Some(ref_),
    }
}

fn feature_tags(f: &mut Option<model::Feature>) -> Option<&mut HashMap<String, String>> {
    match f {
        None => None,
        Some(model::Feature::Node(ref mut n)) => Some(&mut n.tags),
        Some(model::Feature::Way(ref mut w)) => Some(&mut w.tags),
    }
}

fn feature_nodes(f: &mut Option<model::Feature>) -> Option<&mut Vec<i64>> {
    match f {
        Some(model::Feature::Way(ref mut w)) => Some(&mut w.nodes),
        _ => None,
    }
}
