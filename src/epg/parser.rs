//! XMLTV channel reader
//! Streams a guide file and keeps only the `<channel>` headers (id and
//! first display name); programmes are skipped.
//! Supports both plain XML and gzip-compressed (.xml.gz) files

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

use crate::error::{MythError, Result};
use crate::xml::decode_xml_entities;

/// Stop after this many malformed elements.
const MAX_ERRORS: usize = 50;

/// One `<channel>` of the guide.
#[derive(Debug, Clone, PartialEq)]
pub struct XmltvChannel {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct XmltvData {
    pub channels: Vec<XmltvChannel>,
    pub parse_errors: Vec<String>,
}

impl XmltvData {
    /// Display name -> XMLTV id. A name used twice keeps the later id.
    pub fn callsigns(&self) -> BTreeMap<String, String> {
        self.channels
            .iter()
            .filter(|c| !c.display_name.is_empty())
            .map(|c| (c.display_name.clone(), c.id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    DisplayName,
}

pub struct XmltvParser;

impl XmltvParser {
    pub fn parse(xml: &str) -> Result<XmltvData> {
        Self::parse_reader(SanitizingReader::new(xml.as_bytes()))
    }

    pub fn parse_reader<R: BufRead>(reader: R) -> Result<XmltvData> {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(false);

        let mut data = XmltvData::default();
        let mut buf = Vec::with_capacity(8192);
        let mut state = ParserState::Root;
        let mut current: Option<XmltvChannel> = None;
        let mut text_buf = String::new();

        loop {
            let position = xml_reader.buffer_position();
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"channel" => {
                        state = ParserState::Channel;
                        current = Some(XmltvChannel {
                            id: get_attribute(e, b"id").unwrap_or_default(),
                            display_name: String::new(),
                        });
                    }
                    b"display-name" if state == ParserState::Channel => {
                        state = ParserState::DisplayName;
                        text_buf.clear();
                    }
                    _ => {}
                },
                Ok(Event::Empty(ref e)) if e.name().as_ref() == b"channel" => {
                    // <channel id="..."/> carries no name
                    state = ParserState::Root;
                }
                Ok(Event::Text(e)) if state == ParserState::DisplayName => {
                    text_buf.push_str(&decode_xml_entities(&String::from_utf8_lossy(e.as_ref())));
                }
                Ok(Event::GeneralRef(e)) if state == ParserState::DisplayName => {
                    let name = String::from_utf8_lossy(e.as_ref()).to_string();
                    text_buf.push_str(&decode_xml_entities(&format!("&{};", name)));
                }
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"display-name" if state == ParserState::DisplayName => {
                        if let Some(ref mut channel) = current {
                            if channel.display_name.is_empty() {
                                channel.display_name = text_buf.trim().to_string();
                            }
                        }
                        state = ParserState::Channel;
                    }
                    b"channel" => {
                        if let Some(channel) = current.take() {
                            if !channel.id.is_empty() {
                                data.channels.push(channel);
                            }
                        }
                        state = ParserState::Root;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    let message = format!("XML error at byte {}: {}", position, e);
                    warn!("{}", message);
                    data.parse_errors.push(message);
                    if data.parse_errors.len() >= MAX_ERRORS {
                        break;
                    }
                    // Skip the malformed channel
                    current = None;
                    state = ParserState::Root;
                    text_buf.clear();
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(data)
    }

    /// Parse a guide file, detecting gzip compression from its magic bytes.
    pub fn parse_file(path: &Path) -> Result<XmltvData> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(64 * 1024, file);

        let mut magic = [0u8; 2];
        let is_gzip = match reader.read_exact(&mut magic) {
            Ok(()) => magic == [0x1f, 0x8b],
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(MythError::Io(e)),
        };
        reader.seek(SeekFrom::Start(0))?;

        if is_gzip {
            let decoder = BufReader::with_capacity(64 * 1024, GzDecoder::new(reader));
            Self::parse_reader(SanitizingReader::new(decoder))
        } else {
            Self::parse_reader(SanitizingReader::new(reader))
        }
    }
}

fn get_attribute(e: &quick_xml::events::BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| decode_xml_entities(&String::from_utf8_lossy(attr.value.as_ref())))
}

/// Reader that makes real-world guide files acceptable to the XML parser:
/// control characters other than tab/CR/LF become spaces, and `&` that
/// doesn't start an entity is escaped. A trailing `&` whose entity may
/// continue in the next chunk is held back until that chunk arrives.
struct SanitizingReader<R> {
    inner: R,
    chunk: Vec<u8>,
    pending: Vec<u8>,
    out: Vec<u8>,
    pos: usize,
    eof: bool,
}

/// Longest entity we look ahead for, `&` and `;` included.
const ENTITY_WINDOW: usize = 12;

impl<R: Read> SanitizingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            chunk: vec![0u8; 64 * 1024],
            pending: Vec::new(),
            out: Vec::with_capacity(96 * 1024),
            pos: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> std::io::Result<()> {
        self.out.clear();
        self.pos = 0;
        while self.out.is_empty() && !(self.eof && self.pending.is_empty()) {
            let n = if self.eof { 0 } else { self.inner.read(&mut self.chunk)? };
            if n == 0 {
                self.eof = true;
            }
            let mut data = std::mem::take(&mut self.pending);
            data.extend_from_slice(&self.chunk[..n]);
            self.sanitize(&data);
        }
        Ok(())
    }

    fn sanitize(&mut self, data: &[u8]) {
        let mut i = 0;
        while i < data.len() {
            let b = data[i];
            if b == b'&' {
                match entity_status(&data[i..]) {
                    Entity::Valid => self.out.push(b'&'),
                    Entity::Bare => self.out.extend_from_slice(b"&amp;"),
                    Entity::Incomplete if !self.eof => {
                        self.pending.extend_from_slice(&data[i..]);
                        return;
                    }
                    Entity::Incomplete => self.out.extend_from_slice(b"&amp;"),
                }
            } else {
                self.out.push(match b {
                    0x09 | 0x0A | 0x0D => b,
                    0x00..=0x1F | 0x7F => b' ',
                    _ => b,
                });
            }
            i += 1;
        }
    }
}

enum Entity {
    Valid,
    Bare,
    /// Input ends before the entity could be decided
    Incomplete,
}

fn entity_status(bytes: &[u8]) -> Entity {
    for (i, &b) in bytes.iter().enumerate().skip(1).take(ENTITY_WINDOW - 1) {
        match b {
            b';' => return if i > 1 { Entity::Valid } else { Entity::Bare },
            b'#' if i == 1 => {}
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => {}
            _ => return Entity::Bare,
        }
    }
    if bytes.len() < ENTITY_WINDOW {
        Entity::Incomplete
    } else {
        Entity::Bare
    }
}

impl<R: Read> Read for SanitizingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for SanitizingReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.pos >= self.out.len() {
            self.refill()?;
        }
        Ok(&self.out[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.out.len());
    }
}
