//! EPG (Electronic Program Guide) module
//!
//! Reads the channel list of an XMLTV guide, which maps broadcast names
//! to the XMLTV ids the backend stores per channel.

mod parser;

pub use parser::{XmltvChannel, XmltvData, XmltvParser};
