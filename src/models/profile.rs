//! Backend profile (Myth service)
//!
//! `ProfileText` returns a free-form report. Its features are sections of
//! the form
//!
//! ```text
//! - <feature>:
//!     <value>
//! ```
//!
//! and are read on demand, each coerced to its declared kind.

use indexmap::IndexMap;
use regex::Regex;
use std::fmt;

use super::literal::parse_literal;
use super::{Record, RecordClass, ServiceDefinition};
use crate::backend::Backend;
use crate::error::{MythError, Result};
use crate::value::Value;

pub static PROFILE: ServiceDefinition = ServiceDefinition {
    name: "Profile",
    service: "Myth",
    get_operation: Some("ProfileText"),
    get_keys: &[],
    primary_key: &[],
    post_operation: None,
    post_mapping: &[],
    keys: &["text"],
    writable: &[],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Str,
    Int,
    Float,
    /// Python literal (dict, list, tuple, ...)
    Literal,
}

impl FeatureKind {
    fn label(self) -> &'static str {
        match self {
            FeatureKind::Str => "str",
            FeatureKind::Int => "int",
            FeatureKind::Float => "float",
            FeatureKind::Literal => "literal",
        }
    }
}

pub const FEATURES: &[(&str, FeatureKind)] = &[
    ("audio", FeatureKind::Literal),
    ("branch", FeatureKind::Str),
    ("channel_count", FeatureKind::Int),
    ("country", FeatureKind::Str),
    ("database", FeatureKind::Literal),
    ("grabbers", FeatureKind::Literal),
    ("historical", FeatureKind::Literal),
    ("language", FeatureKind::Str),
    ("libapi", FeatureKind::Str),
    ("logurgency", FeatureKind::Literal),
    ("mythtype", FeatureKind::Int),
    ("playbackprofile", FeatureKind::Literal),
    ("protocol", FeatureKind::Int),
    ("qtversion", FeatureKind::Str),
    ("recordings", FeatureKind::Literal),
    ("remote", FeatureKind::Str),
    ("scheduler", FeatureKind::Literal),
    ("sourcecount", FeatureKind::Int),
    ("storage", FeatureKind::Literal),
    ("theme", FeatureKind::Str),
    ("timezone", FeatureKind::Str),
    ("tuners", FeatureKind::Literal),
    ("tzoffset", FeatureKind::Int),
    ("uuid", FeatureKind::Str),
    ("version", FeatureKind::Str),
    ("vtpertuner", FeatureKind::Float),
];

/// A coerced profile feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Str(String),
    Int(i64),
    Float(f64),
    Literal(serde_json::Value),
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Str(s) => f.write_str(s),
            Feature::Int(i) => write!(f, "{}", i),
            Feature::Float(x) => write!(f, "{}", x),
            Feature::Literal(v) => write!(f, "{}", v),
        }
    }
}

pub struct ProfileClass;

impl RecordClass for ProfileClass {
    fn definition(&self) -> &'static ServiceDefinition {
        &PROFILE
    }

    /// The backend has exactly one profile.
    fn all<'a>(&self, backend: &'a Backend) -> Result<Vec<Record<'a>>> {
        let text = backend.service_api("Myth")?.call("ProfileText", &[])?;
        let mut fields = IndexMap::new();
        fields.insert("text".to_string(), Value::from(text.to_field_string()));
        Ok(vec![Record::new(&PROFILE, backend, fields)])
    }
}

/// Typed view of the profile record.
#[derive(Debug, Clone)]
pub struct Profile<'a> {
    record: Record<'a>,
}

impl<'a> Profile<'a> {
    pub fn fetch(backend: &'a Backend) -> Result<Self> {
        let record = ProfileClass
            .all(backend)?
            .into_iter()
            .next()
            .ok_or_else(|| MythError::FeatureNotFound("text".to_string()))?;
        Ok(Self { record })
    }

    pub fn from_record(record: Record<'a>) -> Self {
        Self { record }
    }

    pub fn text(&self) -> String {
        self.record
            .fields()
            .get("text")
            .map(Value::to_field_string)
            .unwrap_or_default()
    }

    /// Raw text of the `- name:` section.
    pub fn raw_feature(&self, name: &str) -> Result<String> {
        let text = self.text();
        let pattern = Regex::new(&format!("(?m)^- {}:", regex::escape(name)))
            .map_err(|e| MythError::InvalidPattern { pattern: name.to_string(), source: e })?;
        let found = pattern
            .find(&text)
            .ok_or_else(|| MythError::FeatureNotFound(name.to_string()))?;

        // The value sits on the line after the heading
        let rest = text.get(found.end() + 1..).unwrap_or_default();
        let line = rest.split('\n').next().unwrap_or_default();
        Ok(line.trim().to_string())
    }

    /// Named feature, coerced to its declared kind.
    pub fn feature(&self, name: &str) -> Result<Feature> {
        let kind = FEATURES
            .iter()
            .find(|(feature, _)| *feature == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| MythError::UnknownAttribute {
                class: PROFILE.name.to_string(),
                name: name.to_string(),
            })?;
        let raw = strip_long_suffix(&self.raw_feature(name)?);
        coerce(name, kind, &raw)
    }

    pub fn branch(&self) -> Result<String> {
        self.feature("branch").map(|f| f.to_string())
    }

    pub fn version(&self) -> Result<String> {
        self.feature("version").map(|f| f.to_string())
    }

    pub fn record(&self) -> &Record<'a> {
        &self.record
    }
}

/// Drop the `L` that old profile reports append to long integers
/// (6 or more digits).
fn strip_long_suffix(raw: &str) -> String {
    match Regex::new(r"([0-9]{6,})L") {
        Ok(re) => re.replace_all(raw, "$1").into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn coerce(name: &str, kind: FeatureKind, raw: &str) -> Result<Feature> {
    let fail = |message: String| MythError::Coercion {
        name: name.to_string(),
        kind: kind.label(),
        message,
    };
    match kind {
        FeatureKind::Str => Ok(Feature::Str(raw.to_string())),
        FeatureKind::Int => raw.parse().map(Feature::Int).map_err(|e| fail(format!("{} ({:?})", e, raw))),
        FeatureKind::Float => raw.parse().map(Feature::Float).map_err(|e| fail(format!("{} ({:?})", e, raw))),
        FeatureKind::Literal => parse_literal(raw).map(Feature::Literal).map_err(fail),
    }
}
