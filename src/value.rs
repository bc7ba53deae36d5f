//! Dynamic values returned by MythTV service operations
//!
//! Response shapes are dictated by the remote WSDL, so results are kept as
//! a small tree of text, lists and ordered structures instead of per-call
//! Rust types.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// `xsi:nil` or a field the backend didn't send
    Null,
    Text(String),
    List(Vec<Value>),
    Struct(IndexMap<String, Value>),
}

pub(crate) static NULL: Value = Value::Null;

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Member of a structure, `Null` when absent or not a structure.
    pub fn get(&self, key: &str) -> &Value {
        match self {
            Value::Struct(map) => map.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Items of a list. A lone structure counts as a one-item list and
    /// `Null` as an empty one, which absorbs arrays the backend collapsed.
    pub fn items(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// Scalar rendering used for filtering and table output.
    pub fn to_field_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            other => other.to_json(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Value::Null | Value::Text(_) => writeln!(f, "{}", self.to_field_string()),
            Value::List(items) => {
                writeln!(f)?;
                for item in items {
                    write!(f, "{}- ", pad)?;
                    match item {
                        Value::Struct(_) | Value::List(_) => item.write_tree(f, indent + 1)?,
                        _ => writeln!(f, "{}", item.to_field_string())?,
                    }
                }
                Ok(())
            }
            Value::Struct(map) => {
                writeln!(f)?;
                for (key, value) in map {
                    write!(f, "{}{}: ", pad, key)?;
                    value.write_tree(f, indent + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            _ => self.write_tree(f, 0),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
