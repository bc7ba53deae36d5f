//! Record façade over the backend services
//!
//! Each record type is described by a static `ServiceDefinition` (fields,
//! writable subset, fetch and save operations, field renames for the save
//! call) and a `RecordClass` that knows how to enumerate its instances.
//! Fetched instances are generic `Record`s; typed views such as
//! `ChannelInfo` sit on top for the workflows that need them.

mod channel;
mod literal;
mod profile;

pub use channel::{ChannelInfo, ChannelInfoClass, ChannelUpdate, VideoSourceClass, CHANNEL_INFO, VIDEO_SOURCE};
pub use literal::parse_literal;
pub use profile::{Feature, FeatureKind, Profile, ProfileClass, PROFILE};

use indexmap::IndexMap;
use std::fmt;

use crate::backend::Backend;
use crate::error::{MythError, Result};
use crate::value::{Value, NULL};

/// Static description of one record type.
#[derive(Debug)]
pub struct ServiceDefinition {
    pub name: &'static str,
    /// Backend service that owns the record type
    pub service: &'static str,
    /// Operation fetching one record, and its key parameters
    pub get_operation: Option<&'static str>,
    pub get_keys: &'static [&'static str],
    /// Fields identifying a record, for display
    pub primary_key: &'static [&'static str],
    pub post_operation: Option<&'static str>,
    /// Field name -> parameter name of the save operation
    pub post_mapping: &'static [(&'static str, &'static str)],
    pub keys: &'static [&'static str],
    pub writable: &'static [&'static str],
}

impl ServiceDefinition {
    pub fn has_field(&self, name: &str) -> bool {
        self.keys.contains(&name)
    }

    pub fn is_writable(&self, name: &str) -> bool {
        self.writable.contains(&name)
    }
}

/// One fetched record.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    definition: &'static ServiceDefinition,
    backend: &'a Backend,
    fields: IndexMap<String, Value>,
}

impl<'a> Record<'a> {
    pub fn new(definition: &'static ServiceDefinition, backend: &'a Backend, fields: IndexMap<String, Value>) -> Self {
        Self { definition, backend, fields }
    }

    /// Wrap a structure returned by the backend.
    pub fn from_value(definition: &'static ServiceDefinition, backend: &'a Backend, value: &Value) -> Self {
        let fields = match value {
            Value::Struct(map) => map.clone(),
            _ => IndexMap::new(),
        };
        Self::new(definition, backend, fields)
    }

    pub fn definition(&self) -> &'static ServiceDefinition {
        self.definition
    }

    pub fn backend(&self) -> &'a Backend {
        self.backend
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Value of a known field as the backend sent it; `Null` if it was
    /// left out of the response.
    pub fn get(&self, name: &str) -> Result<&Value> {
        if !self.definition.has_field(name) {
            return Err(self.unknown(name));
        }
        Ok(self.fields.get(name).unwrap_or(&NULL))
    }

    pub fn field_string(&self, name: &str) -> Result<String> {
        self.get(name).map(Value::to_field_string)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.definition.has_field(name) {
            return Err(self.unknown(name));
        }
        if !self.definition.is_writable(name) {
            return Err(MythError::ReadOnlyAttribute {
                class: self.definition.name.to_string(),
                name: name.to_string(),
            });
        }
        self.put(name, value);
        Ok(())
    }

    /// Store without checks, for typed builders over writable fields.
    pub(crate) fn put(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    fn unknown(&self, name: &str) -> MythError {
        MythError::UnknownAttribute {
            class: self.definition.name.to_string(),
            name: name.to_string(),
        }
    }

    /// Parameters of the save operation: every renamed field with its
    /// current value. Fields the backend sent as nil are left out.
    pub fn write_view(&self) -> Vec<(String, String)> {
        self.definition
            .post_mapping
            .iter()
            .filter_map(|(field, param)| match self.fields.get(*field) {
                None | Some(Value::Null) => None,
                Some(value) => Some((param.to_string(), value.to_field_string())),
            })
            .collect()
    }

    /// Send the record back through the definition's save operation.
    pub fn save(&self) -> Result<Value> {
        let operation = self
            .definition
            .post_operation
            .ok_or_else(|| MythError::NotSaveable(self.definition.name.to_string()))?;
        let api = self.backend.service_api(self.definition.service)?;
        api.call_named(operation, &self.write_view())
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .definition
            .primary_key
            .iter()
            .map(|k| {
                let value = self.fields.get(*k).map(Value::to_field_string).unwrap_or_default();
                format!("{}={}", k, value)
            })
            .collect();
        write!(f, "{}({})", self.definition.name, keys.join(", "))
    }
}

/// A record type that can be enumerated from the backend.
pub trait RecordClass: Sync {
    fn definition(&self) -> &'static ServiceDefinition;

    /// Every instance the backend holds.
    fn all<'a>(&self, backend: &'a Backend) -> Result<Vec<Record<'a>>>;

    /// Fetch one instance by the definition's key parameters.
    fn get<'a>(&self, backend: &'a Backend, key: &[&str]) -> Result<Record<'a>> {
        let definition = self.definition();
        let operation = definition
            .get_operation
            .ok_or_else(|| MythError::schema(format!("{} has no fetch operation", definition.name)))?;
        let value = backend.service_api(definition.service)?.call(operation, key)?;
        Ok(Record::from_value(definition, backend, &value))
    }
}

static REGISTRY: &[&dyn RecordClass] = &[&ChannelInfoClass, &VideoSourceClass, &ProfileClass];

/// Record class registered under `name`.
pub fn lookup(name: &str) -> Result<&'static dyn RecordClass> {
    REGISTRY
        .iter()
        .copied()
        .find(|class| class.definition().name == name)
        .ok_or_else(|| MythError::UnknownClass(name.to_string()))
}

pub fn class_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|class| class.definition().name).collect()
}
