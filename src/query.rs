//! Filtered queries over a record class
//!
//! ```ignore
//! let channels = QuerySet::new("ChannelInfo", &backend)?
//!     .filter("CallSign", "^CT")?
//!     .all()?;
//! ```
//!
//! `filter` returns a new query and leaves the receiver untouched. Every
//! query derived from the same `QuerySet::new` shares one lazily fetched
//! record list, so the backend is enumerated at most once per lineage.

use regex::Regex;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{MythError, Result};
use crate::models::{self, Record, RecordClass};

/// A (field, pattern) predicate. Patterns are searched for, not anchored.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub pattern: String,
    regex: Regex,
}

impl Filter {
    fn matches(&self, record: &Record<'_>) -> bool {
        record
            .field_string(&self.field)
            .map(|value| self.regex.is_match(&value))
            .unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct QuerySet<'a> {
    class: &'static dyn RecordClass,
    backend: &'a Backend,
    filters: Vec<Filter>,
    records: Rc<RefCell<Option<Vec<Record<'a>>>>>,
}

impl<'a> QuerySet<'a> {
    pub fn new(class_name: &str, backend: &'a Backend) -> Result<Self> {
        Ok(Self {
            class: models::lookup(class_name)?,
            backend,
            filters: Vec::new(),
            records: Rc::new(RefCell::new(None)),
        })
    }

    pub fn class_name(&self) -> &'static str {
        self.class.definition().name
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// A copy of this query with one more predicate.
    pub fn filter(&self, field: &str, pattern: &str) -> Result<Self> {
        self.filter_all(&[(field, pattern)])
    }

    /// A copy of this query with several more predicates.
    pub fn filter_all(&self, predicates: &[(&str, &str)]) -> Result<Self> {
        let definition = self.class.definition();
        let mut query = self.clone();
        for (field, pattern) in predicates {
            if !definition.has_field(field) {
                return Err(MythError::UnknownFilterField(field.to_string()));
            }
            let regex = Regex::new(pattern).map_err(|source| MythError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            query.filters.push(Filter {
                field: field.to_string(),
                pattern: pattern.to_string(),
                regex,
            });
        }
        Ok(query)
    }

    /// Records matching every filter.
    pub fn all(&self) -> Result<Vec<Record<'a>>> {
        if self.records.borrow().is_none() {
            let fetched = self.class.all(self.backend)?;
            debug!("Fetched {} {} record(s)", fetched.len(), self.class_name());
            *self.records.borrow_mut() = Some(fetched);
        }

        let records = self.records.borrow();
        Ok(records
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|record| self.filters.iter().all(|f| f.matches(record)))
            .cloned()
            .collect())
    }
}
