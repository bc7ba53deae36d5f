//! MythTV Services client
//!
//! Discovers the SOAP services of a MythTV backend from their WSDL,
//! invokes operations by name, and wraps the channel and profile records
//! in a small typed layer with filtered queries and validated saves.

pub mod backend;
pub mod chanmaint;
pub mod config;
pub mod epg;
pub mod error;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod query;
pub mod service;
pub mod soap;
pub mod transport;
pub mod value;
pub mod wsdl;
pub mod xml;

#[cfg(test)]
mod testing;

pub use backend::Backend;
pub use config::Settings;
pub use error::{MythError, Result};
pub use query::QuerySet;
pub use service::ServiceApi;
pub use value::Value;
