//! Backend connection
//!
//! Identifies the backend (host and port) and owns one `ServiceApi` per
//! service, created on first use and reused afterwards. `main` builds one
//! `Backend` from the merged settings and passes it down by reference.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::config::Settings;
use crate::error::Result;
use crate::service::ServiceApi;
use crate::transport::{Transport, UreqTransport};
use crate::wsdl::{WsdlResolver, SERVICES};

pub struct Backend {
    hostname: String,
    port: u16,
    cache_dir: PathBuf,
    transport: Arc<dyn Transport>,
    services: Mutex<HashMap<String, Arc<ServiceApi>>>,
}

impl Backend {
    pub fn new(hostname: &str, port: u16, cache_dir: PathBuf, transport: Arc<dyn Transport>) -> Self {
        Self {
            hostname: hostname.to_string(),
            port,
            cache_dir,
            transport,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Backend described by `settings`, talking HTTP through ureq.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = settings.timeout_secs.map(Duration::from_secs);
        Ok(Self::new(
            &settings.hostname,
            settings.port,
            settings.cache_dir()?,
            Arc::new(UreqTransport::new(timeout)),
        ))
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn services() -> &'static [&'static str] {
        SERVICES
    }

    /// Binding for `service_name`, resolving its WSDL the first time.
    pub fn service_api(&self, service_name: &str) -> Result<Arc<ServiceApi>> {
        let mut services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(api) = services.get(service_name) {
            return Ok(api.clone());
        }

        let wsdl = WsdlResolver::new(self.transport.as_ref(), &self.cache_dir).resolve(
            service_name,
            &self.hostname,
            self.port,
        )?;
        let api = Arc::new(ServiceApi::new(
            service_name,
            wsdl,
            &self.hostname,
            self.port,
            self.transport.clone(),
        ));
        debug!("Created {} for {}", api, self);
        services.insert(service_name.to_string(), api.clone());
        Ok(api)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MythTVBackend(hostname={}, port={})", self.hostname, self.port)
    }
}
