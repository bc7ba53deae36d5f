//! HTTP access to the MythTV backend
//!
//! Everything that crosses the network goes through the `Transport`
//! trait, so the resolver and bindings can be exercised against canned
//! documents in tests.

use std::time::Duration;
use tracing::debug;

use crate::error::{MythError, Result};

/// Raw reply to a SOAP POST. Faults come back with non-200 statuses, so
/// the status is handed to the caller instead of being turned into an error.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

pub trait Transport: Send + Sync {
    /// GET a document, failing on anything but 200.
    fn get(&self, url: &str) -> Result<String>;

    /// POST a SOAP envelope.
    fn post_soap(&self, url: &str, soap_action: &str, envelope: &str) -> Result<HttpReply>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqTransport {
    /// Create a transport. `timeout` of None blocks until the backend answers.
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: format!("mythtv_cli/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| MythError::Network(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(MythError::Http { status, url: url.to_string() });
        }

        response
            .body_mut()
            .read_to_string()
            .map_err(|e| MythError::Network(format!("Read failed: {}", e)))
    }

    fn post_soap(&self, url: &str, soap_action: &str, envelope: &str) -> Result<HttpReply> {
        debug!("POST {} ({})", url, soap_action);
        let mut response = self
            .agent
            .post(url)
            .header("User-Agent", &self.user_agent)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", &format!("\"{}\"", soap_action))
            .send(envelope)
            .map_err(|e| MythError::Network(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| MythError::Network(format!("Read failed: {}", e)))?;
        Ok(HttpReply { status, body })
    }
}
