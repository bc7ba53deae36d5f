//! Service binding
//!
//! A `ServiceApi` wraps the resolved WSDL of one backend service. It answers
//! which operations the service offers (classified by the HTTP verb in each
//! operation's `documentation`), what parameters they take, and invokes them
//! over SOAP.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::error::{MythError, Result};
use crate::soap;
use crate::transport::Transport;
use crate::value::Value;
use crate::xml::{Document, Element, MYTHTV_NS, WSDL_NS, WSDL_SOAP_NS, XSD_NS};

/// One request parameter as declared in the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ptype: String,
    pub min_occurs: String,
    pub nillable: String,
}

impl Parameter {
    fn from_element(e: &Element) -> Self {
        Self {
            name: e.attr("name").unwrap_or_default().to_string(),
            ptype: e.attr("type").unwrap_or_default().to_string(),
            // Schema defaults when the attributes are omitted
            min_occurs: e.attr("minOccurs").unwrap_or("1").to_string(),
            nillable: e.attr("nillable").unwrap_or("false").to_string(),
        }
    }
}

pub struct ServiceApi {
    service_name: String,
    wsdl: Document,
    namespaces: Vec<(String, String)>,
    target_namespace: String,
    endpoint: String,
    transport: Arc<dyn Transport>,
    /// (operation, classification), filled on first use
    operations: OnceLock<Vec<(String, String)>>,
}

impl ServiceApi {
    pub fn new(service_name: &str, wsdl: Document, host: &str, port: u16, transport: Arc<dyn Transport>) -> Self {
        let namespaces = wsdl.namespace_map("wsdl");
        let target_namespace = wsdl.root.attr("targetNamespace").unwrap_or(MYTHTV_NS).to_string();
        let endpoint = wsdl
            .root
            .find(|e| e.is(WSDL_SOAP_NS, "address") && e.has_attr("location"))
            .and_then(|e| e.attr("location"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("http://{}:{}/{}", host, port, service_name));
        debug!("{} endpoint: {}", service_name, endpoint);

        Self {
            service_name: service_name.to_string(),
            wsdl,
            namespaces,
            target_namespace,
            endpoint,
            transport,
            operations: OnceLock::new(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn wsdl(&self) -> &Document {
        &self.wsdl
    }

    /// WSDL namespace map; the unnamed default namespace is aliased `wsdl`.
    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    fn classified(&self) -> &[(String, String)] {
        self.operations.get_or_init(|| {
            let mut ops: Vec<(String, String)> = Vec::new();
            for op in self.wsdl.root.descendants() {
                if !op.is(WSDL_NS, "operation") {
                    continue;
                }
                let Some(doc) = op.elements().find(|e| e.is(WSDL_NS, "documentation")) else {
                    continue;
                };
                let name = op.attr("name").unwrap_or_default();
                if ops.iter().any(|(n, _)| n == name) {
                    continue;
                }
                ops.push((name.to_string(), doc.text().trim().to_string()));
            }
            ops
        })
    }

    /// Operations whose classification is one of `kinds` ("GET", "POST").
    pub fn operations(&self, kinds: &[&str]) -> Vec<String> {
        self.classified()
            .iter()
            .filter(|(_, kind)| kinds.contains(&kind.as_str()))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Parameters of `operation`, in schema order.
    pub fn operation_parameters(&self, operation: &str) -> Result<Vec<Parameter>> {
        let matches: Vec<&Element> = self
            .wsdl
            .root
            .descendants()
            .into_iter()
            .filter(|e| e.is(XSD_NS, "element") && e.attr("name") == Some(operation))
            .collect();

        match matches.as_slice() {
            [element] => Ok(element
                .descendants()
                .into_iter()
                .filter(|e| e.is(XSD_NS, "element"))
                .map(Parameter::from_element)
                .collect()),
            [] => Err(MythError::schema(format!(
                "{} service has no schema element for operation '{}'",
                self.service_name, operation
            ))),
            many => Err(MythError::schema(format!(
                "{} service has {} schema elements named '{}', expected one",
                self.service_name,
                many.len(),
                operation
            ))),
        }
    }

    pub fn write_help<W: Write>(&self, out: &mut W, show_post: bool) -> Result<()> {
        let kinds: &[&str] = if show_post { &["GET", "POST"] } else { &["GET"] };
        writeln!(out, "Supported Operations:")?;
        for operation in self.operations(kinds) {
            let names: Vec<String> = self
                .operation_parameters(&operation)?
                .into_iter()
                .map(|p| p.name)
                .collect();
            writeln!(out, "    {:<30} {}", operation, names.join(", "))?;
        }
        Ok(())
    }

    pub fn print_help(&self, show_post: bool) -> Result<()> {
        self.write_help(&mut std::io::stdout().lock(), show_post)
    }

    pub fn write_operation_help<W: Write>(&self, out: &mut W, operation: &str) -> Result<()> {
        let parameters = self.operation_parameters(operation)?;
        writeln!(out, "{} parameters:", operation)?;
        writeln!(out, "    {:<30} {:<20} {:<9} {}", "Name", "Type", "MinOccurs", "Nillable")?;
        for p in parameters {
            writeln!(out, "    {:<30} {:<20} {:<9} {}", p.name, p.ptype, p.min_occurs, p.nillable)?;
        }
        Ok(())
    }

    pub fn print_operation_help(&self, operation: &str) -> Result<()> {
        self.write_operation_help(&mut std::io::stdout().lock(), operation)
    }

    /// Run a command line: `args[0]` is the operation, the rest are
    /// positional arguments. A lone `help` argument writes the operation's
    /// parameter help to `out` instead and returns `None`.
    pub fn execute_args<W: Write>(&self, args: &[String], out: &mut W) -> Result<Option<Value>> {
        let Some((operation, rest)) = args.split_first() else {
            return Err(MythError::schema(format!("No {} operation given", self.service_name)));
        };
        if rest.len() == 1 && rest[0] == "help" {
            self.write_operation_help(out, operation)?;
            return Ok(None);
        }
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        self.call(operation, &rest).map(Some)
    }

    /// Invoke `operation` with positional arguments.
    pub fn call(&self, operation: &str, args: &[&str]) -> Result<Value> {
        let parameters = self.operation_parameters(operation)?;
        if args.len() > parameters.len() {
            return Err(MythError::schema(format!(
                "{} takes at most {} argument(s), got {}",
                operation,
                parameters.len(),
                args.len()
            )));
        }
        let values: Vec<(String, String)> = parameters
            .into_iter()
            .zip(args)
            .map(|(p, a)| (p.name, a.to_string()))
            .collect();
        self.invoke(operation, &values)
    }

    /// Invoke `operation` with named arguments, sent in schema order.
    pub fn call_named(&self, operation: &str, args: &[(String, String)]) -> Result<Value> {
        let parameters = self.operation_parameters(operation)?;
        if let Some((unknown, _)) = args.iter().find(|(name, _)| !parameters.iter().any(|p| &p.name == name)) {
            return Err(MythError::schema(format!("{} has no parameter '{}'", operation, unknown)));
        }
        let values: Vec<(String, String)> = parameters
            .iter()
            .filter_map(|p| args.iter().find(|(name, _)| *name == p.name).cloned())
            .collect();
        self.invoke(operation, &values)
    }

    /// SOAPAction for `operation` from the WSDL binding.
    pub fn soap_action(&self, operation: &str) -> String {
        self.wsdl
            .root
            .descendants()
            .into_iter()
            .filter(|e| e.is(WSDL_NS, "operation") && e.attr("name") == Some(operation))
            .flat_map(|op| op.elements())
            .find(|e| e.is(WSDL_SOAP_NS, "operation"))
            .and_then(|e| e.attr("soapAction"))
            .filter(|action| !action.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}/{}", MYTHTV_NS, self.service_name, operation))
    }

    fn invoke(&self, operation: &str, values: &[(String, String)]) -> Result<Value> {
        debug!("{}.{}({:?})", self.service_name, operation, values);
        let envelope = soap::build_envelope(operation, &self.target_namespace, values);
        let reply = self
            .transport
            .post_soap(&self.endpoint, &self.soap_action(operation), &envelope)?;
        soap::parse_response(operation, &reply)
    }
}

impl fmt::Display for ServiceApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceApi({})", self.service_name)
    }
}
