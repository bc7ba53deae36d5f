//! WSDL retrieval and schema import resolution
//!
//! The backend's WSDL pulls its types in through `xs:import` /
//! `xs:include` directives with `schemaLocation` URLs. The resolver fetches
//! every referenced schema (recursively), drops the directives and splices
//! the imported definitions into the WSDL's own `http://mythtv.org`
//! schema, so the document is self-contained. The result is cached on disk
//! per (service, host, port) and reused without any freshness check.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::Url;

use crate::error::{MythError, Result};
use crate::transport::Transport;
use crate::xml::{Document, Element, Node, MYTHTV_NS, XSD_NS};

/// Services the backend is known to expose.
pub const SERVICES: &[&str] = &[
    "Capture", "Channel", "Content", "DVR", "Frontend", "Guide", "Myth", "Video",
];

const SCHEMA_LOCATION: &str = "schemaLocation";

pub fn wsdl_url(service: &str, host: &str, port: u16) -> String {
    format!("http://{}:{}/{}/wsdl", host, port, service)
}

pub fn cache_path(cache_dir: &Path, service: &str, host: &str, port: u16) -> PathBuf {
    cache_dir.join(format!("MythTV-{}-{}-{}.wsdl", service, host, port))
}

pub struct WsdlResolver<'a> {
    transport: &'a dyn Transport,
    cache_dir: &'a Path,
}

impl<'a> WsdlResolver<'a> {
    pub fn new(transport: &'a dyn Transport, cache_dir: &'a Path) -> Self {
        Self { transport, cache_dir }
    }

    /// Return the self-contained WSDL for `service`, from the cache if present.
    pub fn resolve(&self, service: &str, host: &str, port: u16) -> Result<Document> {
        if !SERVICES.contains(&service) {
            return Err(MythError::UnknownService(service.to_string()));
        }

        let path = cache_path(self.cache_dir, service, host, port);
        if path.exists() {
            debug!("Using cached WSDL {}", path.display());
            let text = fs::read_to_string(&path)?;
            return Document::parse(&text);
        }

        let url = wsdl_url(service, host, port);
        info!("Fetching {} WSDL from {}", service, url);
        let doc = self.fetch_and_patch(&url)?;
        write_cache(&path, &doc)?;
        Ok(doc)
    }

    /// Download the WSDL at `url` and inline all of its schema imports.
    pub fn fetch_and_patch(&self, url: &str) -> Result<Document> {
        let base = Url::parse(url).map_err(|e| MythError::schema(format!("bad WSDL url '{}': {}", url, e)))?;
        let mut doc = Document::parse(&self.transport.get(url)?)?;
        if doc.root.find(is_mythtv_schema).is_none() {
            return Err(MythError::schema(format!("no {} schema in {}", MYTHTV_NS, url)));
        }

        let mut seen = HashSet::new();
        let mut imports = Vec::new();
        self.collect_imports(&base, &mut doc.root, &mut seen, &mut imports)?;
        debug!("Resolved {} schema import(s)", imports.len());

        let schema = doc
            .root
            .find_mut(is_mythtv_schema)
            .ok_or_else(|| MythError::schema(format!("no {} schema in {}", MYTHTV_NS, url)))?;
        for imported in imports {
            splice(schema, imported);
        }
        Ok(doc)
    }

    /// Remove every `schemaLocation` directive below `element`, fetching
    /// each location not fetched before (and, recursively, its own imports).
    fn collect_imports(
        &self,
        base: &Url,
        element: &mut Element,
        seen: &mut HashSet<String>,
        imports: &mut Vec<Document>,
    ) -> Result<()> {
        let directives = element.remove_children(|e| e.has_attr(SCHEMA_LOCATION));
        for directive in directives {
            let location = directive.attr(SCHEMA_LOCATION).unwrap_or_default();
            let url = base
                .join(location)
                .map_err(|e| MythError::schema(format!("bad schemaLocation '{}': {}", location, e)))?;
            if !seen.insert(url.to_string()) {
                continue;
            }

            debug!("Fetching schema {}", url);
            let mut imported = Document::parse(&self.transport.get(url.as_str())?)?;
            self.collect_imports(&url, &mut imported.root, seen, imports)?;
            imports.push(imported);
        }

        for node in element.children.iter_mut() {
            if let Node::Element(child) = node {
                self.collect_imports(base, child, seen, imports)?;
            }
        }
        Ok(())
    }
}

fn is_mythtv_schema(e: &Element) -> bool {
    e.is(XSD_NS, "schema") && e.attr("targetNamespace") == Some(MYTHTV_NS)
}

/// Move the top-level definitions of an imported schema into `schema`.
fn splice(schema: &mut Element, imported: Document) {
    let declarations = imported.root.namespace_declarations();
    for node in imported.root.children {
        let Node::Element(mut definition) = node else {
            continue;
        };
        if definition.has_attr(SCHEMA_LOCATION) || already_defined(schema, &definition) {
            continue;
        }
        definition.inherit_namespaces(&declarations);
        schema.insert(1, definition);
    }
}

fn already_defined(schema: &Element, definition: &Element) -> bool {
    let Some(name) = definition.attr("name") else {
        return false;
    };
    schema
        .elements()
        .any(|e| e.local_name() == definition.local_name() && e.attr("name") == Some(name))
}

/// Write through a uniquely named temporary sibling and rename, so a reader
/// (or another resolver racing us) never sees a half-written cache file.
/// Losing the race to a writer that already renamed its copy into place is
/// fine; both copies are complete.
fn write_cache(path: &Path, doc: &Document) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(doc.to_xml_string().as_bytes())?;
    match tmp.persist(path) {
        Ok(_) => debug!("Wrote WSDL cache {}", path.display()),
        Err(e) if path.exists() => debug!("WSDL cache {} written by another resolver: {}", path.display(), e.error),
        Err(e) => return Err(e.error.into()),
    }
    Ok(())
}

#[cfg(test)]
#[path = "wsdl_tests.rs"]
mod tests;
