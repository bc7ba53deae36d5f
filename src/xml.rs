//! Small mutable XML element tree on top of `quick-xml`
//!
//! The WSDL resolver needs to find, remove and splice elements and then
//! write the result back out, which a streaming reader alone can't do.
//! Every element remembers the namespace URI its prefix resolved to in the
//! document it was parsed from, so elements moved between documents keep
//! matching namespace-aware queries.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fmt::Write as _;

use crate::error::{MythError, Result};

pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const MYTHTV_NS: &str = "http://mythtv.org";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written, e.g. `xs:element`
    pub name: String,
    /// Namespace URI the prefix resolved to when parsed
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    /// True if the element is `{namespace}local`.
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local_name() == local && self.namespace.as_deref() == Some(namespace)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// Attribute looked up by local name, ignoring any prefix.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| split_qname(k).1 == local)
            .map(|(_, v)| v.as_str())
    }

    /// `xmlns` declarations made on this element: (prefix, uri).
    pub fn namespace_declarations(&self) -> Vec<(Option<String>, String)> {
        self.attributes
            .iter()
            .filter_map(|(k, v)| {
                if k == "xmlns" {
                    Some((None, v.clone()))
                } else {
                    k.strip_prefix("xmlns:").map(|p| (Some(p.to_string()), v.clone()))
                }
            })
            .collect()
    }

    /// Declare each namespace the element doesn't already declare itself.
    pub fn inherit_namespaces(&mut self, declarations: &[(Option<String>, String)]) {
        for (prefix, uri) in declarations {
            let key = match prefix {
                Some(p) => format!("xmlns:{}", p),
                None => "xmlns".to_string(),
            };
            if !self.has_attr(&key) {
                self.attributes.push((key, uri.clone()));
            }
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Insert an element among the children, clamping the index.
    pub fn insert(&mut self, index: usize, child: Element) {
        let index = index.min(self.children.len());
        self.children.insert(index, Node::Element(child));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// All descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for child in self.elements() {
            out.push(child);
            child.collect_descendants(out);
        }
    }

    pub fn find<F>(&self, pred: F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool + Copy,
    {
        for child in self.elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }

    /// First element (including `self`) matching `pred`, depth first.
    pub fn find_mut<F>(&mut self, pred: F) -> Option<&mut Element>
    where
        F: Fn(&Element) -> bool + Copy,
    {
        if pred(self) {
            return Some(self);
        }
        for node in self.children.iter_mut() {
            if let Node::Element(child) = node {
                if let Some(found) = child.find_mut(pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Remove direct children matching `pred`, returning them in order.
    pub fn remove_children<F>(&mut self, pred: F) -> Vec<Element>
    where
        F: Fn(&Element) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match node {
                Node::Element(e) if pred(&e) => removed.push(e),
                other => kept.push(other),
            }
        }
        self.children = kept;
        removed
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", k, quick_xml::escape::escape(v.as_str()));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                Node::Element(e) => e.write_to(out),
                Node::Text(t) => out.push_str(&quick_xml::escape::escape(t.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Serialise the element (without an XML declaration).
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

impl Document {
    pub fn parse(xml: &str) -> Result<Document> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut scopes: Vec<Vec<(Option<String>, String)>> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let element = open_element(e, &mut scopes);
                    stack.push(element);
                }
                Ok(Event::Empty(ref e)) => {
                    let element = open_element(e, &mut scopes);
                    scopes.pop();
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| MythError::Xml(format!("unbalanced end tag at byte {}", position)))?;
                    scopes.pop();
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    push_text(&mut stack, &decode_xml_entities(&raw));
                }
                Ok(Event::CData(ref e)) => {
                    push_text(&mut stack, &String::from_utf8_lossy(e.as_ref()));
                }
                Ok(Event::GeneralRef(ref e)) => {
                    let name = String::from_utf8_lossy(e);
                    push_text(&mut stack, &decode_xml_entities(&format!("&{};", name)));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(MythError::Xml(format!("XML error at byte {}: {}", position, e)));
                }
            }
        }

        if !stack.is_empty() {
            return Err(MythError::Xml(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
        }
        root.map(|root| Document { root })
            .ok_or_else(|| MythError::Xml("document has no root element".to_string()))
    }

    /// Serialise with an XML declaration, as written to the cache.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version='1.0' encoding='UTF-8'?>\n");
        self.root.write_to(&mut out);
        out.push('\n');
        out
    }

    /// Namespace map of the root element, with the default namespace given
    /// the explicit alias `default_alias`.
    pub fn namespace_map(&self, default_alias: &str) -> Vec<(String, String)> {
        self.root
            .namespace_declarations()
            .into_iter()
            .map(|(prefix, uri)| (prefix.unwrap_or_else(|| default_alias.to_string()), uri))
            .collect()
    }
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn open_element(e: &BytesStart, scopes: &mut Vec<Vec<(Option<String>, String)>>) -> Element {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let raw = String::from_utf8_lossy(attr.value.as_ref());
        attributes.push((key, decode_xml_entities(&raw)));
    }

    let mut element = Element {
        name,
        namespace: None,
        attributes,
        children: Vec::new(),
    };
    scopes.push(element.namespace_declarations());
    element.namespace = resolve_prefix(scopes, element.prefix());
    element
}

fn resolve_prefix(scopes: &[Vec<(Option<String>, String)>], prefix: Option<&str>) -> Option<String> {
    if prefix == Some("xml") {
        return Some(XML_NS.to_string());
    }
    for scope in scopes.iter().rev() {
        if let Some((_, uri)) = scope.iter().find(|(p, _)| p.as_deref() == prefix) {
            return if uri.is_empty() { None } else { Some(uri.clone()) };
        }
    }
    None
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(MythError::Xml("multiple root elements".to_string())),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) {
    // Text outside the root element is dropped.
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(last)) = parent.children.last_mut() {
        last.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
}

/// Decode XML entities back to normal characters
pub fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            result.push_str(tail);
            return result;
        };

        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity.strip_prefix('#').and_then(|num| {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            }),
        };

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                // Not an entity we know, keep it verbatim
                result.push('&');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="http://mythtv.org">
  <types>
    <xs:schema targetNamespace="http://mythtv.org">
      <xs:import schemaLocation="http://host/xsd?type=A" namespace="http://mythtv.org"/>
      <xs:element name="GetA"/>
    </xs:schema>
  </types>
</definitions>"#;

    #[test]
    fn test_parse_resolves_namespaces() {
        let doc = Document::parse(WSDL).unwrap();
        assert!(doc.root.is(WSDL_NS, "definitions"));

        let schema = doc.root.find(|e| e.is(XSD_NS, "schema")).unwrap();
        assert_eq!(schema.attr("targetNamespace"), Some("http://mythtv.org"));
        assert_eq!(schema.elements().count(), 2);
        assert!(schema.child("element").unwrap().is(XSD_NS, "element"));
    }

    #[test]
    fn test_namespace_map_aliases_default() {
        let doc = Document::parse(WSDL).unwrap();
        let map = doc.namespace_map("wsdl");
        assert!(map.contains(&("wsdl".to_string(), WSDL_NS.to_string())));
        assert!(map.contains(&("xs".to_string(), XSD_NS.to_string())));
    }

    #[test]
    fn test_remove_and_insert() {
        let mut doc = Document::parse(WSDL).unwrap();
        let schema = doc.root.find_mut(|e| e.is(XSD_NS, "schema")).unwrap();
        let removed = schema.remove_children(|e| e.has_attr("schemaLocation"));
        assert_eq!(removed.len(), 1);

        let mut extra = Element::new("xs:complexType");
        extra.set_attr("name", "A");
        schema.insert(1, extra);

        let names: Vec<_> = schema.elements().map(|e| e.local_name().to_string()).collect();
        assert_eq!(names, vec!["element", "complexType"]);
    }

    #[test]
    fn test_round_trip_is_stable() {
        let doc = Document::parse(WSDL).unwrap();
        let written = doc.to_xml_string();
        let reparsed = Document::parse(&written).unwrap();
        assert_eq!(reparsed.to_xml_string(), written);
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_entities_in_text_and_attributes() {
        let doc = Document::parse(r#"<a title="Tom &amp; Jerry">x &lt; y &#x41;</a>"#).unwrap();
        assert_eq!(doc.root.attr("title"), Some("Tom & Jerry"));
        assert_eq!(doc.root.text(), "x < y A");
        assert!(doc.root.to_xml().contains("Tom &amp; Jerry"));
    }

    #[test]
    fn test_decode_xml_entities() {
        assert_eq!(decode_xml_entities("a &amp; b"), "a & b");
        assert_eq!(decode_xml_entities("&#268;T1"), "ČT1");
        assert_eq!(decode_xml_entities("AT&T"), "AT&T");
        assert_eq!(decode_xml_entities("&bogus; x"), "&bogus; x");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(Document::parse("<a><b></a>").is_err());
        assert!(Document::parse("").is_err());
        assert!(Document::parse("<a/><b/>").is_err());
    }
}
