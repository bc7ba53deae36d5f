//! SOAP envelopes for MythTV service calls
//!
//! Requests are document/literal: the operation element in the service's
//! target namespace, one child per parameter. Responses are decoded into a
//! `Value` tree; faults become `MythError::SoapFault`.

use indexmap::IndexMap;
use quick_xml::escape::escape;

use crate::error::{MythError, Result};
use crate::transport::HttpReply;
use crate::value::Value;
use crate::xml::{Document, Element, SOAP_ENV_NS};

/// Build the request envelope for `operation` with its parameters in order.
pub fn build_envelope(operation: &str, namespace: &str, params: &[(String, String)]) -> String {
    let mut body = String::new();
    for (name, value) in params {
        if value.is_empty() {
            body.push_str(&format!("<{}/>", name));
        } else {
            body.push_str(&format!("<{0}>{1}</{0}>", name, escape(value.as_str())));
        }
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"{env}\">\
         <soap:Body><{op} xmlns=\"{ns}\">{body}</{op}></soap:Body>\
         </soap:Envelope>",
        env = SOAP_ENV_NS,
        op = operation,
        ns = escape(namespace),
        body = body,
    )
}

/// Decode the reply to a call of `operation`.
pub fn parse_response(operation: &str, reply: &HttpReply) -> Result<Value> {
    let doc = match Document::parse(&reply.body) {
        Ok(doc) => doc,
        Err(e) if reply.status == 200 => return Err(e),
        Err(_) => {
            return Err(MythError::Http {
                status: reply.status,
                url: operation.to_string(),
            })
        }
    };

    let body = doc
        .root
        .find(|e| e.is(SOAP_ENV_NS, "Body"))
        .ok_or_else(|| MythError::schema(format!("{} response has no SOAP Body", operation)))?;

    if let Some(fault) = body.child("Fault") {
        return Err(fault_error(fault));
    }
    if reply.status != 200 {
        return Err(MythError::Http {
            status: reply.status,
            url: operation.to_string(),
        });
    }

    let Some(response) = body.elements().next() else {
        return Ok(Value::Null);
    };
    let result_name = format!("{}Result", operation);
    let result = response
        .child(&result_name)
        .or_else(|| {
            let mut children = response.elements();
            match (children.next(), children.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        })
        .unwrap_or(response);
    Ok(element_to_value(result))
}

fn fault_error(fault: &Element) -> MythError {
    let text_of = |name: &str| {
        fault
            .find(|e| e.local_name() == name)
            .map(|e| e.text().trim().to_string())
            .unwrap_or_default()
    };
    let mut message = text_of("faultstring");
    let detail = text_of("errorDescription");
    if !detail.is_empty() {
        message = format!("{} ({})", message, detail);
    }
    MythError::SoapFault {
        code: text_of("faultcode"),
        message,
    }
}

/// Convert a response element into a `Value`.
///
/// Leaves become text, or `Null` when empty or `xsi:nil`. An element whose children
/// all share one name is a list when there is more than one of them, when
/// it is named `ArrayOf...`, or when its name is the child name plus `s`
/// (`ChannelInfos` / `ChannelInfo`). Anything else is a structure.
pub fn element_to_value(element: &Element) -> Value {
    let children: Vec<&Element> = element.elements().collect();
    if children.is_empty() {
        let text = element.text();
        if element.attr_local("nil") == Some("true") || text.trim().is_empty() {
            return Value::Null;
        }
        return Value::Text(text);
    }

    let first = children[0].local_name();
    let same_name = children.iter().all(|c| c.local_name() == first);
    let name = element.local_name();
    let is_list = same_name
        && (children.len() > 1 || name.starts_with("ArrayOf") || name == format!("{}s", first));

    if is_list {
        return Value::List(children.into_iter().map(element_to_value).collect());
    }

    let mut map = IndexMap::new();
    for child in children {
        map.insert(child.local_name().to_string(), element_to_value(child));
    }
    Value::Struct(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16, body: &str) -> HttpReply {
        HttpReply { status, body: body.to_string() }
    }

    fn envelope(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>{}</s:Body></s:Envelope>"#,
            inner
        )
    }

    #[test]
    fn test_build_envelope() {
        let params = vec![
            ("ChanID".to_string(), "1001".to_string()),
            ("CallSign".to_string(), "AT&T".to_string()),
            ("Icon".to_string(), String::new()),
        ];
        let xml = build_envelope("UpdateDBChannel", "http://mythtv.org", &params);
        let doc = Document::parse(&xml).unwrap();
        let op = doc.root.find(|e| e.local_name() == "UpdateDBChannel").unwrap();
        assert_eq!(op.namespace.as_deref(), Some("http://mythtv.org"));
        assert_eq!(op.child("ChanID").unwrap().text(), "1001");
        assert_eq!(op.child("CallSign").unwrap().text(), "AT&T");
        assert_eq!(op.child("Icon").unwrap().text(), "");
    }

    #[test]
    fn test_parse_list_response() {
        let body = envelope(
            r#"<GetVideoSourceListResponse xmlns="http://mythtv.org"><GetVideoSourceListResult>
                <AsOf>2024-01-15T12:00:00</AsOf>
                <VideoSources><VideoSource><Id>1</Id><SourceName>DVB-T</SourceName></VideoSource></VideoSources>
            </GetVideoSourceListResult></GetVideoSourceListResponse>"#,
        );
        let value = parse_response("GetVideoSourceList", &reply(200, &body)).unwrap();
        let sources = value.get("VideoSources");
        assert!(matches!(sources, Value::List(items) if items.len() == 1));
        assert_eq!(sources.items()[0].get("SourceName").as_text(), Some("DVB-T"));
    }

    #[test]
    fn test_parse_text_response() {
        let body = envelope(
            r#"<ProfileTextResponse xmlns="http://mythtv.org"><ProfileTextResult>- branch:
    fixes/0.27
</ProfileTextResult></ProfileTextResponse>"#,
        );
        let value = parse_response("ProfileText", &reply(200, &body)).unwrap();
        assert!(value.as_text().unwrap().contains("fixes/0.27"));
    }

    #[test]
    fn test_nil_and_empty_leaves() {
        let doc = Document::parse(
            r#"<ChannelInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><XMLTVID xsi:nil="true"/><IconURL/></ChannelInfo>"#,
        )
        .unwrap();
        let value = element_to_value(&doc.root);
        assert!(value.get("XMLTVID").is_null());
        assert!(value.get("IconURL").is_null());
        assert_eq!(value.items().len(), 1);

        let empty = Document::parse("<ChannelInfos>\n</ChannelInfos>").unwrap();
        assert!(element_to_value(&empty.root).items().is_empty());
    }

    #[test]
    fn test_fault_is_an_error() {
        let body = envelope(
            r#"<s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPResult_ActionFailed</faultstring>
               <detail><UPnPError><errorDescription>Channel ID appears invalid.</errorDescription></UPnPError></detail></s:Fault>"#,
        );
        match parse_response("UpdateDBChannel", &reply(500, &body)) {
            Err(MythError::SoapFault { code, message }) => {
                assert_eq!(code, "s:Client");
                assert!(message.contains("Channel ID appears invalid."));
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_http_error_without_envelope() {
        let result = parse_response("GetChannelInfo", &reply(404, "Not Found"));
        assert!(matches!(result, Err(MythError::Http { status: 404, .. })));
    }
}
