//! In-memory backend used by the unit tests
//!
//! `MockTransport` serves canned documents for GETs and dispatches SOAP
//! POSTs to per-operation handlers. `fake_channel_backend` wires handlers
//! that keep a small channel table, so updates are visible to later fetches.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::Backend;
use crate::error::{MythError, Result};
use crate::transport::{HttpReply, Transport};
use crate::xml::{Document, SOAP_ENV_NS};

pub const HOST: &str = "mythbox";
pub const PORT: u16 = 6544;

type Handler = Box<dyn Fn(&IndexMap<String, String>) -> std::result::Result<String, String> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SoapCall {
    pub url: String,
    pub action: String,
    pub operation: String,
    pub params: IndexMap<String, String>,
}

#[derive(Default)]
pub struct MockTransport {
    documents: HashMap<String, String>,
    handlers: HashMap<String, Handler>,
    gets: Mutex<Vec<String>>,
    posts: Mutex<Vec<SoapCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.to_string(), body.to_string());
        self
    }

    /// Serve the Channel and Myth WSDLs with their schema imports.
    pub fn with_fixtures(self) -> Self {
        let mut transport = self
            .with_document(&wsdl_url("Channel"), CHANNEL_WSDL)
            .with_document(&wsdl_url("Myth"), MYTH_WSDL);
        for (url, body) in CHANNEL_XSDS {
            transport = transport.with_document(url, body);
        }
        transport
    }

    /// Answer `operation` with the inner XML of its `...Result` element,
    /// or a SOAP fault carrying the error string.
    pub fn on_call<F>(mut self, operation: &str, handler: F) -> Self
    where
        F: Fn(&IndexMap<String, String>) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.handlers.insert(operation.to_string(), Box::new(handler));
        self
    }

    pub fn get_count(&self) -> usize {
        self.gets.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<SoapCall> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<SoapCall> {
        self.calls().into_iter().filter(|c| c.operation == operation).collect()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<String> {
        if let Ok(mut gets) = self.gets.lock() {
            gets.push(url.to_string());
        }
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| MythError::Network(format!("{}: Connection refused", url)))
    }

    fn post_soap(&self, url: &str, soap_action: &str, envelope: &str) -> Result<HttpReply> {
        let doc = Document::parse(envelope)?;
        let body = doc
            .root
            .find(|e| e.is(SOAP_ENV_NS, "Body"))
            .ok_or_else(|| MythError::Xml("request without Body".into()))?;
        let request = body
            .elements()
            .next()
            .ok_or_else(|| MythError::Xml("request without operation".into()))?;
        let operation = request.local_name().to_string();
        let params: IndexMap<String, String> = request
            .elements()
            .map(|e| (e.local_name().to_string(), e.text()))
            .collect();

        if let Ok(mut posts) = self.posts.lock() {
            posts.push(SoapCall {
                url: url.to_string(),
                action: soap_action.to_string(),
                operation: operation.clone(),
                params: params.clone(),
            });
        }

        let Some(handler) = self.handlers.get(&operation) else {
            return Ok(HttpReply { status: 500, body: fault("s:Client", "Unknown operation") });
        };
        match handler(&params) {
            Ok(inner) => Ok(HttpReply {
                status: 200,
                body: format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="{env}"><s:Body><{op}Response xmlns="http://mythtv.org"><{op}Result>{inner}</{op}Result></{op}Response></s:Body></s:Envelope>"#,
                    env = SOAP_ENV_NS,
                    op = operation,
                    inner = inner
                ),
            }),
            Err(message) => Ok(HttpReply { status: 500, body: fault("s:Client", &message) }),
        }
    }
}

fn fault(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="{}"><s:Body><s:Fault><faultcode>{}</faultcode><faultstring>{}</faultstring></s:Fault></s:Body></s:Envelope>"#,
        SOAP_ENV_NS, code, message
    )
}

pub fn wsdl_url(service: &str) -> String {
    crate::wsdl::wsdl_url(service, HOST, PORT)
}

/// Backend on `mythbox:6544` whose cache lives in a fresh temp dir.
pub fn backend(transport: Arc<MockTransport>) -> (Backend, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let backend = Backend::new(HOST, PORT, dir.path().to_path_buf(), transport);
    (backend, dir)
}

pub type ChannelTable = Arc<Mutex<Vec<IndexMap<String, String>>>>;

/// A channel row with the fields the fake backend reports.
pub fn channel(chan_id: &str, source_id: &str, call_sign: &str, xmltvid: &str, icon: &str) -> IndexMap<String, String> {
    let chan_num = chan_id.trim_start_matches('1').to_string();
    [
        ("ChanId", chan_id),
        ("ChanNum", chan_num.as_str()),
        ("CallSign", call_sign),
        ("IconURL", icon),
        ("ChannelName", call_sign),
        ("MplexId", "1"),
        ("ServiceId", "257"),
        ("ATSCMajorChan", "0"),
        ("ATSCMinorChan", "0"),
        ("Format", "Default"),
        ("FrequencyId", ""),
        ("SourceId", source_id),
        ("UseEIT", "true"),
        ("Visible", "true"),
        ("XMLTVID", xmltvid),
        ("DefaultAuth", ""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn channel_xml(row: &IndexMap<String, String>) -> String {
    row.iter()
        .map(|(k, v)| format!("<{0}>{1}</{0}>", k, quick_xml::escape::escape(v.as_str())))
        .collect()
}

/// Transport serving the fixtures plus a stateful Channel and Myth service.
pub fn fake_channel_backend(rows: Vec<IndexMap<String, String>>) -> (MockTransport, ChannelTable) {
    let table: ChannelTable = Arc::new(Mutex::new(rows));

    let sources = table.clone();
    let list = table.clone();
    let single = table.clone();
    let update = table.clone();

    let transport = MockTransport::new()
        .with_fixtures()
        .on_call("GetVideoSourceList", move |_| {
            let rows = sources.lock().map_err(|e| e.to_string())?;
            let mut ids: Vec<&str> = rows.iter().filter_map(|r| r.get("SourceId").map(|s| s.as_str())).collect();
            ids.sort();
            ids.dedup();
            let body: String = ids
                .iter()
                .map(|id| format!("<VideoSource><Id>{0}</Id><SourceName>Source {0}</SourceName><Grabber>tv_grab_huro</Grabber></VideoSource>", id))
                .collect();
            Ok(format!("<AsOf>2024-01-15T12:00:00Z</AsOf><VideoSources>{}</VideoSources>", body))
        })
        .on_call("GetChannelInfoList", move |params| {
            let source = params.get("SourceID").cloned().unwrap_or_default();
            let rows = list.lock().map_err(|e| e.to_string())?;
            let body: String = rows
                .iter()
                .filter(|r| r.get("SourceId") == Some(&source))
                .map(|r| format!("<ChannelInfo>{}</ChannelInfo>", channel_xml(r)))
                .collect();
            Ok(format!("<StartIndex>0</StartIndex><ChannelInfos>{}</ChannelInfos>", body))
        })
        .on_call("GetChannelInfo", move |params| {
            let id = params.get("ChanID").cloned().unwrap_or_default();
            let rows = single.lock().map_err(|e| e.to_string())?;
            rows.iter()
                .find(|r| r.get("ChanId") == Some(&id))
                .map(channel_xml)
                .ok_or_else(|| "Channel ID appears invalid.".to_string())
        })
        .on_call("UpdateDBChannel", move |params| {
            let id = params.get("ChannelID").cloned().unwrap_or_default();
            let mut rows = update.lock().map_err(|e| e.to_string())?;
            let row = rows
                .iter_mut()
                .find(|r| r.get("ChanId") == Some(&id))
                .ok_or_else(|| "Channel ID appears invalid.".to_string())?;
            for (field, param) in [
                ("ChanNum", "ChannelNumber"),
                ("CallSign", "CallSign"),
                ("ChannelName", "ChannelName"),
                ("IconURL", "Icon"),
                ("Visible", "visible"),
                ("XMLTVID", "XMLTVID"),
            ] {
                if let Some(value) = params.get(param) {
                    row.insert(field.to_string(), value.clone());
                }
            }
            Ok("true".to_string())
        })
        .on_call("ProfileText", |_| Ok(quick_xml::escape::escape(PROFILE_TEXT).to_string()));

    (transport, table)
}

pub const PROFILE_TEXT: &str = "MythTV Profile
- audio:
    {'passthru': 'false', 'upmixtype': 'passive', 'maxchannels': '2', 'device': 'ALSA:default', 'pulse': 'true'}
- branch:
    fixes/0.27
- channel_count:
    105
- country:
    CZ
- database:
    {'version': '5.5.38', 'usedengine': 'MyISAM', 'engines': ('MyISAM', 'InnoDB'), 'schema': {'recordedprogram': 'MyISAM'}}
- grabbers:
    ['tv_grab_huro']
- historical:
    {'rectime': 12345678L, 'showcount': 1409, 'db_age': 3021.5}
- logurgency:
    None
- tzoffset:
    -3600
- uuid:
    08e1d7b6-8f33-4d39-9d4a-7d3fd1f0dc20
- version:
    v0.27.4-5-gb85b7ae
- vtpertuner:
    1.0
";

pub const CHANNEL_WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/" xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="http://mythtv.org" targetNamespace="http://mythtv.org" name="ChannelServices">
  <types>
    <xs:schema targetNamespace="http://mythtv.org" elementFormDefault="qualified" attributeFormDefault="unqualified">
      <xs:import schemaLocation="http://mythbox:6544/Channel/xsd?type=ChannelInfoList" namespace="http://mythtv.org"/>
      <xs:import schemaLocation="http://mythbox:6544/Channel/xsd?type=VideoSourceList" namespace="http://mythtv.org"/>
      <xs:element name="GetChannelInfo">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="ChanID" type="xs:unsignedInt"/>
        </xs:sequence></xs:complexType>
      </xs:element>
      <xs:element name="GetChannelInfoResponse">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="GetChannelInfoResult" nillable="true" type="tns:ChannelInfo"/>
        </xs:sequence></xs:complexType>
      </xs:element>
      <xs:element name="GetChannelInfoList">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="SourceID" type="xs:unsignedInt"/>
          <xs:element minOccurs="0" name="StartIndex" type="xs:int"/>
          <xs:element minOccurs="0" name="Count" type="xs:int"/>
        </xs:sequence></xs:complexType>
      </xs:element>
      <xs:element name="GetVideoSource">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="SourceID" type="xs:unsignedInt"/>
        </xs:sequence></xs:complexType>
      </xs:element>
      <xs:element name="GetVideoSourceList">
        <xs:complexType><xs:sequence/></xs:complexType>
      </xs:element>
      <xs:element name="GetXMLTVIdList">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="SourceID" type="xs:unsignedInt"/>
        </xs:sequence></xs:complexType>
      </xs:element>
      <xs:element name="UpdateDBChannel">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="MplexID" type="xs:unsignedInt"/>
          <xs:element minOccurs="0" name="SourceID" type="xs:unsignedInt"/>
          <xs:element minOccurs="0" name="ChannelID" type="xs:unsignedInt"/>
          <xs:element minOccurs="0" name="CallSign" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="ChannelName" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="ChannelNumber" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="ServiceID" type="xs:unsignedInt"/>
          <xs:element minOccurs="0" name="ATSCMajorChannel" type="xs:unsignedInt"/>
          <xs:element minOccurs="0" name="ATSCMinorChannel" type="xs:unsignedInt"/>
          <xs:element minOccurs="0" name="UseEIT" type="xs:boolean"/>
          <xs:element minOccurs="0" name="visible" type="xs:boolean"/>
          <xs:element minOccurs="0" name="FrequencyID" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="Icon" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="Format" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="XMLTVID" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="DefaultAuthority" nillable="true" type="xs:string"/>
        </xs:sequence></xs:complexType>
      </xs:element>
      <xs:element name="UpdateDBChannelResponse">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="UpdateDBChannelResult" type="xs:boolean"/>
        </xs:sequence></xs:complexType>
      </xs:element>
    </xs:schema>
  </types>
  <portType name="ChannelServices">
    <operation name="GetChannelInfo"><documentation>GET </documentation></operation>
    <operation name="GetChannelInfoList"><documentation>GET </documentation></operation>
    <operation name="GetVideoSource"><documentation>GET </documentation></operation>
    <operation name="GetVideoSourceList"><documentation>GET </documentation></operation>
    <operation name="GetXMLTVIdList"><documentation>GET </documentation></operation>
    <operation name="UpdateDBChannel"><documentation>POST </documentation></operation>
    <operation name="RemoveDBChannel"><documentation>DELETE</documentation></operation>
    <operation name="Unclassified"/>
  </portType>
  <binding name="ChannelServices" type="tns:ChannelServices">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <operation name="GetChannelInfo"><soap:operation soapAction="http://mythtv.org/Channel/GetChannelInfo" style="document"/></operation>
    <operation name="UpdateDBChannel"><soap:operation soapAction="http://mythtv.org/Channel/UpdateDBChannel" style="document"/></operation>
  </binding>
  <service name="ChannelServices">
    <port name="BasicHttpBinding_ChannelServices" binding="tns:ChannelServices">
      <soap:address location="http://mythbox:6544/Channel"/>
    </port>
  </service>
</definitions>
"#;

pub const CHANNEL_XSDS: &[(&str, &str)] = &[
    (
        "http://mythbox:6544/Channel/xsd?type=ChannelInfoList",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="http://mythtv.org" targetNamespace="http://mythtv.org" elementFormDefault="qualified">
  <xs:include schemaLocation="http://mythbox:6544/Channel/xsd?type=ChannelInfo"/>
  <xs:complexType name="ChannelInfoList">
    <xs:sequence>
      <xs:element minOccurs="0" name="StartIndex" type="xs:int"/>
      <xs:element minOccurs="0" name="ChannelInfos" nillable="true" type="tns:ArrayOfChannelInfo"/>
    </xs:sequence>
  </xs:complexType>
  <xs:element name="ChannelInfoList" nillable="true" type="tns:ChannelInfoList"/>
</xs:schema>"#,
    ),
    (
        "http://mythbox:6544/Channel/xsd?type=VideoSourceList",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="http://mythtv.org" targetNamespace="http://mythtv.org" elementFormDefault="qualified">
  <xs:include schemaLocation="xsd?type=VideoSource"/>
  <xs:include schemaLocation="http://mythbox:6544/Channel/xsd?type=ChannelInfo"/>
  <xs:complexType name="VideoSourceList">
    <xs:sequence>
      <xs:element minOccurs="0" name="AsOf" type="xs:dateTime"/>
      <xs:element minOccurs="0" name="VideoSources" nillable="true" type="tns:ArrayOfVideoSource"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#,
    ),
    (
        "http://mythbox:6544/Channel/xsd?type=ChannelInfo",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="http://mythtv.org" targetNamespace="http://mythtv.org" elementFormDefault="qualified">
  <xs:complexType name="ChannelInfo">
    <xs:sequence>
      <xs:element minOccurs="0" name="ChanId" type="xs:unsignedInt"/>
      <xs:element minOccurs="0" name="CallSign" nillable="true" type="xs:string"/>
      <xs:element minOccurs="0" name="XMLTVID" nillable="true" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#,
    ),
    (
        "http://mythbox:6544/Channel/xsd?type=VideoSource",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="http://mythtv.org" elementFormDefault="qualified">
  <xs:complexType name="VideoSource">
    <xs:sequence>
      <xs:element minOccurs="0" name="Id" type="xs:int"/>
      <xs:element minOccurs="0" name="SourceName" nillable="true" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#,
    ),
];

pub const MYTH_WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/" xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="http://mythtv.org" name="MythServices">
  <types>
    <xs:schema targetNamespace="http://mythtv.org" elementFormDefault="qualified">
      <xs:element name="GetHostName"><xs:complexType><xs:sequence/></xs:complexType></xs:element>
      <xs:element name="ProfileText"><xs:complexType><xs:sequence/></xs:complexType></xs:element>
      <xs:element name="SendMessage">
        <xs:complexType><xs:sequence>
          <xs:element minOccurs="0" name="Message" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="Address" nillable="true" type="xs:string"/>
          <xs:element minOccurs="0" name="udpPort" type="xs:int"/>
          <xs:element minOccurs="0" name="Timeout" type="xs:int"/>
        </xs:sequence></xs:complexType>
      </xs:element>
    </xs:schema>
  </types>
  <portType name="MythServices">
    <operation name="GetHostName"><documentation>GET </documentation></operation>
    <operation name="ProfileText"><documentation>GET </documentation></operation>
    <operation name="SendMessage"><documentation>POST </documentation></operation>
  </portType>
</definitions>
"#;
