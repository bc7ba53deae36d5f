//! Channel service record types

use tracing::debug;

use super::{Record, RecordClass, ServiceDefinition};
use crate::backend::Backend;
use crate::error::{MythError, Result};
use crate::value::Value;

pub static CHANNEL_INFO: ServiceDefinition = ServiceDefinition {
    name: "ChannelInfo",
    service: "Channel",
    get_operation: Some("GetChannelInfo"),
    get_keys: &["ChanID"],
    primary_key: &["ChanId"],
    post_operation: Some("UpdateDBChannel"),
    post_mapping: &[
        ("ChanId", "ChannelID"),
        ("ChanNum", "ChannelNumber"),
        ("CallSign", "CallSign"),
        ("IconURL", "Icon"),
        ("ChannelName", "ChannelName"),
        ("MplexId", "MplexID"),
        ("ServiceId", "ServiceID"),
        ("SourceId", "SourceID"),
        ("ATSCMajorChan", "ATSCMajorChannel"),
        ("ATSCMinorChan", "ATSCMinorChannel"),
        ("UseEIT", "UseEIT"),
        ("Visible", "visible"),
        ("FrequencyId", "FrequencyID"),
        ("Format", "Format"),
        ("XMLTVID", "XMLTVID"),
        ("DefaultAuth", "DefaultAuthority"),
    ],
    keys: &[
        "ChanId", "ChanNum", "CallSign", "IconURL", "ChannelName", "MplexId", "TransportId",
        "ServiceId", "NetworkId", "ATSCMajorChan", "ATSCMinorChan", "Format", "Modulation",
        "Frequency", "FrequencyId", "FrequencyTable", "FineTune", "SIStandard", "ChanFilters",
        "SourceId", "InputId", "CommFree", "UseEIT", "Visible", "XMLTVID", "DefaultAuth",
        "Programs",
    ],
    writable: &["ChanNum", "CallSign", "ChannelName", "IconURL", "Visible", "XMLTVID"],
};

pub static VIDEO_SOURCE: ServiceDefinition = ServiceDefinition {
    name: "VideoSource",
    service: "Channel",
    get_operation: Some("GetVideoSource"),
    get_keys: &["SourceID"],
    primary_key: &["Id"],
    post_operation: None,
    post_mapping: &[],
    keys: &[
        "Id", "SourceName", "Grabber", "UserId", "FreqTable", "LineupId", "Password", "UseEIT",
        "ConfigPath", "NITId",
    ],
    writable: &[],
};

/// Video sources as returned by `GetVideoSourceList`.
fn video_sources(backend: &Backend) -> Result<Value> {
    let list = backend.service_api("Channel")?.call("GetVideoSourceList", &[])?;
    Ok(list.get("VideoSources").clone())
}

pub struct VideoSourceClass;

impl RecordClass for VideoSourceClass {
    fn definition(&self) -> &'static ServiceDefinition {
        &VIDEO_SOURCE
    }

    fn all<'a>(&self, backend: &'a Backend) -> Result<Vec<Record<'a>>> {
        let sources = video_sources(backend)?;
        Ok(sources
            .items()
            .into_iter()
            .map(|source| Record::from_value(&VIDEO_SOURCE, backend, source))
            .collect())
    }
}

pub struct ChannelInfoClass;

impl RecordClass for ChannelInfoClass {
    fn definition(&self) -> &'static ServiceDefinition {
        &CHANNEL_INFO
    }

    /// Channels of every video source, one `GetChannelInfoList` per source.
    fn all<'a>(&self, backend: &'a Backend) -> Result<Vec<Record<'a>>> {
        let api = backend.service_api("Channel")?;
        let mut records = Vec::new();
        for source in video_sources(backend)?.items() {
            let id = source.get("Id").to_field_string();
            let list = api.call("GetChannelInfoList", &[id.as_str()])?;
            let channels = list.get("ChannelInfos").items();
            debug!("Video source {}: {} channel(s)", id, channels.len());
            records.extend(
                channels
                    .into_iter()
                    .map(|channel| Record::from_value(&CHANNEL_INFO, backend, channel)),
            );
        }
        Ok(records)
    }
}

/// Typed read view of a `ChannelInfo` record.
#[derive(Debug, Clone)]
pub struct ChannelInfo<'a> {
    record: Record<'a>,
}

impl<'a> ChannelInfo<'a> {
    pub fn from_record(record: Record<'a>) -> Result<Self> {
        if !std::ptr::eq(record.definition(), &CHANNEL_INFO) {
            return Err(MythError::UnknownClass(format!(
                "{} is not a ChannelInfo",
                record.definition().name
            )));
        }
        Ok(Self { record })
    }

    pub fn all(backend: &'a Backend) -> Result<Vec<Self>> {
        Ok(ChannelInfoClass
            .all(backend)?
            .into_iter()
            .map(|record| Self { record })
            .collect())
    }

    pub fn fetch(backend: &'a Backend, chan_id: &str) -> Result<Self> {
        let record = ChannelInfoClass.get(backend, &[chan_id])?;
        Ok(Self { record })
    }

    fn field(&self, name: &str) -> String {
        self.record
            .fields()
            .get(name)
            .map(Value::to_field_string)
            .unwrap_or_default()
    }

    pub fn chan_id(&self) -> String {
        self.field("ChanId")
    }

    pub fn chan_num(&self) -> String {
        self.field("ChanNum")
    }

    pub fn call_sign(&self) -> String {
        self.field("CallSign")
    }

    pub fn channel_name(&self) -> String {
        self.field("ChannelName")
    }

    pub fn source_id(&self) -> String {
        self.field("SourceId")
    }

    pub fn visible(&self) -> String {
        self.field("Visible")
    }

    pub fn xmltvid(&self) -> String {
        self.field("XMLTVID")
    }

    pub fn icon_url(&self) -> String {
        self.field("IconURL")
    }

    pub fn record(&self) -> &Record<'a> {
        &self.record
    }

    pub fn into_record(self) -> Record<'a> {
        self.record
    }

    /// Start changing the writable fields.
    pub fn update(&mut self) -> ChannelUpdate<'_, 'a> {
        ChannelUpdate { record: &mut self.record }
    }
}

/// Setters for the writable `ChannelInfo` fields.
pub struct ChannelUpdate<'r, 'a> {
    record: &'r mut Record<'a>,
}

impl ChannelUpdate<'_, '_> {
    pub fn chan_num(self, value: &str) -> Self {
        self.record.put("ChanNum", value);
        self
    }

    pub fn call_sign(self, value: &str) -> Self {
        self.record.put("CallSign", value);
        self
    }

    pub fn channel_name(self, value: &str) -> Self {
        self.record.put("ChannelName", value);
        self
    }

    pub fn icon_url(self, value: &str) -> Self {
        self.record.put("IconURL", value);
        self
    }

    pub fn visible(self, visible: bool) -> Self {
        self.record.put("Visible", visible.to_string());
        self
    }

    pub fn xmltvid(self, value: &str) -> Self {
        self.record.put("XMLTVID", value);
        self
    }

    pub fn save(self) -> Result<()> {
        self.record.save()?;
        Ok(())
    }
}
