//! Channel maintenance workflows
//!
//! Lists channels, reconciles backend XMLTV ids against an XMLTV guide and
//! saves or applies call sign -> icon URL maps. Every bulk change is shown
//! and confirmed (unless `assume_yes`) before anything is written. Saves
//! happen one channel at a time; a failed save stops the run and leaves the
//! channels already saved changed on the backend.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::backend::Backend;
use crate::epg::{XmltvData, XmltvParser};
use crate::error::{MythError, Result};
use crate::models::ChannelInfo;
use crate::prompt;

/// How a bulk update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NothingToDo,
    Declined,
    Updated(usize),
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceOptions {
    pub xmltv: PathBuf,
    /// XMLTV call sign -> backend call signs
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Propose every mapped channel, even if its id is already right
    pub replace: bool,
    pub assume_yes: bool,
}

pub struct ChannelMaintenance<'a> {
    backend: &'a Backend,
    options: MaintenanceOptions,
    xmltv: Option<XmltvData>,
    channels: Option<Vec<ChannelInfo<'a>>>,
}

impl<'a> ChannelMaintenance<'a> {
    pub fn new(backend: &'a Backend, options: MaintenanceOptions) -> Self {
        Self { backend, options, xmltv: None, channels: None }
    }

    pub fn xmltv_path(&self) -> &Path {
        &self.options.xmltv
    }

    fn xmltv_data(&mut self) -> Result<&XmltvData> {
        if self.xmltv.is_none() {
            let data = XmltvParser::parse_file(&self.options.xmltv)?;
            info!("Read {} channel(s) from {}", data.channels.len(), self.options.xmltv.display());
            self.xmltv = Some(data);
        }
        Ok(self.xmltv.get_or_insert_with(XmltvData::default))
    }

    fn channels(&mut self) -> Result<&mut Vec<ChannelInfo<'a>>> {
        if self.channels.is_none() {
            self.channels = Some(ChannelInfo::all(self.backend)?);
        }
        Ok(self.channels.get_or_insert_with(Vec::new))
    }

    pub fn list_xmltv<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let callsigns = self.xmltv_data()?.callsigns();
        writeln!(out, "{:<20} {:<64}", "CallSign", "XMLTVID")?;
        writeln!(out, "{}", "-".repeat(41))?;
        for (callsign, xmltvid) in &callsigns {
            writeln!(out, "{:<20} {:<64}", callsign, xmltvid)?;
        }
        Ok(())
    }

    pub fn list_channels<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let row = |out: &mut W, cols: [&str; 8]| {
            writeln!(
                out,
                "{:<5} {:<3} {:<20} {:<7} {:<20} {:<7} {:<20} {:<20}",
                cols[0], cols[1], cols[2], cols[3], cols[4], cols[5], cols[6], cols[7]
            )
        };
        row(out, ["Id", "Src", "CallSign", "ChanNum", "Name", "Visible", "XMLTVID", "Icon URL"])?;
        writeln!(out, "{}", "-".repeat(100))?;
        for channel in self.channels()?.iter() {
            row(
                out,
                [
                    &channel.chan_id(),
                    &channel.source_id(),
                    &channel.call_sign(),
                    &channel.chan_num(),
                    &channel.channel_name(),
                    &channel.visible(),
                    &channel.xmltvid(),
                    &channel.icon_url(),
                ],
            )?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Every call sign variation -> XMLTV id. Guide names map to their own
    /// id, and so does each configured alias of a guide name.
    pub fn callsign_map(&mut self) -> Result<BTreeMap<String, String>> {
        if self.options.aliases.is_empty() {
            warn!("CallSign mapping is empty. This normally should be configured in the settings file");
        }
        let aliases = self.options.aliases.clone();
        let mut map = BTreeMap::new();
        for (callsign, xmltvid) in self.xmltv_data()?.callsigns() {
            for alternate in aliases.get(&callsign).into_iter().flatten() {
                map.insert(alternate.clone(), xmltvid.clone());
            }
            map.insert(callsign, xmltvid);
        }
        Ok(map)
    }

    /// (channel index, new XMLTV id) for each channel needing an update.
    fn proposed_xmltvids(&mut self) -> Result<Vec<(usize, String)>> {
        let map = self.callsign_map()?;
        let replace = self.options.replace;
        Ok(self
            .channels()?
            .iter()
            .enumerate()
            .filter_map(|(i, channel)| {
                let new = map.get(&channel.call_sign())?;
                (replace || *new != channel.xmltvid()).then(|| (i, new.clone()))
            })
            .collect())
    }

    pub fn update_xmltvids<R: BufRead, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<Outcome> {
        let proposed = self.proposed_xmltvids()?;
        if proposed.is_empty() {
            info!("update_xmltvids: no updates required");
            return Ok(Outcome::NothingToDo);
        }

        let assume_yes = self.options.assume_yes;
        let channels = self.channels()?;
        if !assume_yes {
            writeln!(out, "{:<6} {:<20} {:<64}", "Id", "CallSign", "XMLTVID")?;
            writeln!(out, "{}", "-".repeat(85))?;
            for (i, xmltvid) in &proposed {
                writeln!(out, "{:<6} {:<20} {:<64}", channels[*i].chan_id(), channels[*i].call_sign(), xmltvid)?;
            }
            if !prompt::confirm(input, out, "Proceed [y/N]? ")? {
                info!("User aborted update");
                return Ok(Outcome::Declined);
            }
        }

        for (i, xmltvid) in &proposed {
            let channel = &mut channels[*i];
            let old = channel.xmltvid();
            channel.update().xmltvid(xmltvid).save()?;
            info!(
                "ChanID: {} ({}): XMLTVID '{}' -> '{}'",
                channel.call_sign(),
                channel.chan_id(),
                old,
                xmltvid
            );
        }
        Ok(Outcome::Updated(proposed.len()))
    }

    /// Call sign -> icon URL of every channel with an icon. The first
    /// channel seen with a call sign wins.
    pub fn icon_map(&mut self) -> Result<BTreeMap<String, String>> {
        let mut icons = BTreeMap::new();
        for channel in self.channels()?.iter() {
            let icon = channel.icon_url();
            if !icon.is_empty() {
                icons.entry(channel.call_sign()).or_insert(icon);
            }
        }
        Ok(icons)
    }

    pub fn save_icons(&mut self, path: &Path) -> Result<usize> {
        let icons = self.icon_map()?;
        let content = serde_json::to_string_pretty(&icons).map_err(|e| MythError::Settings(e.to_string()))?;
        fs::write(path, content + "\n")?;
        info!("Saved {} icon(s) to {}", icons.len(), path.display());
        Ok(icons.len())
    }

    pub fn load_icons<R: BufRead, W: Write>(&mut self, path: &Path, input: &mut R, out: &mut W) -> Result<Outcome> {
        let content = fs::read_to_string(path)?;
        let icons: BTreeMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| MythError::Settings(format!("{}: {}", path.display(), e)))?;

        let assume_yes = self.options.assume_yes;
        let channels = self.channels()?;
        let proposed: Vec<(usize, String)> = channels
            .iter()
            .enumerate()
            .filter_map(|(i, channel)| {
                let icon = icons.get(&channel.call_sign())?;
                (*icon != channel.icon_url()).then(|| (i, icon.clone()))
            })
            .collect();
        if proposed.is_empty() {
            info!("load_icons: no updates required");
            return Ok(Outcome::NothingToDo);
        }

        if !assume_yes {
            writeln!(out, "{:<6} {:<20} {}", "Id", "CallSign", "Icon URL")?;
            writeln!(out, "{}", "-".repeat(85))?;
            for (i, icon) in &proposed {
                writeln!(out, "{:<6} {:<20} {}", channels[*i].chan_id(), channels[*i].call_sign(), icon)?;
            }
            if !prompt::confirm(input, out, "Proceed [y/N]? ")? {
                info!("User aborted update");
                return Ok(Outcome::Declined);
            }
        }

        for (i, icon) in &proposed {
            let channel = &mut channels[*i];
            let old = channel.icon_url();
            channel.update().icon_url(icon).save()?;
            info!("ChanID: {} ({}): IconURL '{}' -> '{}'", channel.call_sign(), channel.chan_id(), old, icon);
        }
        Ok(Outcome::Updated(proposed.len()))
    }
}
