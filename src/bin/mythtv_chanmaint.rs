//! mythtv_chanmaint - MythTV channel maintenance
//! Lists channels and reconciles XMLTV ids and icons with a MythTV backend

use anyhow::bail;
use clap::{Parser, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};

use mythtv_cli::chanmaint::{ChannelMaintenance, MaintenanceOptions, Outcome};
use mythtv_cli::config::DEFAULT_HOSTNAME;
use mythtv_cli::{logging, Backend, MythError, Settings};

const EPILOG: &str = "\
mythtv_chanmaint has 4 basic use cases:

    mythtv_chanmaint list xmltv --xmltv file.name
        List the channel and XMLTVID data contained in the xmltv file
    mythtv_chanmaint list channels
        List the channel data contained in the MythTV backend
    mythtv_chanmaint update_xmltvids --xmltv file.name [-y] [--replace]
        Update Channel XMLTVIDs, see below
    mythtv_chanmaint icons save|load FILE
        Save the CallSign -> Icon URL map of the backend channels to FILE,
        or apply the map in FILE to the backend channels

Updating Channel XMLTVIDs
-------------------------

Reads the XMLTVIDs from the supplied file (--xmltv file.name), maps every
CallSign variation listed in the settings file (xmltv_callsigns) to its
XMLTVID and checks each channel in the backend. Unless -y is given the
proposed updates are listed and confirmed before the backend is changed.

Typical XMLTVID Workflow
------------------------

1. Get a copy of the XMLTV EPG data (only the channel data is needed):

   $ tv_grab_huro --days 1 --offset 0 --output xmltv.xml

2. List the xmltv callsigns:

   $ mythtv_chanmaint list xmltv --xmltv xmltv.xml

3. List the MythTV callsigns:

   $ mythtv_chanmaint list channels --hostname backend.host.name

4. Update xmltv_callsigns in the settings file. The XMLTV callsign is the
   key, the MythTV callsign(s) the value.

5. Run the update, check the proposed changes and confirm:

   $ mythtv_chanmaint update_xmltvids --xmltv xmltv.xml --hostname backend.host.name

6. Run mythfilldatabase";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Command {
    List,
    #[value(name = "update_xmltvids")]
    UpdateXmltvids,
    Icons,
}

/// MythTV Channel Maintenance
#[derive(Parser, Debug)]
#[command(name = "mythtv_chanmaint", version, after_help = EPILOG)]
struct Cli {
    /// XMLTV data file
    #[arg(long, default_value = "tv_grab.xml")]
    xmltv: PathBuf,

    /// MythTV Backend hostname (localhost)
    #[arg(long)]
    hostname: Option<String>,

    /// MythTV Backend services port (6544)
    #[arg(long = "server-port")]
    port: Option<u16>,

    /// Execute updates without user confirmation
    #[arg(short = 'y')]
    yes: bool,

    /// Propose every mapped channel, even when its XMLTVID already matches
    #[arg(long)]
    replace: bool,

    /// Enable debug output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Maintenance command, see below
    #[arg(value_enum)]
    command: Command,

    /// Command parameter(s)
    params: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut settings = Settings::load();
    logging::init(&settings.log_filter, cli.verbose);
    debug!("Starting");

    if let Some(hostname) = &cli.hostname {
        settings.hostname = hostname.clone();
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }

    match run(&cli, &settings) {
        Ok(()) => {
            debug!("Done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let network = err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<MythError>())
                .any(MythError::is_network);
            if network {
                if settings.hostname == DEFAULT_HOSTNAME {
                    info!("hostname=='localhost' - has it been set in the settings file?");
                }
                error!(
                    "Unable to get backend service. Please check hostname={}, port={} is correct and the backend is up",
                    settings.hostname, settings.port
                );
            }
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Missing XMLTV data is reported, not treated as a failure.
fn xmltv_available(path: &Path) -> bool {
    if path.exists() {
        return true;
    }
    println!("{} doesn't exist", path.display());
    false
}

fn run(cli: &Cli, settings: &Settings) -> anyhow::Result<()> {
    let backend = Backend::from_settings(settings)?;
    let options = MaintenanceOptions {
        xmltv: cli.xmltv.clone(),
        aliases: settings.xmltv_callsigns.clone(),
        replace: cli.replace,
        assume_yes: cli.yes,
    };
    let mut maint = ChannelMaintenance::new(&backend, options);
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout();

    let outcome = match cli.command {
        Command::List => {
            let [param] = cli.params.as_slice() else {
                bail!("Expecting only 1 parameter, got: {:?}", cli.params);
            };
            match param.as_str() {
                "xmltv" if xmltv_available(maint.xmltv_path()) => maint.list_xmltv(&mut stdout)?,
                "xmltv" => {}
                "channels" => maint.list_channels(&mut stdout)?,
                other => bail!("Unknown list parameter: {}", other),
            }
            return Ok(());
        }
        Command::UpdateXmltvids => {
            if !cli.params.is_empty() {
                bail!("update_xmltvids takes no parameters, got: {:?}", cli.params);
            }
            if !xmltv_available(maint.xmltv_path()) {
                return Ok(());
            }
            maint.update_xmltvids(&mut stdin, &mut stdout)?
        }
        Command::Icons => {
            let [action, file] = cli.params.as_slice() else {
                bail!("Expecting save|load FILE, got: {:?}", cli.params);
            };
            let path = Path::new(file);
            match action.as_str() {
                "save" => {
                    maint.save_icons(path)?;
                    return Ok(());
                }
                "load" => maint.load_icons(path, &mut stdin, &mut stdout)?,
                other => bail!("Unknown icons parameter: {}", other),
            }
        }
    };

    if let Outcome::Updated(count) = outcome {
        info!("Updated {} channel(s)", count);
    }
    Ok(())
}
