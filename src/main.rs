//! mythtv_cli - MythTV Services command line client
//! Dumps service operations and bulk-updates records on a MythTV backend

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use mythtv_cli::config::{DEFAULT_HOSTNAME, DEFAULT_PORT};
use mythtv_cli::models::Profile;
use mythtv_cli::{logging, prompt, Backend, MythError, QuerySet, Settings};

const EPILOG: &str = "\
mythtv_cli has 3 basic use cases:

    mythtv_cli generate config
        Generate a basic settings file
    mythtv_cli dump <service> <operation> <key...>
        Print the results of the requested service/operation
    mythtv_cli update <class name> <filter field> <filter regex> <update field> <update value>
        Update the records matching the supplied regular expression in the
        requested class.

Valid Services: Capture, Channel, Content, DVR, Frontend, Guide, Myth, Video

Valid Class Names: ChannelInfo, VideoSource, Profile

Additional Help:

   mythtv_cli dump <service> help # for help on individual services.
   mythtv_cli dump <service> <operation> help # for detailed parameter information

MythTV Web Services Documentation: https://www.mythtv.org/wiki/Services_API";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Command {
    Dump,
    Update,
    Generate,
}

/// MythTV Web Services CLI
#[derive(Parser, Debug)]
#[command(name = "mythtv_cli", version, after_help = EPILOG)]
struct Cli {
    /// Show POST operations with operation help
    #[arg(long)]
    post: bool,

    /// MythTV Backend hostname
    #[arg(long)]
    hostname: Option<String>,

    /// MythTV Backend services port
    #[arg(long = "server-port")]
    port: Option<u16>,

    /// Execute updates without user confirmation
    #[arg(short = 'y')]
    yes: bool,

    /// Enable debug output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print dump results as JSON
    #[arg(long)]
    json: bool,

    /// Maintenance command, see below
    #[arg(value_enum)]
    command: Command,

    /// Command parameter(s)
    #[arg(required = true, num_args = 1..)]
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

    let result = match cli.command {
        Command::Dump => dump(&cli, &settings),
        Command::Update => update(&cli, &settings),
        Command::Generate => generate(&cli, settings.clone()),
    };

    match result {
        Ok(()) => {
            debug!("Done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err, &settings);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &anyhow::Error, settings: &Settings) {
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
}

fn dump(cli: &Cli, settings: &Settings) -> anyhow::Result<()> {
    let backend = Backend::from_settings(settings)?;
    let service = backend.service_api(&cli.params[0])?;
    let args = &cli.params[1..];

    if args.is_empty() || args[0] == "help" {
        service.print_help(cli.post)?;
        return Ok(());
    }

    if let Some(value) = service.execute_args(args, &mut io::stdout())? {
        if cli.json {
            println!("{}", value.to_json_pretty());
        } else {
            println!("{}", value);
        }
    }
    Ok(())
}

/// update <class name> <filter field> <filter regex> <update field> <update value>
fn update(cli: &Cli, settings: &Settings) -> anyhow::Result<()> {
    let [class_name, filter_field, filter_regex, update_field, update_value] = cli.params.as_slice() else {
        bail!("Expect 5 parameters, got {}", cli.params.len());
    };

    let backend = Backend::from_settings(settings)?;
    let query = QuerySet::new(class_name, &backend)?;
    info!(
        "update {} {} '{}' {} '{}'",
        class_name, filter_field, filter_regex, update_field, update_value
    );

    let mut records = query.filter(filter_field, filter_regex)?.all()?;
    if records.is_empty() {
        info!("Nothing to update");
        return Ok(());
    }

    if !cli.yes {
        for record in &records {
            println!(
                "{} {}: '{}' => '{}'",
                record,
                update_field,
                record.field_string(update_field)?,
                update_value
            );
        }
        if !prompt::confirm_stdin("Proceed with update? [y/N] ")? {
            info!("User aborted update");
            return Ok(());
        }
    }

    for record in &mut records {
        let old = record.field_string(update_field)?;
        record.set(update_field, update_value.as_str())?;
        record.save()?;
        info!("Updated: {} {}: '{}' => '{}'", record, update_field, old, update_value);
    }
    info!("Updated {} record(s)", records.len());
    Ok(())
}

/// Interactively write a settings file with a working hostname and port.
fn generate(cli: &Cli, mut settings: Settings) -> anyhow::Result<()> {
    if cli.params[0] != "config" {
        bail!("Unknown generation command: {}", cli.params[0]);
    }

    let path = Settings::settings_path();
    if path.exists() {
        bail!(
            "{} already exists. Please rename or remove this file before generating a new config file.",
            path.display()
        );
    }

    let mut hostname = cli.hostname.clone();
    let mut port = cli.port;
    let (branch, version) = loop {
        settings.hostname = match hostname.take() {
            Some(hostname) => hostname,
            None => prompt::ask_stdin("Enter MythTV Backend hostname [localhost]: ", DEFAULT_HOSTNAME)?,
        };
        settings.port = match port.take() {
            Some(port) => port,
            None => {
                let answer = prompt::ask_stdin("Enter MythTV Backend port [6544]: ", &DEFAULT_PORT.to_string())?;
                match answer.parse() {
                    Ok(port) => port,
                    Err(_) => {
                        warn!("Invalid port: {}", answer);
                        continue;
                    }
                }
            }
        };

        println!("Confirming connection to the MythTV backend.");
        println!("This could take a while...");
        let backend = Backend::from_settings(&settings)?;
        match Profile::fetch(&backend) {
            Ok(profile) => break (profile.branch()?, profile.version()?),
            Err(err) if err.is_network() => {
                println!("Error: {}", err);
                println!(
                    "Unable to connect backend. Please confirm your connection details, \
                     that the backend is running and try again."
                );
            }
            Err(err) => return Err(err.into()),
        }
    };

    println!("Confirmed connection to MythTV:");
    println!("   Backend branch: {}", branch);
    println!("   Version:        {}\n", version);
    println!("Generating config...");
    settings
        .save(&path)
        .with_context(|| format!("Unable to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
