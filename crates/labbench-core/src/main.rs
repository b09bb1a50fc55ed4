use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use labbench_core::{logging, LabConfig, LabSession, LoadResponse};
use std::path::PathBuf;
use std::process::ExitCode;

fn load_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("file")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Protocol file"),
        )
        .arg(
            Arg::new("steps")
                .long("steps")
                .action(ArgAction::SetTrue)
                .help("Print the calibration step list after loading"),
        )
        .arg(
            Arg::new("calibrate-placeable")
                .long("calibrate-placeable")
                .value_name("CONTAINER:AXIS")
                .action(ArgAction::Append)
                .help("Calibrate a container for the pipette on an axis"),
        )
        .arg(
            Arg::new("calibrate-plunger")
                .long("calibrate-plunger")
                .value_name("POSITION:AXIS")
                .action(ArgAction::Append)
                .help("Calibrate a plunger position for the pipette on an axis"),
        )
}

fn cli() -> Command {
    Command::new("labbench")
        .version(labbench_core::VERSION)
        .about("Dry-run liquid-handling protocols and track calibration")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(load_command("load-json", "Load a declarative (JSON) protocol"))
        .subcommand(load_command("load-script", "Load a scripted (Lua) protocol"))
}

/// `name:axis` pairs, split at the last colon
fn targets(args: &ArgMatches, id: &str) -> Result<Vec<(String, String)>> {
    args.get_many::<String>(id)
        .unwrap_or_default()
        .map(|value| {
            value
                .rsplit_once(':')
                .filter(|(name, axis)| !name.is_empty() && !axis.is_empty())
                .map(|(name, axis)| (name.to_string(), axis.to_string()))
                .with_context(|| format!("--{id} expects <name>:<axis>, got '{value}'"))
        })
        .collect()
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: &str, args: &ArgMatches) -> Result<ExitCode> {
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => LabConfig::from_file(path)?,
        None => LabConfig::default(),
    };
    let session = LabSession::from_config(&config)?;

    let path = args
        .get_one::<PathBuf>("file")
        .context("missing protocol file")?;
    let payload =
        std::fs::read(path).with_context(|| format!("cannot read protocol {}", path.display()))?;

    let response: LoadResponse = if command == "load-json" {
        session.load_declarative(&payload)
    } else {
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        session.load_scripted(&payload, &name)
    };
    print_json(&response)?;
    if !response.is_ok() {
        return Ok(ExitCode::FAILURE);
    }

    for (container, axis) in targets(args, "calibrate-placeable")? {
        session
            .calibrate_placeable(&container, &axis)
            .with_context(|| format!("calibrating {container} on axis {axis}"))?;
    }
    for (position, axis) in targets(args, "calibrate-plunger")? {
        session
            .calibrate_plunger(&position, &axis)
            .with_context(|| format!("calibrating plunger {position} on axis {axis}"))?;
    }

    if args.get_flag("steps") {
        print_json(&session.refresh_step_list())?;
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    logging::init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some((command @ ("load-json" | "load-script"), args)) => run(command, args),
        _ => Ok(ExitCode::FAILURE),
    }
}
