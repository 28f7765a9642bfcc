//! soap-score — inspect, reformat and query SOAP scores from the command line.
//!
//! ```bash
//! soap-score check score.soap
//! soap-score position score.soap 12 2.5
//! soap-score beats score.soap --limit 32
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use soap_score::{CliConfig, Interpreter, Soap, Timeline};

/// SOAP score notation tool
#[derive(Parser, Debug)]
#[command(name = "soap-score", version)]
#[command(about = "Parse, rewrite and query SOAP score files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a score and report its states
    Check { file: PathBuf },
    /// Rewrite a score in canonical form
    Fmt { file: PathBuf },
    /// Print the compiled states
    Dump {
        file: PathBuf,
        /// Emit JSON instead of debug output
        #[arg(long)]
        json: bool,
    },
    /// Seconds from score start to a bar and beat
    Position { file: PathBuf, bar: u32, beat: f64 },
    /// Bar and beat reached after a number of seconds
    Location { file: PathBuf, seconds: f64 },
    /// List labels with their locations and positions
    Labels { file: PathBuf },
    /// List scheduled beats with their timing
    Beats {
        file: PathBuf,
        /// Maximum number of beats to list
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let config = CliConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    debug!(?args, "starting");
    run(args.command, &config)
}

fn run(command: Command, config: &CliConfig) -> Result<()> {
    let precision = config.precision;

    match command {
        Command::Check { file } => {
            let states = parse_file(&file)?;
            Interpreter::new(states.clone())
                .with_context(|| format!("{} is not playable", file.display()))?;
            info!(states = states.len(), "score is valid");
            println!("{}: ok, {} states", file.display(), states.len());
        }
        Command::Fmt { file } => {
            let states = parse_file(&file)?;
            print!("{}", Soap::write(&states));
        }
        Command::Dump { file, json } => {
            let states = parse_file(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&states)?);
            } else {
                for state in &states {
                    println!("{state:?}");
                }
            }
        }
        Command::Position { file, bar, beat } => {
            let interpreter = load_interpreter(&file)?;
            let position = interpreter.position_at_location(bar, beat)?;
            println!("{position:.precision$}");
        }
        Command::Location { file, seconds } => {
            let interpreter = load_interpreter(&file)?;
            let location = interpreter.location_at_position(seconds)?;
            println!("{}|{:.precision$}", location.bar, location.beat);
        }
        Command::Labels { file } => {
            let interpreter = load_interpreter(&file)?;
            for name in interpreter.labels() {
                if let (Some(location), Some(position)) = (
                    interpreter.label_location(&name),
                    interpreter.label_position(&name),
                ) {
                    println!("{name}\t{location}\t{position:.precision$}");
                }
            }
        }
        Command::Beats { file, limit } => {
            let interpreter = load_interpreter(&file)?;
            let limit = limit.unwrap_or(config.beat_limit);
            for infos in Timeline::new(&interpreter).with_limit(limit) {
                let event = if infos.event.is_some() { "*" } else { "" };
                println!(
                    "{}|{:.precision$}\t{:.precision$}\t{:.precision$}\t{:.precision$}\t{event}",
                    infos.location.bar,
                    infos.location.beat,
                    infos.position,
                    infos.duration,
                    infos.dt,
                );
            }
        }
    }

    Ok(())
}

fn parse_file(path: &Path) -> Result<Vec<soap_score::CompiledState>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Soap::parse(&source).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_interpreter(path: &Path) -> Result<Interpreter> {
    let states = parse_file(path)?;
    Interpreter::new(states).with_context(|| format!("{} is not playable", path.display()))
}
