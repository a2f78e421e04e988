//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands::{self, RecordOptions};
use crate::logging;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// A guided voice memo recorder with a live scrolling waveform
#[derive(Parser)]
#[command(name = "voxmemo")]
#[command(version)]
#[command(about = "Record a voice memo: pick a microphone, record, preview, accept")]
#[command(long_about = "Record a voice memo: pick a microphone, record, preview, accept.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n    Record options (--team, --device, -o) can be used without explicitly saying 'record'.\n\nEXAMPLES:\n    # Record and save to the configured output directory\n    $ voxmemo\n\n    # Record with the blue team palette and save to a file\n    $ voxmemo --team blue -o memo.wav\n\n    # Preselect the second input device\n    $ voxmemo record --device 1\n\n    # Edit configuration file\n    $ voxmemo config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/voxmemo/voxmemo.toml\n    Logs:               ~/.local/state/voxmemo/voxmemo.log.*"
)]
struct Cli {
    #[command(flatten)]
    record: RecordArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct RecordArgs {
    /// Team identifier used for the color palette
    #[arg(long, value_name = "TEAM", global = true)]
    team: Option<String>,

    /// Input device to preselect: index, name, or "default"
    #[arg(short, long, value_name = "DEVICE", global = true)]
    device: Option<String>,

    /// Write the accepted recording to this file
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,
}

impl From<RecordArgs> for RecordOptions {
    fn from(args: RecordArgs) -> Self {
        RecordOptions {
            team: args.team,
            device: args.device,
            output: args.output,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Record a voice memo (default)
    ///
    /// Enter starts and stops, Space pauses, and in the preview Space plays,
    /// arrows seek, Enter accepts and r re-records. Escape or q discards.
    #[command(visible_alias = "r")]
    Record,

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the input device in voxmemo.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   voxmemo completions bash > voxmemo.bash
    ///   voxmemo completions zsh > _voxmemo
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that print to the terminal run without file logging.
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "voxmemo", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return exit_on_error(commands::handle_list_devices()),
        Some(Commands::Logs) => return exit_on_error(commands::handle_logs()),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Record) => {
            commands::handle_record(cli.record.into()).await?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

fn exit_on_error(result: anyhow::Result<()>) -> anyhow::Result<()> {
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_options_without_subcommand() {
        let cli = Cli::try_parse_from(["voxmemo", "--team", "blue", "-o", "memo.wav"]).unwrap();
        assert!(cli.command.is_none());
        let options: RecordOptions = cli.record.into();
        assert_eq!(options.team.as_deref(), Some("blue"));
        assert_eq!(options.output, Some(PathBuf::from("memo.wav")));
    }

    #[test]
    fn test_record_options_after_subcommand() {
        let cli = Cli::try_parse_from(["voxmemo", "record", "--device", "1"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Record)));
        assert_eq!(cli.record.device.as_deref(), Some("1"));
    }
}
