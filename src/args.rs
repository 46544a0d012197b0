use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_win_setup::console_font::ConsoleFont;
use rust_win_setup::report::ExportFormat;
use rust_win_setup::resolution::Resolution;

/// Idempotent Windows workstation tweaks that re-launch themselves elevated when needed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report whether the process is running elevated
    Status,

    /// Read or change the primary display resolution
    #[command(subcommand)]
    Resolution(ResolutionCommand),

    /// Inspect or extend the machine-wide PATH
    #[command(subcommand)]
    Path(PathCommand),

    /// Edit the terminal settings file
    #[command(subcommand)]
    Terminal(TerminalCommand),

    /// Set the console host (cmd.exe) font
    ConsoleFont(ConsoleFontArgs),
}

#[derive(Subcommand, Debug)]
pub enum ResolutionCommand {
    /// Print the current resolution
    Get,
    /// Switch to WIDTHxHEIGHT, e.g. 1920x1080
    Set { target: Resolution },
}

#[derive(Subcommand, Debug)]
pub enum PathCommand {
    /// Append a directory unless it is already present
    Add { dir: PathBuf },

    /// List the current entries
    List {
        /// Export the listing to this file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Export format [default: txt]
        #[arg(long, value_enum, requires = "export")]
        format: Option<ExportFormat>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TerminalCommand {
    /// Shallow-merge a JSON object into settings.json (inline JSON or @file)
    Merge {
        update: String,

        /// Settings file to edit instead of the current user's
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct ConsoleFontArgs {
    /// Glyph height in pixels
    #[arg(long, default_value = "14")]
    pub height: u16,

    /// Glyph width in pixels (0 = automatic)
    #[arg(long, default_value = "0")]
    pub width: u16,

    /// Font family identifier
    #[arg(long, default_value = "54")]
    pub family: u32,

    /// Font weight (400 = normal)
    #[arg(long, default_value = "400")]
    pub weight: u32,
}

impl From<&ConsoleFontArgs> for ConsoleFont {
    fn from(args: &ConsoleFontArgs) -> Self {
        ConsoleFont {
            height: args.height,
            width: args.width,
            family: args.family,
            weight: args.weight,
        }
    }
}
