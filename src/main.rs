//! rust-win-setup entry point.

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use rust_win_setup::console_font::{set_console_font, ConsoleFont};
use rust_win_setup::gateway::SystemGateway;
use rust_win_setup::path::{add_to_path, list_path_entries};
use rust_win_setup::privilege::check_privilege;
use rust_win_setup::report::{display_entries, export, inspect_entries, ExportFormat};
use rust_win_setup::resolution::{get_resolution, set_resolution};
use rust_win_setup::settings::{merge_settings, merge_settings_at};
use rust_win_setup::terminal::TerminalSettings;
use rust_win_setup::Outcome;
use tracing::{error, Level};

use crate::args::{Cli, Command, PathCommand, ResolutionCommand, TerminalCommand};

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_target(false)
        .init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(windows)]
fn run(cli: Cli) -> Result<bool> {
    let gateway = rust_win_setup::gateway::WindowsGateway::new();
    dispatch(cli, &gateway)
}

#[cfg(not(windows))]
fn run(_cli: Cli) -> Result<bool> {
    anyhow::bail!("rust-win-setup only supports Windows")
}

/// Run one command. Returns whether it succeeded.
#[cfg_attr(not(windows), allow(dead_code))]
fn dispatch(cli: Cli, gateway: &dyn SystemGateway) -> Result<bool> {
    let outcome = match cli.command {
        Command::Status => {
            print_privileges(gateway);
            return Ok(true);
        }
        Command::Resolution(ResolutionCommand::Get) => {
            println!("{}", get_resolution(gateway)?);
            return Ok(true);
        }
        Command::Resolution(ResolutionCommand::Set { target }) => set_resolution(gateway, target),
        Command::Path(PathCommand::Add { dir }) => add_to_path(gateway, &dir),
        Command::Path(PathCommand::List { export: target, format }) => {
            let entries = inspect_entries(gateway, &list_path_entries(gateway)?);
            display_entries(&entries, cli.verbose);
            if let Some(path) = target {
                let format = format.unwrap_or(ExportFormat::Txt);
                export(&entries, &path, format)
                    .with_context(|| format!("exporting to {}", path.display()))?;
                println!("Successfully exported to {}", path.display());
            }
            return Ok(true);
        }
        Command::Terminal(TerminalCommand::Merge { update, settings }) => {
            let text = match update.strip_prefix('@') {
                Some(file) => std::fs::read_to_string(file)
                    .with_context(|| format!("reading update from {file}"))?,
                None => update,
            };
            let document = TerminalSettings::validate_update(&text)?;
            match settings {
                Some(path) => merge_settings_at(gateway, &path, &document),
                None => merge_settings(gateway, &document),
            }
        }
        Command::ConsoleFont(args) => set_console_font(gateway, ConsoleFont::from(&args)),
    };

    Ok(report(outcome))
}

fn report(outcome: Outcome) -> bool {
    match &outcome.error {
        None => println!("✓ Done"),
        Some(e) => eprintln!("❌ Failed [{}]: {e}", e.kind()),
    }
    outcome.success
}

/// Print whether the process is elevated.
fn print_privileges(gateway: &dyn SystemGateway) {
    let status = check_privilege(gateway);
    if let Some(e) = &status.error {
        println!("⚠️  Could not query privileges: {e}");
    }
    if status.is_admin {
        println!("✓ Running with elevated privileges");
    } else {
        println!("⚠️  WARNING: Not running with elevated privileges.");
        println!("   Changing resolution, PATH or the console font will re-launch");
        println!("   this command as Administrator.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_win_setup::gateway::{Hive, MemoryGateway, RegValue};
    use rust_win_setup::path::{ENVIRONMENT_KEY, PATH_VALUE};

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["rust-win-setup"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn path_add_dispatches_to_registry() {
        let gw = MemoryGateway::new()
            .with_elevated(true)
            .with_value(
                Hive::LocalMachine,
                ENVIRONMENT_KEY,
                PATH_VALUE,
                RegValue::ExpandString("C:\\a".into()),
            )
            .with_dir("C:\\b");

        assert!(dispatch(cli(&["path", "add", "C:\\b"]), &gw).unwrap());
        assert_eq!(
            gw.value(Hive::LocalMachine, ENVIRONMENT_KEY, PATH_VALUE),
            Some(RegValue::ExpandString("C:\\a;C:\\b".into()))
        );
    }

    #[test]
    fn failed_outcome_is_reported_as_false() {
        let gw = MemoryGateway::new().with_elevated(true);
        assert!(!dispatch(cli(&["path", "add", "C:\\missing"]), &gw).unwrap());
    }

    #[test]
    fn terminal_merge_with_explicit_settings_path() {
        let gw = MemoryGateway::new().with_file("settings.json", r#"{"copyOnSelect": true}"#);

        let ok = dispatch(
            cli(&[
                "terminal",
                "merge",
                r#"{"copyOnSelect": false}"#,
                "--settings",
                "settings.json",
            ]),
            &gw,
        )
        .unwrap();

        assert!(ok);
        assert!(gw.file("settings.json").unwrap().contains("\"copyOnSelect\": false"));
    }

    #[test]
    fn invalid_update_json_is_an_error() {
        let gw = MemoryGateway::new().with_file("settings.json", "{}");
        let result = dispatch(
            cli(&["terminal", "merge", "{nope", "--settings", "settings.json"]),
            &gw,
        );
        assert!(result.is_err());
        assert!(gw.file_writes().is_empty());
    }

    #[test]
    fn terminal_merge_writes_nested_nulls_verbatim() {
        let gw = MemoryGateway::new().with_file(
            "settings.json",
            r#"{"defaultProfile": "{guid}", "profiles": {"list": [{"name": "pwsh"}]}}"#,
        );

        let ok = dispatch(
            cli(&[
                "terminal",
                "merge",
                r#"{"defaultProfile": null, "profiles": {"list": [{"name": "cmd", "hidden": null}]}}"#,
                "--settings",
                "settings.json",
            ]),
            &gw,
        )
        .unwrap();

        assert!(ok);
        let merged: serde_json::Value =
            serde_json::from_str(&gw.file("settings.json").unwrap()).unwrap();
        assert_eq!(
            merged,
            serde_json::json!({
                "defaultProfile": null,
                "profiles": {"list": [{"name": "cmd", "hidden": null}]}
            })
        );
    }
}
