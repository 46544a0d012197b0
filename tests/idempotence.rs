//! End-to-end checks of the mutators against the in-memory gateway.

use std::path::Path;

use rust_win_setup::console_font::{set_console_font, ConsoleFont, CONSOLE_KEY};
use rust_win_setup::gateway::{Hive, MemoryGateway, RegValue};
use rust_win_setup::path::{add_to_path, list_path_entries, ENVIRONMENT_KEY, PATH_VALUE};
use rust_win_setup::resolution::{set_resolution, Resolution};
use rust_win_setup::settings::{merge_settings, parse_document, settings_path};
use rust_win_setup::terminal::TerminalSettings;
use rust_win_setup::ErrorKind;
use serde_json::json;

const LOCAL_APP_DATA: &str = r"C:\Users\dev\AppData\Local";

fn workstation(path: &str) -> MemoryGateway {
    MemoryGateway::new()
        .with_elevated(true)
        .with_resolution(Resolution::new(1920, 1080))
        .with_value(
            Hive::LocalMachine,
            ENVIRONMENT_KEY,
            PATH_VALUE,
            RegValue::ExpandString(path.to_string()),
        )
        .with_env("LOCALAPPDATA", LOCAL_APP_DATA)
}

fn machine_path(gw: &MemoryGateway) -> String {
    match gw.value(Hive::LocalMachine, ENVIRONMENT_KEY, PATH_VALUE) {
        Some(RegValue::ExpandString(s)) => s,
        other => panic!("unexpected PATH value: {other:?}"),
    }
}

#[test]
fn repeated_resolution_change_elevates_at_most_once() {
    let gw = workstation("C:\\a");
    let target = Resolution::new(1360, 768);

    assert!(set_resolution(&gw, target).success);
    gw.set_elevated(false);
    assert!(set_resolution(&gw, target).success);

    assert!(gw.elevation_requests().is_empty());
    assert_eq!(gw.display_changes(), vec![target]);
}

#[test]
fn path_order_is_preserved_and_duplicates_rejected() {
    let gw = workstation("C:\\a;C:\\b")
        .with_dir("C:\\a")
        .with_dir("C:\\c");

    assert!(add_to_path(&gw, Path::new("C:\\c")).success);
    assert_eq!(machine_path(&gw), "C:\\a;C:\\b;C:\\c");

    assert!(add_to_path(&gw, Path::new("C:\\a")).success);
    assert!(add_to_path(&gw, Path::new("C:\\c")).success);
    assert_eq!(machine_path(&gw), "C:\\a;C:\\b;C:\\c");
    assert_eq!(gw.registry_writes().len(), 1);

    assert_eq!(
        list_path_entries(&gw).unwrap(),
        vec!["C:\\a", "C:\\b", "C:\\c"]
    );
    assert_eq!(gw.open_handles(), 0);
}

#[test]
fn missing_directory_never_reaches_the_registry() {
    let gw = workstation("C:\\a");

    let outcome = add_to_path(&gw, Path::new("C:\\not-there"));

    assert_eq!(outcome.error_kind(), Some(ErrorKind::NotFound));
    assert_eq!(gw.keys_opened(), 0);
    assert_eq!(machine_path(&gw), "C:\\a");
}

#[test]
fn typed_update_merges_shallowly_into_settings_file() {
    let gw = workstation("C:\\a");
    let path = settings_path(&gw);
    let gw = gw.with_file(
        &path,
        r#"{
            "copyOnSelect": true,
            "profiles": {"defaults": {"opacity": 90}, "list": [{"name": "Windows PowerShell"}]},
            "schemes": []
        }"#,
    );

    let update = TerminalSettings::from_json(r#"{"copyOnSelect": false, "initialRows": null}"#)
        .unwrap()
        .to_document()
        .unwrap();
    let outcome = merge_settings(&gw, &update);

    assert!(outcome.success, "{outcome}");
    let merged = parse_document(&path, &gw.file(&path).unwrap()).unwrap();
    assert_eq!(merged["copyOnSelect"], json!(false));
    assert_eq!(merged["initialRows"], json!(null));
    assert_eq!(
        merged["profiles"],
        json!({"defaults": {"opacity": 90}, "list": [{"name": "Windows PowerShell"}]})
    );
    assert_eq!(merged["schemes"], json!([]));
    assert!(gw.elevation_requests().is_empty());
}

#[test]
fn merge_without_settings_file_writes_nothing() {
    let gw = workstation("C:\\a");

    let outcome = merge_settings(&gw, &serde_json::Map::new());

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind(), Some(ErrorKind::NotFound));
    assert!(gw.file_writes().is_empty());
}

#[test]
fn console_font_requires_elevation_then_writes() {
    let gw = workstation("C:\\a");
    gw.set_elevated(false);

    let terminated = gw.expect_terminated(|gw| {
        let _ = set_console_font(gw, ConsoleFont::default());
    });
    assert_eq!(terminated.code, 0);
    assert!(gw.registry_writes().is_empty());

    gw.set_elevated(true);
    assert!(set_console_font(&gw, ConsoleFont::default()).success);
    assert_eq!(
        gw.value(Hive::CurrentUser, CONSOLE_KEY, "FontSize"),
        Some(RegValue::Dword(0x000E_0000))
    );
}
