//! Machine-wide `PATH` stored under the session manager's environment key.
//!
//! Entries are compared as exact strings; no case folding, trailing
//! separator cleanup or `%VAR%` expansion happens before comparison.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gateway::{Hive, KeyDisposition, RegValue, RegistryKey, SystemGateway};
use crate::outcome::Outcome;
use crate::privilege::require_elevation;

pub const ENVIRONMENT_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";
pub const PATH_VALUE: &str = "PATH";
pub const SEPARATOR: char = ';';

/// Split a `;`-separated PATH value into its entries, in order.
///
/// Leading/trailing separators and empty segments are dropped.
pub fn split_path_list(value: &str) -> Vec<String> {
    value
        .trim_matches(SEPARATOR)
        .split(SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_path_list(entries: &[String]) -> String {
    entries.join(&SEPARATOR.to_string())
}

/// Append `entry` unless it is already present.
///
/// Returns `true` when the list changed.
pub fn append_unique(entries: &mut Vec<String>, entry: &str) -> bool {
    if entries.iter().any(|existing| existing == entry) {
        return false;
    }
    entries.push(entry.to_string());
    true
}

fn read_path_value(key: &dyn RegistryKey) -> Result<String> {
    match key.get_value(PATH_VALUE)? {
        None => Ok(String::new()),
        Some(value) => value.as_str().map(str::to_string).ok_or_else(|| {
            Error::registry(
                format!("{}\\{ENVIRONMENT_KEY}", Hive::LocalMachine),
                format!("{PATH_VALUE} is not a string value"),
            )
        }),
    }
}

/// Current machine PATH entries, in order. Needs no elevation.
pub fn list_path_entries(gateway: &dyn SystemGateway) -> Result<Vec<String>> {
    let key = gateway.open_key(Hive::LocalMachine, ENVIRONMENT_KEY, KeyDisposition::ReadOnly)?;
    Ok(split_path_list(&read_path_value(key.as_ref())?))
}

/// Add `new_path` to the machine PATH.
///
/// `new_path` must exist. The entry is appended after the existing ones;
/// nothing is written if it is already present. Only an actual change goes
/// through the elevation gate.
pub fn add_to_path(gateway: &dyn SystemGateway, new_path: &Path) -> Outcome {
    Outcome::from(append_to_path(gateway, new_path))
}

fn append_to_path(gateway: &dyn SystemGateway, new_path: &Path) -> Result<()> {
    if !gateway.path_exists(new_path) {
        return Err(Error::NotFound(format!("{} does not exist", new_path.display())));
    }

    let new_entry = new_path.to_string_lossy();
    match list_path_entries(gateway) {
        Ok(entries) if entries.iter().any(|e| *e == new_entry) => {
            info!("{new_entry} is already on PATH");
            return Ok(());
        }
        Ok(_) => {}
        Err(e) => debug!("Read-only PATH lookup failed, continuing elevated: {e}"),
    }

    require_elevation(gateway);

    let mut key = gateway.open_key(
        Hive::LocalMachine,
        ENVIRONMENT_KEY,
        KeyDisposition::OpenExisting,
    )?;

    let mut entries = split_path_list(&read_path_value(key.as_ref())?);
    for (i, entry) in entries.iter().enumerate() {
        debug!("> {i}: {entry}");
    }

    // Re-checked under the write handle; the value may have changed since.
    if !append_unique(&mut entries, &new_entry) {
        info!("{new_entry} is already on PATH");
        return Ok(());
    }

    key.set_value(PATH_VALUE, &RegValue::ExpandString(join_path_list(&entries)))?;
    info!("Added {new_entry} to PATH");
    Ok(())
}
