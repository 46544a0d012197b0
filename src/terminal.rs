//! Typed view of the terminal `settings.json` schema.
//!
//! Every field is optional so a value can describe a partial update. Fields
//! the file allows to be `null` are `Option<Option<T>>`: absent, explicit
//! `null`, or a value. Keys not modelled here are carried in `extra`.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::settings::{parse_document, SettingsDocument};

const UPDATE_SOURCE: &str = "<update>";

/// Deserialize a present field into `Some`, keeping an explicit `null`.
fn nullable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSettings {
    #[serde(
        rename = "$help",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub help: Option<Option<String>>,
    #[serde(
        rename = "$schema",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_show_notification_icon: Option<bool>,
    /// A format name such as `"html"`, or a boolean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy_formatting: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy_on_select: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_window_preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_tab_menu: Option<Vec<NewTabEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Profiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemes: Option<Vec<Scheme>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_tabs_in_titlebar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_on_user_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_acrylic_in_tab_row: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windowing_behavior: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub initial_cols: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub initial_rows: Option<Option<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TerminalSettings {
    /// Parse an update from JSON text, checking it against the schema.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Parse {
            path: UPDATE_SOURCE.into(),
            reason: e.to_string(),
        })
    }

    /// Check an update against the schema and return it unchanged.
    ///
    /// Unlike [`TerminalSettings::to_document`], explicit `null`s anywhere in
    /// the update survive, so each top-level value is merged exactly as given.
    pub fn validate_update(text: &str) -> Result<SettingsDocument> {
        let document = parse_document(Path::new(UPDATE_SOURCE), text)?;
        serde_json::from_value::<Self>(Value::Object(document.clone())).map_err(|e| {
            Error::Parse {
                path: UPDATE_SOURCE.into(),
                reason: e.to_string(),
            }
        })?;
        Ok(document)
    }

    /// The keys that are set, as a document ready for merging.
    pub fn to_document(&self) -> Result<SettingsDocument> {
        match serde_json::to_value(self).map_err(std::io::Error::from)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Parse {
                path: UPDATE_SOURCE.into(),
                reason: format!("update serialized to {other} instead of an object"),
            }),
        }
    }
}

/// One key binding entry under `actions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<ActionCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A command is either a bare action name or an object with arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionCommand {
    Name(String),
    Detailed(CommandArgs),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropdown_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggle_visibility: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desktop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_line: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_mode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Font {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_acrylic: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_on_exit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profiles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<ProfileDefaults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<ProfileItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTabEntry {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named colour scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheme {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_black: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_blue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_cyan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_green: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_purple: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_red: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_white: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bright_yellow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cyan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub green: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purple: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yellow: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
