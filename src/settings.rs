//! Shallow merge of an update object into the terminal's `settings.json`.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gateway::SystemGateway;
use crate::outcome::Outcome;

/// A JSON object keyed by top-level setting name.
pub type SettingsDocument = Map<String, Value>;

pub const SETTINGS_PATH_TEMPLATE: &str =
    r"%LOCALAPPDATA%\Packages\Microsoft.WindowsTerminal_8wekyb3d8bbwe\LocalState\settings.json";

const INDENT: &[u8] = b"    ";

/// Expand `%NAME%` references using the gateway's environment.
///
/// References to unset variables and a `%` without a closing partner are
/// kept literally. Scanning resumes right after the first `%` of an
/// unresolved pair, so `50% of %A%` still expands `%A%`.
pub fn expand_env_vars(gateway: &dyn SystemGateway, template: &str) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let resolved = after
            .find('%')
            .and_then(|end| gateway.env_var(&after[..end]).map(|value| (end, value)));
        match resolved {
            Some((end, value)) => {
                expanded.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                expanded.push('%');
                rest = after;
            }
        }
    }
    expanded.push_str(rest);
    expanded
}

/// Location of the terminal settings file for the current user.
pub fn settings_path(gateway: &dyn SystemGateway) -> PathBuf {
    PathBuf::from(expand_env_vars(gateway, SETTINGS_PATH_TEMPLATE))
}

/// Overwrite top-level keys of `document` with those in `update`.
///
/// Nested objects and arrays are replaced wholesale, never merged.
pub fn shallow_merge(document: &mut SettingsDocument, update: &SettingsDocument) {
    for (key, value) in update {
        document.insert(key.clone(), value.clone());
    }
}

/// Parse a settings file body into a document.
pub fn parse_document(path: &Path, text: &str) -> Result<SettingsDocument> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let parse_error = |reason: String| Error::Parse {
        path: path.to_path_buf(),
        reason,
    };

    match serde_json::from_str::<Value>(text).map_err(|e| parse_error(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(parse_error(format!(
            "expected a JSON object at the top level, found {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Serialize with four-space indentation.
pub fn to_pretty_json(document: &SettingsDocument) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer).map_err(io::Error::from)?;
    String::from_utf8(buf).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Merge `update` into the current user's terminal settings file.
///
/// The file must already exist; it is never created. No elevation needed.
/// An unset `%LOCALAPPDATA%` leaves the path unresolved, which then fails
/// the existence check.
pub fn merge_settings(gateway: &dyn SystemGateway, update: &SettingsDocument) -> Outcome {
    Outcome::from(merge_into(gateway, &settings_path(gateway), update))
}

/// Same as [`merge_settings`] against an explicit file.
pub fn merge_settings_at(
    gateway: &dyn SystemGateway,
    path: &Path,
    update: &SettingsDocument,
) -> Outcome {
    Outcome::from(merge_into(gateway, path, update))
}

fn merge_into(gateway: &dyn SystemGateway, path: &Path, update: &SettingsDocument) -> Result<()> {
    if !gateway.path_exists(path) {
        return Err(Error::NotFound(format!(
            "terminal settings file not found at {}",
            path.display()
        )));
    }

    let mut document = parse_document(path, &gateway.read_file(path)?)?;
    debug!(
        "Merging keys {:?} into {}",
        update.keys().collect::<Vec<_>>(),
        path.display()
    );
    shallow_merge(&mut document, update);

    gateway.write_file(path, &to_pretty_json(&document)?)?;
    info!("Updated {} setting(s) in {}", update.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::MemoryGateway;
    use serde_json::json;

    const LOCAL_APP_DATA: &str = r"C:\Users\dev\AppData\Local";

    fn document(value: Value) -> SettingsDocument {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn default_settings_path() -> PathBuf {
        PathBuf::from(format!(
            r"{LOCAL_APP_DATA}\Packages\Microsoft.WindowsTerminal_8wekyb3d8bbwe\LocalState\settings.json"
        ))
    }

    #[test]
    fn expands_known_variables() {
        let gw = MemoryGateway::new().with_env("LOCALAPPDATA", LOCAL_APP_DATA);
        assert_eq!(settings_path(&gw), default_settings_path());
    }

    #[test]
    fn unset_variable_is_kept_literally() {
        let gw = MemoryGateway::new().with_env("A", "1");
        assert_eq!(expand_env_vars(&gw, "%NOPE%\\x"), "%NOPE%\\x");
        assert_eq!(expand_env_vars(&gw, "%NOPE%A%"), "%NOPE1");
    }

    #[test]
    fn unset_local_app_data_fails_the_existence_check() {
        let gw = MemoryGateway::new();

        let outcome = merge_settings(&gw, &document(json!({ "copyOnSelect": false })));

        assert_eq!(outcome.error_kind(), Some(ErrorKind::NotFound));
        assert!(gw.file_writes().is_empty());
    }

    #[test]
    fn lone_percent_is_literal() {
        let gw = MemoryGateway::new().with_env("A", "1");
        assert_eq!(expand_env_vars(&gw, "50% of %A%"), "50% of 1");
        assert_eq!(expand_env_vars(&gw, "100%"), "100%");
    }

    #[test]
    fn merge_replaces_top_level_keys_only() {
        let mut doc = document(json!({
            "copyOnSelect": true,
            "profiles": { "defaults": { "opacity": 80 }, "list": [{ "name": "cmd" }] }
        }));
        let update = document(json!({
            "copyOnSelect": false,
            "launchMode": "maximized"
        }));

        shallow_merge(&mut doc, &update);

        assert_eq!(doc["copyOnSelect"], json!(false));
        assert_eq!(doc["launchMode"], json!("maximized"));
        assert_eq!(
            doc["profiles"],
            json!({ "defaults": { "opacity": 80 }, "list": [{ "name": "cmd" }] })
        );
    }

    #[test]
    fn nested_update_replaces_instead_of_merging() {
        let mut doc = document(json!({
            "profiles": { "defaults": { "opacity": 80 }, "list": [{ "name": "cmd" }] }
        }));
        let update = document(json!({ "profiles": { "defaults": { "useAcrylic": true } } }));

        shallow_merge(&mut doc, &update);

        assert_eq!(doc["profiles"], json!({ "defaults": { "useAcrylic": true } }));
    }

    #[test]
    fn parse_rejects_non_objects_and_garbage() {
        let path = Path::new("settings.json");
        assert_eq!(
            parse_document(path, "[1, 2]").unwrap_err().kind(),
            ErrorKind::Parse
        );
        assert_eq!(
            parse_document(path, "{ not json").unwrap_err().kind(),
            ErrorKind::Parse
        );
    }

    #[test]
    fn parse_accepts_byte_order_mark() {
        let doc = parse_document(Path::new("s.json"), "\u{feff}{\"a\": 1}").unwrap();
        assert_eq!(doc["a"], json!(1));
    }

    #[test]
    fn pretty_output_uses_four_spaces_and_keeps_order() {
        let doc = document(json!({ "b": 1, "a": { "c": true } }));
        assert_eq!(
            to_pretty_json(&doc).unwrap(),
            "{\n    \"b\": 1,\n    \"a\": {\n        \"c\": true\n    }\n}"
        );
    }

    #[test]
    fn merges_into_resolved_settings_file() {
        let path = default_settings_path();
        let gw = MemoryGateway::new()
            .with_env("LOCALAPPDATA", LOCAL_APP_DATA)
            .with_file(
                &path,
                r#"{"copyOnSelect": true, "profiles": {"list": [{"name": "pwsh"}]}}"#,
            );

        let outcome = merge_settings(&gw, &document(json!({ "copyOnSelect": false })));

        assert!(outcome.success, "{outcome}");
        let written = parse_document(&path, &gw.file(&path).unwrap()).unwrap();
        assert_eq!(written["copyOnSelect"], json!(false));
        assert_eq!(written["profiles"], json!({ "list": [{ "name": "pwsh" }] }));
        assert!(gw.elevation_requests().is_empty());
    }

    #[test]
    fn missing_file_is_not_found_and_not_created() {
        let gw = MemoryGateway::new().with_env("LOCALAPPDATA", LOCAL_APP_DATA);

        let outcome = merge_settings(&gw, &document(json!({ "copyOnSelect": false })));

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::NotFound));
        assert!(gw.file_writes().is_empty());
        assert!(gw.file(default_settings_path()).is_none());
    }

    #[test]
    fn malformed_file_is_a_parse_failure_and_left_alone() {
        let path = PathBuf::from("settings.json");
        let gw = MemoryGateway::new().with_file(&path, "{ \"copyOnSelect\": ");

        let outcome = merge_settings_at(&gw, &path, &document(json!({ "a": 1 })));

        assert_eq!(outcome.error_kind(), Some(ErrorKind::Parse));
        assert!(gw.file_writes().is_empty());
        assert_eq!(gw.file(&path).unwrap(), "{ \"copyOnSelect\": ");
    }

    #[test]
    fn failed_write_is_an_io_error_and_keeps_contents() {
        let path = PathBuf::from("settings.json");
        let gw = MemoryGateway::new().with_file(&path, r#"{"copyOnSelect": true}"#);
        gw.set_fail_file_writes(true);

        let outcome = merge_settings_at(&gw, &path, &document(json!({ "copyOnSelect": false })));

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Io));
        assert_eq!(gw.file(&path).unwrap(), r#"{"copyOnSelect": true}"#);
        assert!(gw.file_writes().is_empty());
    }
}
