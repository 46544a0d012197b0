//! Capability boundary between the mutators and the operating system.
//!
//! Every OS interaction the mutators need (token query, elevation, display
//! mode, registry, files, environment) goes through [`SystemGateway`].
//! [`WindowsGateway`] binds it to the real Win32 APIs; [`MemoryGateway`]
//! keeps everything in memory so the algorithms can be exercised anywhere.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::resolution::Resolution;

pub mod memory;
#[cfg(windows)]
pub mod win32;

pub use memory::{MemoryGateway, Terminated};
#[cfg(windows)]
pub use win32::WindowsGateway;

/// Root registry hive a key path is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hive::LocalMachine => write!(f, "HKEY_LOCAL_MACHINE"),
            Hive::CurrentUser => write!(f, "HKEY_CURRENT_USER"),
        }
    }
}

/// How a key should be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Open an existing key for reading only.
    ReadOnly,
    /// Open an existing key for reading and writing; fail if missing.
    OpenExisting,
    /// Open the key, creating it first when it does not exist.
    OpenOrCreate,
}

/// The registry value types this crate reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    String(String),
    ExpandString(String),
    Dword(u32),
}

impl RegValue {
    /// String payload of `REG_SZ` / `REG_EXPAND_SZ` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RegValue::String(s) | RegValue::ExpandString(s) => Some(s),
            RegValue::Dword(_) => None,
        }
    }
}

/// An open registry key. Dropping the handle releases the key.
pub trait RegistryKey {
    /// Read a value; `Ok(None)` when the value does not exist.
    fn get_value(&self, name: &str) -> Result<Option<RegValue>>;

    fn set_value(&mut self, name: &str, value: &RegValue) -> Result<()>;
}

/// How the current process was started, used to re-launch it elevated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub executable: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// Arguments joined into a single command-line string.
    ///
    /// Arguments with whitespace or quotes are wrapped in double quotes so the
    /// new process sees the same argv.
    pub fn command_line(&self) -> String {
        self.args
            .iter()
            .map(|arg| quote_arg(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // Backslashes before a quote must be doubled, plus one for the quote.
                quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
                continue;
            }
            _ => {}
        }
        if c != '\\' {
            quoted.extend(std::iter::repeat('\\').take(backslashes));
            backslashes = 0;
            quoted.push(c);
        }
    }
    // Trailing backslashes precede the closing quote.
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

/// Every OS interaction the mutators perform.
pub trait SystemGateway {
    /// Whether the current process token is elevated.
    fn is_elevated(&self) -> Result<bool>;

    /// Executable and arguments of the running process.
    fn invocation(&self) -> Result<Invocation>;

    /// Ask the OS to start `invocation` elevated. Does not wait for it.
    fn request_elevation(&self, invocation: &Invocation) -> Result<()>;

    /// End the current process.
    fn terminate(&self, code: i32) -> !;

    /// Primary display resolution in pixels.
    fn screen_resolution(&self) -> Result<Resolution>;

    /// Submit a display mode change for the primary display.
    fn change_resolution(&self, target: Resolution) -> Result<()>;

    fn open_key(
        &self,
        hive: Hive,
        path: &str,
        disposition: KeyDisposition,
    ) -> Result<Box<dyn RegistryKey + '_>>;

    fn path_exists(&self, path: &Path) -> bool;

    fn env_var(&self, name: &str) -> Option<String>;

    fn read_file(&self, path: &Path) -> Result<String>;

    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;
}
