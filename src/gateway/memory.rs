//! In-memory [`SystemGateway`] for tests and rehearsals.
//!
//! Uses `RefCell`/`Cell` for interior mutability since all operations are
//! single-threaded and the trait takes `&self`.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use super::{Hive, Invocation, KeyDisposition, RegValue, RegistryKey, SystemGateway};
use crate::error::{Error, Result};
use crate::resolution::Resolution;

/// Unwind payload raised by [`MemoryGateway::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminated {
    pub code: i32,
}

type KeyId = (Hive, String);

/// A single recorded registry write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryWrite {
    pub hive: Hive,
    pub path: String,
    pub name: String,
    pub value: RegValue,
}

pub struct MemoryGateway {
    elevated: Cell<bool>,
    privilege_failure: RefCell<Option<String>>,
    refuse_elevation: Cell<bool>,
    invocation: RefCell<Invocation>,
    elevation_requests: RefCell<Vec<Invocation>>,

    resolution: Cell<Resolution>,
    rejected: RefCell<HashSet<Resolution>>,
    display_changes: RefCell<Vec<Resolution>>,

    keys: RefCell<HashMap<KeyId, BTreeMap<String, RegValue>>>,
    registry_writes: RefCell<Vec<RegistryWrite>>,
    fail_registry_writes: Cell<bool>,
    fail_file_writes: Cell<bool>,
    keys_opened: Cell<usize>,
    open_handles: Cell<usize>,

    dirs: RefCell<HashSet<PathBuf>>,
    files: RefCell<HashMap<PathBuf, String>>,
    file_writes: RefCell<Vec<PathBuf>>,
    env: RefCell<HashMap<String, String>>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            elevated: Cell::new(false),
            privilege_failure: RefCell::new(None),
            refuse_elevation: Cell::new(false),
            invocation: RefCell::new(Invocation {
                executable: PathBuf::from("C:\\tools\\rust-win-setup.exe"),
                args: Vec::new(),
            }),
            elevation_requests: RefCell::new(Vec::new()),
            resolution: Cell::new(Resolution::new(1920, 1080)),
            rejected: RefCell::new(HashSet::new()),
            display_changes: RefCell::new(Vec::new()),
            keys: RefCell::new(HashMap::new()),
            registry_writes: RefCell::new(Vec::new()),
            fail_registry_writes: Cell::new(false),
            fail_file_writes: Cell::new(false),
            keys_opened: Cell::new(0),
            open_handles: Cell::new(0),
            dirs: RefCell::new(HashSet::new()),
            files: RefCell::new(HashMap::new()),
            file_writes: RefCell::new(Vec::new()),
            env: RefCell::new(HashMap::new()),
        }
    }
}

fn key_id(hive: Hive, path: &str) -> KeyId {
    // Registry paths are case-insensitive.
    (hive, path.to_ascii_lowercase())
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Builders ---

    pub fn with_elevated(self, elevated: bool) -> Self {
        self.elevated.set(elevated);
        self
    }

    pub fn with_privilege_query_failure(self, reason: &str) -> Self {
        *self.privilege_failure.borrow_mut() = Some(reason.to_string());
        self
    }

    pub fn with_elevation_refused(self) -> Self {
        self.refuse_elevation.set(true);
        self
    }

    pub fn with_args(self, args: &[&str]) -> Self {
        self.invocation.borrow_mut().args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_resolution(self, resolution: Resolution) -> Self {
        self.resolution.set(resolution);
        self
    }

    /// Make the simulated driver reject a change to `resolution`.
    pub fn with_rejected_resolution(self, resolution: Resolution) -> Self {
        self.rejected.borrow_mut().insert(resolution);
        self
    }

    /// Create an empty key.
    pub fn with_key(self, hive: Hive, path: &str) -> Self {
        self.keys.borrow_mut().entry(key_id(hive, path)).or_default();
        self
    }

    /// Create a key (if needed) holding `name = value`.
    pub fn with_value(self, hive: Hive, path: &str, name: &str, value: RegValue) -> Self {
        self.keys
            .borrow_mut()
            .entry(key_id(hive, path))
            .or_default()
            .insert(name.to_ascii_lowercase(), value);
        self
    }

    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        self.dirs.borrow_mut().insert(path.into());
        self
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files
            .borrow_mut()
            .insert(path.into(), contents.to_string());
        self
    }

    pub fn with_env(self, name: &str, value: &str) -> Self {
        self.env
            .borrow_mut()
            .insert(name.to_ascii_uppercase(), value.to_string());
        self
    }

    // --- Runtime toggles ---

    pub fn set_elevated(&self, elevated: bool) {
        self.elevated.set(elevated);
    }

    /// Make every registry `set_value` fail until switched off again.
    pub fn set_fail_registry_writes(&self, fail: bool) {
        self.fail_registry_writes.set(fail);
    }

    /// Make every `write_file` fail until switched off again.
    pub fn set_fail_file_writes(&self, fail: bool) {
        self.fail_file_writes.set(fail);
    }

    // --- Inspection ---

    pub fn elevation_requests(&self) -> Vec<Invocation> {
        self.elevation_requests.borrow().clone()
    }

    pub fn display_changes(&self) -> Vec<Resolution> {
        self.display_changes.borrow().clone()
    }

    pub fn value(&self, hive: Hive, path: &str, name: &str) -> Option<RegValue> {
        self.keys
            .borrow()
            .get(&key_id(hive, path))
            .and_then(|values| values.get(&name.to_ascii_lowercase()).cloned())
    }

    pub fn key_exists(&self, hive: Hive, path: &str) -> bool {
        self.keys.borrow().contains_key(&key_id(hive, path))
    }

    pub fn registry_writes(&self) -> Vec<RegistryWrite> {
        self.registry_writes.borrow().clone()
    }

    /// How many times a key has been opened.
    pub fn keys_opened(&self) -> usize {
        self.keys_opened.get()
    }

    /// Key handles currently held (opened and not yet dropped).
    pub fn open_handles(&self) -> usize {
        self.open_handles.get()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.borrow().get(path.as_ref()).cloned()
    }

    pub fn file_writes(&self) -> Vec<PathBuf> {
        self.file_writes.borrow().clone()
    }

    /// Run `f`, which is expected to end in [`SystemGateway::terminate`].
    ///
    /// Returns the termination payload. Panics if `f` returns normally, and
    /// re-raises any other panic.
    pub fn expect_terminated<F>(&self, f: F) -> Terminated
    where
        F: FnOnce(&Self),
    {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(()) => panic!("expected the process to terminate, but it continued"),
            Err(payload) => match payload.downcast::<Terminated>() {
                Ok(terminated) => *terminated,
                Err(other) => panic::resume_unwind(other),
            },
        }
    }
}

impl SystemGateway for MemoryGateway {
    fn is_elevated(&self) -> Result<bool> {
        match self.privilege_failure.borrow().as_ref() {
            Some(reason) => Err(Error::PrivilegeQuery(reason.clone())),
            None => Ok(self.elevated.get()),
        }
    }

    fn invocation(&self) -> Result<Invocation> {
        Ok(self.invocation.borrow().clone())
    }

    fn request_elevation(&self, invocation: &Invocation) -> Result<()> {
        if self.refuse_elevation.get() {
            return Err(Error::ElevationRequest(
                "the operation was canceled by the user".to_string(),
            ));
        }
        self.elevation_requests.borrow_mut().push(invocation.clone());
        Ok(())
    }

    fn terminate(&self, code: i32) -> ! {
        panic::panic_any(Terminated { code })
    }

    fn screen_resolution(&self) -> Result<Resolution> {
        Ok(self.resolution.get())
    }

    fn change_resolution(&self, target: Resolution) -> Result<()> {
        if self.rejected.borrow().contains(&target) {
            return Err(Error::OsRejection(format!(
                "driver refused {target} (DISP_CHANGE_BADMODE)"
            )));
        }
        self.display_changes.borrow_mut().push(target);
        self.resolution.set(target);
        Ok(())
    }

    fn open_key(
        &self,
        hive: Hive,
        path: &str,
        disposition: KeyDisposition,
    ) -> Result<Box<dyn RegistryKey + '_>> {
        let id = key_id(hive, path);
        {
            let mut keys = self.keys.borrow_mut();
            if !keys.contains_key(&id) {
                match disposition {
                    KeyDisposition::ReadOnly | KeyDisposition::OpenExisting => {
                        return Err(Error::registry(
                            format!("{hive}\\{path}"),
                            "the system cannot find the file specified",
                        ));
                    }
                    KeyDisposition::OpenOrCreate => {
                        keys.insert(id.clone(), BTreeMap::new());
                    }
                }
            }
        }

        self.keys_opened.set(self.keys_opened.get() + 1);
        self.open_handles.set(self.open_handles.get() + 1);
        Ok(Box::new(MemoryKey {
            gateway: self,
            read_only: disposition == KeyDisposition::ReadOnly,
            hive,
            path: path.to_string(),
            id,
        }))
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.dirs.borrow().contains(path) || self.files.borrow().contains_key(path)
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.env.borrow().get(&name.to_ascii_uppercase()).cloned()
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        self.files.borrow().get(path).cloned().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))
        })
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if self.fail_file_writes.get() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{}: access is denied", path.display()),
            )));
        }
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), contents.to_string());
        self.file_writes.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

struct MemoryKey<'a> {
    gateway: &'a MemoryGateway,
    read_only: bool,
    hive: Hive,
    path: String,
    id: KeyId,
}

impl RegistryKey for MemoryKey<'_> {
    fn get_value(&self, name: &str) -> Result<Option<RegValue>> {
        Ok(self
            .gateway
            .keys
            .borrow()
            .get(&self.id)
            .and_then(|values| values.get(&name.to_ascii_lowercase()).cloned()))
    }

    fn set_value(&mut self, name: &str, value: &RegValue) -> Result<()> {
        if self.read_only {
            return Err(Error::registry(
                format!("{}\\{}", self.hive, self.path),
                "key was opened read-only",
            ));
        }
        if self.gateway.fail_registry_writes.get() {
            return Err(Error::registry(
                format!("{}\\{}", self.hive, self.path),
                "access is denied",
            ));
        }

        self.gateway
            .keys
            .borrow_mut()
            .entry(self.id.clone())
            .or_default()
            .insert(name.to_ascii_lowercase(), value.clone());
        self.gateway.registry_writes.borrow_mut().push(RegistryWrite {
            hive: self.hive,
            path: self.path.clone(),
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }
}

impl Drop for MemoryKey<'_> {
    fn drop(&mut self) {
        self.gateway
            .open_handles
            .set(self.gateway.open_handles.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_handles_are_released_on_drop() {
        let gw = MemoryGateway::new().with_key(Hive::CurrentUser, "Console");
        {
            let _key = gw
                .open_key(Hive::CurrentUser, "Console", KeyDisposition::OpenExisting)
                .unwrap();
            assert_eq!(gw.open_handles(), 1);
        }
        assert_eq!(gw.open_handles(), 0);
        assert_eq!(gw.keys_opened(), 1);
    }

    #[test]
    fn open_existing_fails_for_missing_key() {
        let gw = MemoryGateway::new();
        let err = gw
            .open_key(Hive::LocalMachine, "SOFTWARE\\Nope", KeyDisposition::OpenExisting)
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::RegistryAccess);
        assert_eq!(gw.open_handles(), 0);
    }

    #[test]
    fn open_or_create_makes_the_key() {
        let gw = MemoryGateway::new();
        let key = gw.open_key(Hive::CurrentUser, "Console", KeyDisposition::OpenOrCreate);
        assert!(key.is_ok());
        drop(key);
        assert!(gw.key_exists(Hive::CurrentUser, "console"));
    }

    #[test]
    fn value_names_are_case_insensitive() {
        let gw = MemoryGateway::new().with_value(
            Hive::LocalMachine,
            "Env",
            "Path",
            RegValue::ExpandString("C:\\a".into()),
        );
        let key = gw
            .open_key(Hive::LocalMachine, "ENV", KeyDisposition::OpenExisting)
            .unwrap();
        assert_eq!(
            key.get_value("PATH").unwrap(),
            Some(RegValue::ExpandString("C:\\a".into()))
        );
    }

    #[test]
    fn terminate_unwinds_with_payload() {
        let gw = MemoryGateway::new();
        let terminated = gw.expect_terminated(|gw| gw.terminate(3));
        assert_eq!(terminated, Terminated { code: 3 });
    }
}
