//! [`SystemGateway`] backed by the Win32 API.
//!
//! Registry handles are wrapped in [`Win32Key`], which closes the key when
//! dropped so every exit path releases it.

use std::path::Path;
use std::sync::Once;

use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, HANDLE, HWND};
use windows::Win32::Graphics::Gdi::{
    ChangeDisplaySettingsW, CDS_TYPE, DEVMODEW, DISP_CHANGE_SUCCESSFUL, DM_PELSHEIGHT,
    DM_PELSWIDTH,
};
use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE, REG_DWORD, REG_EXPAND_SZ,
    REG_OPTION_NON_VOLATILE, REG_SZ, REG_VALUE_TYPE,
};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SetProcessDPIAware, SM_CXSCREEN, SM_CYSCREEN, SW_SHOWNORMAL,
};

use super::{Hive, Invocation, KeyDisposition, RegValue, RegistryKey, SystemGateway};
use crate::error::{Error, Result};
use crate::resolution::Resolution;

static DPI_AWARE: Once = Once::new();

/// The live machine.
#[derive(Debug, Default)]
pub struct WindowsGateway;

impl WindowsGateway {
    pub fn new() -> Self {
        Self
    }
}

impl SystemGateway for WindowsGateway {
    fn is_elevated(&self) -> Result<bool> {
        unsafe {
            let mut token = HANDLE::default();
            OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token)
                .map_err(|e| Error::PrivilegeQuery(format!("OpenProcessToken: {e}")))?;

            let mut elevation = TOKEN_ELEVATION::default();
            let mut return_length = 0u32;
            let queried = GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut _ as *mut _),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut return_length,
            );
            let _ = CloseHandle(token);

            queried.map_err(|e| Error::PrivilegeQuery(format!("GetTokenInformation: {e}")))?;
            Ok(elevation.TokenIsElevated != 0)
        }
    }

    fn invocation(&self) -> Result<Invocation> {
        Ok(Invocation {
            executable: std::env::current_exe()?,
            args: std::env::args_os()
                .skip(1)
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        })
    }

    fn request_elevation(&self, invocation: &Invocation) -> Result<()> {
        let verb = HSTRING::from("runas");
        let file = HSTRING::from(invocation.executable.as_os_str());
        let params = HSTRING::from(invocation.command_line());

        // ShellExecuteW reports success with a value greater than 32.
        let instance = unsafe {
            ShellExecuteW(
                HWND::default(),
                &verb,
                &file,
                &params,
                PCWSTR::null(),
                SW_SHOWNORMAL,
            )
        };
        let code = instance.0 as isize;
        if code <= 32 {
            return Err(Error::ElevationRequest(format!(
                "ShellExecuteW returned {code}"
            )));
        }
        Ok(())
    }

    fn terminate(&self, code: i32) -> ! {
        std::process::exit(code)
    }

    fn screen_resolution(&self) -> Result<Resolution> {
        // Without DPI awareness the metrics are scaled.
        DPI_AWARE.call_once(|| unsafe {
            let _ = SetProcessDPIAware();
        });

        let (width, height) =
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if width <= 0 || height <= 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(Resolution::new(width as u32, height as u32))
    }

    fn change_resolution(&self, target: Resolution) -> Result<()> {
        let mode = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as u16,
            dmFields: DM_PELSWIDTH | DM_PELSHEIGHT,
            dmPelsWidth: target.width,
            dmPelsHeight: target.height,
            ..Default::default()
        };

        let status = unsafe { ChangeDisplaySettingsW(Some(&mode), CDS_TYPE(0)) };
        if status != DISP_CHANGE_SUCCESSFUL {
            return Err(Error::OsRejection(format!(
                "ChangeDisplaySettingsW returned {} for {target}",
                status.0
            )));
        }
        Ok(())
    }

    fn open_key(
        &self,
        hive: Hive,
        path: &str,
        disposition: KeyDisposition,
    ) -> Result<Box<dyn RegistryKey + '_>> {
        let root = match hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::CurrentUser => HKEY_CURRENT_USER,
        };
        let subkey = HSTRING::from(path);
        let mut hkey = HKEY::default();

        let result = unsafe {
            match disposition {
                KeyDisposition::ReadOnly => RegOpenKeyExW(root, &subkey, 0, KEY_READ, &mut hkey),
                KeyDisposition::OpenExisting => {
                    RegOpenKeyExW(root, &subkey, 0, KEY_READ | KEY_WRITE, &mut hkey)
                }
                KeyDisposition::OpenOrCreate => RegCreateKeyExW(
                    root,
                    &subkey,
                    0,
                    PCWSTR::null(),
                    REG_OPTION_NON_VOLATILE,
                    KEY_READ | KEY_WRITE,
                    None,
                    &mut hkey,
                    None,
                ),
            }
        };

        let name = format!("{hive}\\{path}");
        if result != ERROR_SUCCESS {
            return Err(Error::registry(name, format!("error code {}", result.0)));
        }
        Ok(Box::new(Win32Key { hkey, name }))
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        Ok(std::fs::write(path, contents)?)
    }
}

/// An open registry key, closed on drop.
struct Win32Key {
    hkey: HKEY,
    name: String,
}

impl RegistryKey for Win32Key {
    fn get_value(&self, value_name: &str) -> Result<Option<RegValue>> {
        let value = HSTRING::from(value_name);
        let mut size = 0u32;
        let mut type_code = REG_VALUE_TYPE(0);

        unsafe {
            // Get size
            let result = RegQueryValueExW(
                self.hkey,
                &value,
                None,
                Some(&mut type_code),
                None,
                Some(&mut size),
            );
            if result == ERROR_FILE_NOT_FOUND {
                return Ok(None);
            }
            if result != ERROR_SUCCESS {
                return Err(Error::registry(
                    &self.name,
                    format!("reading '{value_name}': error code {}", result.0),
                ));
            }

            let mut buffer = vec![0u8; size as usize];
            let result = RegQueryValueExW(
                self.hkey,
                &value,
                None,
                Some(&mut type_code),
                Some(buffer.as_mut_ptr()),
                Some(&mut size),
            );
            if result != ERROR_SUCCESS {
                return Err(Error::registry(
                    &self.name,
                    format!("reading '{value_name}': error code {}", result.0),
                ));
            }
            buffer.truncate(size as usize);

            if type_code == REG_SZ {
                Ok(Some(RegValue::String(decode_wide(&buffer))))
            } else if type_code == REG_EXPAND_SZ {
                Ok(Some(RegValue::ExpandString(decode_wide(&buffer))))
            } else if type_code == REG_DWORD && buffer.len() >= 4 {
                let dword = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
                Ok(Some(RegValue::Dword(dword)))
            } else {
                Err(Error::registry(
                    &self.name,
                    format!("'{value_name}' has unsupported type {}", type_code.0),
                ))
            }
        }
    }

    fn set_value(&mut self, value_name: &str, value: &RegValue) -> Result<()> {
        let (type_code, data) = match value {
            RegValue::String(s) => (REG_SZ, encode_wide(s)),
            RegValue::ExpandString(s) => (REG_EXPAND_SZ, encode_wide(s)),
            RegValue::Dword(d) => (REG_DWORD, d.to_le_bytes().to_vec()),
        };

        let name = HSTRING::from(value_name);
        let result = unsafe { RegSetValueExW(self.hkey, &name, 0, type_code, Some(&data)) };
        if result != ERROR_SUCCESS {
            return Err(Error::registry(
                &self.name,
                format!("writing '{value_name}': error code {}", result.0),
            ));
        }
        Ok(())
    }
}

impl Drop for Win32Key {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.hkey);
        }
    }
}

/// UTF-16LE bytes to a string, stopping at the first NUL.
fn decode_wide(bytes: &[u8]) -> String {
    let wide: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

/// NUL-terminated UTF-16LE bytes, as `REG_SZ` expects.
fn encode_wide(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}
