use crate::{Hive, RegistryError, RegistryKey, RegistryReader};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::System::Registry::{
    RegCloseKey, RegOpenKeyExW, RegQueryValueExW, HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE,
    KEY_READ, REG_EXPAND_SZ, REG_SZ, REG_VALUE_TYPE,
};

fn wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

/// The Win32 registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowsRegistry;

impl RegistryReader for WindowsRegistry {
    fn open_readonly(&self, hive: Hive, path: &str) -> Result<Box<dyn RegistryKey>, RegistryError> {
        let root = match hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::CurrentUser => HKEY_CURRENT_USER,
        };
        let subkey = wide(path);
        let mut handle = HKEY::default();

        // SAFETY: `subkey` is NUL-terminated and outlives the call; `handle`
        // is a valid out pointer.
        let status = unsafe {
            RegOpenKeyExW(root, PCWSTR(subkey.as_ptr()), 0, KEY_READ, &mut handle)
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Err(RegistryError::KeyNotFound {
                hive,
                path: path.to_string(),
            });
        }
        check(status, path)?;

        Ok(Box::new(WindowsKey {
            path: path.to_string(),
            handle,
        }))
    }
}

struct WindowsKey {
    path: String,
    handle: HKEY,
}

impl RegistryKey for WindowsKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn string_value(&self, name: &str) -> Result<String, RegistryError> {
        let value_name = wide(name);
        let mut kind = REG_VALUE_TYPE::default();
        let mut len: u32 = 0;

        // SAFETY: sizing query; only the type and length out pointers are set.
        let status = unsafe {
            RegQueryValueExW(
                self.handle,
                PCWSTR(value_name.as_ptr()),
                None,
                Some(&mut kind as *mut _),
                None,
                Some(&mut len as *mut _),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Err(RegistryError::ValueNotFound {
                path: self.path.clone(),
                name: name.to_string(),
            });
        }
        check(status, &self.path)?;
        if kind != REG_SZ && kind != REG_EXPAND_SZ {
            return Err(RegistryError::InvalidData {
                path: self.path.clone(),
                name: name.to_string(),
            });
        }

        let mut buf = vec![0u16; (len as usize).div_ceil(2)];
        // SAFETY: `buf` holds at least `len` bytes.
        let status = unsafe {
            RegQueryValueExW(
                self.handle,
                PCWSTR(value_name.as_ptr()),
                None,
                None,
                Some(buf.as_mut_ptr().cast::<u8>()),
                Some(&mut len as *mut _),
            )
        };
        check(status, &self.path)?;

        buf.truncate(len as usize / 2);
        while buf.last() == Some(&0) {
            buf.pop();
        }
        String::from_utf16(&buf).map_err(|_| RegistryError::InvalidData {
            path: self.path.clone(),
            name: name.to_string(),
        })
    }
}

impl Drop for WindowsKey {
    fn drop(&mut self) {
        // SAFETY: the handle was opened by RegOpenKeyExW and is closed once.
        let status = unsafe { RegCloseKey(self.handle) };
        if status != ERROR_SUCCESS {
            tracing::warn!(target: "win_registry", path = %self.path, code = status.0, "failed to close registry key");
        }
    }
}

fn check(status: WIN32_ERROR, path: &str) -> Result<(), RegistryError> {
    if status == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(RegistryError::Access {
            path: path.to_string(),
            code: status.0,
        })
    }
}
