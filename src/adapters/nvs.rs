//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] over the persisted colon-string documents
//! (schedule table, enables, delay parameters, device state).
//!
//! - **`target_os = "espidf"`** — raw ESP-IDF NVS blobs in a dedicated
//!   namespace. Commits are atomic per `nvs_commit()`, so a power cut
//!   mid-save leaves the previous document intact.
//! - **`not(target_os = "espidf")`** — in-memory map for host-side
//!   testing and simulation.

use log::info;

use crate::app::ports::{StorageError, StorageKey, StoragePort};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &str = "homectrl";

/// Documents are small colon strings; anything bigger is corruption.
#[allow(dead_code)]
const MAX_DOC_SIZE: usize = 1024;

pub struct NvsStorage {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, String>>,
}

impl NvsStorage {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after an NVS version mismatch the partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                log::warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsStorage: ESP-IDF NVS initialised");
            Ok(Self {})
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsStorage: simulation backend");
            Ok(Self {
                store: std::cell::RefCell::new(HashMap::new()),
            })
        }
    }

    /// Open the controller namespace, run a closure with the handle,
    /// then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = NAMESPACE.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn key_buf(key: StorageKey) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let kb = key.name().as_bytes();
        let kl = kb.len().min(15);
        buf[..kl].copy_from_slice(&kb[..kl]);
        buf
    }
}

impl StoragePort for NvsStorage {
    fn load(&self, key: StorageKey) -> Result<String, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .get(key.name())
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(false, |handle| {
                let key_buf = Self::key_buf(key);
                let mut size: usize = 0;

                // First call sizes the blob.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size == 0 || size > MAX_DOC_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf)
            });

            match result {
                Ok(bytes) => {
                    String::from_utf8(bytes).map_err(|_| StorageError::IoError)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn save(&mut self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(key.name().to_string(), value.to_string());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(true, |handle| {
                let key_buf = Self::key_buf(key);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        value.as_ptr() as *const _,
                        value.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_roundtrips() {
        let mut nvs = NvsStorage::new().unwrap();
        nvs.save(StorageKey::DelayParams, "1800:600:150:65:1:0:1:1")
            .unwrap();
        assert_eq!(
            nvs.load(StorageKey::DelayParams).unwrap(),
            "1800:600:150:65:1:0:1:1"
        );
    }

    #[test]
    fn missing_key_is_not_found() {
        let nvs = NvsStorage::new().unwrap();
        assert!(matches!(
            nvs.load(StorageKey::Schedule),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn keys_are_isolated() {
        let mut nvs = NvsStorage::new().unwrap();
        nvs.save(StorageKey::Schedule, "table").unwrap();
        nvs.save(StorageKey::ScheduleEnable, "0:1:0:0:1").unwrap();
        assert_eq!(nvs.load(StorageKey::Schedule).unwrap(), "table");
        assert_eq!(nvs.load(StorageKey::ScheduleEnable).unwrap(), "0:1:0:0:1");
    }
}
