//! Safe handle over one loaded copy of the DCC driver.
//!
//! [`DccDevice`] owns the library handle and its function table. Every
//! wrapper method makes exactly one native call under the device's FFI lock,
//! converts the driver's output parameters into return values and reports a
//! nonzero result as [`DccError::Native`] without interpreting it.

use std::ffi::CString;
use std::os::raw::{c_char, c_float, c_short};
use std::path::Path;
use std::sync::Arc;

use dcc_sys::{DCCModInfo, DCCdata, DCC_EEP_Data, DccApi, ERROR_STRING_LEN};
use libloading::Library;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DccError, Result};
use crate::parameter::ParameterId;
use crate::records::{decode_ascii, CalibrationRecord, LiveParameters, ModuleInfo};

/// Libraries currently owned by a live device.
///
/// Keyed on the address of the bound `DCC_init`: the platform loader hands
/// out one copy of a library per process however it was named, and that copy
/// keeps process-wide driver state (mode, init status).
static OPEN_LIBRARIES: Mutex<Vec<usize>> = parking_lot::const_mutex(Vec::new());

/// Identity of the library behind a function table.
fn library_identity(api: &DccApi) -> usize {
    api.init as usize
}

/// Registry slot held for as long as a device is alive.
struct LibraryClaim {
    identity: usize,
    label: String,
}

impl LibraryClaim {
    fn acquire(identity: usize, label: String) -> Result<Self> {
        let mut open = OPEN_LIBRARIES.lock();
        if open.contains(&identity) {
            return Err(DccError::LibraryInUse { path: label });
        }
        open.push(identity);
        Ok(Self { identity, label })
    }
}

impl Drop for LibraryClaim {
    fn drop(&mut self) {
        OPEN_LIBRARIES.lock().retain(|&id| id != self.identity);
    }
}

/// Internal state shared between clones of a device.
struct DeviceInner {
    /// Bound entry points. Valid while `library` is alive.
    api: DccApi,
    /// Serializes native calls; the driver's reentrancy is undocumented.
    ffi_lock: Mutex<()>,
    /// `None` for in-process function tables.
    library: Option<Library>,
    /// Dropped after the library so a reopen never races the unload.
    claim: LibraryClaim,
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        info!(library = %self.claim.label, "Releasing DCC library");
    }
}

/// A loaded DCC driver.
///
/// Cheap to clone; clones share the library handle and the FFI lock, and the
/// library is unloaded when the last clone drops.
///
/// # Thread Safety
///
/// `DccDevice` is `Send` and `Sync`. Calls from several threads are
/// serialized: only one native call is in flight per device at a time.
#[derive(Clone)]
pub struct DccDevice {
    inner: Arc<DeviceInner>,
}

impl DccDevice {
    /// Load the driver library and bind all of its entry points.
    ///
    /// `path` may be a file path or a bare library name for the platform
    /// loader to resolve.
    ///
    /// # Errors
    ///
    /// * [`DccError::LibraryNotFound`] if the library cannot be loaded.
    /// * [`DccError::SymbolResolution`] if any entry point is missing.
    /// * [`DccError::LibraryInUse`] if another live device owns the library.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use daq_driver_dcc::DccDevice;
    ///
    /// let dcc = DccDevice::open(r"C:\Program Files (x86)\BH\DCC\DLL\dcc64.dll")?;
    /// dcc.init(r"C:\Program Files (x86)\BH\DCC\dcc100.ini")?;
    /// # Ok::<(), daq_driver_dcc::DccError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // SAFETY: the function signatures in dcc-sys follow the vendor
        // header; the table is stored next to the library that backs it.
        let (library, api) = unsafe { DccApi::load(path) }?;

        // On conflict `library` drops here, which only releases this
        // reference; the owning device keeps the library loaded.
        let claim = LibraryClaim::acquire(library_identity(&api), path.display().to_string())?;

        info!(library = %claim.label, "Loaded DCC library");

        Ok(Self {
            inner: Arc::new(DeviceInner {
                api,
                ffi_lock: Mutex::new(()),
                library: Some(library),
                claim,
            }),
        })
    }

    /// Wrap an in-process function table, e.g. a software stand-in for the
    /// driver. `label` is used in logs and errors in place of a path.
    ///
    /// # Safety
    ///
    /// Every pointer in `api` must stay callable for the life of the device
    /// and behave like the native entry point it replaces with respect to
    /// the pointers it is given.
    pub unsafe fn from_api(api: DccApi, label: &str) -> Result<Self> {
        let claim = LibraryClaim::acquire(library_identity(&api), label.to_string())?;
        debug!(library = %label, "Using in-process DCC function table");

        Ok(Self {
            inner: Arc::new(DeviceInner {
                api,
                ffi_lock: Mutex::new(()),
                library: None,
                claim,
            }),
        })
    }

    /// Path (or label) the library was opened with.
    pub fn library(&self) -> &str {
        &self.inner.claim.label
    }

    /// Run `f` with exclusive access to the function table.
    fn with_api<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&DccApi) -> R,
    {
        let _guard = self.inner.ffi_lock.lock();
        f(&self.inner.api)
    }

    /// Make one native call and turn its result code into a `Result`.
    fn call<F>(&self, function: &'static str, module: Option<i16>, f: F) -> Result<()>
    where
        F: FnOnce(&DccApi) -> c_short,
    {
        let code = self.with_api(f);
        debug!(function, ?module, code, "DCC call");
        check(function, code)
    }

    /// Initialize the driver from the vendor INI file.
    ///
    /// The path is passed through as a narrow string; its contents are never
    /// read by this crate.
    pub fn init<P: AsRef<Path>>(&self, ini_file: P) -> Result<()> {
        let ini_file = ini_file.as_ref();
        let text = ini_file.to_str().ok_or_else(|| DccError::InvalidArgument {
            message: format!("INI path is not valid UTF-8: {}", ini_file.display()),
        })?;
        let c_path = CString::new(text).map_err(|_| DccError::InvalidArgument {
            message: format!("INI path contains a NUL byte: {}", text),
        })?;

        // SAFETY: c_path is NUL terminated and outlives the call.
        self.call("DCC_init", None, |api| unsafe { (api.init)(c_path.as_ptr()) })?;
        info!(ini = %text, "DCC driver initialized");
        Ok(())
    }

    /// Whether module `module` is active.
    ///
    /// The driver returns a flag rather than a result code here; negative
    /// values are its error codes.
    pub fn test_if_active(&self, module: i16) -> Result<bool> {
        // SAFETY: scalar arguments only.
        let raw = self.with_api(|api| unsafe { (api.test_if_active)(module) });
        debug!(function = "DCC_test_if_active", module, raw, "DCC call");
        if raw < 0 {
            check("DCC_test_if_active", raw)?;
        }
        Ok(raw != 0)
    }

    /// Initialization status of a module, as reported by the driver.
    pub fn get_init_status(&self, module: i16) -> Result<i16> {
        let mut status: c_short = 0;
        // SAFETY: status is a live local for the duration of the call.
        self.call("DCC_get_init_status", Some(module), |api| unsafe {
            (api.get_init_status)(module, &mut status)
        })?;
        Ok(status)
    }

    /// Current driver mode. The return value is the mode itself.
    pub fn get_mode(&self) -> i16 {
        // SAFETY: no arguments.
        let mode = self.with_api(|api| unsafe { (api.get_mode)() });
        debug!(function = "DCC_get_mode", mode, "DCC call");
        mode
    }

    /// Switch the driver mode and return the driver's in-use report.
    ///
    /// Passed through verbatim. How the driver treats `force_use` when a
    /// module is claimed by another process has not been confirmed against
    /// vendor documentation.
    pub fn set_mode(&self, mode: i16, force_use: bool) -> Result<i16> {
        let mut in_use: c_short = 0;
        // SAFETY: in_use is a live local for the duration of the call.
        self.call("DCC_set_mode", None, |api| unsafe {
            (api.set_mode)(mode, force_use.into(), &mut in_use)
        })?;
        Ok(in_use)
    }

    /// Identification of a module.
    pub fn get_module_info(&self, module: i16) -> Result<ModuleInfo> {
        let mut raw = DCCModInfo::default();
        // SAFETY: raw is a live, correctly laid out local.
        self.call("DCC_get_module_info", Some(module), |api| unsafe {
            (api.get_module_info)(module, &mut raw)
        })?;
        ModuleInfo::try_from(&raw)
    }

    /// Driver text for a result code.
    pub fn get_error_string(&self, code: i16) -> Result<String> {
        let mut buf = [0 as c_char; ERROR_STRING_LEN];
        // SAFETY: the driver writes at most `max_length` bytes into buf.
        self.call("DCC_get_error_string", None, |api| unsafe {
            (api.get_error_string)(code, buf.as_mut_ptr(), ERROR_STRING_LEN as c_short)
        })?;
        decode_ascii("error string", &buf)
    }

    /// Read one scalar parameter.
    pub fn get_parameter(&self, module: i16, id: ParameterId) -> Result<f32> {
        let mut value: c_float = 0.0;
        // SAFETY: value is a live local for the duration of the call.
        self.call("DCC_get_parameter", Some(module), |api| unsafe {
            (api.get_parameter)(module, id.code(), &mut value)
        })?;
        Ok(value)
    }

    /// Write one scalar parameter.
    ///
    /// With `send_to_hardware` false only the driver's software copy should
    /// change. That split is the driver's contract and has not been verified
    /// on hardware.
    pub fn set_parameter(
        &self,
        module: i16,
        id: ParameterId,
        send_to_hardware: bool,
        value: f32,
    ) -> Result<()> {
        debug!(module, parameter = %id, value, send_to_hardware, "Setting DCC parameter");
        // SAFETY: scalar arguments only.
        self.call("DCC_set_parameter", Some(module), |api| unsafe {
            (api.set_parameter)(module, id.code(), send_to_hardware.into(), value)
        })
    }

    /// Read the whole live parameter block.
    pub fn get_parameters(&self, module: i16) -> Result<LiveParameters> {
        let mut raw = DCCdata::default();
        // SAFETY: raw is a live, correctly laid out local.
        self.call("DCC_get_parameters", Some(module), |api| unsafe {
            (api.get_parameters)(module, &mut raw)
        })?;
        Ok(LiveParameters::from(&raw))
    }

    /// Write the whole live parameter block. See [`Self::set_parameter`]
    /// for `send_to_hardware`.
    pub fn set_parameters(
        &self,
        module: i16,
        send_to_hardware: bool,
        params: &LiveParameters,
    ) -> Result<()> {
        let mut raw = DCCdata::from(params);
        // SAFETY: raw is a live, correctly laid out local.
        self.call("DCC_set_parameters", Some(module), |api| unsafe {
            (api.set_parameters)(module, send_to_hardware.into(), &mut raw)
        })
    }

    /// Read the calibration record from the module EEPROM.
    pub fn get_eeprom_data(&self, module: i16) -> Result<CalibrationRecord> {
        let mut raw = DCC_EEP_Data::default();
        // SAFETY: raw is a live, correctly laid out local.
        self.call("DCC_get_eeprom_data", Some(module), |api| unsafe {
            (api.get_eeprom_data)(module, &mut raw)
        })?;
        CalibrationRecord::try_from(&raw)
    }

    /// Write a calibration record to the module EEPROM.
    ///
    /// `write_enable` is the driver's unlock code. The record is encoded
    /// before the call, so an unrepresentable serial number never reaches
    /// the driver.
    pub fn write_eeprom_data(
        &self,
        module: i16,
        write_enable: u16,
        record: &CalibrationRecord,
    ) -> Result<()> {
        let mut raw = record.to_raw()?;
        warn!(module, serial = %record.serial_number, "Writing DCC EEPROM");
        // SAFETY: raw is a live, correctly laid out local.
        self.call("DCC_write_eeprom_data", Some(module), |api| unsafe {
            (api.write_eeprom_data)(module, write_enable, &mut raw)
        })
    }

    /// Read one HV gain limit.
    pub fn get_gain_hv_limit(&self, module: i16, limit_id: i16) -> Result<i16> {
        let mut value: c_short = 0;
        // SAFETY: value is a live local for the duration of the call.
        self.call("DCC_get_gain_HV_limit", Some(module), |api| unsafe {
            (api.get_gain_HV_limit)(module, limit_id, &mut value)
        })?;
        Ok(value)
    }

    /// Write one HV gain limit. The driver takes the value by pointer.
    pub fn set_gain_hv_limit(&self, module: i16, limit_id: i16, value: i16) -> Result<()> {
        let mut slot: c_short = value;
        // SAFETY: slot is a live local for the duration of the call.
        self.call("DCC_set_gain_HV_limit", Some(module), |api| unsafe {
            (api.set_gain_HV_limit)(module, limit_id, &mut slot)
        })
    }

    /// Switch the module outputs on or off.
    pub fn enable_outputs(&self, module: i16, enable: bool) -> Result<()> {
        // SAFETY: scalar arguments only.
        self.call("DCC_enable_outputs", Some(module), |api| unsafe {
            (api.enable_outputs)(module, enable.into())
        })
    }

    /// Clear a latched overload.
    pub fn clear_overload(&self, module: i16) -> Result<()> {
        // SAFETY: scalar arguments only.
        self.call("DCC_clear_overload", Some(module), |api| unsafe {
            (api.clear_overload)(module)
        })
    }

    /// Raw overload state.
    pub fn get_overload_state(&self, module: i16) -> Result<i16> {
        let mut state: c_short = 0;
        // SAFETY: state is a live local for the duration of the call.
        self.call("DCC_get_overload_state", Some(module), |api| unsafe {
            (api.get_overload_state)(module, &mut state)
        })?;
        Ok(state)
    }

    /// Raw current-limit state.
    pub fn get_curr_lmt_state(&self, module: i16) -> Result<i16> {
        let mut state: c_short = 0;
        // SAFETY: state is a live local for the duration of the call.
        self.call("DCC_get_curr_lmt_state", Some(module), |api| unsafe {
            (api.get_curr_lmt_state)(module, &mut state)
        })?;
        Ok(state)
    }
}

/// Map a native result code to `Ok` or a verbatim [`DccError::Native`].
fn check(function: &'static str, code: c_short) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        warn!(function, code, "DCC driver returned an error");
        Err(DccError::Native { function, code })
    }
}

impl std::fmt::Debug for DccDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DccDevice")
            .field("library", &self.inner.claim.label)
            .field("in_process", &self.inner.library.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_codes_verbatim() {
        assert!(check("DCC_init", 0).is_ok());
        let err = check("DCC_init", -7).unwrap_err();
        assert_eq!(err.native_code(), Some(-7));
        let err = check("DCC_init", 3).unwrap_err();
        assert_eq!(err.native_code(), Some(3));
    }

    #[test]
    fn test_claim_is_exclusive_and_released() {
        let first = LibraryClaim::acquire(0x1000, "first".to_string()).unwrap();
        match LibraryClaim::acquire(0x1000, "second".to_string()) {
            Err(DccError::LibraryInUse { path }) => assert_eq!(path, "second"),
            other => panic!("expected LibraryInUse, got {:?}", other.map(|c| c.label.clone())),
        }
        drop(first);
        assert!(LibraryClaim::acquire(0x1000, "second".to_string()).is_ok());
    }

    #[test]
    fn test_open_missing_library_leaves_no_claim() {
        let path = "/nonexistent/dir/libdcc.so";
        let err = DccDevice::open(path).unwrap_err();
        assert!(err.is_library_not_found());
        // A failed open must not block the next attempt.
        let err = DccDevice::open(path).unwrap_err();
        assert!(err.is_library_not_found());
    }

    #[cfg(feature = "mock")]
    #[test]
    #[serial_test::serial]
    fn test_same_library_under_another_name_is_in_use() {
        let dcc = crate::mock::open().unwrap();

        // Same entry points reached through a different path string, as
        // with an absolute path and a bare name the loader resolves.
        let err = unsafe { DccDevice::from_api(crate::mock::api(), "/opt/bh/libdcc.so") }
            .unwrap_err();
        match err {
            DccError::LibraryInUse { path } => assert_eq!(path, "/opt/bh/libdcc.so"),
            other => panic!("expected LibraryInUse, got {other:?}"),
        }

        drop(dcc);
        let renamed = unsafe { DccDevice::from_api(crate::mock::api(), "libdcc.so") }.unwrap();
        assert_eq!(renamed.library(), "libdcc.so");
    }

    #[cfg(feature = "mock")]
    #[test]
    #[serial_test::serial]
    #[tracing_test::traced_test]
    fn test_native_failure_is_logged() {
        let dcc = crate::mock::open().unwrap();
        let err = dcc.get_parameters(1).unwrap_err();
        assert!(err.is_native());
        assert!(logs_contain("DCC driver returned an error"));
        assert!(logs_contain("DCC_get_parameters"));
    }
}
