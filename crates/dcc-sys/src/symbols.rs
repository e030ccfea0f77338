//! Exported driver entry points and their runtime resolution.

use std::ffi::OsStr;
use std::os::raw::{c_char, c_float, c_short, c_ushort};

use libloading::Library;

use crate::layout::{DCCModInfo, DCCdata, DCC_EEP_Data};

pub type DCC_init = unsafe extern "C" fn(ini_file: *const c_char) -> c_short;
pub type DCC_test_if_active = unsafe extern "C" fn(mod_no: c_short) -> c_short;
pub type DCC_get_init_status =
    unsafe extern "C" fn(mod_no: c_short, ini_status: *mut c_short) -> c_short;
pub type DCC_get_mode = unsafe extern "C" fn() -> c_short;
pub type DCC_set_mode =
    unsafe extern "C" fn(mode: c_short, force_use: c_short, in_use: *mut c_short) -> c_short;
pub type DCC_get_module_info =
    unsafe extern "C" fn(mod_no: c_short, mod_info: *mut DCCModInfo) -> c_short;
pub type DCC_get_error_string =
    unsafe extern "C" fn(error_id: c_short, dest_string: *mut c_char, max_length: c_short) -> c_short;
pub type DCC_get_parameter =
    unsafe extern "C" fn(mod_no: c_short, par_id: c_short, value: *mut c_float) -> c_short;
pub type DCC_set_parameter = unsafe extern "C" fn(
    mod_no: c_short,
    par_id: c_short,
    send_to_hard: c_short,
    value: c_float,
) -> c_short;
pub type DCC_get_parameters =
    unsafe extern "C" fn(mod_no: c_short, data: *mut DCCdata) -> c_short;
pub type DCC_set_parameters =
    unsafe extern "C" fn(mod_no: c_short, send_to_hard: c_short, data: *mut DCCdata) -> c_short;
pub type DCC_get_eeprom_data =
    unsafe extern "C" fn(mod_no: c_short, eep_data: *mut DCC_EEP_Data) -> c_short;
pub type DCC_write_eeprom_data = unsafe extern "C" fn(
    mod_no: c_short,
    write_enable: c_ushort,
    eep_data: *mut DCC_EEP_Data,
) -> c_short;
pub type DCC_get_gain_HV_limit =
    unsafe extern "C" fn(mod_no: c_short, lim_id: c_short, value: *mut c_short) -> c_short;
pub type DCC_set_gain_HV_limit =
    unsafe extern "C" fn(mod_no: c_short, lim_id: c_short, value: *mut c_short) -> c_short;
pub type DCC_enable_outputs = unsafe extern "C" fn(mod_no: c_short, enable: c_short) -> c_short;
pub type DCC_clear_overload = unsafe extern "C" fn(mod_no: c_short) -> c_short;
pub type DCC_get_overload_state =
    unsafe extern "C" fn(mod_no: c_short, state: *mut c_short) -> c_short;
pub type DCC_get_curr_lmt_state =
    unsafe extern "C" fn(mod_no: c_short, state: *mut c_short) -> c_short;

/// Every symbol [`DccApi::load`] binds, in binding order.
pub const SYMBOLS: &[&str] = &[
    "DCC_init",
    "DCC_test_if_active",
    "DCC_get_init_status",
    "DCC_get_mode",
    "DCC_set_mode",
    "DCC_get_module_info",
    "DCC_get_error_string",
    "DCC_get_parameter",
    "DCC_set_parameter",
    "DCC_get_parameters",
    "DCC_set_parameters",
    "DCC_get_eeprom_data",
    "DCC_write_eeprom_data",
    "DCC_get_gain_HV_limit",
    "DCC_set_gain_HV_limit",
    "DCC_enable_outputs",
    "DCC_clear_overload",
    "DCC_get_overload_state",
    "DCC_get_curr_lmt_state",
];

/// Failure to load the driver or to bind one of its entry points.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load DCC library '{path}': {source}")]
    Library {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("DCC library '{path}' does not export {symbol}: {source}")]
    Symbol {
        path: String,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// Function table for one loaded copy of the driver.
///
/// The pointers are plain `extern "C"` functions, so a table can also be
/// assembled by hand from Rust functions with the same signatures (used by
/// software stand-ins for the driver).
#[derive(Debug, Clone, Copy)]
pub struct DccApi {
    pub init: DCC_init,
    pub test_if_active: DCC_test_if_active,
    pub get_init_status: DCC_get_init_status,
    pub get_mode: DCC_get_mode,
    pub set_mode: DCC_set_mode,
    pub get_module_info: DCC_get_module_info,
    pub get_error_string: DCC_get_error_string,
    pub get_parameter: DCC_get_parameter,
    pub set_parameter: DCC_set_parameter,
    pub get_parameters: DCC_get_parameters,
    pub set_parameters: DCC_set_parameters,
    pub get_eeprom_data: DCC_get_eeprom_data,
    pub write_eeprom_data: DCC_write_eeprom_data,
    pub get_gain_HV_limit: DCC_get_gain_HV_limit,
    pub set_gain_HV_limit: DCC_set_gain_HV_limit,
    pub enable_outputs: DCC_enable_outputs,
    pub clear_overload: DCC_clear_overload,
    pub get_overload_state: DCC_get_overload_state,
    pub get_curr_lmt_state: DCC_get_curr_lmt_state,
}

macro_rules! bind {
    ($lib:expr, $path:expr, $name:ident) => {{
        let symbol = $lib
            .get::<$name>(concat!(stringify!($name), "\0").as_bytes())
            .map_err(|source| LoadError::Symbol {
                path: $path.clone(),
                symbol: stringify!($name),
                source,
            })?;
        *symbol
    }};
}

impl DccApi {
    /// Load the driver at `path` and bind every entry point in [`SYMBOLS`].
    ///
    /// `path` is handed to the platform loader unchanged, so both absolute
    /// paths and bare library names work. Binding stops at the first missing
    /// symbol and the library is unloaded again before the error is returned.
    ///
    /// # Safety
    ///
    /// Loading runs the library's initialisation routines. The returned
    /// table is only valid while the returned [`Library`] is alive, and the
    /// signatures are trusted to match the vendor header.
    pub unsafe fn load<P: AsRef<OsStr>>(path: P) -> Result<(Library, DccApi), LoadError> {
        let display = path.as_ref().to_string_lossy().into_owned();
        let lib = Library::new(path.as_ref()).map_err(|source| LoadError::Library {
            path: display.clone(),
            source,
        })?;

        let api = DccApi {
            init: bind!(lib, display, DCC_init),
            test_if_active: bind!(lib, display, DCC_test_if_active),
            get_init_status: bind!(lib, display, DCC_get_init_status),
            get_mode: bind!(lib, display, DCC_get_mode),
            set_mode: bind!(lib, display, DCC_set_mode),
            get_module_info: bind!(lib, display, DCC_get_module_info),
            get_error_string: bind!(lib, display, DCC_get_error_string),
            get_parameter: bind!(lib, display, DCC_get_parameter),
            set_parameter: bind!(lib, display, DCC_set_parameter),
            get_parameters: bind!(lib, display, DCC_get_parameters),
            set_parameters: bind!(lib, display, DCC_set_parameters),
            get_eeprom_data: bind!(lib, display, DCC_get_eeprom_data),
            write_eeprom_data: bind!(lib, display, DCC_write_eeprom_data),
            get_gain_HV_limit: bind!(lib, display, DCC_get_gain_HV_limit),
            set_gain_HV_limit: bind!(lib, display, DCC_set_gain_HV_limit),
            enable_outputs: bind!(lib, display, DCC_enable_outputs),
            clear_overload: bind!(lib, display, DCC_clear_overload),
            get_overload_state: bind!(lib, display, DCC_get_overload_state),
            get_curr_lmt_state: bind!(lib, display, DCC_get_curr_lmt_state),
        };

        Ok((lib, api))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_table_complete() {
        assert_eq!(SYMBOLS.len(), 19);
        let mut sorted = SYMBOLS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), SYMBOLS.len());
    }

    #[test]
    fn test_load_missing_library() {
        let err = unsafe { DccApi::load("/nonexistent/dir/dcc64.dll") }.unwrap_err();
        assert!(matches!(err, LoadError::Library { .. }));
        assert!(err.to_string().contains("/nonexistent/dir/dcc64.dll"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_library_without_dcc_symbols() {
        // libc loads fine but exports none of the driver entry points.
        let err = unsafe { DccApi::load("libc.so.6") }.unwrap_err();
        match err {
            LoadError::Symbol { symbol, .. } => assert_eq!(symbol, "DCC_init"),
            other => panic!("expected symbol error, got {other:?}"),
        }
    }
}
