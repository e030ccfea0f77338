//! Low-level FFI bindings for the DCC detector control card driver.
//!
//! The vendor ships the driver as a dynamic library (`dcc64.dll` on Windows)
//! together with a C header. This crate mirrors that header: the three record
//! types the driver reads and writes, the numeric parameter codes, and one
//! function-pointer type per exported symbol.
//!
//! The library is resolved at runtime with `libloading` rather than linked,
//! so the crate builds on machines without the vendor SDK installed.
//!
//! # Safety
//!
//! Every function pointer in [`DccApi`] is an `unsafe extern "C"` call into
//! vendor code. For a safe wrapper, use the `daq-driver-dcc` crate instead.
//!
//! # Example (unsafe)
//!
//! ```no_run
//! use dcc_sys::{DccApi, DCCModInfo};
//! use std::ffi::CString;
//!
//! let (_lib, api) = unsafe { DccApi::load("dcc64.dll") }?;
//! let ini = CString::new("dcc100.ini").unwrap();
//! let mut info = DCCModInfo::default();
//! unsafe {
//!     if (api.init)(ini.as_ptr()) == 0 {
//!         (api.get_module_info)(1, &mut info);
//!     }
//! }
//! # Ok::<(), dcc_sys::LoadError>(())
//! ```

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(unsafe_code)]
#![allow(missing_docs)]

mod layout;
mod symbols;

pub use layout::{DCCModInfo, DCCdata, DCC_EEP_Data};
pub use symbols::*;

use std::os::raw::c_short;

/// Length of `DCCModInfo::serial_no`.
pub const MOD_INFO_SERIAL_LEN: usize = 12;

/// Length of `DCC_EEP_Data::serial_no`.
pub const EEP_SERIAL_LEN: usize = 8;

/// Size of the buffer handed to `DCC_get_error_string`.
pub const ERROR_STRING_LEN: usize = 512;

// Parameter identifiers accepted by DCC_get_parameter / DCC_set_parameter.
pub const DCC_ACTIVE: c_short = 0;
pub const PCI_BUS_NO: c_short = 1;
pub const C1_P5V: c_short = 2;
pub const C1_M5V: c_short = 3;
pub const C1_P12V: c_short = 4;
pub const C1_GAIN_HV: c_short = 5;
pub const C2_P5V: c_short = 6;
pub const C2_M5V: c_short = 7;
pub const C2_P12V: c_short = 8;
pub const C2_DIGOUT: c_short = 9;
pub const C3_COOLING: c_short = 10;
pub const C3_COOLVOLT: c_short = 11;
pub const C3_COOLCURR: c_short = 12;
pub const C3_GAIN_HV: c_short = 13;
pub const C3_P5V: c_short = 14;
pub const C3_M5V: c_short = 15;
pub const C3_P12V: c_short = 16;

/// Number of parameter identifiers defined by the driver.
pub const PARAMETER_COUNT: usize = 17;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_codes_are_dense() {
        let codes = [
            DCC_ACTIVE, PCI_BUS_NO, C1_P5V, C1_M5V, C1_P12V, C1_GAIN_HV, C2_P5V, C2_M5V, C2_P12V,
            C2_DIGOUT, C3_COOLING, C3_COOLVOLT, C3_COOLCURR, C3_GAIN_HV, C3_P5V, C3_M5V, C3_P12V,
        ];
        assert_eq!(codes.len(), PARAMETER_COUNT);
        for (i, code) in codes.iter().enumerate() {
            assert_eq!(*code as usize, i);
        }
    }
}
