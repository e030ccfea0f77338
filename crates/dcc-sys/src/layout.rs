//! Records exchanged with the driver by pointer.
//!
//! Field order and primitive widths follow the vendor header. The driver
//! writes straight into these structs, so any drift here corrupts memory on
//! the other side of the boundary; the assertions at the bottom pin every
//! offset at compile time.

use std::mem::{align_of, offset_of, size_of};
use std::os::raw::{c_char, c_float, c_short, c_uchar};

use crate::{EEP_SERIAL_LEN, MOD_INFO_SERIAL_LEN};

/// Module identification filled in by `DCC_get_module_info`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DCCModInfo {
    pub module_type: c_short,
    pub bus_number: c_short,
    pub slot_number: c_short,
    pub base_adr: c_short,
    pub serial_no: [c_char; MOD_INFO_SERIAL_LEN],
    pub in_use: c_short,
}

/// Live analog/digital configuration of one module.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DCCdata {
    pub gain_p5v: c_float,
    pub gain_m5v: c_float,
    pub gain_p12v: c_float,
    pub gain_hv: c_float,
    pub digi_out: c_uchar,
    pub cooling: c_short,
    pub cool_voltage: c_float,
    pub cool_curr_lmt: c_float,
}

/// Calibration limits persisted in the module EEPROM.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DCC_EEP_Data {
    pub serial_no: [c_char; EEP_SERIAL_LEN],
    pub module_type: c_short,
    pub gain_p5v_limit: c_float,
    pub gain_m5v_limit: c_float,
    pub gain_p12v_limit: c_float,
    pub gain_hv_limit: c_float,
    pub cool_voltage_limit: c_float,
    pub cool_curr_limit: c_float,
}

const _: () = {
    assert!(size_of::<DCCModInfo>() == 22);
    assert!(align_of::<DCCModInfo>() == 2);
    assert!(offset_of!(DCCModInfo, module_type) == 0);
    assert!(offset_of!(DCCModInfo, bus_number) == 2);
    assert!(offset_of!(DCCModInfo, slot_number) == 4);
    assert!(offset_of!(DCCModInfo, base_adr) == 6);
    assert!(offset_of!(DCCModInfo, serial_no) == 8);
    assert!(offset_of!(DCCModInfo, in_use) == 20);

    assert!(size_of::<DCCdata>() == 28);
    assert!(align_of::<DCCdata>() == 4);
    assert!(offset_of!(DCCdata, gain_p5v) == 0);
    assert!(offset_of!(DCCdata, gain_m5v) == 4);
    assert!(offset_of!(DCCdata, gain_p12v) == 8);
    assert!(offset_of!(DCCdata, gain_hv) == 12);
    assert!(offset_of!(DCCdata, digi_out) == 16);
    assert!(offset_of!(DCCdata, cooling) == 18);
    assert!(offset_of!(DCCdata, cool_voltage) == 20);
    assert!(offset_of!(DCCdata, cool_curr_lmt) == 24);

    assert!(size_of::<DCC_EEP_Data>() == 36);
    assert!(align_of::<DCC_EEP_Data>() == 4);
    assert!(offset_of!(DCC_EEP_Data, serial_no) == 0);
    assert!(offset_of!(DCC_EEP_Data, module_type) == 8);
    assert!(offset_of!(DCC_EEP_Data, gain_p5v_limit) == 12);
    assert!(offset_of!(DCC_EEP_Data, gain_m5v_limit) == 16);
    assert!(offset_of!(DCC_EEP_Data, gain_p12v_limit) == 20);
    assert!(offset_of!(DCC_EEP_Data, gain_hv_limit) == 24);
    assert!(offset_of!(DCC_EEP_Data, cool_voltage_limit) == 28);
    assert!(offset_of!(DCC_EEP_Data, cool_curr_limit) == 32);
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Copy out the bytes the driver would see in `range`.
    ///
    /// Only ever called on ranges that cover fields, never padding.
    fn bytes_at<T>(value: &T, range: std::ops::Range<usize>) -> Vec<u8> {
        assert!(range.end <= size_of::<T>());
        let base = value as *const T as *const u8;
        // SAFETY: the range is inside the record and covers initialised fields.
        range.map(|i| unsafe { *base.add(i) }).collect()
    }

    #[test]
    fn test_mod_info_byte_pattern() {
        let mut info = DCCModInfo {
            module_type: 0x0102,
            bus_number: 3,
            slot_number: -4,
            base_adr: 0x7f00,
            in_use: 1,
            ..Default::default()
        };
        for (dst, src) in info.serial_no.iter_mut().zip(b"DCC1234567AB") {
            *dst = *src as c_char;
        }

        assert_eq!(bytes_at(&info, 0..2), 0x0102i16.to_ne_bytes());
        assert_eq!(bytes_at(&info, 2..4), 3i16.to_ne_bytes());
        assert_eq!(bytes_at(&info, 4..6), (-4i16).to_ne_bytes());
        assert_eq!(bytes_at(&info, 6..8), 0x7f00i16.to_ne_bytes());
        assert_eq!(bytes_at(&info, 8..20), b"DCC1234567AB");
        assert_eq!(bytes_at(&info, 20..22), 1i16.to_ne_bytes());
    }

    #[test]
    fn test_live_data_byte_pattern() {
        let data = DCCdata {
            gain_p5v: 1.5,
            gain_m5v: -2.25,
            gain_p12v: 3.0,
            gain_hv: 70.0,
            digi_out: 0xa5,
            cooling: 1,
            cool_voltage: 2.5,
            cool_curr_lmt: 1.25,
        };

        assert_eq!(bytes_at(&data, 0..4), 1.5f32.to_ne_bytes());
        assert_eq!(bytes_at(&data, 4..8), (-2.25f32).to_ne_bytes());
        assert_eq!(bytes_at(&data, 12..16), 70.0f32.to_ne_bytes());
        assert_eq!(bytes_at(&data, 16..17), [0xa5u8]);
        assert_eq!(bytes_at(&data, 18..20), 1i16.to_ne_bytes());
        assert_eq!(bytes_at(&data, 20..24), 2.5f32.to_ne_bytes());
        assert_eq!(bytes_at(&data, 24..28), 1.25f32.to_ne_bytes());
    }

    #[test]
    fn test_eeprom_byte_pattern() {
        let mut eep = DCC_EEP_Data {
            module_type: 100,
            gain_hv_limit: 90.0,
            cool_curr_limit: 2.0,
            ..Default::default()
        };
        for (dst, src) in eep.serial_no.iter_mut().zip(b"SN000042") {
            *dst = *src as c_char;
        }

        assert_eq!(bytes_at(&eep, 0..8), b"SN000042");
        assert_eq!(bytes_at(&eep, 8..10), 100i16.to_ne_bytes());
        assert_eq!(bytes_at(&eep, 24..28), 90.0f32.to_ne_bytes());
        assert_eq!(bytes_at(&eep, 32..36), 2.0f32.to_ne_bytes());
    }
}
