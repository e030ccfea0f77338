//! Decoded views of the records the driver fills in.
//!
//! The raw `#[repr(C)]` layouts live in `dcc-sys`; the types here are what
//! callers hold. Conversions happen once per call and never keep a pointer
//! into native memory.

use std::os::raw::c_char;

use dcc_sys::{DCCModInfo, DCCdata, DCC_EEP_Data, EEP_SERIAL_LEN};

use crate::error::{DccError, Result};

/// Identification of one hardware module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module type code, e.g. 100 for a DCC-100.
    pub module_type: i16,
    /// PCI bus the module sits on.
    pub bus_number: i16,
    /// Slot on that bus.
    pub slot_number: i16,
    /// I/O base address.
    pub base_address: i16,
    /// Serial number, up to 12 ASCII characters.
    pub serial_number: String,
    /// Raw in-use flag as reported by the driver.
    pub in_use: i16,
}

impl ModuleInfo {
    /// Whether the driver reports the module as claimed.
    pub fn is_in_use(&self) -> bool {
        self.in_use != 0
    }
}

impl TryFrom<&DCCModInfo> for ModuleInfo {
    type Error = DccError;

    fn try_from(raw: &DCCModInfo) -> Result<Self> {
        Ok(Self {
            module_type: raw.module_type,
            bus_number: raw.bus_number,
            slot_number: raw.slot_number,
            base_address: raw.base_adr,
            serial_number: decode_ascii("module serial number", &raw.serial_no)?,
            in_use: raw.in_use,
        })
    }
}

/// Live analog and digital configuration of a module.
///
/// Fields hold the driver's values unchanged, so a block read back and
/// written again leaves the driver as it was.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveParameters {
    /// +5 V supply output.
    pub gain_p5v: f32,
    /// -5 V supply output.
    pub gain_m5v: f32,
    /// +12 V supply output.
    pub gain_p12v: f32,
    /// Detector high-voltage gain.
    pub gain_hv: f32,
    /// Digital output byte.
    pub digital_out: u8,
    /// Raw cooling flag; see [`Self::is_cooling`].
    pub cooling: i16,
    /// Cooler voltage.
    pub cool_voltage: f32,
    /// Cooler current limit.
    pub cool_current_limit: f32,
}

impl LiveParameters {
    /// Whether the driver reports cooling as enabled.
    pub fn is_cooling(&self) -> bool {
        self.cooling != 0
    }
}

impl From<&DCCdata> for LiveParameters {
    fn from(raw: &DCCdata) -> Self {
        Self {
            gain_p5v: raw.gain_p5v,
            gain_m5v: raw.gain_m5v,
            gain_p12v: raw.gain_p12v,
            gain_hv: raw.gain_hv,
            digital_out: raw.digi_out,
            cooling: raw.cooling,
            cool_voltage: raw.cool_voltage,
            cool_current_limit: raw.cool_curr_lmt,
        }
    }
}

impl From<&LiveParameters> for DCCdata {
    fn from(params: &LiveParameters) -> Self {
        Self {
            gain_p5v: params.gain_p5v,
            gain_m5v: params.gain_m5v,
            gain_p12v: params.gain_p12v,
            gain_hv: params.gain_hv,
            digi_out: params.digital_out,
            cooling: params.cooling,
            cool_voltage: params.cool_voltage,
            cool_curr_lmt: params.cool_current_limit,
        }
    }
}

/// Calibration limits stored in the module EEPROM.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationRecord {
    /// Serial number, up to 8 ASCII characters.
    pub serial_number: String,
    /// Module type code.
    pub module_type: i16,
    /// Upper limit for the +5 V output.
    pub gain_p5v_limit: f32,
    /// Upper limit for the -5 V output.
    pub gain_m5v_limit: f32,
    /// Upper limit for the +12 V output.
    pub gain_p12v_limit: f32,
    /// Upper limit for the HV gain.
    pub gain_hv_limit: f32,
    /// Upper limit for the cooler voltage.
    pub cool_voltage_limit: f32,
    /// Upper limit for the cooler current.
    pub cool_current_limit: f32,
}

impl CalibrationRecord {
    /// Encode into the native layout.
    ///
    /// Fails if the serial number does not fit the 8-byte native field.
    pub fn to_raw(&self) -> Result<DCC_EEP_Data> {
        Ok(DCC_EEP_Data {
            serial_no: encode_ascii::<EEP_SERIAL_LEN>("EEPROM serial number", &self.serial_number)?,
            module_type: self.module_type,
            gain_p5v_limit: self.gain_p5v_limit,
            gain_m5v_limit: self.gain_m5v_limit,
            gain_p12v_limit: self.gain_p12v_limit,
            gain_hv_limit: self.gain_hv_limit,
            cool_voltage_limit: self.cool_voltage_limit,
            cool_curr_limit: self.cool_current_limit,
        })
    }
}

impl TryFrom<&DCC_EEP_Data> for CalibrationRecord {
    type Error = DccError;

    fn try_from(raw: &DCC_EEP_Data) -> Result<Self> {
        Ok(Self {
            serial_number: decode_ascii("EEPROM serial number", &raw.serial_no)?,
            module_type: raw.module_type,
            gain_p5v_limit: raw.gain_p5v_limit,
            gain_m5v_limit: raw.gain_m5v_limit,
            gain_p12v_limit: raw.gain_p12v_limit,
            gain_hv_limit: raw.gain_hv_limit,
            cool_voltage_limit: raw.cool_voltage_limit,
            cool_current_limit: raw.cool_curr_limit,
        })
    }
}

/// Decode a fixed-length narrow string.
///
/// Stops at the first NUL or at the end of the buffer, whichever comes first.
pub(crate) fn decode_ascii(field: &'static str, buf: &[c_char]) -> Result<String> {
    let bytes: Vec<u8> = buf.iter().map(|&c| c as u8).take_while(|&b| b != 0).collect();
    if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(DccError::Decode {
            field,
            message: format!("non-ASCII byte 0x{:02x} at offset {}", bytes[pos], pos),
        });
    }
    // All bytes are ASCII, so this cannot fail.
    String::from_utf8(bytes).map_err(|e| DccError::Decode {
        field,
        message: e.to_string(),
    })
}

/// Encode into a fixed-length narrow buffer, NUL padded.
///
/// A value of exactly `N` bytes fills the buffer without a terminator.
pub(crate) fn encode_ascii<const N: usize>(field: &'static str, value: &str) -> Result<[c_char; N]> {
    if !value.is_ascii() || value.bytes().any(|b| b == 0) {
        return Err(DccError::Encode {
            field,
            message: format!("'{}' is not plain ASCII", value.escape_default()),
        });
    }
    if value.len() > N {
        return Err(DccError::Encode {
            field,
            message: format!("'{}' is {} bytes, field holds {}", value, value.len(), N),
        });
    }

    let mut buf = [0 as c_char; N];
    for (dst, src) in buf.iter_mut().zip(value.bytes()) {
        *dst = src as c_char;
    }
    Ok(buf)
}
