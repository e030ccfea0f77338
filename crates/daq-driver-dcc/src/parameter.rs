//! Single-value parameter identifiers.
//!
//! `DCC_get_parameter` / `DCC_set_parameter` address one scalar by a numeric
//! code. [`ParameterId`] closes that set so a typo is a compile error rather
//! than a driver error code.

use std::fmt;
use std::str::FromStr;

use crate::error::DccError;

/// Identifier of one scalar addressed by `get_parameter` / `set_parameter`.
///
/// The `C1`/`C2`/`C3` prefixes name the connector the value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ParameterId {
    /// Whether the module is active.
    DccActive = dcc_sys::DCC_ACTIVE,
    /// PCI bus number of the module.
    PciBusNo = dcc_sys::PCI_BUS_NO,
    /// +5 V output on connector 1.
    C1P5v = dcc_sys::C1_P5V,
    /// -5 V output on connector 1.
    C1M5v = dcc_sys::C1_M5V,
    /// +12 V output on connector 1.
    C1P12v = dcc_sys::C1_P12V,
    /// HV gain on connector 1.
    C1GainHv = dcc_sys::C1_GAIN_HV,
    /// +5 V output on connector 2.
    C2P5v = dcc_sys::C2_P5V,
    /// -5 V output on connector 2.
    C2M5v = dcc_sys::C2_M5V,
    /// +12 V output on connector 2.
    C2P12v = dcc_sys::C2_P12V,
    /// Digital output byte on connector 2.
    C2DigOut = dcc_sys::C2_DIGOUT,
    /// Cooling enable on connector 3.
    C3Cooling = dcc_sys::C3_COOLING,
    /// Cooler voltage on connector 3.
    C3CoolVolt = dcc_sys::C3_COOLVOLT,
    /// Cooler current limit on connector 3.
    C3CoolCurr = dcc_sys::C3_COOLCURR,
    /// HV gain on connector 3.
    C3GainHv = dcc_sys::C3_GAIN_HV,
    /// +5 V output on connector 3.
    C3P5v = dcc_sys::C3_P5V,
    /// -5 V output on connector 3.
    C3M5v = dcc_sys::C3_M5V,
    /// +12 V output on connector 3.
    C3P12v = dcc_sys::C3_P12V,
}

impl ParameterId {
    /// All identifiers, ordered by native code.
    pub const ALL: [ParameterId; dcc_sys::PARAMETER_COUNT] = [
        Self::DccActive,
        Self::PciBusNo,
        Self::C1P5v,
        Self::C1M5v,
        Self::C1P12v,
        Self::C1GainHv,
        Self::C2P5v,
        Self::C2M5v,
        Self::C2P12v,
        Self::C2DigOut,
        Self::C3Cooling,
        Self::C3CoolVolt,
        Self::C3CoolCurr,
        Self::C3GainHv,
        Self::C3P5v,
        Self::C3M5v,
        Self::C3P12v,
    ];

    /// Native code passed to the driver.
    pub fn code(self) -> i16 {
        self as i16
    }

    /// Convert from a raw native code.
    pub fn from_raw(raw: i16) -> Option<Self> {
        usize::try_from(raw)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// Name as spelled in the vendor header.
    pub fn name(self) -> &'static str {
        match self {
            Self::DccActive => "DCC_ACTIVE",
            Self::PciBusNo => "PCI_BUS_NO",
            Self::C1P5v => "C1_P5V",
            Self::C1M5v => "C1_M5V",
            Self::C1P12v => "C1_P12V",
            Self::C1GainHv => "C1_GAIN_HV",
            Self::C2P5v => "C2_P5V",
            Self::C2M5v => "C2_M5V",
            Self::C2P12v => "C2_P12V",
            Self::C2DigOut => "C2_DIGOUT",
            Self::C3Cooling => "C3_COOLING",
            Self::C3CoolVolt => "C3_COOLVOLT",
            Self::C3CoolCurr => "C3_COOLCURR",
            Self::C3GainHv => "C3_GAIN_HV",
            Self::C3P5v => "C3_P5V",
            Self::C3M5v => "C3_M5V",
            Self::C3P12v => "C3_P12V",
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterId {
    type Err = DccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DccError::InvalidArgument {
                message: format!("Unknown DCC parameter: {}", s),
            })
    }
}

impl TryFrom<i16> for ParameterId {
    type Error = DccError;

    fn try_from(raw: i16) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or_else(|| DccError::InvalidArgument {
            message: format!("Unknown DCC parameter code: {}", raw),
        })
    }
}

impl From<ParameterId> for i16 {
    fn from(id: ParameterId) -> Self {
        id.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_header() {
        assert_eq!(ParameterId::DccActive.code(), 0);
        assert_eq!(ParameterId::C1GainHv.code(), 5);
        assert_eq!(ParameterId::C2DigOut.code(), 9);
        assert_eq!(ParameterId::C3GainHv.code(), 13);
        assert_eq!(ParameterId::C3P12v.code(), 16);
    }

    #[test]
    fn test_all_is_ordered_by_code() {
        for (i, id) in ParameterId::ALL.iter().enumerate() {
            assert_eq!(id.code() as usize, i);
            assert_eq!(ParameterId::from_raw(id.code()), Some(*id));
        }
    }

    #[test]
    fn test_from_raw_out_of_range() {
        assert_eq!(ParameterId::from_raw(17), None);
        assert_eq!(ParameterId::from_raw(-1), None);
        assert!(ParameterId::try_from(99).is_err());
    }

    #[test]
    fn test_name_round_trip() {
        assert_eq!(ParameterId::C3GainHv.to_string(), "C3_GAIN_HV");
        assert_eq!(
            "c3_gain_hv".parse::<ParameterId>().unwrap(),
            ParameterId::C3GainHv
        );
        assert!("C4_GAIN_HV".parse::<ParameterId>().is_err());
    }
}
