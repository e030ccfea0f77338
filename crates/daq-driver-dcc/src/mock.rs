//! Software stand-in for the DCC driver.
//!
//! The functions here have the exact native signatures and are wired into a
//! [`DccApi`] table, so a [`DccDevice`] built with [`open`] goes through the
//! same pointer marshaling as it does against the vendor library. State is
//! process-wide, like the real driver's: only one mock device can be open at
//! a time, and tests sharing it should be serialized.
//!
//! Behavior follows the driver's documented contract closely enough for
//! testing: `send_to_hard` updates a separate "hardware" copy, EEPROM writes
//! need [`EEPROM_UNLOCK_CODE`], and every call is appended to
//! [`MockState::calls`].

use std::ffi::CStr;
use std::os::raw::{c_char, c_float, c_short, c_ushort};

use dcc_sys::{DCCModInfo, DCCdata, DCC_EEP_Data, DccApi};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::device::DccDevice;
use crate::error::Result;
use crate::parameter::ParameterId;

/// Number of module slots the stand-in exposes.
pub const MAX_MODULES: usize = 8;

/// Number of HV gain limit slots per module.
pub const GAIN_LIMIT_SLOTS: usize = 3;

/// Unlock code accepted by `DCC_write_eeprom_data`.
pub const EEPROM_UNLOCK_CODE: u16 = 0x5a5a;

/// Registry label used for the mock device.
pub const MOCK_LIBRARY: &str = "<dcc-mock>";

/// Empty INI path.
pub const ERR_OPEN_FILE: i16 = -1;
/// Call before `DCC_init`.
pub const ERR_NOT_INITIALIZED: i16 = -2;
/// Module index outside the emulated slots.
pub const ERR_WRONG_MODULE: i16 = -3;
/// Module not installed or not activated.
pub const ERR_MODULE_INACTIVE: i16 = -4;
/// Unknown parameter code.
pub const ERR_WRONG_PARAMETER: i16 = -5;
/// Write to a read-only parameter.
pub const ERR_READ_ONLY: i16 = -6;
/// EEPROM write without [`EEPROM_UNLOCK_CODE`].
pub const ERR_EEPROM_LOCKED: i16 = -7;
/// HV gain limit slot out of range.
pub const ERR_WRONG_LIMIT: i16 = -8;
/// Non-positive error string capacity.
pub const ERR_BUFFER: i16 = -9;
/// Null output pointer.
pub const ERR_NULL_POINTER: i16 = -10;
/// `DCC_set_mode` without force while claimed elsewhere.
pub const ERR_IN_USE: i16 = -11;

const ERROR_TEXT: &[(i16, &str)] = &[
    (0, "No error"),
    (ERR_OPEN_FILE, "Cannot open initialization file"),
    (ERR_NOT_INITIALIZED, "Driver not initialized"),
    (ERR_WRONG_MODULE, "Invalid module number"),
    (ERR_MODULE_INACTIVE, "Module is not active"),
    (ERR_WRONG_PARAMETER, "Invalid parameter id"),
    (ERR_READ_ONLY, "Parameter is read only"),
    (ERR_EEPROM_LOCKED, "EEPROM write not enabled"),
    (ERR_WRONG_LIMIT, "Invalid gain limit id"),
    (ERR_BUFFER, "Output buffer too small"),
    (ERR_NULL_POINTER, "Null pointer argument"),
    (ERR_IN_USE, "Module in use by another application"),
];

/// State of one emulated module.
#[derive(Debug, Clone, Default)]
pub struct MockModule {
    /// Present in the emulated system; becomes active on init.
    pub installed: bool,
    /// Set by `DCC_init` for installed modules.
    pub active: bool,
    /// Reported by `DCC_get_init_status`.
    pub init_status: i16,
    /// Returned by `DCC_get_module_info`.
    pub info: DCCModInfo,
    /// Driver-side software copy of the live parameters.
    pub shadow: DCCdata,
    /// What was last sent to the hardware.
    pub hardware: DCCdata,
    /// Calibration record in the emulated EEPROM.
    pub eeprom: DCC_EEP_Data,
    /// HV gain limit slots.
    pub gain_hv_limits: [i16; GAIN_LIMIT_SLOTS],
    /// Last value passed to `DCC_enable_outputs`.
    pub outputs_enabled: bool,
    /// Overload state; cleared by `DCC_clear_overload`.
    pub overload: i16,
    /// Current-limit state.
    pub current_limit: i16,
}

/// Process-wide state of the stand-in.
#[derive(Debug, Clone)]
pub struct MockState {
    /// Whether `DCC_init` has succeeded.
    pub initialized: bool,
    /// Driver mode.
    pub mode: i16,
    /// Last INI path passed to `DCC_init`.
    pub ini_file: Option<String>,
    /// Makes the next call to `DCC_set_mode` see the modules as claimed.
    pub claimed_elsewhere: bool,
    /// Raw bytes `DCC_get_error_string` returns for every code instead of
    /// its table, copied up to `max_length` with no terminator added.
    pub error_text: Option<Vec<u8>>,
    /// Module slots, indexed by module number.
    pub modules: [MockModule; MAX_MODULES],
    /// Native symbol of every call, in order.
    pub calls: Vec<&'static str>,
}

impl Default for MockState {
    fn default() -> Self {
        let mut modules: [MockModule; MAX_MODULES] = Default::default();
        for (index, module) in modules.iter_mut().enumerate().take(2) {
            module.installed = true;
            module.info = DCCModInfo {
                module_type: 100,
                bus_number: 2,
                slot_number: index as c_short,
                base_adr: 0x1000 + index as c_short * 0x100,
                serial_no: serial::<12>(&format!("DCC{:07}", 4711 + index)),
                in_use: 0,
            };
            module.eeprom = DCC_EEP_Data {
                serial_no: serial::<8>(&format!("SN{:06}", 4711 + index)),
                module_type: 100,
                gain_p5v_limit: 5.0,
                gain_m5v_limit: 5.0,
                gain_p12v_limit: 12.0,
                gain_hv_limit: 90.0,
                cool_voltage_limit: 5.0,
                cool_curr_limit: 2.0,
            };
            module.gain_hv_limits = [90, 90, 90];
        }
        Self {
            initialized: false,
            mode: 0,
            ini_file: None,
            claimed_elsewhere: false,
            error_text: None,
            modules,
            calls: Vec::new(),
        }
    }
}

fn serial<const N: usize>(text: &str) -> [c_char; N] {
    let mut buf = [0 as c_char; N];
    for (dst, src) in buf.iter_mut().zip(text.bytes()) {
        *dst = src as c_char;
    }
    buf
}

static STATE: Lazy<Mutex<MockState>> = Lazy::new(|| Mutex::new(MockState::default()));

/// Inspect or modify the stand-in's state.
pub fn with_state<R>(f: impl FnOnce(&mut MockState) -> R) -> R {
    f(&mut *STATE.lock())
}

/// Restore the power-on state.
pub fn reset() {
    *STATE.lock() = MockState::default();
}

/// Function table pointing at the stand-in.
pub fn api() -> DccApi {
    DccApi {
        init: mock_init,
        test_if_active: mock_test_if_active,
        get_init_status: mock_get_init_status,
        get_mode: mock_get_mode,
        set_mode: mock_set_mode,
        get_module_info: mock_get_module_info,
        get_error_string: mock_get_error_string,
        get_parameter: mock_get_parameter,
        set_parameter: mock_set_parameter,
        get_parameters: mock_get_parameters,
        set_parameters: mock_set_parameters,
        get_eeprom_data: mock_get_eeprom_data,
        write_eeprom_data: mock_write_eeprom_data,
        get_gain_HV_limit: mock_get_gain_hv_limit,
        set_gain_HV_limit: mock_set_gain_hv_limit,
        enable_outputs: mock_enable_outputs,
        clear_overload: mock_clear_overload,
        get_overload_state: mock_get_overload_state,
        get_curr_lmt_state: mock_get_curr_lmt_state,
    }
}

/// Open a device over the stand-in, starting from the power-on state.
pub fn open() -> Result<DccDevice> {
    // SAFETY: every entry in the table is a 'static function with the
    // native signature that only touches the pointers it is given.
    let device = unsafe { DccDevice::from_api(api(), MOCK_LIBRARY) }?;
    reset();
    Ok(device)
}

/// Record a call and resolve `mod_no` to a module slot.
fn module<'a>(
    state: &'a mut MockState,
    symbol: &'static str,
    mod_no: c_short,
) -> std::result::Result<&'a mut MockModule, c_short> {
    state.calls.push(symbol);
    let index = usize::try_from(mod_no).map_err(|_| ERR_WRONG_MODULE)?;
    state.modules.get_mut(index).ok_or(ERR_WRONG_MODULE)
}

/// Like [`module`], but the driver must be initialized and the module active.
fn active_module<'a>(
    state: &'a mut MockState,
    symbol: &'static str,
    mod_no: c_short,
) -> std::result::Result<&'a mut MockModule, c_short> {
    let initialized = state.initialized;
    let module = module(state, symbol, mod_no)?;
    if !initialized {
        return Err(ERR_NOT_INITIALIZED);
    }
    if !module.active {
        return Err(ERR_MODULE_INACTIVE);
    }
    Ok(module)
}

fn code(result: std::result::Result<(), c_short>) -> c_short {
    result.err().unwrap_or(0)
}

fn read_field(data: &DCCdata, module: &MockModule, id: ParameterId) -> c_float {
    match id {
        ParameterId::DccActive => f32::from(u8::from(module.active)),
        ParameterId::PciBusNo => f32::from(module.info.bus_number),
        ParameterId::C1P5v | ParameterId::C2P5v | ParameterId::C3P5v => data.gain_p5v,
        ParameterId::C1M5v | ParameterId::C2M5v | ParameterId::C3M5v => data.gain_m5v,
        ParameterId::C1P12v | ParameterId::C2P12v | ParameterId::C3P12v => data.gain_p12v,
        ParameterId::C1GainHv | ParameterId::C3GainHv => data.gain_hv,
        ParameterId::C2DigOut => f32::from(data.digi_out),
        ParameterId::C3Cooling => f32::from(data.cooling),
        ParameterId::C3CoolVolt => data.cool_voltage,
        ParameterId::C3CoolCurr => data.cool_curr_lmt,
    }
}

fn write_field(data: &mut DCCdata, id: ParameterId, value: c_float) -> std::result::Result<(), c_short> {
    match id {
        ParameterId::DccActive | ParameterId::PciBusNo => return Err(ERR_READ_ONLY),
        ParameterId::C1P5v | ParameterId::C2P5v | ParameterId::C3P5v => data.gain_p5v = value,
        ParameterId::C1M5v | ParameterId::C2M5v | ParameterId::C3M5v => data.gain_m5v = value,
        ParameterId::C1P12v | ParameterId::C2P12v | ParameterId::C3P12v => data.gain_p12v = value,
        ParameterId::C1GainHv | ParameterId::C3GainHv => data.gain_hv = value,
        ParameterId::C2DigOut => data.digi_out = value.clamp(0.0, 255.0) as u8,
        ParameterId::C3Cooling => data.cooling = c_short::from(value != 0.0),
        ParameterId::C3CoolVolt => data.cool_voltage = value,
        ParameterId::C3CoolCurr => data.cool_curr_lmt = value,
    }
    Ok(())
}

unsafe extern "C" fn mock_init(ini_file: *const c_char) -> c_short {
    let mut state = STATE.lock();
    state.calls.push("DCC_init");
    if ini_file.is_null() {
        return ERR_NULL_POINTER;
    }
    let path = CStr::from_ptr(ini_file).to_string_lossy().into_owned();
    if path.is_empty() {
        return ERR_OPEN_FILE;
    }
    state.ini_file = Some(path);
    state.initialized = true;
    for module in state.modules.iter_mut().filter(|m| m.installed) {
        module.active = true;
        module.init_status = 1;
    }
    0
}

unsafe extern "C" fn mock_test_if_active(mod_no: c_short) -> c_short {
    let mut state = STATE.lock();
    match module(&mut state, "DCC_test_if_active", mod_no) {
        Ok(m) => c_short::from(m.active),
        Err(code) => code,
    }
}

unsafe extern "C" fn mock_get_init_status(mod_no: c_short, ini_status: *mut c_short) -> c_short {
    let mut state = STATE.lock();
    code(module(&mut state, "DCC_get_init_status", mod_no).and_then(|m| {
        if ini_status.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        *ini_status = m.init_status;
        Ok(())
    }))
}

unsafe extern "C" fn mock_get_mode() -> c_short {
    let mut state = STATE.lock();
    state.calls.push("DCC_get_mode");
    state.mode
}

unsafe extern "C" fn mock_set_mode(mode: c_short, force_use: c_short, in_use: *mut c_short) -> c_short {
    let mut state = STATE.lock();
    state.calls.push("DCC_set_mode");
    if in_use.is_null() {
        return ERR_NULL_POINTER;
    }
    let claimed = state.claimed_elsewhere;
    *in_use = c_short::from(claimed);
    if claimed && force_use == 0 {
        return ERR_IN_USE;
    }
    state.mode = mode;
    0
}

unsafe extern "C" fn mock_get_module_info(mod_no: c_short, mod_info: *mut DCCModInfo) -> c_short {
    let mut state = STATE.lock();
    code(module(&mut state, "DCC_get_module_info", mod_no).and_then(|m| {
        if mod_info.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        *mod_info = m.info;
        Ok(())
    }))
}

unsafe extern "C" fn mock_get_error_string(
    error_id: c_short,
    dest_string: *mut c_char,
    max_length: c_short,
) -> c_short {
    let mut state = STATE.lock();
    state.calls.push("DCC_get_error_string");
    if dest_string.is_null() {
        return ERR_NULL_POINTER;
    }
    let capacity = match usize::try_from(max_length) {
        Ok(n) if n > 0 => n,
        _ => return ERR_BUFFER,
    };
    let dest = std::slice::from_raw_parts_mut(dest_string, capacity);

    if let Some(raw) = &state.error_text {
        for (dst, src) in dest.iter_mut().zip(raw) {
            *dst = *src as c_char;
        }
        return 0;
    }

    let text = ERROR_TEXT
        .iter()
        .find(|(code, _)| *code == error_id)
        .map(|(_, text)| (*text).to_string())
        .unwrap_or_else(|| format!("Unknown error code {}", error_id));

    let len = text.len().min(capacity - 1);
    for (dst, src) in dest.iter_mut().zip(text.bytes().take(len)) {
        *dst = src as c_char;
    }
    dest[len] = 0;
    0
}

unsafe extern "C" fn mock_get_parameter(mod_no: c_short, par_id: c_short, value: *mut c_float) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_get_parameter", mod_no).and_then(|m| {
        let id = ParameterId::from_raw(par_id).ok_or(ERR_WRONG_PARAMETER)?;
        if value.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        let m: &MockModule = m;
        *value = read_field(&m.shadow, m, id);
        Ok(())
    }))
}

unsafe extern "C" fn mock_set_parameter(
    mod_no: c_short,
    par_id: c_short,
    send_to_hard: c_short,
    value: c_float,
) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_set_parameter", mod_no).and_then(|m| {
        let id = ParameterId::from_raw(par_id).ok_or(ERR_WRONG_PARAMETER)?;
        write_field(&mut m.shadow, id, value)?;
        if send_to_hard != 0 {
            m.hardware = m.shadow;
        }
        Ok(())
    }))
}

unsafe extern "C" fn mock_get_parameters(mod_no: c_short, data: *mut DCCdata) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_get_parameters", mod_no).and_then(|m| {
        if data.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        *data = m.shadow;
        Ok(())
    }))
}

unsafe extern "C" fn mock_set_parameters(mod_no: c_short, send_to_hard: c_short, data: *mut DCCdata) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_set_parameters", mod_no).and_then(|m| {
        if data.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        m.shadow = *data;
        if send_to_hard != 0 {
            m.hardware = m.shadow;
        }
        Ok(())
    }))
}

unsafe extern "C" fn mock_get_eeprom_data(mod_no: c_short, eep_data: *mut DCC_EEP_Data) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_get_eeprom_data", mod_no).and_then(|m| {
        if eep_data.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        *eep_data = m.eeprom;
        Ok(())
    }))
}

unsafe extern "C" fn mock_write_eeprom_data(
    mod_no: c_short,
    write_enable: c_ushort,
    eep_data: *mut DCC_EEP_Data,
) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_write_eeprom_data", mod_no).and_then(|m| {
        if write_enable != EEPROM_UNLOCK_CODE {
            return Err(ERR_EEPROM_LOCKED);
        }
        if eep_data.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        m.eeprom = *eep_data;
        Ok(())
    }))
}

unsafe extern "C" fn mock_get_gain_hv_limit(mod_no: c_short, lim_id: c_short, value: *mut c_short) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_get_gain_HV_limit", mod_no).and_then(|m| {
        let index = usize::try_from(lim_id).map_err(|_| ERR_WRONG_LIMIT)?;
        let slot = m.gain_hv_limits.get(index).ok_or(ERR_WRONG_LIMIT)?;
        if value.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        *value = *slot;
        Ok(())
    }))
}

unsafe extern "C" fn mock_set_gain_hv_limit(mod_no: c_short, lim_id: c_short, value: *mut c_short) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_set_gain_HV_limit", mod_no).and_then(|m| {
        if value.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        let index = usize::try_from(lim_id).map_err(|_| ERR_WRONG_LIMIT)?;
        let slot = m.gain_hv_limits.get_mut(index).ok_or(ERR_WRONG_LIMIT)?;
        *slot = *value;
        Ok(())
    }))
}

unsafe extern "C" fn mock_enable_outputs(mod_no: c_short, enable: c_short) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_enable_outputs", mod_no).map(|m| {
        m.outputs_enabled = enable != 0;
    }))
}

unsafe extern "C" fn mock_clear_overload(mod_no: c_short) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_clear_overload", mod_no).map(|m| {
        m.overload = 0;
    }))
}

unsafe extern "C" fn mock_get_overload_state(mod_no: c_short, state_out: *mut c_short) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_get_overload_state", mod_no).and_then(|m| {
        if state_out.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        *state_out = m.overload;
        Ok(())
    }))
}

unsafe extern "C" fn mock_get_curr_lmt_state(mod_no: c_short, state_out: *mut c_short) -> c_short {
    let mut state = STATE.lock();
    code(active_module(&mut state, "DCC_get_curr_lmt_state", mod_no).and_then(|m| {
        if state_out.is_null() {
            return Err(ERR_NULL_POINTER);
        }
        *state_out = m.current_limit;
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_has_two_modules() {
        let state = MockState::default();
        assert_eq!(state.modules.iter().filter(|m| m.installed).count(), 2);
        assert!(!state.initialized);
        assert!(state.modules.iter().all(|m| !m.active));
    }

    #[test]
    fn test_field_mapping_round_trip() {
        let mut data = DCCdata::default();
        let module = MockModule::default();
        write_field(&mut data, ParameterId::C3GainHv, 70.0).unwrap();
        write_field(&mut data, ParameterId::C2DigOut, 300.0).unwrap();
        assert_eq!(read_field(&data, &module, ParameterId::C3GainHv), 70.0);
        assert_eq!(read_field(&data, &module, ParameterId::C2DigOut), 255.0);
        assert_eq!(
            write_field(&mut data, ParameterId::PciBusNo, 1.0),
            Err(ERR_READ_ONLY)
        );
    }

    #[test]
    fn test_every_error_code_has_text() {
        for (code, text) in ERROR_TEXT {
            assert!(!text.is_empty(), "code {} has no text", code);
        }
    }
}
