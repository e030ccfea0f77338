//! Safe Rust driver for DCC detector control cards.
//!
//! This crate wraps the vendor's DCC driver library (loaded at runtime via
//! `dcc-sys`) with typed records, a closed parameter enum and proper error
//! handling. It adds no behavior of its own: every call is one synchronous
//! round-trip into the driver, and the driver's result codes are reported
//! verbatim.
//!
//! # Architecture
//!
//! - [`DccDevice`] - Owns the loaded library; one method per entry point
//! - [`ParameterId`] - Scalar parameters addressed by `get/set_parameter`
//! - [`ModuleInfo`] / [`LiveParameters`] / [`CalibrationRecord`] - Decoded records
//! - [`DccConfig`] - TOML/env configuration
//! - [`mock`] - Software stand-in for the driver (feature `mock`)
//!
//! # Examples
//!
//! ```no_run
//! use daq_driver_dcc::{DccDevice, ParameterId};
//!
//! # fn example() -> anyhow::Result<()> {
//! let dcc = DccDevice::open(r"C:\Program Files (x86)\BH\DCC\DLL\dcc64.dll")?;
//! if let Err(err) = dcc.init(r"C:\Program Files (x86)\BH\DCC\dcc100.ini") {
//!     if let Some(code) = err.native_code() {
//!         eprintln!("Init failed: {}", dcc.get_error_string(code)?);
//!     }
//!     return Err(err.into());
//! }
//!
//! if dcc.test_if_active(1)? {
//!     dcc.set_parameter(1, ParameterId::C3GainHv, true, 70.0)?;
//!     dcc.enable_outputs(1, true)?;
//!     println!("HV gain: {}", dcc.get_parameter(1, ParameterId::C3GainHv)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod parameter;
pub mod records;

pub use config::DccConfig;
pub use device::DccDevice;
pub use error::{DccError, Result};
pub use parameter::ParameterId;
pub use records::{CalibrationRecord, LiveParameters, ModuleInfo};
