//! Construction failures when loading the driver library.

use std::io::Write;

use daq_driver_dcc::{DccConfig, DccDevice, DccError};

#[test]
fn test_nonexistent_path_is_library_not_found() {
    let path = "/nonexistent/BH/DCC/DLL/dcc64.dll";
    let err = DccDevice::open(path).unwrap_err();
    assert!(err.is_library_not_found(), "got {err:?}");
    assert!(err.to_string().contains(path));

    // Nothing is left claimed by the failed attempt.
    let err = DccDevice::open(path).unwrap_err();
    assert!(err.is_library_not_found(), "got {err:?}");
}

#[test]
fn test_file_that_is_not_a_library() {
    let mut file = tempfile::Builder::new()
        .suffix(".so")
        .tempfile()
        .unwrap();
    writeln!(file, "this is not a shared object").unwrap();

    let err = DccDevice::open(file.path()).unwrap_err();
    assert!(err.is_library_not_found(), "got {err:?}");
}

#[cfg(target_os = "linux")]
#[test]
fn test_missing_symbols_fail_at_construction() {
    let err = DccDevice::open("libc.so.6").unwrap_err();
    match err {
        DccError::SymbolResolution { symbol, .. } => assert_eq!(symbol, "DCC_init"),
        other => panic!("expected symbol resolution error, got {other:?}"),
    }

    // The failed load released its claim on the library.
    let err = DccDevice::open("libc.so.6").unwrap_err();
    assert!(matches!(err, DccError::SymbolResolution { .. }));
}

#[test]
fn test_config_file_pointing_at_missing_library() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("dcc.toml");
    std::fs::write(
        &config_path,
        "library_path = \"/nonexistent/libdcc.so\"\nini_file = \"dcc100.ini\"\nmodule = 1\n",
    )
    .unwrap();

    let config = DccConfig::load(&config_path).unwrap();
    assert_eq!(config.module, 1);

    let err = config.open().unwrap_err();
    let dcc_err = err.downcast_ref::<DccError>().expect("DccError source");
    assert!(dcc_err.is_library_not_found());
}
