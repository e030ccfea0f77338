//! Configuration for opening a DCC driver.
//!
//! # Example Configuration
//!
//! ```toml
//! library_path = 'C:\Program Files (x86)\BH\DCC\DLL\dcc64.dll'
//! ini_file = 'C:\Program Files (x86)\BH\DCC\dcc100.ini'
//! module = 1
//! ```
//!
//! Any field can be overridden from the environment with a `DCC_` prefix,
//! e.g. `DCC_LIBRARY_PATH=/opt/bh/libdcc.so`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::device::DccDevice;

/// Where the driver lives and how to initialize it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DccConfig {
    /// Path or name of the vendor library.
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,

    /// Vendor INI file passed to `DCC_init`. Skips init when absent.
    #[serde(default)]
    pub ini_file: Option<PathBuf>,

    /// Module index the application works with.
    #[serde(default)]
    pub module: i16,
}

fn default_library_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("dcc64.dll")
    } else {
        PathBuf::from("libdcc.so")
    }
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            library_path: default_library_path(),
            ini_file: None,
            module: 0,
        }
    }
}

impl DccConfig {
    /// Load from a TOML file, with `DCC_*` environment variables on top.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("DCC config file not found: {}", path.display());
        }
        debug!("Loading DCC config from: {}", path.display());

        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("DCC_"))
            .extract()
            .with_context(|| format!("Failed to parse DCC config: {}", path.display()))
    }

    /// Open the configured library and run `DCC_init` if an INI file is set.
    pub fn open(&self) -> Result<DccDevice> {
        let device = DccDevice::open(&self.library_path).with_context(|| {
            format!("Failed to open DCC library {}", self.library_path.display())
        })?;

        if let Some(ini) = &self.ini_file {
            device
                .init(ini)
                .with_context(|| format!("DCC_init failed for {}", ini.display()))?;
        }

        info!(library = %device.library(), module = self.module, "DCC driver ready");
        Ok(device)
    }
}

impl FromStr for DccConfig {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: DccConfig = "".parse().unwrap();
        assert_eq!(config, DccConfig::default());
        assert!(config.ini_file.is_none());
    }

    #[test]
    fn test_parse_full() {
        let config: DccConfig = r#"
            library_path = "/opt/bh/libdcc.so"
            ini_file = "/opt/bh/dcc100.ini"
            module = 1
        "#
        .parse()
        .unwrap();
        assert_eq!(config.library_path, PathBuf::from("/opt/bh/libdcc.so"));
        assert_eq!(config.ini_file, Some(PathBuf::from("/opt/bh/dcc100.ini")));
        assert_eq!(config.module, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = DccConfig::load(Path::new("/nonexistent/dcc.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_with_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "dcc.toml",
                r#"
                    library_path = "dcc64.dll"
                    module = 1
                "#,
            )?;
            jail.set_env("DCC_MODULE", "3");

            let config = DccConfig::load(Path::new("dcc.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.library_path, PathBuf::from("dcc64.dll"));
            assert_eq!(config.module, 3);
            Ok(())
        });
    }

    #[test]
    fn test_open_missing_library_has_context() {
        let config = DccConfig {
            library_path: PathBuf::from("/nonexistent/libdcc.so"),
            ..Default::default()
        };
        let err = config.open().unwrap_err();
        assert!(err.to_string().contains("Failed to open DCC library"));
        let source = err.downcast_ref::<crate::DccError>().unwrap();
        assert!(source.is_library_not_found());
    }
}
