//! Error types for DCC operations.
//!
//! Construction failures (library or symbols missing) are fatal for a
//! [`DccDevice`](crate::DccDevice). Everything else is per call. Native result
//! codes are carried verbatim; the driver owns their meaning and
//! [`DccDevice::get_error_string`](crate::DccDevice::get_error_string) turns
//! them into text.

use dcc_sys::LoadError;
use thiserror::Error;

/// Result type alias for DCC operations.
pub type Result<T> = std::result::Result<T, DccError>;

/// Errors that can occur when working with the DCC driver.
#[derive(Error, Debug)]
pub enum DccError {
    /// The driver library could not be loaded from the given path.
    #[error("DCC library not found at '{path}': {source}")]
    LibraryNotFound {
        /// Path or name handed to the loader.
        path: String,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// The library loaded but lacks one of the required entry points.
    #[error("DCC library '{path}' is missing symbol {symbol}: {source}")]
    SymbolResolution {
        /// Path or name handed to the loader.
        path: String,
        /// First entry point that could not be bound.
        symbol: &'static str,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// Another live device already owns this library, under any name.
    #[error("DCC library '{path}' is already loaded by another device")]
    LibraryInUse {
        /// Path or label of the rejected open.
        path: String,
    },

    /// The driver returned a nonzero result code.
    #[error("{function} failed with driver code {code}")]
    Native {
        /// Native symbol that failed.
        function: &'static str,
        /// Driver result code, unchanged.
        code: i16,
    },

    /// A fixed-length buffer from the driver did not hold ASCII text.
    #[error("Failed to decode {field}: {message}")]
    Decode {
        /// Record field being decoded.
        field: &'static str,
        /// What was wrong with the bytes.
        message: String,
    },

    /// A value could not be represented in the driver's fixed-length buffer.
    #[error("Failed to encode {field}: {message}")]
    Encode {
        /// Record field being encoded.
        field: &'static str,
        /// Why the value does not fit.
        message: String,
    },

    /// An argument cannot be passed across the boundary.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },
}

impl DccError {
    /// The raw driver code, for native failures.
    pub fn native_code(&self) -> Option<i16> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this is a library-not-found error.
    pub fn is_library_not_found(&self) -> bool {
        matches!(self, Self::LibraryNotFound { .. })
    }

    /// Check if the driver rejected the call.
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native { .. })
    }
}

impl From<LoadError> for DccError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Library { path, source } => Self::LibraryNotFound { path, source },
            LoadError::Symbol {
                path,
                symbol,
                source,
            } => Self::SymbolResolution {
                path,
                symbol,
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_display() {
        let err = DccError::Native {
            function: "DCC_get_parameter",
            code: -5,
        };
        assert!(err.to_string().contains("DCC_get_parameter"));
        assert!(err.to_string().contains("-5"));
        assert_eq!(err.native_code(), Some(-5));
        assert!(err.is_native());
    }

    #[test]
    fn test_non_native_has_no_code() {
        let err = DccError::Decode {
            field: "serial_no",
            message: "byte 0xff at 3".to_string(),
        };
        assert_eq!(err.native_code(), None);
        assert!(!err.is_library_not_found());
    }
}
