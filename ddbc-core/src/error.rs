//! Types for working with errors produced by ddbc.

use std::error::Error as StdError;
use std::result::Result as StdResult;

use crate::odbc::{CType, DriverError};

/// A specialized `Result` type for ddbc.
pub type Result<T, E = Error> = StdResult<T, E>;

// Convenience type alias for usage within ddbc.
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// Represents all the ways a method can fail within ddbc.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error occurred while resolving the function table or parsing settings.
    #[error("error with configuration: {0}")]
    Configuration(#[source] BoxDynError),

    /// The number of values does not match the number of parameter descriptors.
    #[error("expected {expected} parameter values, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    /// A host value cannot be converted to the C type declared for its parameter.
    #[error("parameter {index}: cannot bind a {found} value as {expected:?}")]
    TypeMismatch {
        index: usize,
        expected: CType,
        found: &'static str,
    },

    /// A value does not fit the representable range of its target.
    #[error("value {value} is out of range for {target}")]
    Range { target: &'static str, value: String },

    /// Fetched data is longer than the buffer bound for its column.
    #[error(
        "column {column}, row {row}: value of {actual} bytes does not fit the {capacity} byte buffer"
    )]
    BufferTooSmall {
        column: usize,
        row: usize,
        actual: usize,
        capacity: usize,
    },

    /// A value in a set-based execution is wider than its parameter's declared size.
    #[error("parameter {parameter}, row {row}: value of length {len} exceeds the declared size {size}")]
    ParameterTooLong {
        parameter: usize,
        row: usize,
        len: usize,
        size: usize,
    },

    /// A C type code outside of the supported set.
    #[error("unsupported C type code {0}")]
    UnsupportedType(i16),

    /// A deferred parameter whose value is not text, wide text or binary.
    #[error("parameter {index}: {found} values cannot be sent as data-at-execution")]
    UnsupportedStreamingType { index: usize, found: &'static str },

    /// The ODBC driver returned a failure code.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Unexpected or invalid data encountered while talking to the driver.
    ///
    /// This indicates either a programming error in the calling code (for example fetching
    /// from a closed statement) or a driver that does not honour the ODBC call contract.
    #[error("encountered unexpected or invalid data: {0}")]
    Protocol(String),

    /// No column found for the given name.
    #[error("no column found for name: {0}")]
    ColumnNotFound(String),

    /// Column index was out of bounds.
    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// Error occurred while decoding a fetched value.
    #[error("error occurred while decoding column {index}: {source}")]
    ColumnDecode {
        index: usize,

        #[source]
        source: BoxDynError,
    },

    /// Error occurred while decoding a value.
    #[error("error occurred while decoding: {0}")]
    Decode(#[source] BoxDynError),
}

impl Error {
    #[inline]
    pub(crate) fn config(err: impl Into<BoxDynError>) -> Self {
        Error::Configuration(err.into())
    }

    #[inline]
    pub(crate) fn range(target: &'static str, value: impl ToString) -> Self {
        Error::Range {
            target,
            value: value.to_string(),
        }
    }

    /// Returns the driver error if this error came from the ODBC driver.
    pub fn as_driver_error(&self) -> Option<&DriverError> {
        match self {
            Error::Driver(e) => Some(e),
            _ => None,
        }
    }
}

/// Format an error message as a `Protocol` error
#[macro_export]
macro_rules! err_protocol {
    ($expr:expr) => {
        $crate::error::Error::Protocol($expr.into())
    };

    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Protocol(format!($fmt, $($arg)*))
    };
}
