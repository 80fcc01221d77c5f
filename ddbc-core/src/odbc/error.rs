use std::fmt::{self, Display, Formatter};

use crate::odbc::sys::SqlReturn;

/// One diagnostic record as returned by `SQLGetDiagRecW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// Five character SQLSTATE code.
    pub state: String,
    /// Driver specific error code.
    pub native_error: i32,
    pub message: String,
}

impl DiagnosticRecord {
    /// The `"SQLSTATE (native)"` half of the diagnostic pair.
    pub fn code(&self) -> String {
        format!("{} ({})", self.state, self.native_error)
    }

    /// The diagnostic as a `(code, message)` pair.
    pub fn to_pair(&self) -> (String, String) {
        (self.code(), self.message.clone())
    }
}

impl Display for DiagnosticRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message)
    }
}

/// Broad class of a driver failure, derived from its SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Warning,
    Data,
    Integrity,
    Programming,
    Operational,
    NotSupported,
    /// Anything without a more specific class.
    Database,
}

impl ErrorKind {
    pub fn from_sqlstate(state: &str) -> Self {
        let class = state.get(..2).unwrap_or("");
        match state {
            "01000" | "01S02" => ErrorKind::Warning,
            "01003" | "01004" | "01S01" | "01S07" => ErrorKind::Data,
            "01S00" | "01S09" => ErrorKind::Programming,
            "01001" | "01002" | "01006" | "01007" | "01S06" | "01S08" => ErrorKind::Operational,
            "22019" | "22025" => ErrorKind::Programming,
            "23000" | "40002" | "44000" => ErrorKind::Integrity,
            "24000" | "34000" | "3C000" | "3D000" | "3F000" => ErrorKind::Programming,
            "28000" | "40001" | "40003" => ErrorKind::Operational,
            "HY000" | "HY001" | "HY008" | "HY013" | "HY014" | "HY018" | "HYT00" | "HYT01" => {
                ErrorKind::Operational
            }
            "HY019" | "HY020" => ErrorKind::Data,
            "HYC00" | "IM001" => ErrorKind::NotSupported,
            _ if class == "07" || class == "42" || state.starts_with("21S") => {
                ErrorKind::Programming
            }
            _ if class == "08" || class == "25" => ErrorKind::Operational,
            _ if class == "22" => ErrorKind::Data,
            _ if class == "HY" => ErrorKind::Programming,
            _ if class == "IM" => ErrorKind::Operational,
            _ => ErrorKind::Database,
        }
    }
}

/// A non-success return code from an ODBC function together with the diagnostics the
/// driver attached to it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{function} returned {code}{}", detail(.code, .records))]
pub struct DriverError {
    pub function: &'static str,
    pub code: SqlReturn,
    pub records: Vec<DiagnosticRecord>,
}

impl DriverError {
    pub fn first(&self) -> Option<&DiagnosticRecord> {
        self.records.first()
    }

    /// SQLSTATE of the first record.
    pub fn state(&self) -> Option<&str> {
        self.first().map(|r| r.state.as_str())
    }

    pub fn kind(&self) -> ErrorKind {
        self.state()
            .map(ErrorKind::from_sqlstate)
            .unwrap_or(ErrorKind::Database)
    }
}

fn detail(code: &SqlReturn, records: &[DiagnosticRecord]) -> String {
    match records.first() {
        Some(record) => format!(": {}", record),
        None if *code == SqlReturn::INVALID_HANDLE => ": invalid handle".to_owned(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: &str) -> DiagnosticRecord {
        DiagnosticRecord {
            state: state.to_owned(),
            native_error: 102,
            message: "Incorrect syntax near 'FORM'.".to_owned(),
        }
    }

    #[test]
    fn test_sqlstate_classes() {
        assert_eq!(ErrorKind::from_sqlstate("42000"), ErrorKind::Programming);
        assert_eq!(ErrorKind::from_sqlstate("42S02"), ErrorKind::Programming);
        assert_eq!(ErrorKind::from_sqlstate("07009"), ErrorKind::Programming);
        assert_eq!(ErrorKind::from_sqlstate("21S01"), ErrorKind::Programming);
        assert_eq!(ErrorKind::from_sqlstate("22003"), ErrorKind::Data);
        assert_eq!(ErrorKind::from_sqlstate("22019"), ErrorKind::Programming);
        assert_eq!(ErrorKind::from_sqlstate("01004"), ErrorKind::Data);
        assert_eq!(ErrorKind::from_sqlstate("01000"), ErrorKind::Warning);
        assert_eq!(ErrorKind::from_sqlstate("23000"), ErrorKind::Integrity);
        assert_eq!(ErrorKind::from_sqlstate("08S01"), ErrorKind::Operational);
        assert_eq!(ErrorKind::from_sqlstate("HYT00"), ErrorKind::Operational);
        assert_eq!(ErrorKind::from_sqlstate("HY010"), ErrorKind::Programming);
        assert_eq!(ErrorKind::from_sqlstate("HYC00"), ErrorKind::NotSupported);
        assert_eq!(ErrorKind::from_sqlstate("IM002"), ErrorKind::Operational);
        assert_eq!(ErrorKind::from_sqlstate("S0001"), ErrorKind::Database);
    }

    #[test]
    fn test_driver_error_display() {
        let err = DriverError {
            function: "SQLExecDirectW",
            code: SqlReturn::ERROR,
            records: vec![record("42000")],
        };
        assert_eq!(
            err.to_string(),
            "SQLExecDirectW returned SQL_ERROR: 42000 (102) Incorrect syntax near 'FORM'."
        );
        assert_eq!(err.kind(), ErrorKind::Programming);
    }

    #[test]
    fn test_record_pair() {
        let (code, message) = record("42000").to_pair();
        assert_eq!(code, "42000 (102)");
        assert_eq!(message, "Incorrect syntax near 'FORM'.");
    }

    #[test]
    fn test_invalid_handle_without_records() {
        let err = DriverError {
            function: "SQLExecute",
            code: SqlReturn::INVALID_HANDLE,
            records: Vec::new(),
        };
        assert_eq!(err.to_string(), "SQLExecute returned SQL_INVALID_HANDLE: invalid handle");
        assert_eq!(err.kind(), ErrorKind::Database);
    }

    #[test]
    fn test_driver_error_is_a_std_error() {
        let err = DriverError {
            function: "SQLFetchScroll",
            code: SqlReturn::ERROR,
            records: Vec::new(),
        };
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert_eq!(boxed.to_string(), "SQLFetchScroll returned SQL_ERROR");
        assert!(boxed.source().is_none());
    }
}
