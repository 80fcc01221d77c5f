//! Raw types and constants of the ODBC C call interface.
//!
//! Only the subset used by the marshalling core is declared here. Names follow the ODBC
//! headers with the `SQL_` prefix dropped.

use std::ffi::c_void;
use std::fmt;

pub type Pointer = *mut c_void;
pub type SmallInt = i16;
pub type USmallInt = u16;
pub type Integer = i32;
pub type Len = isize;
pub type ULen = usize;

/// The ODBC wide character unit (UTF-16LE on the wire).
pub type WChar = u16;

/// Statement handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HStmt(pub Pointer);

/// Descriptor handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HDesc(pub Pointer);

impl HStmt {
    pub fn as_handle(self) -> Pointer {
        self.0
    }
}

pub const HANDLE_STMT: SmallInt = 3;
pub const HANDLE_DESC: SmallInt = 4;

/// Return code of every ODBC function.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlReturn(pub SmallInt);

impl SqlReturn {
    pub const SUCCESS: SqlReturn = SqlReturn(0);
    pub const SUCCESS_WITH_INFO: SqlReturn = SqlReturn(1);
    pub const STILL_EXECUTING: SqlReturn = SqlReturn(2);
    pub const NEED_DATA: SqlReturn = SqlReturn(99);
    pub const NO_DATA: SqlReturn = SqlReturn(100);
    pub const PARAM_DATA_AVAILABLE: SqlReturn = SqlReturn(101);
    pub const ERROR: SqlReturn = SqlReturn(-1);
    pub const INVALID_HANDLE: SqlReturn = SqlReturn(-2);

    /// `SQL_SUCCEEDED`: success, with or without diagnostics.
    pub fn succeeded(self) -> bool {
        self == Self::SUCCESS || self == Self::SUCCESS_WITH_INFO
    }
}

impl fmt::Debug for SqlReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SUCCESS => "SQL_SUCCESS",
            Self::SUCCESS_WITH_INFO => "SQL_SUCCESS_WITH_INFO",
            Self::STILL_EXECUTING => "SQL_STILL_EXECUTING",
            Self::NEED_DATA => "SQL_NEED_DATA",
            Self::NO_DATA => "SQL_NO_DATA",
            Self::PARAM_DATA_AVAILABLE => "SQL_PARAM_DATA_AVAILABLE",
            Self::ERROR => "SQL_ERROR",
            Self::INVALID_HANDLE => "SQL_INVALID_HANDLE",
            SqlReturn(other) => return write!(f, "SqlReturn({})", other),
        };
        f.write_str(name)
    }
}

impl fmt::Display for SqlReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// length / indicator sentinels
pub const NULL_DATA: Len = -1;
pub const DATA_AT_EXEC: Len = -2;
pub const NTS: Len = -3;
pub const NO_TOTAL: Len = -4;

const LEN_DATA_AT_EXEC_OFFSET: Len = -100;

/// `SQL_LEN_DATA_AT_EXEC(length)`
pub fn len_data_at_exec(length: Len) -> Len {
    LEN_DATA_AT_EXEC_OFFSET - length
}

/// True for both `SQL_DATA_AT_EXEC` and `SQL_LEN_DATA_AT_EXEC(n)` indicators.
pub fn is_data_at_exec(indicator: Len) -> bool {
    indicator == DATA_AT_EXEC || indicator <= LEN_DATA_AT_EXEC_OFFSET
}

// statement attributes
pub const ATTR_PARAMS_PROCESSED_PTR: Integer = 21;
pub const ATTR_PARAMSET_SIZE: Integer = 22;
pub const ATTR_ROWS_FETCHED_PTR: Integer = 26;
pub const ATTR_ROW_ARRAY_SIZE: Integer = 27;
pub const ATTR_APP_PARAM_DESC: Integer = 10011;

// descriptor fields
pub const DESC_TYPE: SmallInt = 1002;
pub const DESC_PRECISION: SmallInt = 1005;
pub const DESC_SCALE: SmallInt = 1006;
pub const DESC_DATA_PTR: SmallInt = 1010;

// SQLFreeStmt options
pub const CLOSE: USmallInt = 0;
pub const UNBIND: USmallInt = 2;
pub const RESET_PARAMS: USmallInt = 3;

pub const FETCH_NEXT: SmallInt = 1;

// parameter directions
pub const PARAM_INPUT: SmallInt = 1;
pub const PARAM_INPUT_OUTPUT: SmallInt = 2;
pub const PARAM_OUTPUT: SmallInt = 4;

// nullability reported by SQLDescribeCol
pub const NO_NULLS: SmallInt = 0;
pub const NULLABLE: SmallInt = 1;

// SQL data type codes
pub const SQL_UNKNOWN_TYPE: SmallInt = 0;
pub const SQL_CHAR: SmallInt = 1;
pub const SQL_NUMERIC: SmallInt = 2;
pub const SQL_DECIMAL: SmallInt = 3;
pub const SQL_INTEGER: SmallInt = 4;
pub const SQL_SMALLINT: SmallInt = 5;
pub const SQL_FLOAT: SmallInt = 6;
pub const SQL_REAL: SmallInt = 7;
pub const SQL_DOUBLE: SmallInt = 8;
pub const SQL_VARCHAR: SmallInt = 12;
pub const SQL_TYPE_DATE: SmallInt = 91;
pub const SQL_TYPE_TIME: SmallInt = 92;
pub const SQL_TYPE_TIMESTAMP: SmallInt = 93;
pub const SQL_LONGVARCHAR: SmallInt = -1;
pub const SQL_BINARY: SmallInt = -2;
pub const SQL_VARBINARY: SmallInt = -3;
pub const SQL_LONGVARBINARY: SmallInt = -4;
pub const SQL_BIGINT: SmallInt = -5;
pub const SQL_TINYINT: SmallInt = -6;
pub const SQL_BIT: SmallInt = -7;
pub const SQL_WCHAR: SmallInt = -8;
pub const SQL_WVARCHAR: SmallInt = -9;
pub const SQL_WLONGVARCHAR: SmallInt = -10;
pub const SQL_GUID: SmallInt = -11;

// C data type codes
pub const C_CHAR: SmallInt = 1;
pub const C_NUMERIC: SmallInt = 2;
pub const C_FLOAT: SmallInt = 7;
pub const C_DOUBLE: SmallInt = 8;
pub const C_TYPE_DATE: SmallInt = 91;
pub const C_TYPE_TIME: SmallInt = 92;
pub const C_TYPE_TIMESTAMP: SmallInt = 93;
pub const C_BINARY: SmallInt = -2;
pub const C_BIT: SmallInt = -7;
pub const C_WCHAR: SmallInt = -8;
pub const C_GUID: SmallInt = -11;
pub const C_SSHORT: SmallInt = -15;
pub const C_SLONG: SmallInt = -16;
pub const C_USHORT: SmallInt = -17;
pub const C_ULONG: SmallInt = -18;
pub const C_SBIGINT: SmallInt = -25;
pub const C_STINYINT: SmallInt = -26;
pub const C_UBIGINT: SmallInt = -27;
pub const C_UTINYINT: SmallInt = -28;

/// `SQL_MAX_NUMERIC_LEN`
pub const MAX_NUMERIC_LEN: usize = 16;

/// `SQL_DATE_STRUCT`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SqlDate {
    pub year: i16,
    pub month: u16,
    pub day: u16,
}

/// `SQL_TIME_STRUCT`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SqlTime {
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

/// `SQL_TIMESTAMP_STRUCT`; `fraction` is in nanoseconds.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SqlTimestamp {
    pub year: i16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub fraction: u32,
}

/// `SQL_NUMERIC_STRUCT`; `sign` is 1 for positive and 0 for negative, `val` is the
/// little-endian unscaled magnitude.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SqlNumeric {
    pub precision: u8,
    pub scale: i8,
    pub sign: u8,
    pub val: [u8; MAX_NUMERIC_LEN],
}

/// `SQLGUID`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SqlGuid {
    pub d1: u32,
    pub d2: u16,
    pub d3: u16,
    pub d4: [u8; 8],
}
