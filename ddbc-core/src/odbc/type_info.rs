use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::odbc::sys::{self, SmallInt};
use crate::odbc::CType;

/// Width of the character buffer used to fetch NUMERIC and DECIMAL columns.
pub const NUMERIC_TEXT_WIDTH: usize = 64;

/// SQL data type of a parameter or result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDataType {
    Char,
    VarChar,
    LongVarChar,
    WChar,
    WVarChar,
    WLongVarChar,
    Numeric,
    Decimal,
    Integer,
    SmallInt,
    TinyInt,
    BigInt,
    Bit,
    Real,
    Float,
    Double,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Guid,
    /// A driver specific type code.
    Other(SmallInt),
}

impl SqlDataType {
    pub fn from_raw(code: SmallInt) -> Self {
        match code {
            sys::SQL_CHAR => SqlDataType::Char,
            sys::SQL_VARCHAR => SqlDataType::VarChar,
            sys::SQL_LONGVARCHAR => SqlDataType::LongVarChar,
            sys::SQL_WCHAR => SqlDataType::WChar,
            sys::SQL_WVARCHAR => SqlDataType::WVarChar,
            sys::SQL_WLONGVARCHAR => SqlDataType::WLongVarChar,
            sys::SQL_NUMERIC => SqlDataType::Numeric,
            sys::SQL_DECIMAL => SqlDataType::Decimal,
            sys::SQL_INTEGER => SqlDataType::Integer,
            sys::SQL_SMALLINT => SqlDataType::SmallInt,
            sys::SQL_TINYINT => SqlDataType::TinyInt,
            sys::SQL_BIGINT => SqlDataType::BigInt,
            sys::SQL_BIT => SqlDataType::Bit,
            sys::SQL_REAL => SqlDataType::Real,
            sys::SQL_FLOAT => SqlDataType::Float,
            sys::SQL_DOUBLE => SqlDataType::Double,
            // SQL_DATE, SQL_TIME and SQL_TIMESTAMP from ODBC 2.x
            sys::SQL_TYPE_DATE | 9 => SqlDataType::Date,
            sys::SQL_TYPE_TIME | 10 => SqlDataType::Time,
            sys::SQL_TYPE_TIMESTAMP | 11 => SqlDataType::Timestamp,
            sys::SQL_BINARY => SqlDataType::Binary,
            sys::SQL_VARBINARY => SqlDataType::VarBinary,
            sys::SQL_LONGVARBINARY => SqlDataType::LongVarBinary,
            sys::SQL_GUID => SqlDataType::Guid,
            other => SqlDataType::Other(other),
        }
    }

    pub fn raw(self) -> SmallInt {
        match self {
            SqlDataType::Char => sys::SQL_CHAR,
            SqlDataType::VarChar => sys::SQL_VARCHAR,
            SqlDataType::LongVarChar => sys::SQL_LONGVARCHAR,
            SqlDataType::WChar => sys::SQL_WCHAR,
            SqlDataType::WVarChar => sys::SQL_WVARCHAR,
            SqlDataType::WLongVarChar => sys::SQL_WLONGVARCHAR,
            SqlDataType::Numeric => sys::SQL_NUMERIC,
            SqlDataType::Decimal => sys::SQL_DECIMAL,
            SqlDataType::Integer => sys::SQL_INTEGER,
            SqlDataType::SmallInt => sys::SQL_SMALLINT,
            SqlDataType::TinyInt => sys::SQL_TINYINT,
            SqlDataType::BigInt => sys::SQL_BIGINT,
            SqlDataType::Bit => sys::SQL_BIT,
            SqlDataType::Real => sys::SQL_REAL,
            SqlDataType::Float => sys::SQL_FLOAT,
            SqlDataType::Double => sys::SQL_DOUBLE,
            SqlDataType::Date => sys::SQL_TYPE_DATE,
            SqlDataType::Time => sys::SQL_TYPE_TIME,
            SqlDataType::Timestamp => sys::SQL_TYPE_TIMESTAMP,
            SqlDataType::Binary => sys::SQL_BINARY,
            SqlDataType::VarBinary => sys::SQL_VARBINARY,
            SqlDataType::LongVarBinary => sys::SQL_LONGVARBINARY,
            SqlDataType::Guid => sys::SQL_GUID,
            SqlDataType::Other(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SqlDataType::Char => "CHAR",
            SqlDataType::VarChar => "VARCHAR",
            SqlDataType::LongVarChar => "LONGVARCHAR",
            SqlDataType::WChar => "WCHAR",
            SqlDataType::WVarChar => "WVARCHAR",
            SqlDataType::WLongVarChar => "WLONGVARCHAR",
            SqlDataType::Numeric => "NUMERIC",
            SqlDataType::Decimal => "DECIMAL",
            SqlDataType::Integer => "INTEGER",
            SqlDataType::SmallInt => "SMALLINT",
            SqlDataType::TinyInt => "TINYINT",
            SqlDataType::BigInt => "BIGINT",
            SqlDataType::Bit => "BIT",
            SqlDataType::Real => "REAL",
            SqlDataType::Float => "FLOAT",
            SqlDataType::Double => "DOUBLE",
            SqlDataType::Date => "DATE",
            SqlDataType::Time => "TIME",
            SqlDataType::Timestamp => "TIMESTAMP",
            SqlDataType::Binary => "BINARY",
            SqlDataType::VarBinary => "VARBINARY",
            SqlDataType::LongVarBinary => "LONGVARBINARY",
            SqlDataType::Guid => "GUID",
            SqlDataType::Other(_) => "UNKNOWN",
        }
    }

    pub fn is_narrow_text(self) -> bool {
        matches!(
            self,
            SqlDataType::Char | SqlDataType::VarChar | SqlDataType::LongVarChar
        )
    }

    /// Wide text, including driver specific types which are fetched as wide text.
    pub fn is_wide_text(self) -> bool {
        matches!(
            self,
            SqlDataType::WChar
                | SqlDataType::WVarChar
                | SqlDataType::WLongVarChar
                | SqlDataType::Other(_)
        )
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            SqlDataType::Binary | SqlDataType::VarBinary | SqlDataType::LongVarBinary
        )
    }

    pub fn is_decimal(self) -> bool {
        matches!(self, SqlDataType::Numeric | SqlDataType::Decimal)
    }

    /// Whether the declared column size bounds the buffer width.
    pub fn is_variable_length(self) -> bool {
        self.is_narrow_text() || self.is_wide_text() || self.is_binary()
    }

    /// The C type a column of this type is fetched as.
    ///
    /// NUMERIC and DECIMAL are fetched as text and parsed with the column's precision and
    /// scale, which avoids depending on driver support for `SQL_C_NUMERIC` results.
    pub fn fetch_c_type(self) -> CType {
        match self {
            SqlDataType::Char | SqlDataType::VarChar | SqlDataType::LongVarChar => CType::Char,
            SqlDataType::Numeric | SqlDataType::Decimal => CType::Char,
            SqlDataType::WChar
            | SqlDataType::WVarChar
            | SqlDataType::WLongVarChar
            | SqlDataType::Other(_) => CType::WChar,
            SqlDataType::Integer => CType::SLong,
            SqlDataType::SmallInt => CType::SShort,
            SqlDataType::TinyInt => CType::UTinyInt,
            SqlDataType::BigInt => CType::SBigInt,
            SqlDataType::Bit => CType::Bit,
            SqlDataType::Real => CType::Float,
            SqlDataType::Float | SqlDataType::Double => CType::Double,
            SqlDataType::Date => CType::Date,
            SqlDataType::Time => CType::Time,
            SqlDataType::Timestamp => CType::Timestamp,
            SqlDataType::Guid => CType::Guid,
            SqlDataType::Binary | SqlDataType::VarBinary | SqlDataType::LongVarBinary => {
                CType::Binary
            }
        }
    }
}

impl Display for SqlDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SqlDataType::Other(code) => write!(f, "UNKNOWN({})", code),
            other => f.write_str(other.name()),
        }
    }
}
