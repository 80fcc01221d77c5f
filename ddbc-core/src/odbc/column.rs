use crate::error::Result;
use crate::odbc::codec::wide;
use crate::odbc::diagnostics::check_success;
use crate::odbc::sys::{self, HStmt, SmallInt, ULen};
use crate::odbc::{OdbcApi, SqlDataType};

const INITIAL_NAME_LEN: usize = 256;

/// Whether a result column may contain NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    NoNulls,
    Nullable,
    Unknown,
}

impl Nullability {
    pub fn from_raw(raw: SmallInt) -> Self {
        match raw {
            sys::NO_NULLS => Nullability::NoNulls,
            sys::NULLABLE => Nullability::Nullable,
            _ => Nullability::Unknown,
        }
    }
}

/// Metadata of one column of the active result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Position in the result set, starting at 0.
    pub ordinal: usize,
    pub name: String,
    pub data_type: SqlDataType,
    /// Declared width in characters or bytes; 0 when the driver reports no bound.
    pub column_size: usize,
    pub decimal_digits: i16,
    pub nullability: Nullability,
}

impl ColumnDescriptor {
    pub fn new(ordinal: usize, name: impl Into<String>, data_type: SqlDataType) -> Self {
        Self {
            ordinal,
            name: name.into(),
            data_type,
            column_size: 0,
            decimal_digits: 0,
            nullability: Nullability::Unknown,
        }
    }

    pub fn with_size(mut self, column_size: usize) -> Self {
        self.column_size = column_size;
        self
    }

    pub fn with_decimal_digits(mut self, decimal_digits: i16) -> Self {
        self.decimal_digits = decimal_digits;
        self
    }

    pub fn with_nullability(mut self, nullability: Nullability) -> Self {
        self.nullability = nullability;
        self
    }

    /// True when values of this column have no declared bound.
    pub fn is_unbounded(&self) -> bool {
        self.data_type.is_variable_length() && self.column_size == 0
    }
}

/// Number of columns in the active result set, 0 if the statement produced none.
pub(crate) fn count<A: OdbcApi + ?Sized>(api: &A, stmt: HStmt) -> Result<usize> {
    let mut count: SmallInt = 0;
    let ret = unsafe { api.num_result_cols(stmt, &mut count) };
    check_success(api, stmt, "SQLNumResultCols", ret)?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Describes every column of the active result set.
pub(crate) fn describe_all<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
) -> Result<Vec<ColumnDescriptor>> {
    let count = count(api, stmt)?;
    (0..count).map(|ordinal| describe(api, stmt, ordinal)).collect()
}

pub(crate) fn describe<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    ordinal: usize,
) -> Result<ColumnDescriptor> {
    let column_number = u16::try_from(ordinal + 1)
        .map_err(|_| err_protocol!("column ordinal {} is out of range", ordinal))?;
    let mut name = vec![0u16; INITIAL_NAME_LEN];

    loop {
        let mut name_length: SmallInt = 0;
        let mut data_type: SmallInt = 0;
        let mut column_size: ULen = 0;
        let mut decimal_digits: SmallInt = 0;
        let mut nullable: SmallInt = 0;
        let buffer_length = SmallInt::try_from(name.len()).unwrap_or(SmallInt::MAX);

        let ret = unsafe {
            api.describe_col(
                stmt,
                column_number,
                name.as_mut_ptr(),
                buffer_length,
                &mut name_length,
                &mut data_type,
                &mut column_size,
                &mut decimal_digits,
                &mut nullable,
            )
        };
        check_success(api, stmt, "SQLDescribeColW", ret)?;

        let name_length = usize::try_from(name_length).unwrap_or(0);
        if name_length >= name.len() && name.len() < SmallInt::MAX as usize {
            name.resize((name_length + 1).min(SmallInt::MAX as usize), 0);
            continue;
        }

        let mut decoded = wide::decode_lossy(&name[..name_length.min(name.len())]);
        if decoded.is_empty() {
            decoded = format!("col{}", ordinal);
        }

        let column = ColumnDescriptor {
            ordinal,
            name: decoded,
            data_type: SqlDataType::from_raw(data_type),
            column_size,
            decimal_digits,
            nullability: Nullability::from_raw(nullable),
        };
        log::trace!("described column {:?}", column);
        return Ok(column);
    }
}
