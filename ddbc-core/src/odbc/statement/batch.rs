//! Choosing how many rows to fetch per round trip.

use std::mem::size_of;

use crate::odbc::sys::{SqlDate, SqlGuid, SqlTime, SqlTimestamp, WChar};
use crate::odbc::type_info::NUMERIC_TEXT_WIDTH;
use crate::odbc::{ColumnDescriptor, SqlDataType};

/// Bytes one value of `column` takes in a row buffer. Columns without a declared width
/// count as `fallback` characters or bytes.
pub fn row_width(column: &ColumnDescriptor, fallback: usize) -> usize {
    let declared = if column.column_size == 0 {
        fallback
    } else {
        column.column_size
    };

    match column.data_type {
        SqlDataType::Char | SqlDataType::VarChar | SqlDataType::LongVarChar => declared,
        SqlDataType::WChar
        | SqlDataType::WVarChar
        | SqlDataType::WLongVarChar
        | SqlDataType::Other(_) => declared * size_of::<WChar>(),
        SqlDataType::Binary | SqlDataType::VarBinary | SqlDataType::LongVarBinary => declared,
        SqlDataType::Integer | SqlDataType::Real => 4,
        SqlDataType::SmallInt => 2,
        SqlDataType::TinyInt | SqlDataType::Bit => 1,
        SqlDataType::BigInt | SqlDataType::Float | SqlDataType::Double => 8,
        SqlDataType::Numeric | SqlDataType::Decimal => NUMERIC_TEXT_WIDTH,
        SqlDataType::Date => size_of::<SqlDate>(),
        SqlDataType::Time => size_of::<SqlTime>(),
        SqlDataType::Timestamp => size_of::<SqlTimestamp>(),
        SqlDataType::Guid => size_of::<SqlGuid>(),
    }
}

/// Sum of [`row_width`] over all columns.
pub fn row_bytes(columns: &[ColumnDescriptor], fallback: usize) -> usize {
    columns
        .iter()
        .map(|column| row_width(column, fallback))
        .fold(0usize, usize::saturating_add)
}

/// Rows per fetch for rows of `row_bytes` bytes under `memory_limit`, one of 1, 10, 100 or
/// 1000.
pub fn rows_per_batch(row_bytes: usize, memory_limit: usize) -> usize {
    let rows_in_limit = if row_bytes == 0 {
        1
    } else {
        memory_limit / row_bytes
    };

    match rows_in_limit {
        0 => 1,
        1..=100 => 10,
        101..=1000 => 100,
        _ => 1000,
    }
}
