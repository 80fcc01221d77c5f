//! Turning the active result set into [`OdbcRow`]s.
//!
//! The buffered path binds one [`ColumnBuffer`] per column and fetches whole row arrays with
//! `SQLFetchScroll`. The row path fetches a single row with `SQLFetch` and reads every value
//! with `SQLGetData`, in chunks for values of unknown length.

use std::mem::size_of;
use std::ptr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::odbc::arena::ColumnTable;
use crate::odbc::diagnostics::{check, check_success};
use crate::odbc::sys::{self, HStmt, Len, Pointer, SqlReturn, ULen};
use crate::odbc::type_info::NUMERIC_TEXT_WIDTH;
use crate::odbc::{
    CType, CValue, ColumnBuffer, ColumnDescriptor, FixedPointValue, HostValue, OdbcApi, OdbcRow,
    SqlDataType,
};

/// Element count per row of the buffer `column` is fetched into, terminator included.
pub(crate) fn buffer_units(column: &ColumnDescriptor, fallback: usize) -> usize {
    let c_type = column.data_type.fetch_c_type();
    if column.data_type.is_decimal() {
        return NUMERIC_TEXT_WIDTH + 1;
    }
    if !c_type.is_variable() {
        return 1;
    }
    let declared = if column.column_size == 0 {
        fallback
    } else {
        column.column_size
    };
    declared + c_type.terminator_size() / c_type.unit_size()
}

/// Whether `column` should be read with `SQLGetData` instead of through a bound buffer.
pub(crate) fn is_lob(column: &ColumnDescriptor, threshold: usize) -> bool {
    column.data_type.is_variable_length()
        && (column.column_size == 0 || column.column_size > threshold)
}

struct BoundColumn {
    values: ColumnBuffer,
    indicators: ColumnTable<Len>,
}

/// Row arrays for every column of a result set, `rows` rows deep.
pub struct ColumnBufferSet {
    rows: usize,
    columns: Vec<BoundColumn>,
    // the driver writes the number of fetched rows here
    rows_fetched: Box<ULen>,
}

impl ColumnBufferSet {
    pub fn new(columns: &[ColumnDescriptor], rows: usize, fallback: usize) -> Self {
        let columns = columns
            .iter()
            .map(|column| BoundColumn {
                values: ColumnBuffer::new(
                    column.data_type.fetch_c_type(),
                    rows,
                    buffer_units(column, fallback),
                ),
                indicators: ColumnTable::new(rows, 1),
            })
            .collect();
        Self {
            rows,
            columns,
            rows_fetched: Box::new(0),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Binds every column and the fetched-rows counter to `stmt`.
    pub(crate) fn bind<A: OdbcApi + ?Sized>(&mut self, api: &A, stmt: HStmt) -> Result<()> {
        set_row_array_size(api, stmt, self.rows)?;
        let counter: *mut ULen = &mut *self.rows_fetched;
        let ret = unsafe {
            api.set_stmt_attr(stmt, sys::ATTR_ROWS_FETCHED_PTR, counter as Pointer, 0)
        };
        check_success(api, stmt, "SQLSetStmtAttrW", ret)?;

        for (index, column) in self.columns.iter_mut().enumerate() {
            let number = u16::try_from(index + 1)
                .map_err(|_| err_protocol!("column ordinal {} is out of range", index))?;
            let ret = unsafe {
                api.bind_col(
                    stmt,
                    number,
                    column.values.c_type().raw(),
                    column.values.as_mut_ptr(),
                    column.values.stride_bytes() as Len,
                    column.indicators.as_mut_ptr() as *mut Len,
                )
            };
            check_success(api, stmt, "SQLBindCol", ret)?;
        }
        Ok(())
    }

    /// Fetches the next row array of at most `limit` rows. Returns the number of rows
    /// fetched, or `None` at the end of the result set.
    pub(crate) fn fetch<A: OdbcApi + ?Sized>(
        &mut self,
        api: &A,
        stmt: HStmt,
        limit: usize,
    ) -> Result<Option<usize>> {
        let limit = limit.clamp(1, self.rows);
        set_row_array_size(api, stmt, limit)?;
        *self.rows_fetched = 0;
        let ret = unsafe { api.fetch_scroll(stmt, sys::FETCH_NEXT, 0) };
        match check(api, stmt, "SQLFetchScroll", ret)? {
            SqlReturn::NO_DATA => Ok(None),
            _ => Ok(Some((*self.rows_fetched).min(limit))),
        }
    }

    /// Converts row `row` of the last fetched array.
    pub(crate) fn materialize(
        &self,
        row: usize,
        columns: &Arc<[ColumnDescriptor]>,
    ) -> Result<OdbcRow> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (index, (bound, descriptor)) in self.columns.iter().zip(columns.iter()).enumerate() {
            let indicator = bound.indicators.row(row)[0];
            let value = match indicator {
                sys::NULL_DATA => HostValue::Null,
                sys::NO_TOTAL => {
                    log::warn!(
                        "column {} ({}), row {}: driver could not determine the value length, returning NULL",
                        index,
                        descriptor.name,
                        row
                    );
                    HostValue::Null
                }
                len if len < 0 => {
                    return Err(err_protocol!(
                        "column {}, row {}: invalid length indicator {}",
                        index,
                        row,
                        len
                    ))
                }
                len => {
                    let len = len as usize;
                    let capacity = bound.values.capacity_bytes();
                    if bound.values.c_type().is_variable() && len > capacity {
                        return Err(Error::BufferTooSmall {
                            column: index,
                            row,
                            actual: len,
                            capacity,
                        });
                    }
                    decode_cell(index, descriptor, bound.values.read(row, len))?
                }
            };
            values.push(value);
        }
        Ok(OdbcRow::new(Arc::clone(columns), values))
    }
}

fn set_row_array_size<A: OdbcApi + ?Sized>(api: &A, stmt: HStmt, rows: usize) -> Result<()> {
    let ret = unsafe { api.set_stmt_attr(stmt, sys::ATTR_ROW_ARRAY_SIZE, rows as Pointer, 0) };
    check_success(api, stmt, "SQLSetStmtAttrW", ret)?;
    Ok(())
}

/// Unbinds the columns and restores single-row fetching.
pub(crate) fn unbind<A: OdbcApi + ?Sized>(api: &A, stmt: HStmt) -> Result<()> {
    let ret = unsafe { api.free_stmt(stmt, sys::UNBIND) };
    check_success(api, stmt, "SQLFreeStmt", ret)?;
    set_row_array_size(api, stmt, 1)?;
    let ret = unsafe { api.set_stmt_attr(stmt, sys::ATTR_ROWS_FETCHED_PTR, ptr::null_mut(), 0) };
    check_success(api, stmt, "SQLSetStmtAttrW", ret)?;
    Ok(())
}

/// Host value of a fetched cell of `column`.
pub(crate) fn decode_cell(
    index: usize,
    column: &ColumnDescriptor,
    value: CValue,
) -> Result<HostValue> {
    if column.data_type.is_decimal() {
        if let CValue::Char(bytes) = &value {
            let text = String::from_utf8_lossy(bytes);
            let precision = u8::try_from(column.column_size).ok().filter(|p| *p > 0);
            let scale = i8::try_from(column.decimal_digits).ok();
            return FixedPointValue::parse(&text, precision, scale)
                .map(HostValue::Decimal)
                .map_err(|e| match e {
                    Error::Decode(source) => Error::ColumnDecode { index, source },
                    other => other,
                });
        }
    }

    match value.decode()? {
        HostValue::Guid(g) if column.data_type == SqlDataType::Guid => {
            Ok(HostValue::Text(g.hyphenated().to_string()))
        }
        other => Ok(other),
    }
}

/// Fetches the next row with `SQLFetch` and reads it value by value.
pub(crate) fn fetch_row<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    columns: &Arc<[ColumnDescriptor]>,
    chunk_units: usize,
) -> Result<Option<OdbcRow>> {
    let ret = unsafe { api.fetch(stmt) };
    if check(api, stmt, "SQLFetch", ret)? == SqlReturn::NO_DATA {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let number = u16::try_from(index + 1)
            .map_err(|_| err_protocol!("column ordinal {} is out of range", index))?;
        let c_type = column.data_type.fetch_c_type();
        let value = match c_type {
            CType::Char => {
                read_chunks::<u8, _>(api, stmt, number, c_type, chunk_units)?.map(CValue::Char)
            }
            CType::WChar => {
                read_chunks::<u16, _>(api, stmt, number, c_type, chunk_units)?.map(CValue::WChar)
            }
            CType::Binary => {
                read_chunks::<u8, _>(api, stmt, number, c_type, chunk_units)?.map(CValue::Binary)
            }
            fixed => read_fixed(api, stmt, number, fixed)?,
        };
        values.push(match value {
            Some(value) => decode_cell(index, column, value)?,
            None => HostValue::Null,
        });
    }
    Ok(Some(OdbcRow::new(Arc::clone(columns), values)))
}

/// Reads a character or binary value in chunks of `chunk_units` until the driver reports
/// that the whole value was returned. `None` for NULL.
fn read_chunks<T, A>(
    api: &A,
    stmt: HStmt,
    column_number: u16,
    c_type: CType,
    chunk_units: usize,
) -> Result<Option<Vec<T>>>
where
    T: Copy + Default,
    A: OdbcApi + ?Sized,
{
    let unit = size_of::<T>();
    let terminator_units = c_type.terminator_size() / unit;
    let mut chunk = vec![T::default(); chunk_units.max(1) + terminator_units];
    let room = chunk_units.max(1) * unit;
    let mut value: Vec<T> = Vec::new();
    let mut calls = 0usize;

    loop {
        let mut indicator: Len = 0;
        let ret = unsafe {
            api.get_data(
                stmt,
                column_number,
                c_type.raw(),
                chunk.as_mut_ptr() as Pointer,
                (chunk.len() * unit) as Len,
                &mut indicator,
            )
        };
        match ret {
            SqlReturn::SUCCESS | SqlReturn::SUCCESS_WITH_INFO => {}
            SqlReturn::NO_DATA => break,
            _ => {
                check_success(api, stmt, "SQLGetData", ret)?;
            }
        }
        calls += 1;

        if indicator == sys::NULL_DATA {
            return Ok(None);
        }
        let bytes = if indicator == sys::NO_TOTAL || indicator < 0 || indicator as usize > room {
            room
        } else {
            indicator as usize
        };
        value.extend_from_slice(&chunk[..bytes / unit]);

        if ret == SqlReturn::SUCCESS {
            break;
        }
    }

    if calls > 1 {
        log::trace!(
            "column {}: read {} bytes in {} chunks",
            column_number,
            value.len() * unit,
            calls
        );
    }
    Ok(Some(value))
}

fn read_fixed<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    column_number: u16,
    c_type: CType,
) -> Result<Option<CValue>> {
    let mut value = CValue::placeholder(c_type);
    let mut indicator: Len = 0;
    let ret = unsafe {
        api.get_data(
            stmt,
            column_number,
            c_type.raw(),
            value.as_ptr(),
            value.byte_len() as Len,
            &mut indicator,
        )
    };
    if check(api, stmt, "SQLGetData", ret)? == SqlReturn::NO_DATA || indicator == sys::NULL_DATA {
        return Ok(None);
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_units() {
        let text = ColumnDescriptor::new(0, "t", SqlDataType::VarChar).with_size(10);
        let wide = ColumnDescriptor::new(0, "w", SqlDataType::WVarChar);
        let bin = ColumnDescriptor::new(0, "b", SqlDataType::VarBinary).with_size(16);
        let dec = ColumnDescriptor::new(0, "d", SqlDataType::Decimal).with_size(10);
        let int = ColumnDescriptor::new(0, "i", SqlDataType::Integer).with_size(10);
        assert_eq!(buffer_units(&text, 4096), 11);
        assert_eq!(buffer_units(&wide, 4096), 4097);
        assert_eq!(buffer_units(&bin, 4096), 16);
        assert_eq!(buffer_units(&dec, 4096), 65);
        assert_eq!(buffer_units(&int, 4096), 1);
    }

    #[test]
    fn test_lob_detection() {
        let max = ColumnDescriptor::new(0, "m", SqlDataType::WLongVarChar);
        let wide = ColumnDescriptor::new(0, "w", SqlDataType::WVarChar).with_size(9000);
        let narrow = ColumnDescriptor::new(0, "n", SqlDataType::VarChar).with_size(100);
        assert!(is_lob(&max, 8000));
        assert!(is_lob(&wide, 8000));
        assert!(!is_lob(&narrow, 8000));
        assert!(!is_lob(&ColumnDescriptor::new(0, "i", SqlDataType::Integer), 8000));
    }

    #[test]
    fn test_decimal_cells_are_parsed_with_column_shape() -> Result<()> {
        let column = ColumnDescriptor::new(0, "d", SqlDataType::Numeric)
            .with_size(10)
            .with_decimal_digits(2);
        let value = decode_cell(0, &column, CValue::Char(b"-123.4".to_vec()))?;
        assert_eq!(value, HostValue::Decimal(FixedPointValue::new(10, 2, 0, 12340)));
        assert!(matches!(
            decode_cell(0, &column, CValue::Char(b"abc".to_vec())),
            Err(Error::ColumnDecode { index: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_guid_cells_are_text() -> Result<()> {
        let column = ColumnDescriptor::new(0, "g", SqlDataType::Guid);
        let raw = sys::SqlGuid {
            d1: 0x6f9619ff,
            d2: 0x8b86,
            d3: 0xd011,
            d4: [0xb4, 0x2d, 0x00, 0xc0, 0x4f, 0xc9, 0x64, 0xff],
        };
        assert_eq!(
            decode_cell(0, &column, CValue::Guid(raw))?,
            HostValue::Text("6f9619ff-8b86-d011-b42d-00c04fc964ff".into())
        );
        Ok(())
    }
}
