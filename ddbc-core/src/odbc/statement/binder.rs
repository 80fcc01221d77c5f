//! Binding host values to statement parameters.
//!
//! Scalar execution binds one [`ParamSlot`] per parameter. Set-based execution binds one
//! column-wise array per parameter and lets the driver iterate the rows. Both keep every
//! buffer in a [`ParamArena`] owned by the executing statement until the parameters are
//! reset.

use std::borrow::Cow;
use std::ptr;

use crate::error::{Error, Result};
use crate::odbc::arena::{ColumnTable, ParamArray, ParamSlot};
use crate::odbc::diagnostics::{check_success, handle_records};
use crate::odbc::numeric::MAX_PRECISION;
use crate::odbc::sys::{self, HDesc, HStmt, Len, Pointer, SmallInt, ULen, HANDLE_DESC};
use crate::odbc::{
    CType, CValue, ColumnBuffer, DriverError, FixedPointValue, HostValue, OdbcApi, ParamArena,
    SqlDataType,
};

/// Text longer than this many characters is declared as a long text type.
const LONG_TEXT_CHARS: usize = 4000;
/// Binary values longer than this many bytes are declared as `VARBINARY`.
const LONG_BINARY_BYTES: usize = 8000;

/// Direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamDirection {
    #[default]
    Input,
    Output,
    InputOutput,
}

impl ParamDirection {
    pub fn raw(self) -> SmallInt {
        match self {
            ParamDirection::Input => sys::PARAM_INPUT,
            ParamDirection::Output => sys::PARAM_OUTPUT,
            ParamDirection::InputOutput => sys::PARAM_INPUT_OUTPUT,
        }
    }
}

/// How one parameter is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub direction: ParamDirection,
    pub c_type: CType,
    pub sql_type: SqlDataType,
    /// Declared size: characters for text, bytes for binary, precision for NUMERIC. 0 lets
    /// the binder use the size of the value.
    pub column_size: usize,
    /// Scale of NUMERIC/DECIMAL and fractional digits of TIMESTAMP.
    pub decimal_digits: i16,
    /// Always send the value with `SQLPutData`, whatever its size.
    pub data_at_exec: bool,
}

impl ParameterDescriptor {
    pub fn new(c_type: CType, sql_type: SqlDataType, column_size: usize) -> Self {
        Self {
            direction: ParamDirection::Input,
            c_type,
            sql_type,
            column_size,
            decimal_digits: 0,
            data_at_exec: false,
        }
    }

    pub fn with_decimal_digits(mut self, decimal_digits: i16) -> Self {
        self.decimal_digits = decimal_digits;
        self
    }

    pub fn with_direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_data_at_exec(mut self, data_at_exec: bool) -> Self {
        self.data_at_exec = data_at_exec;
        self
    }

    /// The descriptor a value is bound with when the caller supplies none.
    pub fn infer(value: &HostValue) -> Self {
        match value {
            HostValue::Null => Self::new(CType::Char, SqlDataType::VarChar, 1),
            HostValue::Bool(_) => Self::new(CType::Bit, SqlDataType::Bit, 1),
            HostValue::Int(i) => infer_int(*i, *i),
            HostValue::Float(_) => Self::new(CType::Double, SqlDataType::Double, 15),
            HostValue::Decimal(d) => {
                Self::new(CType::Numeric, SqlDataType::Numeric, usize::from(d.precision))
                    .with_decimal_digits(i16::from(d.scale))
            }
            HostValue::Text(s) => infer_text(!s.is_ascii(), text_len(s, !s.is_ascii())),
            HostValue::Bytes(b) => infer_bytes(b.len()),
            HostValue::Date(_) => Self::new(CType::Date, SqlDataType::Date, 10),
            HostValue::Time(_) => Self::new(CType::Time, SqlDataType::Time, 8),
            HostValue::Timestamp(_) => {
                Self::new(CType::Timestamp, SqlDataType::Timestamp, 26).with_decimal_digits(6)
            }
            HostValue::Guid(_) => Self::new(CType::Guid, SqlDataType::Guid, 16),
        }
    }

    /// One descriptor for a column of values bound as an array: typed after the first
    /// non-null value and wide enough for every value.
    pub fn infer_column(values: &[HostValue]) -> Self {
        let first = match values.iter().find(|v| !v.is_null()) {
            Some(first) => first,
            None => return Self::infer(&HostValue::Null),
        };

        match first {
            HostValue::Int(_) => {
                let ints = values.iter().filter_map(|v| match v {
                    HostValue::Int(i) => Some(*i),
                    _ => None,
                });
                let (min, max) = ints.fold((i128::MAX, i128::MIN), |(lo, hi), i| {
                    (lo.min(i), hi.max(i))
                });
                infer_int(min, max)
            }
            HostValue::Text(_) => {
                let texts = || {
                    values.iter().filter_map(|v| match v {
                        HostValue::Text(s) => Some(s.as_str()),
                        _ => None,
                    })
                };
                let wide = texts().any(|s| !s.is_ascii());
                let len = texts().map(|s| text_len(s, wide)).max().unwrap_or(0);
                infer_text(wide, len)
            }
            HostValue::Bytes(_) => {
                let len = values
                    .iter()
                    .filter_map(HostValue::as_bytes)
                    .map(<[u8]>::len)
                    .max()
                    .unwrap_or(0);
                infer_bytes(len)
            }
            HostValue::Decimal(_) => {
                let decimals = || {
                    values.iter().filter_map(|v| match v {
                        HostValue::Decimal(d) => Some(d),
                        _ => None,
                    })
                };
                let scale = decimals().map(|d| d.scale.max(0)).max().unwrap_or(0);
                let integral = decimals()
                    .map(|d| i16::from(d.precision) - i16::from(d.scale))
                    .max()
                    .unwrap_or(1)
                    .max(1);
                let precision = (integral + i16::from(scale)).min(i16::from(MAX_PRECISION));
                Self::new(CType::Numeric, SqlDataType::Numeric, precision as usize)
                    .with_decimal_digits(i16::from(scale))
            }
            other => Self::infer(other),
        }
    }
}

fn infer_int(min: i128, max: i128) -> ParameterDescriptor {
    let fits = |lo: i128, hi: i128| min >= lo && max <= hi;
    if fits(0, 255) {
        ParameterDescriptor::new(CType::UTinyInt, SqlDataType::TinyInt, 3)
    } else if fits(i16::MIN.into(), i16::MAX.into()) {
        ParameterDescriptor::new(CType::SShort, SqlDataType::SmallInt, 5)
    } else if fits(i32::MIN.into(), i32::MAX.into()) {
        ParameterDescriptor::new(CType::SLong, SqlDataType::Integer, 10)
    } else {
        ParameterDescriptor::new(CType::SBigInt, SqlDataType::BigInt, 19)
    }
}

fn text_len(s: &str, wide: bool) -> usize {
    if wide {
        s.encode_utf16().count()
    } else {
        s.len()
    }
}

fn infer_text(wide: bool, len: usize) -> ParameterDescriptor {
    let long = len > LONG_TEXT_CHARS;
    let (c_type, sql_type) = match (wide, long) {
        (false, false) => (CType::Char, SqlDataType::VarChar),
        (false, true) => (CType::Char, SqlDataType::LongVarChar),
        (true, false) => (CType::WChar, SqlDataType::WVarChar),
        (true, true) => (CType::WChar, SqlDataType::WLongVarChar),
    };
    ParameterDescriptor::new(c_type, sql_type, len.max(1))
}

fn infer_bytes(len: usize) -> ParameterDescriptor {
    let sql_type = if len > LONG_BINARY_BYTES {
        SqlDataType::VarBinary
    } else {
        SqlDataType::Binary
    };
    ParameterDescriptor::new(CType::Binary, sql_type, len.max(1))
}

/// Precision and scale a NUMERIC parameter is bound with.
fn numeric_shape(descriptor: &ParameterDescriptor) -> Result<(u8, i8)> {
    let precision = u8::try_from(descriptor.column_size)
        .ok()
        .filter(|p| (1..=MAX_PRECISION).contains(p))
        .ok_or_else(|| Error::range("NUMERIC precision", descriptor.column_size))?;
    let scale = i8::try_from(descriptor.decimal_digits)
        .map_err(|_| Error::range("NUMERIC scale", descriptor.decimal_digits))?;
    Ok((precision, scale))
}

/// Brings a decimal value to the precision and scale of its descriptor.
fn normalize<'v>(
    value: &'v HostValue,
    descriptor: &ParameterDescriptor,
) -> Result<Cow<'v, HostValue>> {
    match (descriptor.c_type, value) {
        (CType::Numeric, HostValue::Decimal(d)) if descriptor.column_size > 0 => {
            let (precision, scale) = numeric_shape(descriptor)?;
            Ok(Cow::Owned(HostValue::Decimal(d.rescale(precision, scale)?)))
        }
        _ => Ok(Cow::Borrowed(value)),
    }
}

fn parameter_number(index: usize) -> Result<u16> {
    u16::try_from(index + 1)
        .map_err(|_| err_protocol!("parameter index {} is out of range", index))
}

/// Binds `values` as the parameters of `stmt`, one slot per value.
///
/// Text and binary values longer than `inline_threshold` bytes, and values whose descriptor
/// asks for it, are bound as data-at-execution: the slot's address is bound as token and
/// the value is sent later by the [`DaeStreamer`](super::dae::DaeStreamer).
pub(crate) fn bind_parameters<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    values: &[HostValue],
    descriptors: &[ParameterDescriptor],
    inline_threshold: usize,
    arena: &mut ParamArena,
) -> Result<()> {
    if values.len() != descriptors.len() {
        return Err(Error::ArgumentCount {
            expected: descriptors.len(),
            actual: values.len(),
        });
    }

    for (index, (value, descriptor)) in values.iter().zip(descriptors).enumerate() {
        let number = parameter_number(index)?;
        let value = normalize(value, descriptor)?;

        let (c_value, indicator, data_at_exec) = if value.is_null() {
            (CValue::placeholder(descriptor.c_type), sys::NULL_DATA, false)
        } else {
            let c_value = CValue::encode(&value, descriptor.c_type, index)?;
            let len = c_value.byte_len();
            let deferred = descriptor.data_at_exec
                || (descriptor.c_type.is_variable() && len > inline_threshold);
            if deferred && !descriptor.c_type.is_variable() {
                return Err(Error::UnsupportedStreamingType {
                    index,
                    found: value.type_name(),
                });
            }
            let indicator = if deferred {
                sys::len_data_at_exec(len as Len)
            } else {
                len as Len
            };
            (c_value, indicator, deferred)
        };

        let (column_size, decimal_digits): (ULen, SmallInt) = match &c_value {
            // a null placeholder carries no shape, the descriptor does
            CValue::Numeric(_) if indicator == sys::NULL_DATA => {
                let (precision, scale) = if descriptor.column_size > 0 {
                    numeric_shape(descriptor)?
                } else {
                    (MAX_PRECISION, 0)
                };
                (ULen::from(precision), SmallInt::from(scale))
            }
            CValue::Numeric(n) => (ULen::from(n.precision), SmallInt::from(n.scale)),
            other if descriptor.column_size == 0 => {
                (other.unit_len().max(1), descriptor.decimal_digits)
            }
            _ => (descriptor.column_size, descriptor.decimal_digits),
        };

        let slot = arena.push_slot(ParamSlot {
            index,
            value: c_value,
            indicator,
            data_at_exec,
        });

        let (value_ptr, buffer_length) = if data_at_exec {
            (slot.token(), 0)
        } else {
            let len = slot.value.byte_len() as Len;
            (slot.value.as_ptr(), len)
        };

        log::trace!(
            "binding parameter {} as {:?}/{} (size {}, digits {}, indicator {})",
            number,
            descriptor.c_type,
            descriptor.sql_type,
            column_size,
            decimal_digits,
            slot.indicator
        );

        let ret = unsafe {
            api.bind_parameter(
                stmt,
                number,
                descriptor.direction.raw(),
                descriptor.c_type.raw(),
                descriptor.sql_type.raw(),
                column_size,
                decimal_digits,
                value_ptr,
                buffer_length,
                &mut slot.indicator,
            )
        };
        check_success(api, stmt, "SQLBindParameter", ret)?;

        if let CValue::Numeric(n) = slot.value {
            if slot.indicator != sys::NULL_DATA {
                let data = slot.value.as_ptr();
                set_numeric_descriptor(api, stmt, number, n.precision, n.scale, data)?;
            }
        }
    }

    Ok(())
}

/// Binds each column of `columns` as one parameter array of `rows` values.
///
/// The caller sets `SQL_ATTR_PARAMSET_SIZE` to `rows` before executing.
pub(crate) fn bind_parameter_arrays<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    columns: &[Vec<HostValue>],
    descriptors: &[ParameterDescriptor],
    rows: usize,
    arena: &mut ParamArena,
) -> Result<()> {
    if columns.len() != descriptors.len() {
        return Err(Error::ArgumentCount {
            expected: descriptors.len(),
            actual: columns.len(),
        });
    }

    for (index, (column, descriptor)) in columns.iter().zip(descriptors).enumerate() {
        let number = parameter_number(index)?;
        if descriptor.data_at_exec {
            return Err(err_protocol!(
                "parameter {}: data-at-execution values cannot be bound as arrays",
                index
            ));
        }
        if column.len() != rows {
            return Err(Error::ArgumentCount {
                expected: rows,
                actual: column.len(),
            });
        }

        let mut descriptor = Cow::Borrowed(descriptor);
        if descriptor.c_type == CType::Numeric && descriptor.column_size == 0 {
            let inferred = ParameterDescriptor::infer_column(column);
            let owned = descriptor.to_mut();
            owned.column_size = inferred.column_size;
            owned.decimal_digits = inferred.decimal_digits;
        }

        let encoded = column
            .iter()
            .map(|value| {
                if value.is_null() {
                    return Ok(None);
                }
                let value = normalize(value, &descriptor)?;
                CValue::encode(&value, descriptor.c_type, index).map(Some)
            })
            .collect::<Result<Vec<Option<CValue>>>>()?;

        let (width, column_size, decimal_digits) = if descriptor.c_type.is_variable() {
            let longest = encoded
                .iter()
                .flatten()
                .map(CValue::unit_len)
                .max()
                .unwrap_or(0);
            let width = if descriptor.column_size == 0 {
                longest.max(1)
            } else {
                descriptor.column_size
            };
            for (row, value) in encoded.iter().enumerate() {
                if let Some(value) = value {
                    if value.unit_len() > width {
                        return Err(Error::ParameterTooLong {
                            parameter: index,
                            row,
                            len: value.unit_len(),
                            size: width,
                        });
                    }
                }
            }
            (width, width, descriptor.decimal_digits)
        } else {
            (1, descriptor.column_size, descriptor.decimal_digits)
        };

        let terminator_units =
            descriptor.c_type.terminator_size() / descriptor.c_type.unit_size().max(1);
        let mut values = ColumnBuffer::new(descriptor.c_type, rows, width + terminator_units);
        let mut indicators = ColumnTable::<Len>::new(rows, 1);
        for (row, value) in encoded.iter().enumerate() {
            indicators.row_mut(row)[0] = match value {
                Some(value) => {
                    values.write(row, value)?;
                    value.byte_len() as Len
                }
                None => sys::NULL_DATA,
            };
        }

        let array = arena.push_array(ParamArray {
            index,
            values,
            indicators,
        });

        log::trace!(
            "binding parameter array {} as {:?}/{} ({} rows of {} bytes)",
            number,
            descriptor.c_type,
            descriptor.sql_type,
            rows,
            array.values.stride_bytes()
        );

        let data = array.values.as_mut_ptr();
        let ret = unsafe {
            api.bind_parameter(
                stmt,
                number,
                descriptor.direction.raw(),
                descriptor.c_type.raw(),
                descriptor.sql_type.raw(),
                column_size,
                decimal_digits,
                data,
                array.values.stride_bytes() as Len,
                array.indicators.as_mut_ptr() as *mut Len,
            )
        };
        check_success(api, stmt, "SQLBindParameter", ret)?;

        if descriptor.c_type == CType::Numeric {
            let (precision, scale) = numeric_shape(&descriptor)?;
            set_numeric_descriptor(api, stmt, number, precision, scale, data)?;
        }
    }

    Ok(())
}

/// `SQLBindParameter` has no way to pass the scale of a `SQL_C_NUMERIC` value, so the
/// application parameter descriptor record is completed by hand. The data pointer is set
/// last because changing any other field unbinds it.
fn set_numeric_descriptor<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    parameter_number: u16,
    precision: u8,
    scale: i8,
    data: Pointer,
) -> Result<()> {
    let mut handle: Pointer = ptr::null_mut();
    let ret = unsafe {
        api.get_stmt_attr(
            stmt,
            sys::ATTR_APP_PARAM_DESC,
            &mut handle as *mut Pointer as Pointer,
            0,
            ptr::null_mut(),
        )
    };
    check_success(api, stmt, "SQLGetStmtAttrW", ret)?;
    let desc = HDesc(handle);
    let record = parameter_number as SmallInt;

    let fields: [(SmallInt, Pointer); 4] = [
        (sys::DESC_TYPE, sys::C_NUMERIC as isize as Pointer),
        (sys::DESC_PRECISION, precision as isize as Pointer),
        (sys::DESC_SCALE, scale as isize as Pointer),
        (sys::DESC_DATA_PTR, data),
    ];
    for (field, value) in fields {
        let ret = unsafe { api.set_desc_field(desc, record, field, value, 0) };
        if !ret.succeeded() {
            return Err(DriverError {
                function: "SQLSetDescFieldW",
                code: ret,
                records: handle_records(api, HANDLE_DESC, desc.0),
            }
            .into());
        }
    }
    log::trace!(
        "set numeric descriptor of parameter {} to precision {}, scale {}",
        parameter_number,
        precision,
        scale
    );
    Ok(())
}

impl From<FixedPointValue> for ParameterDescriptor {
    fn from(value: FixedPointValue) -> Self {
        Self::infer(&HostValue::Decimal(value))
    }
}
