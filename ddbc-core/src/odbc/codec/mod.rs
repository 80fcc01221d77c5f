//! Conversion between [`HostValue`]s and C-typed values.
//!
//! [`CType`] is the closed set of C type tags the core understands and [`CValue`] holds one
//! value of each of them, laid out exactly as the ODBC driver reads and writes it.

use std::ffi::c_void;
use std::mem::size_of;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::odbc::numeric::MAX_PRECISION;
use crate::odbc::sys::{
    self, Pointer, SmallInt, SqlDate, SqlGuid, SqlNumeric, SqlTime, SqlTimestamp,
};
use crate::odbc::{FixedPointValue, HostValue};

pub mod wide;

/// Supported C data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CType {
    Char,
    WChar,
    Bit,
    STinyInt,
    UTinyInt,
    SShort,
    UShort,
    SLong,
    ULong,
    SBigInt,
    UBigInt,
    Float,
    Double,
    Numeric,
    Date,
    Time,
    Timestamp,
    Guid,
    Binary,
}

impl CType {
    /// Maps an ODBC `SQL_C_*` code onto the supported set.
    ///
    /// The unsigned-agnostic legacy codes (`SQL_C_TINYINT`, `SQL_C_SHORT`, `SQL_C_LONG`)
    /// are treated as their signed variants.
    pub fn from_raw(code: SmallInt) -> Result<Self> {
        Ok(match code {
            sys::C_CHAR => CType::Char,
            sys::C_WCHAR => CType::WChar,
            sys::C_BIT => CType::Bit,
            sys::C_STINYINT | -6 => CType::STinyInt,
            sys::C_UTINYINT => CType::UTinyInt,
            sys::C_SSHORT | 5 => CType::SShort,
            sys::C_USHORT => CType::UShort,
            sys::C_SLONG | 4 => CType::SLong,
            sys::C_ULONG => CType::ULong,
            sys::C_SBIGINT => CType::SBigInt,
            sys::C_UBIGINT => CType::UBigInt,
            sys::C_FLOAT => CType::Float,
            sys::C_DOUBLE => CType::Double,
            sys::C_NUMERIC => CType::Numeric,
            sys::C_TYPE_DATE => CType::Date,
            sys::C_TYPE_TIME => CType::Time,
            sys::C_TYPE_TIMESTAMP => CType::Timestamp,
            sys::C_GUID => CType::Guid,
            sys::C_BINARY => CType::Binary,
            other => return Err(Error::UnsupportedType(other)),
        })
    }

    pub fn raw(self) -> SmallInt {
        match self {
            CType::Char => sys::C_CHAR,
            CType::WChar => sys::C_WCHAR,
            CType::Bit => sys::C_BIT,
            CType::STinyInt => sys::C_STINYINT,
            CType::UTinyInt => sys::C_UTINYINT,
            CType::SShort => sys::C_SSHORT,
            CType::UShort => sys::C_USHORT,
            CType::SLong => sys::C_SLONG,
            CType::ULong => sys::C_ULONG,
            CType::SBigInt => sys::C_SBIGINT,
            CType::UBigInt => sys::C_UBIGINT,
            CType::Float => sys::C_FLOAT,
            CType::Double => sys::C_DOUBLE,
            CType::Numeric => sys::C_NUMERIC,
            CType::Date => sys::C_TYPE_DATE,
            CType::Time => sys::C_TYPE_TIME,
            CType::Timestamp => sys::C_TYPE_TIMESTAMP,
            CType::Guid => sys::C_GUID,
            CType::Binary => sys::C_BINARY,
        }
    }

    /// Size in bytes of one value, or `None` for character and binary data.
    pub fn fixed_size(self) -> Option<usize> {
        Some(match self {
            CType::Char | CType::WChar | CType::Binary => return None,
            CType::Bit | CType::STinyInt | CType::UTinyInt => 1,
            CType::SShort | CType::UShort => 2,
            CType::SLong | CType::ULong => 4,
            CType::SBigInt | CType::UBigInt => 8,
            CType::Float => size_of::<f32>(),
            CType::Double => size_of::<f64>(),
            CType::Numeric => size_of::<SqlNumeric>(),
            CType::Date => size_of::<SqlDate>(),
            CType::Time => size_of::<SqlTime>(),
            CType::Timestamp => size_of::<SqlTimestamp>(),
            CType::Guid => size_of::<SqlGuid>(),
        })
    }

    /// Bytes per character unit for variable-length types.
    pub fn unit_size(self) -> usize {
        match self {
            CType::WChar => size_of::<sys::WChar>(),
            other => other.fixed_size().unwrap_or(1),
        }
    }

    /// Text, wide text and binary: the types that may be streamed in pieces.
    pub fn is_variable(self) -> bool {
        self.fixed_size().is_none()
    }

    /// Bytes the driver appends after character data.
    pub fn terminator_size(self) -> usize {
        match self {
            CType::Char => 1,
            CType::WChar => size_of::<sys::WChar>(),
            _ => 0,
        }
    }
}

/// A value in its C representation.
#[derive(Debug, Clone, PartialEq)]
pub enum CValue {
    Char(Vec<u8>),
    WChar(Vec<u16>),
    Bit(u8),
    STinyInt(i8),
    UTinyInt(u8),
    SShort(i16),
    UShort(u16),
    SLong(i32),
    ULong(u32),
    SBigInt(i64),
    UBigInt(u64),
    Float(f32),
    Double(f64),
    Numeric(SqlNumeric),
    Date(SqlDate),
    Time(SqlTime),
    Timestamp(SqlTimestamp),
    Guid(SqlGuid),
    Binary(Vec<u8>),
}

fn int<T: TryFrom<i128>>(value: i128, target: &'static str) -> Result<T> {
    T::try_from(value).map_err(|_| Error::range(target, value))
}

fn year(year: i32) -> Result<i16> {
    if (1..=9999).contains(&year) {
        Ok(year as i16)
    } else {
        Err(Error::range("date year", year))
    }
}

fn sql_date(date: &NaiveDate) -> Result<SqlDate> {
    Ok(SqlDate {
        year: year(date.year())?,
        month: date.month() as u16,
        day: date.day() as u16,
    })
}

fn sql_timestamp(ts: &NaiveDateTime) -> Result<SqlTimestamp> {
    let date = sql_date(&ts.date())?;
    // leap seconds are reported as nanosecond >= 1_000_000_000
    let micros = (ts.nanosecond() / 1_000).min(999_999);
    Ok(SqlTimestamp {
        year: date.year,
        month: date.month,
        day: date.day,
        hour: ts.hour() as u16,
        minute: ts.minute() as u16,
        second: ts.second() as u16,
        fraction: micros * 1_000,
    })
}

fn naive_date(date: &SqlDate) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::from(date.year), u32::from(date.month), u32::from(date.day))
        .ok_or_else(|| Error::range("DATE", format!("{:?}", date)))
}

impl CValue {
    /// Converts `value` to `c_type`. `index` is the parameter position reported on a type
    /// mismatch.
    pub fn encode(value: &HostValue, c_type: CType, index: usize) -> Result<Self> {
        let mismatch = || Error::TypeMismatch {
            index,
            expected: c_type,
            found: value.type_name(),
        };

        Ok(match (c_type, value) {
            (CType::Char, HostValue::Text(s)) => CValue::Char(s.as_bytes().to_vec()),
            (CType::WChar, HostValue::Text(s)) => CValue::WChar(wide::encode(s)),
            (CType::Binary, HostValue::Bytes(b)) => CValue::Binary(b.clone()),
            (CType::Binary, HostValue::Text(s)) => CValue::Binary(s.as_bytes().to_vec()),
            (CType::Bit, HostValue::Bool(b)) => CValue::Bit(u8::from(*b)),
            (CType::STinyInt, HostValue::Int(i)) => CValue::STinyInt(int(*i, "TINYINT")?),
            (CType::UTinyInt, HostValue::Int(i)) => {
                CValue::UTinyInt(int(*i, "unsigned TINYINT")?)
            }
            (CType::SShort, HostValue::Int(i)) => CValue::SShort(int(*i, "SMALLINT")?),
            (CType::UShort, HostValue::Int(i)) => CValue::UShort(int(*i, "unsigned SMALLINT")?),
            (CType::SLong, HostValue::Int(i)) => CValue::SLong(int(*i, "INTEGER")?),
            (CType::ULong, HostValue::Int(i)) => CValue::ULong(int(*i, "unsigned INTEGER")?),
            (CType::SBigInt, HostValue::Int(i)) => CValue::SBigInt(int(*i, "BIGINT")?),
            (CType::UBigInt, HostValue::Int(i)) => CValue::UBigInt(int(*i, "unsigned BIGINT")?),
            (CType::Float, HostValue::Float(f)) => {
                if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                    return Err(Error::range("REAL", f));
                }
                CValue::Float(*f as f32)
            }
            (CType::Double, HostValue::Float(f)) => CValue::Double(*f),
            (CType::Numeric, HostValue::Decimal(d)) => {
                if d.precision == 0 || d.precision > MAX_PRECISION {
                    return Err(Error::range("NUMERIC precision", d.precision));
                }
                if i32::from(d.scale) > i32::from(d.precision) {
                    return Err(Error::range("NUMERIC scale", d.scale));
                }
                if d.magnitude >= 10u128.pow(u32::from(d.precision)) {
                    return Err(Error::range(
                        "NUMERIC magnitude",
                        d.to_string_with('.'),
                    ));
                }
                CValue::Numeric(d.to_sql_numeric())
            }
            (CType::Date, HostValue::Date(d)) => CValue::Date(sql_date(d)?),
            (CType::Time, HostValue::Time(t)) => CValue::Time(SqlTime {
                hour: t.hour() as u16,
                minute: t.minute() as u16,
                second: t.second() as u16,
            }),
            (CType::Timestamp, HostValue::Timestamp(ts)) => CValue::Timestamp(sql_timestamp(ts)?),
            (CType::Guid, HostValue::Guid(g)) => {
                let (d1, d2, d3, d4) = g.as_fields();
                CValue::Guid(SqlGuid {
                    d1,
                    d2,
                    d3,
                    d4: *d4,
                })
            }
            _ => return Err(mismatch()),
        })
    }

    /// Converts back to a host value.
    pub fn decode(&self) -> Result<HostValue> {
        Ok(match self {
            CValue::Char(bytes) => HostValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            CValue::WChar(units) => HostValue::Text(wide::decode_lossy(units)),
            CValue::Binary(bytes) => HostValue::Bytes(bytes.clone()),
            CValue::Bit(b) => HostValue::Bool(*b != 0),
            CValue::STinyInt(i) => HostValue::Int(i128::from(*i)),
            CValue::UTinyInt(i) => HostValue::Int(i128::from(*i)),
            CValue::SShort(i) => HostValue::Int(i128::from(*i)),
            CValue::UShort(i) => HostValue::Int(i128::from(*i)),
            CValue::SLong(i) => HostValue::Int(i128::from(*i)),
            CValue::ULong(i) => HostValue::Int(i128::from(*i)),
            CValue::SBigInt(i) => HostValue::Int(i128::from(*i)),
            CValue::UBigInt(i) => HostValue::Int(i128::from(*i)),
            CValue::Float(f) => HostValue::Float(f64::from(*f)),
            CValue::Double(f) => HostValue::Float(*f),
            CValue::Numeric(n) => HostValue::Decimal(FixedPointValue::from_sql_numeric(n)),
            CValue::Date(d) => HostValue::Date(naive_date(d)?),
            CValue::Time(t) => HostValue::Time(
                NaiveTime::from_hms_opt(u32::from(t.hour), u32::from(t.minute), u32::from(t.second))
                    .ok_or_else(|| Error::range("TIME", format!("{:?}", t)))?,
            ),
            CValue::Timestamp(ts) => {
                let date = naive_date(&SqlDate {
                    year: ts.year,
                    month: ts.month,
                    day: ts.day,
                })?;
                let time = NaiveTime::from_hms_micro_opt(
                    u32::from(ts.hour),
                    u32::from(ts.minute),
                    u32::from(ts.second),
                    ts.fraction / 1_000,
                )
                .ok_or_else(|| Error::range("TIMESTAMP", format!("{:?}", ts)))?;
                HostValue::Timestamp(date.and_time(time))
            }
            CValue::Guid(g) => HostValue::Guid(Uuid::from_fields(g.d1, g.d2, g.d3, &g.d4)),
        })
    }

    pub fn c_type(&self) -> CType {
        match self {
            CValue::Char(_) => CType::Char,
            CValue::WChar(_) => CType::WChar,
            CValue::Bit(_) => CType::Bit,
            CValue::STinyInt(_) => CType::STinyInt,
            CValue::UTinyInt(_) => CType::UTinyInt,
            CValue::SShort(_) => CType::SShort,
            CValue::UShort(_) => CType::UShort,
            CValue::SLong(_) => CType::SLong,
            CValue::ULong(_) => CType::ULong,
            CValue::SBigInt(_) => CType::SBigInt,
            CValue::UBigInt(_) => CType::UBigInt,
            CValue::Float(_) => CType::Float,
            CValue::Double(_) => CType::Double,
            CValue::Numeric(_) => CType::Numeric,
            CValue::Date(_) => CType::Date,
            CValue::Time(_) => CType::Time,
            CValue::Timestamp(_) => CType::Timestamp,
            CValue::Guid(_) => CType::Guid,
            CValue::Binary(_) => CType::Binary,
        }
    }

    /// A zeroed value of `c_type`, bound behind a null indicator so the data pointer is
    /// never null.
    pub fn placeholder(c_type: CType) -> Self {
        match c_type {
            CType::Char => CValue::Char(vec![0]),
            CType::WChar => CValue::WChar(vec![0]),
            CType::Binary => CValue::Binary(vec![0]),
            CType::Bit => CValue::Bit(0),
            CType::STinyInt => CValue::STinyInt(0),
            CType::UTinyInt => CValue::UTinyInt(0),
            CType::SShort => CValue::SShort(0),
            CType::UShort => CValue::UShort(0),
            CType::SLong => CValue::SLong(0),
            CType::ULong => CValue::ULong(0),
            CType::SBigInt => CValue::SBigInt(0),
            CType::UBigInt => CValue::UBigInt(0),
            CType::Float => CValue::Float(0.0),
            CType::Double => CValue::Double(0.0),
            CType::Numeric => CValue::Numeric(SqlNumeric::default()),
            CType::Date => CValue::Date(SqlDate::default()),
            CType::Time => CValue::Time(SqlTime::default()),
            CType::Timestamp => CValue::Timestamp(SqlTimestamp::default()),
            CType::Guid => CValue::Guid(SqlGuid::default()),
        }
    }

    /// Length of the value in bytes, excluding any terminator.
    pub fn byte_len(&self) -> usize {
        match self {
            CValue::Char(b) | CValue::Binary(b) => b.len(),
            CValue::WChar(u) => u.len() * size_of::<sys::WChar>(),
            other => other.c_type().fixed_size().unwrap_or(0),
        }
    }

    /// Length in character units (bytes, or UTF-16 units for wide text).
    pub fn unit_len(&self) -> usize {
        match self {
            CValue::WChar(u) => u.len(),
            other => other.byte_len(),
        }
    }

    /// Address of the payload. Valid as long as `self` is neither moved nor mutated.
    pub fn as_ptr(&mut self) -> Pointer {
        match self {
            CValue::Char(b) | CValue::Binary(b) => b.as_mut_ptr() as Pointer,
            CValue::WChar(u) => u.as_mut_ptr() as Pointer,
            CValue::Bit(v) | CValue::UTinyInt(v) => v as *mut u8 as *mut c_void,
            CValue::STinyInt(v) => v as *mut i8 as *mut c_void,
            CValue::SShort(v) => v as *mut i16 as *mut c_void,
            CValue::UShort(v) => v as *mut u16 as *mut c_void,
            CValue::SLong(v) => v as *mut i32 as *mut c_void,
            CValue::ULong(v) => v as *mut u32 as *mut c_void,
            CValue::SBigInt(v) => v as *mut i64 as *mut c_void,
            CValue::UBigInt(v) => v as *mut u64 as *mut c_void,
            CValue::Float(v) => v as *mut f32 as *mut c_void,
            CValue::Double(v) => v as *mut f64 as *mut c_void,
            CValue::Numeric(v) => v as *mut SqlNumeric as *mut c_void,
            CValue::Date(v) => v as *mut SqlDate as *mut c_void,
            CValue::Time(v) => v as *mut SqlTime as *mut c_void,
            CValue::Timestamp(v) => v as *mut SqlTimestamp as *mut c_void,
            CValue::Guid(v) => v as *mut SqlGuid as *mut c_void,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: HostValue, c_type: CType) -> Result<HostValue> {
        CValue::encode(&value, c_type, 0)?.decode()
    }

    fn assert_round_trip(value: HostValue, c_type: CType) {
        assert_eq!(round_trip(value.clone(), c_type).unwrap(), value, "{:?}", c_type);
    }

    // ========== closed set ==========

    #[test]
    fn test_every_tag_maps_back_to_itself() -> Result<()> {
        let all = [
            CType::Char,
            CType::WChar,
            CType::Bit,
            CType::STinyInt,
            CType::UTinyInt,
            CType::SShort,
            CType::UShort,
            CType::SLong,
            CType::ULong,
            CType::SBigInt,
            CType::UBigInt,
            CType::Float,
            CType::Double,
            CType::Numeric,
            CType::Date,
            CType::Time,
            CType::Timestamp,
            CType::Guid,
            CType::Binary,
        ];
        for c_type in all {
            assert_eq!(CType::from_raw(c_type.raw())?, c_type);
            assert_eq!(CValue::placeholder(c_type).c_type(), c_type);
        }
        Ok(())
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        assert!(matches!(CType::from_raw(99), Err(Error::UnsupportedType(99))));
        assert!(matches!(CType::from_raw(-154), Err(Error::UnsupportedType(-154))));
    }

    // ========== integers ==========

    #[test]
    fn test_integer_boundaries_round_trip() {
        assert_round_trip(HostValue::Int(i128::from(i8::MIN)), CType::STinyInt);
        assert_round_trip(HostValue::Int(255), CType::UTinyInt);
        assert_round_trip(HostValue::Int(i128::from(i16::MIN)), CType::SShort);
        assert_round_trip(HostValue::Int(i128::from(u16::MAX)), CType::UShort);
        assert_round_trip(HostValue::Int(i128::from(i32::MAX)), CType::SLong);
        assert_round_trip(HostValue::Int(i128::from(u32::MAX)), CType::ULong);
        assert_round_trip(HostValue::Int(i128::from(i64::MIN)), CType::SBigInt);
        assert_round_trip(HostValue::Int(i128::from(u64::MAX)), CType::UBigInt);
    }

    #[test]
    fn test_integer_out_of_range() {
        for (value, c_type) in [
            (70_000, CType::SShort),
            (-1, CType::UTinyInt),
            (256, CType::UTinyInt),
            (128, CType::STinyInt),
            (i128::from(i32::MAX) + 1, CType::SLong),
            (-1, CType::UBigInt),
            (i128::from(u64::MAX) + 1, CType::UBigInt),
        ] {
            assert!(
                matches!(
                    CValue::encode(&HostValue::Int(value), c_type, 0),
                    Err(Error::Range { .. })
                ),
                "{} as {:?}",
                value,
                c_type
            );
        }
    }

    #[test]
    fn test_type_mismatch_names_index_and_type() {
        let err = CValue::encode(&HostValue::Text("1".into()), CType::SLong, 3).unwrap_err();
        match err {
            Error::TypeMismatch {
                index,
                expected,
                found,
            } => {
                assert_eq!(index, 3);
                assert_eq!(expected, CType::SLong);
                assert_eq!(found, "text");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    // ========== floats, bits ==========

    #[test]
    fn test_floats_round_trip() {
        assert_round_trip(HostValue::Float(-1.5e300), CType::Double);
        assert_round_trip(HostValue::Float(0.25), CType::Float);
        assert!(matches!(
            CValue::encode(&HostValue::Float(1e300), CType::Float, 0),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn test_bit_round_trip() {
        assert_round_trip(HostValue::Bool(true), CType::Bit);
        assert_round_trip(HostValue::Bool(false), CType::Bit);
    }

    // ========== fixed point ==========

    #[test]
    fn test_numeric_round_trip() {
        assert_round_trip(
            HostValue::Decimal(FixedPointValue::new(10, 2, 1, 12345)),
            CType::Numeric,
        );
        assert_round_trip(
            HostValue::Decimal(FixedPointValue::new(38, 10, 0, 10u128.pow(37) + 7)),
            CType::Numeric,
        );
    }

    #[test]
    fn test_numeric_precision_is_checked() {
        let too_wide = HostValue::Decimal(FixedPointValue::new(39, 0, 1, 1));
        assert!(matches!(
            CValue::encode(&too_wide, CType::Numeric, 0),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn test_numeric_magnitude_must_fit_precision() {
        let too_many_digits = HostValue::Decimal(FixedPointValue::new(2, 0, 1, 12345));
        assert!(matches!(
            CValue::encode(&too_many_digits, CType::Numeric, 0),
            Err(Error::Range { target: "NUMERIC magnitude", .. })
        ));

        let edge = HostValue::Decimal(FixedPointValue::new(2, 0, 0, 99));
        assert_round_trip(edge, CType::Numeric);
        let widest = HostValue::Decimal(FixedPointValue::new(38, 0, 1, 10u128.pow(38) - 1));
        assert_round_trip(widest, CType::Numeric);
        let over = HostValue::Decimal(FixedPointValue::new(38, 0, 1, 10u128.pow(38)));
        assert!(CValue::encode(&over, CType::Numeric, 0).is_err());
    }

    // ========== date and time ==========

    #[test]
    fn test_leap_day_round_trip() {
        assert_round_trip(
            HostValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            CType::Date,
        );
        assert_round_trip(
            HostValue::Date(NaiveDate::from_ymd_opt(1, 1, 1).unwrap()),
            CType::Date,
        );
        assert_round_trip(
            HostValue::Date(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap()),
            CType::Date,
        );
    }

    #[test]
    fn test_year_10000_is_out_of_range() {
        let date = NaiveDate::from_ymd_opt(10000, 1, 1).unwrap();
        assert!(matches!(
            CValue::encode(&HostValue::Date(date), CType::Date, 0),
            Err(Error::Range { .. })
        ));
        assert!(matches!(
            CValue::encode(
                &HostValue::Timestamp(date.and_hms_opt(0, 0, 0).unwrap()),
                CType::Timestamp,
                0
            ),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn test_timestamp_microseconds_become_nanoseconds() -> Result<()> {
        let ts = NaiveDate::from_ymd_opt(2023, 10, 5)
            .unwrap()
            .and_hms_micro_opt(13, 14, 15, 123_456)
            .unwrap();
        let encoded = CValue::encode(&HostValue::Timestamp(ts), CType::Timestamp, 0)?;
        match encoded {
            CValue::Timestamp(raw) => assert_eq!(raw.fraction, 123_456_000),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(encoded.decode()?, HostValue::Timestamp(ts));
        Ok(())
    }

    #[test]
    fn test_time_round_trip() {
        assert_round_trip(
            HostValue::Time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()),
            CType::Time,
        );
    }

    #[test]
    fn test_invalid_wire_date_is_range_error() {
        let bad = CValue::Date(SqlDate {
            year: 2023,
            month: 2,
            day: 30,
        });
        assert!(matches!(bad.decode(), Err(Error::Range { .. })));
    }

    // ========== guid, text, binary ==========

    #[test]
    fn test_guid_round_trip() -> Result<()> {
        let g = Uuid::parse_str("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
        let encoded = CValue::encode(&HostValue::Guid(g), CType::Guid, 0)?;
        match &encoded {
            CValue::Guid(raw) => {
                assert_eq!(raw.d1, 0x6f9619ff);
                assert_eq!(raw.d2, 0x8b86);
                assert_eq!(raw.d3, 0xd011);
                assert_eq!(raw.d4, [0xb4, 0x2d, 0x00, 0xc0, 0x4f, 0xc9, 0x64, 0xff]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(encoded.decode()?, HostValue::Guid(g));
        Ok(())
    }

    #[test]
    fn test_wide_text_with_broken_surrogates_decodes_lossily() -> Result<()> {
        let cell = CValue::WChar(vec![0x41, 0xD83D, 0xDE00, 0xDC00, 0x42]);
        assert_eq!(cell.decode()?, HostValue::Text("A😀\u{FFFD}B".into()));
        Ok(())
    }

    #[test]
    fn test_text_round_trip() {
        assert_round_trip(HostValue::Text("plain".into()), CType::Char);
        assert_round_trip(HostValue::Text("wide ✓ 😀".into()), CType::WChar);
        assert_round_trip(HostValue::Bytes(vec![0, 1, 2, 255]), CType::Binary);
    }

    #[test]
    fn test_lengths() -> Result<()> {
        let wide = CValue::encode(&HostValue::Text("a😀".into()), CType::WChar, 0)?;
        assert_eq!(wide.unit_len(), 3);
        assert_eq!(wide.byte_len(), 6);
        assert_eq!(CValue::SLong(1).byte_len(), 4);
        assert_eq!(CValue::placeholder(CType::Timestamp).byte_len(), 16);
        Ok(())
    }
}
