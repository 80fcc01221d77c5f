use std::fmt::{self, Display, Formatter};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::odbc::FixedPointValue;

/// A dynamically typed value exchanged with the caller.
///
/// Parameters are built from these and every fetched cell comes back as one.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    /// Integers of any C width; range checks happen when a target width is known.
    Int(i128),
    Float(f64),
    Decimal(FixedPointValue),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Guid(Uuid),
}

impl HostValue {
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Decimal(_) => "decimal",
            HostValue::Text(_) => "text",
            HostValue::Bytes(_) => "bytes",
            HostValue::Date(_) => "date",
            HostValue::Time(_) => "time",
            HostValue::Timestamp(_) => "timestamp",
            HostValue::Guid(_) => "guid",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => i64::try_from(*i).ok(),
            HostValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            HostValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl Display for HostValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("NULL"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Float(x) => write!(f, "{}", x),
            HostValue::Decimal(d) => write!(f, "{}", d),
            HostValue::Text(s) => write!(f, "{:?}", s),
            HostValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            HostValue::Date(d) => write!(f, "{}", d),
            HostValue::Time(t) => write!(f, "{}", t),
            HostValue::Timestamp(ts) => write!(f, "{}", ts),
            HostValue::Guid(g) => write!(f, "{}", g.hyphenated()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for HostValue {
                fn from(value: $t) -> Self {
                    HostValue::Int(i128::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<f32> for HostValue {
    fn from(value: f32) -> Self {
        HostValue::Float(f64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<FixedPointValue> for HostValue {
    fn from(value: FixedPointValue) -> Self {
        HostValue::Decimal(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Text(value.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Text(value)
    }
}

impl From<&[u8]> for HostValue {
    fn from(value: &[u8]) -> Self {
        HostValue::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(value: Vec<u8>) -> Self {
        HostValue::Bytes(value)
    }
}

impl From<NaiveDate> for HostValue {
    fn from(value: NaiveDate) -> Self {
        HostValue::Date(value)
    }
}

impl From<NaiveTime> for HostValue {
    fn from(value: NaiveTime) -> Self {
        HostValue::Time(value)
    }
}

impl From<NaiveDateTime> for HostValue {
    fn from(value: NaiveDateTime) -> Self {
        HostValue::Timestamp(value)
    }
}

impl From<Uuid> for HostValue {
    fn from(value: Uuid) -> Self {
        HostValue::Guid(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}
