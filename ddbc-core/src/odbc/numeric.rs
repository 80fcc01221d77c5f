use std::fmt::{self, Display, Formatter};
use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::odbc::sys::SqlNumeric;

/// Largest precision a 16-byte magnitude can always hold.
pub const MAX_PRECISION: u8 = 38;

static DECIMAL_SEPARATOR: Lazy<Mutex<char>> = Lazy::new(|| Mutex::new('.'));

/// Sets the process-wide character used as radix point when parsing and rendering
/// NUMERIC/DECIMAL text.
///
/// The separator must be a single character that is neither whitespace nor a control
/// character.
pub fn set_decimal_separator(separator: &str) -> Result<()> {
    let mut chars = separator.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        (None, _) => return Err(Error::config("decimal separator cannot be empty")),
        (Some(_), Some(_)) => {
            return Err(Error::config(
                "decimal separator must be a single character",
            ))
        }
    };
    if c.is_whitespace() {
        return Err(Error::config(
            "whitespace characters are not allowed as decimal separators",
        ));
    }
    if c.is_control() {
        return Err(Error::config(format!(
            "control character {:?} is not allowed as a decimal separator",
            c
        )));
    }

    *DECIMAL_SEPARATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = c;
    log::debug!("decimal separator set to {:?}", c);
    Ok(())
}

/// The current process-wide decimal separator, `.` unless changed.
pub fn decimal_separator() -> char {
    *DECIMAL_SEPARATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exact decimal value as a scaled integer: `(-1)^(1 - sign) * magnitude / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedPointValue {
    /// Total number of significant decimal digits.
    pub precision: u8,
    /// Digits after the radix point.
    pub scale: i8,
    /// 1 for positive (and zero), 0 for negative.
    pub sign: u8,
    /// Unscaled absolute value.
    pub magnitude: u128,
}

impl FixedPointValue {
    pub fn new(precision: u8, scale: i8, sign: u8, magnitude: u128) -> Self {
        Self {
            precision,
            scale,
            sign,
            magnitude,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.sign == 0 && self.magnitude != 0
    }

    pub fn from_sql_numeric(numeric: &SqlNumeric) -> Self {
        Self {
            precision: numeric.precision,
            scale: numeric.scale,
            sign: numeric.sign,
            magnitude: LittleEndian::read_u128(&numeric.val),
        }
    }

    pub fn to_sql_numeric(&self) -> SqlNumeric {
        let mut numeric = SqlNumeric {
            precision: self.precision,
            scale: self.scale,
            sign: self.sign,
            ..SqlNumeric::default()
        };
        LittleEndian::write_u128(&mut numeric.val, self.magnitude);
        numeric
    }

    /// Parses decimal text such as `-123.45`, accepting `.` or the configured separator as
    /// radix point.
    ///
    /// With `scale` given the value is rescaled to exactly that many fractional digits;
    /// fractional digits that would be lost must be zero. Without `precision` the number of
    /// significant digits is used.
    pub fn parse(text: &str, precision: Option<u8>, scale: Option<i8>) -> Result<Self> {
        let separator = decimal_separator();
        let text = text.trim();
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let mut magnitude: u128 = 0;
        let mut seen_digit = false;
        let mut significant = 0u32;
        let mut fraction_digits = 0u32;
        let mut in_fraction = false;

        for c in digits.chars() {
            match c {
                '0'..='9' => {
                    let d = u128::from(c as u8 - b'0');
                    magnitude = magnitude
                        .checked_mul(10)
                        .and_then(|m| m.checked_add(d))
                        .ok_or_else(|| Error::range("NUMERIC", text))?;
                    if magnitude != 0 {
                        significant += 1;
                    }
                    if in_fraction {
                        fraction_digits += 1;
                    }
                    seen_digit = true;
                }
                c if (c == '.' || c == separator) && !in_fraction => in_fraction = true,
                _ => {
                    return Err(Error::Decode(
                        format!("invalid decimal text {:?}", text).into(),
                    ))
                }
            }
        }
        if !seen_digit {
            return Err(Error::Decode(
                format!("invalid decimal text {:?}", text).into(),
            ));
        }

        let mut scale_now = fraction_digits as i32;
        if let Some(target) = scale {
            let target = i32::from(target);
            while scale_now < target {
                magnitude = magnitude
                    .checked_mul(10)
                    .ok_or_else(|| Error::range("NUMERIC", text))?;
                scale_now += 1;
            }
            while scale_now > target {
                if magnitude % 10 != 0 {
                    return Err(Error::range("NUMERIC scale", text));
                }
                magnitude /= 10;
                scale_now -= 1;
            }
        }

        let scale = i8::try_from(scale_now).map_err(|_| Error::range("NUMERIC scale", text))?;
        let precision = match precision {
            Some(p) => p,
            None => {
                let digits = significant.max(scale_now.max(0) as u32).max(1);
                u8::try_from(digits).map_err(|_| Error::range("NUMERIC precision", text))?
            }
        };

        Ok(Self {
            precision,
            scale,
            sign: if negative && magnitude != 0 { 0 } else { 1 },
            magnitude,
        })
    }

    /// The same value with exactly `scale` fractional digits and the given precision.
    ///
    /// Fails with [`Error::Range`] if non-zero digits would be dropped or the magnitude
    /// overflows.
    pub fn rescale(&self, precision: u8, scale: i8) -> Result<Self> {
        let mut magnitude = self.magnitude;
        let mut current = i32::from(self.scale);
        let target = i32::from(scale);
        while current < target {
            magnitude = magnitude
                .checked_mul(10)
                .ok_or_else(|| Error::range("NUMERIC", self.to_string_with('.')))?;
            current += 1;
        }
        while current > target {
            if magnitude % 10 != 0 {
                return Err(Error::range("NUMERIC scale", self.to_string_with('.')));
            }
            magnitude /= 10;
            current -= 1;
        }
        Ok(Self {
            precision,
            scale,
            sign: self.sign,
            magnitude,
        })
    }

    /// Renders the value with `separator` as radix point.
    pub fn to_string_with(&self, separator: char) -> String {
        let mut digits = self.magnitude.to_string();
        let mut out = String::with_capacity(digits.len() + 3);
        if self.is_negative() {
            out.push('-');
        }

        if self.scale <= 0 {
            out.push_str(&digits);
            if self.magnitude != 0 {
                for _ in 0..(-i32::from(self.scale)) {
                    out.push('0');
                }
            }
            return out;
        }

        let scale = self.scale as usize;
        if digits.len() <= scale {
            digits = format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits);
        }
        let (int_part, frac_part) = digits.split_at(digits.len() - scale);
        out.push_str(int_part);
        out.push(separator);
        out.push_str(frac_part);
        out
    }
}

impl Display for FixedPointValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(decimal_separator()))
    }
}
