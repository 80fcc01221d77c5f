use rust_decimal::Decimal;

use crate::error::Error;
use crate::odbc::FixedPointValue;

use super::precision_of;

impl From<Decimal> for FixedPointValue {
    fn from(value: Decimal) -> Self {
        let magnitude = value.mantissa().unsigned_abs();
        let scale = value.scale();
        FixedPointValue {
            // a 96-bit mantissa has at most 29 digits and the scale at most 28
            precision: precision_of(magnitude, i64::from(scale)) as u8,
            scale: scale as i8,
            sign: if value.is_sign_negative() && magnitude != 0 {
                0
            } else {
                1
            },
            magnitude,
        }
    }
}

impl TryFrom<FixedPointValue> for Decimal {
    type Error = Error;

    fn try_from(value: FixedPointValue) -> Result<Self, Error> {
        let out_of_range = || Error::range("DECIMAL", value);
        let (magnitude, scale) = if value.scale < 0 {
            let shift = 10u128
                .checked_pow(u32::from(value.scale.unsigned_abs()))
                .ok_or_else(out_of_range)?;
            (value.magnitude.checked_mul(shift).ok_or_else(out_of_range)?, 0)
        } else {
            (value.magnitude, value.scale as u32)
        };

        let mut mantissa = i128::try_from(magnitude).map_err(|_| out_of_range())?;
        if value.is_negative() {
            mantissa = -mantissa;
        }
        Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|_| out_of_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() -> Result<(), Error> {
        let value = FixedPointValue::new(10, 2, 0, 12345);
        let decimal = Decimal::try_from(value)?;
        assert_eq!(decimal, Decimal::new(-12345, 2));
        assert_eq!(FixedPointValue::from(decimal), FixedPointValue::new(5, 2, 0, 12345));
        Ok(())
    }

    #[test]
    fn test_wider_than_96_bits() {
        let value = FixedPointValue::new(38, 0, 1, 10u128.pow(37));
        assert!(matches!(Decimal::try_from(value), Err(Error::Range { .. })));
    }
}
