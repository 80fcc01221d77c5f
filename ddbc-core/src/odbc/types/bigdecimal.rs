use bigdecimal::BigDecimal;
use bigdecimal_::ToPrimitive;
use num_bigint::{BigInt, BigUint, Sign};

use crate::error::Error;
use crate::odbc::numeric::MAX_PRECISION;
use crate::odbc::FixedPointValue;

use super::precision_of;

impl From<FixedPointValue> for BigDecimal {
    fn from(value: FixedPointValue) -> Self {
        let sign = if value.is_negative() {
            Sign::Minus
        } else {
            Sign::Plus
        };
        let magnitude = BigInt::from_biguint(sign, BigUint::from(value.magnitude));
        BigDecimal::new(magnitude, i64::from(value.scale))
    }
}

impl TryFrom<&BigDecimal> for FixedPointValue {
    type Error = Error;

    fn try_from(value: &BigDecimal) -> Result<Self, Error> {
        let out_of_range = || Error::range("NUMERIC", value);
        let (mut bigint, exponent) = value.as_bigint_and_exponent();
        let scale = if exponent < 0 {
            let shift = u32::try_from(exponent.unsigned_abs()).map_err(|_| out_of_range())?;
            if bigint.sign() != Sign::NoSign {
                if shift > u32::from(MAX_PRECISION) {
                    return Err(out_of_range());
                }
                bigint *= BigInt::from(10).pow(shift);
            }
            0
        } else {
            exponent
        };

        let negative = bigint.sign() == Sign::Minus;
        let magnitude = bigint.magnitude().to_u128().ok_or_else(out_of_range)?;
        let precision = precision_of(magnitude, scale);
        if precision > u32::from(MAX_PRECISION) {
            return Err(out_of_range());
        }

        Ok(FixedPointValue {
            precision: precision as u8,
            scale: i8::try_from(scale).map_err(|_| out_of_range())?,
            sign: if negative { 0 } else { 1 },
            magnitude,
        })
    }
}

impl TryFrom<BigDecimal> for FixedPointValue {
    type Error = Error;

    fn try_from(value: BigDecimal) -> Result<Self, Error> {
        FixedPointValue::try_from(&value)
    }
}
