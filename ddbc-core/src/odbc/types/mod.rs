//! Conversions between [`FixedPointValue`](crate::odbc::FixedPointValue) and the decimal
//! types of other crates.
//!
//! | Rust type                             | Cargo feature |
//! |---------------------------------------|---------------|
//! | `bigdecimal::BigDecimal`              | `bigdecimal`  |
//! | `rust_decimal::Decimal`               | `decimal`     |
//!
//! Values that do not fit 38 digits fail with [`Error::Range`](crate::error::Error::Range).

#[cfg(feature = "bigdecimal")]
pub mod bigdecimal;

#[cfg(feature = "decimal")]
pub mod decimal;

/// Precision needed for `magnitude` at `scale`: its digit count, at least the scale, at
/// least 1.
#[cfg(any(feature = "bigdecimal", feature = "decimal"))]
fn precision_of(magnitude: u128, scale: i64) -> u32 {
    let digits = magnitude.checked_ilog10().map_or(1, |d| d + 1);
    digits.max(u32::try_from(scale).unwrap_or(0)).max(1)
}
