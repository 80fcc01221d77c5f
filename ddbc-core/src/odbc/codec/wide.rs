//! Transcoding between the ODBC wide character unit (UTF-16LE) and host strings.
//!
//! Every wide buffer read from the driver goes through [`utf16_to_utf32`] on its way to a
//! `String`. Invalid code units never fail a conversion, they become U+FFFD.
//!
//! [`to_native`] and [`from_native`] are for callers that pass text on to APIs taking the
//! platform's `wchar_t`: 32 bits wide outside Windows, where the explicit UTF-16 ⇄ UTF-32
//! step is needed, and UTF-16 on Windows, where the conversion is a copy.

use crate::odbc::sys::WChar;

pub const REPLACEMENT: u32 = 0xFFFD;

/// The platform's native `wchar_t`.
#[cfg(windows)]
pub type NativeWide = u16;
#[cfg(not(windows))]
pub type NativeWide = u32;

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// UTF-16 code units to UTF-32 code points, combining surrogate pairs.
pub fn utf16_to_utf32(units: &[u16]) -> Vec<u32> {
    let mut out = Vec::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        if is_high_surrogate(unit) {
            match units.get(i + 1) {
                Some(&low) if is_low_surrogate(low) => {
                    let high = u32::from(unit) - 0xD800;
                    let low = u32::from(low) - 0xDC00;
                    out.push(0x10000 + (high << 10) + low);
                    i += 2;
                    continue;
                }
                _ => out.push(REPLACEMENT),
            }
        } else if is_low_surrogate(unit) {
            out.push(REPLACEMENT);
        } else {
            out.push(u32::from(unit));
        }
        i += 1;
    }
    out
}

/// UTF-32 code points to UTF-16 code units, splitting supplementary characters into
/// surrogate pairs.
pub fn utf32_to_utf16(points: &[u32]) -> Vec<u16> {
    let mut out = Vec::with_capacity(points.len());
    for &point in points {
        match char::from_u32(point) {
            Some(c) => {
                let mut buf = [0u16; 2];
                out.extend_from_slice(c.encode_utf16(&mut buf));
            }
            None => out.push(REPLACEMENT as u16),
        }
    }
    out
}

/// Wire units to the native wide representation.
#[cfg(not(windows))]
pub fn to_native(units: &[WChar]) -> Vec<NativeWide> {
    utf16_to_utf32(units)
}

#[cfg(windows)]
pub fn to_native(units: &[WChar]) -> Vec<NativeWide> {
    units.to_vec()
}

/// Native wide representation to wire units.
#[cfg(not(windows))]
pub fn from_native(native: &[NativeWide]) -> Vec<WChar> {
    utf32_to_utf16(native)
}

#[cfg(windows)]
pub fn from_native(native: &[NativeWide]) -> Vec<WChar> {
    native.to_vec()
}

pub fn encode(s: &str) -> Vec<WChar> {
    s.encode_utf16().collect()
}

pub fn decode_lossy(units: &[WChar]) -> String {
    utf16_to_utf32(units)
        .into_iter()
        .map(|point| char::from_u32(point).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decodes up to the first NUL unit.
pub fn decode_nul_terminated(units: &[WChar]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    decode_lossy(&units[..end])
}
