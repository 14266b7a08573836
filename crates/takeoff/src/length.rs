//! Decimal inches → `feet-inches-sixteenths`.
//!
//! The sixteenths digit is rounded half away from zero. A fraction that rounds
//! up to a full inch prints as `16` sixteenths unless carrying is requested,
//! e.g. `11.99"` renders as `0-11-16`, or `1-0-0` with carry.

use serde::Deserialize;

/// Length formatting options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LengthConfig {
    /// Carry a rounded-up `16/16` into the next inch (and `12"` into the next foot).
    #[serde(default)]
    pub carry_sixteenths: bool,
}

/// Canonical length string with default (non-carrying) formatting.
pub fn normalize(inches: f64) -> String {
    normalize_with(inches, &LengthConfig::default())
}

pub fn normalize_with(inches: f64, config: &LengthConfig) -> String {
    let inches = if inches.is_finite() && inches > 0.0 { inches } else { 0.0 };

    let remainder = inches % 12.0;
    // inches - remainder is an exact multiple of 12
    let mut feet = ((inches - remainder) / 12.0).round() as u64;
    let mut whole = remainder.floor() as u64;
    let mut sixteenths = ((remainder - whole as f64) * 16.0).round() as u64;

    if config.carry_sixteenths && sixteenths == 16 {
        sixteenths = 0;
        whole += 1;
        if whole == 12 {
            whole = 0;
            feet += 1;
        }
    }

    format!("{feet}-{whole}-{sixteenths}")
}

/// Inverse of [`normalize`]: `f-i-s` → `f*12 + i + s/16` inches.
pub fn reconstruct(canonical: &str) -> Option<f64> {
    let (feet, inches, sixteenths) = parse_parts(canonical)?;
    Some(feet as f64 * 12.0 + inches as f64 + sixteenths as f64 / 16.0)
}

/// Whether `s` could have been produced by [`normalize_with`].
pub fn is_canonical(s: &str) -> bool {
    matches!(parse_parts(s), Some((_, inches, sixteenths)) if inches < 12 && sixteenths <= 16)
}

fn parse_parts(s: &str) -> Option<(u64, u64, u64)> {
    let mut parts = s.split('-');
    let mut next = || -> Option<u64> {
        let p = parts.next()?;
        if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        p.parse().ok()
    };
    let triple = (next()?, next()?, next()?);
    if parts.next().is_some() {
        return None;
    }
    Some(triple)
}
