//! Rounding and fixed-point helpers - total functions, no NaN escapes

use core::fmt;
use core::iter::Sum;
use core::ops::Add;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money scale (1e6 for $1.00)
pub const SCALE: u64 = 1_000_000;

/// Round half away from zero to `decimals` places.
/// Non-finite input collapses to 0.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Simulator precision
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Recommendation precision
pub fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

/// Plan engine precision
pub fn round6(value: f64) -> f64 {
    round_to(value, 6)
}

/// Clamp without panicking when `min > max` (the upper bound wins)
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Divide, returning 0 if the denominator is not positive
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Non-negative USD amount in 1e6 fixed point.
///
/// Plan amounts live here so that six-decimal rounding and budget
/// conservation are exact. Serialized as a plain decimal number.
///
/// The JSON form goes through `f64` (a division by 1e6 on the way out, a
/// multiplication on the way back). A round trip is exact below 2^51
/// micro-units, about 2.25e9 USD. Above that an amount can come back off by
/// a micro-unit, and past 2^53 (about 9.0e9 USD) `f64` no longer holds every
/// integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(pub u64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    /// Convert a USD value, rounding to 6 decimals.
    /// Negative and non-finite values become zero.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        // `as` saturates at u64::MAX
        Micros((value * SCALE as f64).round() as u64)
    }

    /// `self * weight`, rounded to the nearest micro-unit
    pub fn scaled(self, weight: f64) -> Self {
        if !weight.is_finite() || weight <= 0.0 {
            return Self::ZERO;
        }
        Micros((self.0 as f64 * weight).round() as u64)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: Micros) -> Micros {
        Micros(self.0.saturating_sub(other.0))
    }
}

impl Add for Micros {
    type Output = Micros;

    fn add(self, other: Micros) -> Micros {
        Micros(self.0.saturating_add(other.0))
    }
}

impl Sum for Micros {
    fn sum<I: Iterator<Item = Micros>>(iter: I) -> Micros {
        iter.fold(Micros::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Micros> for Micros {
    fn sum<I: Iterator<Item = &'a Micros>>(iter: I) -> Micros {
        iter.copied().sum()
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:06}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl Serialize for Micros {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Micros {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "amount must be finite and non-negative, got {}",
                value
            )));
        }
        Ok(Micros::from_f64(value))
    }
}
