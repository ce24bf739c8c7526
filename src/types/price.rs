use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Price type using NewType pattern for type safety
/// Prevents accidental mixing with other numeric types like Size
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price(pub Decimal);

impl Price {
    /// Create a new Price from a Decimal
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Get the underlying Decimal value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Parse a Price from a string
    pub fn parse(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Self(Decimal::from_str(s)?))
    }

    /// Convert to f64 for indicator math (lossy, never used for order math)
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    /// Build a Price from an f64 produced by indicator math
    pub fn from_f64(value: f64) -> Option<Self> {
        Decimal::from_f64(value).map(Self)
    }

    /// Scale the price by `1 + pct` (pct may be negative)
    pub fn scaled_by(&self, pct: Decimal) -> Self {
        Self(self.0 * (Decimal::ONE + pct))
    }

    /// Fractional change of `self` relative to `base`: (self - base) / base
    pub fn change_from(&self, base: Price) -> Decimal {
        if base.0.is_zero() {
            Decimal::ZERO
        } else {
            (self.0 - base.0) / base.0
        }
    }

    /// Get the absolute value of the price
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Serialize as string to preserve precision across the wire
impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Ok(Price(decimal))
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl std::ops::Sub for Price {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl std::ops::Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self {
        Self(self.0 * rhs)
    }
}

// Price / Price -> Decimal for ratio calculations
impl std::ops::Div<Price> for Price {
    type Output = Decimal;

    fn div(self, rhs: Price) -> Decimal {
        self.0 / rhs.0
    }
}
