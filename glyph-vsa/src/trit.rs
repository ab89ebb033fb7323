//! Single balanced ternary component {-1, 0, +1}.
//!
//! A hypervector is a sequence of trits. Atomic symbols only use `N` and `P`
//! (bipolar); `Z` appears where a bundle's weighted vote is an exact tie.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Mul, Neg};

use crate::error::{Result, VsaError};

/// A balanced ternary digit.
///
/// | Variant | Symbol | Value |
/// |---------|--------|-------|
/// | `N`     | `-`    | -1    |
/// | `Z`     | `0`    |  0    |
/// | `P`     | `+`    | +1    |
///
/// # Examples
///
/// ```
/// use glyph_vsa::Trit;
///
/// assert_eq!(Trit::N.value(), -1);
/// assert_eq!(Trit::P * Trit::N, Trit::N);
/// assert_eq!(-Trit::P, Trit::N);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Trit {
    /// Negative trit (-1).
    N = -1,
    /// Zero trit (0).
    #[default]
    Z = 0,
    /// Positive trit (+1).
    P = 1,
}

impl Trit {
    /// Create a trit from an integer value.
    ///
    /// # Errors
    ///
    /// Returns `VsaError::InvalidValue` if value is not -1, 0, or +1.
    ///
    /// # Examples
    ///
    /// ```
    /// use glyph_vsa::Trit;
    ///
    /// assert_eq!(Trit::from_value(1).unwrap(), Trit::P);
    /// assert!(Trit::from_value(2).is_err());
    /// ```
    pub const fn from_value(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(Trit::N),
            0 => Ok(Trit::Z),
            1 => Ok(Trit::P),
            _ => Err(VsaError::InvalidValue(value)),
        }
    }

    /// Sign of an integer vote total. Exact zero maps to `Z`.
    #[must_use]
    pub const fn from_sign(total: i64) -> Self {
        if total > 0 {
            Trit::P
        } else if total < 0 {
            Trit::N
        } else {
            Trit::Z
        }
    }

    /// Integer value of the trit.
    #[must_use]
    pub const fn value(self) -> i8 {
        self as i8
    }

    /// Check if the trit is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        matches!(self, Trit::Z)
    }

    /// Encode as `(plus_bit, minus_bit)` for the bitsliced planes.
    #[must_use]
    pub const fn to_bits(self) -> (bool, bool) {
        match self {
            Trit::P => (true, false),
            Trit::Z => (false, false),
            Trit::N => (false, true),
        }
    }

    /// Decode from `(plus_bit, minus_bit)`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if both bits are set (invalid state).
    #[must_use]
    pub const fn from_bits(plus: bool, minus: bool) -> Self {
        debug_assert!(!(plus && minus), "invalid state: both planes set");
        if plus {
            Trit::P
        } else if minus {
            Trit::N
        } else {
            Trit::Z
        }
    }
}

impl Mul for Trit {
    type Output = Trit;

    /// Element product, the binding operator. `(a * k) * k == a` whenever `k != Z`.
    fn mul(self, rhs: Trit) -> Trit {
        match (self, rhs) {
            (Trit::Z, _) | (_, Trit::Z) => Trit::Z,
            (a, b) if a == b => Trit::P,
            _ => Trit::N,
        }
    }
}

impl Neg for Trit {
    type Output = Trit;

    fn neg(self) -> Trit {
        match self {
            Trit::N => Trit::P,
            Trit::Z => Trit::Z,
            Trit::P => Trit::N,
        }
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Trit::N => '-',
            Trit::Z => '0',
            Trit::P => '+',
        };
        write!(f, "{c}")
    }
}
