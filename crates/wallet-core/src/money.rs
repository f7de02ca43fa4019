//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Gift card 33.33 with a 1.10x promo:                                    │
//! │    33.33 * 1.10 = 36.663000000000004 in f64                             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    3333 cents * 1000 bps / 10000 = 333.3 → 333 cents bonus             │
//! │    Rounded ONCE, at the final value, half-up                           │
//! │    final credit = 3333 + 333 = 3666 cents                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use wallet_core::money::Money;
//! use wallet_core::types::Multiplier;
//!
//! let base = Money::from_cents(3333); // 33.33
//! let bonus = base.bonus_for(Multiplier::from_bps(11_000));
//! assert_eq!(bonus.cents(), 333);
//! assert_eq!((base + bonus).cents(), 3666);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::types::Multiplier;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents / fils).
///
/// ## Design Decisions
/// - **i64 (signed)**: debits are represented as negative deltas when a
///   running balance is replayed
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Currency-agnostic**: the currency code travels next to the amount on
///   every lot and ledger entry
///
/// ## Where Money is Used
/// ```text
/// GiftCard.final_credit ──► WalletLot.amount ──► WalletLot.remaining
///                                                      │
///                      deduct(amount) ──► DeductionPlan draws ──► ledger debits
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use wallet_core::money::Money;
    ///
    /// let credit = Money::from_cents(10_000); // 100.00
    /// assert_eq!(credit.cents(), 10_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Computes the promotional bonus `self * (multiplier - 1)`.
    ///
    /// ## Rounding
    /// Round half-up (away from zero), applied exactly once on the final
    /// value. Intermediate products are carried in i128 so no precision is
    /// dropped before the single rounding step.
    ///
    /// ## Example
    /// ```rust
    /// use wallet_core::money::Money;
    /// use wallet_core::types::Multiplier;
    ///
    /// // 10.05 at 1.50x → bonus 5.025 → 5.03
    /// let bonus = Money::from_cents(1005).bonus_for(Multiplier::from_bps(15_000));
    /// assert_eq!(bonus.cents(), 503);
    ///
    /// // No promo → no bonus
    /// assert!(Money::from_cents(1005).bonus_for(Multiplier::ONE).is_zero());
    /// ```
    pub fn bonus_for(&self, multiplier: Multiplier) -> Money {
        let extra_bps = multiplier.bps() as i128 - Multiplier::ONE.bps() as i128;
        let bonus = round_half_up_div(self.0 as i128 * extra_bps, 10_000);
        Money::from_cents(bonus as i64)
    }
}

/// Integer division rounding half away from zero.
fn round_half_up_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`36.66`, `-5.50`); currency symbols are a
/// presentation concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
