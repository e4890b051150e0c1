//! This module defines [`TrustLevel`] and the voting power thresholds.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tendermint_lite_utils::serde::number_as_string;

use crate::error::VerificationError;

/// Fraction of trusted voting power that must sign a header to skip ahead to it
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(try_from = "RawTrustLevel")]
pub struct TrustLevel {
    #[serde(with = "number_as_string")]
    numerator: u64,
    #[serde(with = "number_as_string")]
    denominator: u64,
}

#[derive(Deserialize)]
struct RawTrustLevel {
    #[serde(with = "number_as_string")]
    numerator: u64,
    #[serde(with = "number_as_string")]
    denominator: u64,
}

impl TryFrom<RawTrustLevel> for TrustLevel {
    type Error = VerificationError;

    fn try_from(raw: RawTrustLevel) -> Result<Self, Self::Error> {
        Self::new(raw.numerator, raw.denominator)
    }
}

impl TrustLevel {
    /// One third, the default
    pub const ONE_THIRD: Self = Self {
        numerator: 1,
        denominator: 3,
    };

    /// Two thirds
    pub const TWO_THIRDS: Self = Self {
        numerator: 2,
        denominator: 3,
    };

    /// Creates a trust level of `numerator / denominator`.
    /// # Errors
    /// Returns [`VerificationError::InvalidTrustLevel`] unless `0 < numerator <= denominator`.
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, VerificationError> {
        ensure!(
            numerator > 0 && numerator <= denominator,
            VerificationError::InvalidTrustLevel {
                numerator,
                denominator,
            }
        );
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// The numerator.
    #[must_use]
    pub const fn numerator(self) -> u64 {
        self.numerator
    }

    /// The denominator.
    #[must_use]
    pub const fn denominator(self) -> u64 {
        self.denominator
    }

    /// Whether `signed` out of `total` voting power reaches this level, boundary included.
    #[must_use]
    pub fn voting_power_meets(self, signed: u64, total: u64) -> bool {
        u128::from(signed) * u128::from(self.denominator)
            >= u128::from(total) * u128::from(self.numerator)
    }
}

/// Whether `signed` is strictly more than two thirds of `total`.
#[must_use]
pub fn has_full_quorum(signed: u64, total: u64) -> bool {
    u128::from(signed) * 3 > u128::from(total) * 2
}

impl Default for TrustLevel {
    fn default() -> Self {
        Self::ONE_THIRD
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TrustLevel {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || VerificationError::MalformedTrustLevel {
            input: s.to_string(),
        };
        let (numerator, denominator) = s.split_once('/').ok_or_else(malformed)?;
        let numerator = numerator.trim().parse().map_err(|_| malformed())?;
        let denominator = denominator.trim().parse().map_err(|_| malformed())?;
        Self::new(numerator, denominator)
    }
}
