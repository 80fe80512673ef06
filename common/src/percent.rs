//! [`Percent`]-related definitions.

use derive_more::Display;
use rust_decimal::{Decimal, RoundingStrategy};

/// Floating-point percentage.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct Percent(Decimal);

impl Percent {
    /// Computes the share `part` represents of `total`, rounded to 2
    /// decimal places.
    ///
    /// Zero `total` gives `0%`.
    #[must_use]
    pub fn ratio(part: impl Into<Decimal>, total: impl Into<Decimal>) -> Self {
        let (part, total) = (part.into(), total.into());
        if total.is_zero() {
            return Self(Decimal::ZERO);
        }
        let val = (part * Decimal::ONE_HUNDRED / total)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self(val.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    /// Returns the inner [`Decimal`] value.
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Percent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use rust_decimal::prelude::ToPrimitive as _;

        serializer.serialize_f64(self.0.to_f64().unwrap_or_default())
    }
}

#[cfg(test)]
mod spec {
    use super::Percent;

    #[test]
    fn ratio() {
        assert_eq!(Percent::ratio(2, 3).to_string(), "66.67");
        assert_eq!(Percent::ratio(1, 8).value(), "12.5".parse().unwrap());
        assert_eq!(Percent::ratio(5, 5).value(), 100.into());
        assert_eq!(Percent::ratio(0, 4).value(), 0.into());
    }

    #[test]
    fn ratio_of_nothing_is_zero() {
        assert_eq!(Percent::ratio(0, 0).value(), 0.into());
        assert_eq!(Percent::ratio(3, 0).value(), 0.into());
    }
}
