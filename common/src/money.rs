//! [`Money`]-related definitions.

use std::{fmt, iter, ops, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::{Decimal, RoundingStrategy};

/// Amount of money in the agency currency, with a cent precision.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Number of fractional digits kept in a [`Money`] amount.
    pub const SCALE: u32 = 2;

    /// Largest amount storable (`NUMERIC(10, 2)`).
    pub const MAX: Self = Self(Decimal::from_parts(
        0x540B_E3FF, // 9_999_999_999
        0x2,
        0,
        false,
        Self::SCALE,
    ));

    /// Creates a new [`Money`] rounding the provided amount to cents.
    ///
    /// [`None`] is returned if the amount doesn't fit into [`Money::MAX`].
    #[must_use]
    pub fn new(amount: Decimal) -> Option<Self> {
        let amount = amount.round_dp_with_strategy(
            Self::SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        (amount.abs() <= Self::MAX.0).then_some(Self(amount))
    }

    /// Indicates whether this amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Returns the inner [`Decimal`] amount.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut amount = self.0;
        amount.rescale(Self::SCALE);
        write!(f, "{amount}")
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| "invalid amount")?;
        if amount.scale() > Self::SCALE {
            return Err("more than 2 decimal places");
        }
        Self::new(amount).ok_or("amount too large")
    }
}

impl ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, ops::Add::add)
    }
}

impl<'a> iter::Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.
    //!
    //! [`Money`] is represented as a decimal string (`"1200.00"`), while
    //! both strings and numbers are accepted on input.

    use std::str::FromStr as _;

    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    use super::Money;

    impl Serialize for Money {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Money {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Repr {
                Str(String),
                Int(i64),
                Float(f64),
            }

            match Repr::deserialize(d)? {
                Repr::Str(s) => Money::from_str(&s).map_err(de::Error::custom),
                Repr::Int(i) => Money::new(i.into())
                    .ok_or_else(|| de::Error::custom("amount too large")),
                Repr::Float(f) => Money::from_str(&f.to_string())
                    .map_err(de::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::Money;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(money("1200").amount(), "1200".parse().unwrap());
        assert_eq!(money("1200.5"), money("1200.50"));
        assert_eq!(money(" 80.00 "), money("80"));

        assert!(Money::from_str("12.345").is_err());
        assert!(Money::from_str("abc").is_err());
        assert!(Money::from_str("").is_err());
        assert!(Money::from_str("100000000000").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(money("1200").to_string(), "1200.00");
        assert_eq!(money("1200.5").to_string(), "1200.50");
        assert_eq!(money("0").to_string(), "0.00");
        assert_eq!(Money::MAX.to_string(), "99999999.99");
    }

    #[test]
    fn sums() {
        assert_eq!(money("1200") + money("80.50"), money("1280.50"));
        assert_eq!(
            [money("10.10"), money("20.20"), money("0.70")]
                .iter()
                .sum::<Money>(),
            money("31"),
        );
        assert_eq!(Vec::<Money>::new().into_iter().sum::<Money>(), Money::ZERO);
    }

    #[test]
    fn detects_negative_amounts() {
        assert!(money("-1").is_negative());
        assert!(!money("0").is_negative());
        assert!(!money("-0").is_negative());
    }
}
