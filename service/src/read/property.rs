//! [`Property`]-related read definitions.

use common::{Money, Percent};
use derive_more::Deref;

#[cfg(doc)]
use crate::domain::Property;

/// Indicator whether a [`Property`] is rented or not.
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct IsRented(pub bool);

impl PartialEq<bool> for IsRented {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}

/// Occupancy statistics of [`Property`]s.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stats {
    /// Total number of [`Property`]s.
    pub total: u64,

    /// Number of [`Property`]s without an active lease.
    pub available: u64,

    /// Number of [`Property`]s with an active lease.
    pub rented: u64,

    /// Sum of monthly rents over the rented [`Property`]s.
    pub total_monthly_revenue: Money,

    /// Share of rented [`Property`]s.
    pub occupancy_rate: Percent,
}

impl Stats {
    /// Creates new [`Stats`] out of the provided counters.
    #[must_use]
    pub fn new(total: u64, rented: u64, total_monthly_revenue: Money) -> Self {
        Self {
            total,
            available: total.saturating_sub(rented),
            rented,
            total_monthly_revenue,
            occupancy_rate: Percent::ratio(rented, total),
        }
    }
}

pub mod list {
    //! [`Property`] list definitions.

    use common::{define_pagination, Money};

    use crate::{
        domain::{property, Property},
        read::Search,
    };

    define_pagination!(Property, Filter);

    /// Filter for [`Selector`].
    #[derive(Clone, Debug, Default)]
    pub struct Filter {
        /// [`Search`] in a city.
        pub city: Option<Search>,

        /// [`property::Kind`] of the [`Property`]s.
        pub kind: Option<property::Kind>,

        /// Availability of the [`Property`]s.
        pub is_available: Option<bool>,

        /// [`Search`] among names, addresses and cities.
        pub search: Option<Search>,

        /// Minimum monthly rent, inclusive.
        pub min_rent: Option<Money>,

        /// Maximum monthly rent, inclusive.
        pub max_rent: Option<Money>,
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::Money;

    use super::Stats;

    #[test]
    fn computes_occupancy() {
        let stats = Stats::new(25, 20, Money::from_str("24000").unwrap());

        assert_eq!(stats.available, 5);
        assert_eq!(stats.occupancy_rate.value(), 80.into());
    }

    #[test]
    fn no_properties_means_zero_occupancy() {
        let stats = Stats::new(0, 0, Money::ZERO);

        assert_eq!(stats.available, 0);
        assert!(stats.occupancy_rate.value().is_zero());
    }
}
