//! [`Payment`] read model definition.

use common::{Money, Percent};

use crate::domain::{payment, Payment};

/// Earliest unpaid [`Payment`] of a tenant.
#[derive(Clone, Debug)]
pub struct Current(pub Payment);

/// Number of [`payment::ReceiptNumber`]s issued for [`Payment`]s created
/// within a [`Month`].
///
/// [`Month`]: common::Month
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReceiptCount(pub u32);

impl ReceiptCount {
    /// Returns the sequence number of the next [`payment::ReceiptNumber`].
    #[must_use]
    pub fn next(self) -> u32 {
        self.0 + 1
    }
}

/// Collection statistics of [`Payment`]s.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stats {
    /// Total number of [`Payment`]s.
    pub total: u64,

    /// Number of [`payment::Status::Paid`] [`Payment`]s.
    pub paid: u64,

    /// Number of [`payment::Status::Pending`] [`Payment`]s.
    pub pending: u64,

    /// Number of [`payment::Status::Overdue`] [`Payment`]s.
    pub overdue: u64,

    /// Sum of paid amounts.
    pub total_collected: Money,

    /// Sum of unpaid amounts.
    pub total_pending: Money,

    /// Share of paid [`Payment`]s.
    pub collection_rate: Percent,
}

impl Stats {
    /// Aggregates [`Stats`] out of the provided `(status, count, sum)`
    /// groups of [`Payment`]s.
    #[must_use]
    pub fn aggregate(
        groups: impl IntoIterator<Item = (payment::Status, u64, Money)>,
    ) -> Self {
        use payment::Status as S;

        let mut stats = Self {
            total: 0,
            paid: 0,
            pending: 0,
            overdue: 0,
            total_collected: Money::ZERO,
            total_pending: Money::ZERO,
            collection_rate: Percent::ratio(0, 0),
        };
        for (status, count, sum) in groups {
            stats.total += count;
            match status {
                S::Paid => {
                    stats.paid += count;
                    stats.total_collected += sum;
                }
                S::Pending => {
                    stats.pending += count;
                    stats.total_pending += sum;
                }
                S::Overdue => {
                    stats.overdue += count;
                    stats.total_pending += sum;
                }
            }
        }
        stats.collection_rate = Percent::ratio(stats.paid, stats.total);
        stats
    }
}

pub mod list {
    //! [`Payment`]s list definitions.

    use common::{define_pagination, Month};

    use crate::domain::{payment, property, user, Payment};

    define_pagination!(Payment, Filter);

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// [`payment::Status`] of the [`Payment`]s.
        pub status: Option<payment::Status>,

        /// [`Month`] the [`Payment`]s are due in.
        pub month: Option<Month>,

        /// ID of the [`Property`] the [`Payment`]s are for.
        ///
        /// [`Property`]: crate::domain::Property
        pub property_id: Option<property::Id>,

        /// ID of the tenant [`User`] the [`Payment`]s are due by.
        ///
        /// [`User`]: crate::domain::User
        pub tenant_id: Option<user::Id>,
    }
}

#[cfg(test)]
mod spec {
    use std::{iter, str::FromStr as _};

    use common::Money;

    use super::{ReceiptCount, Stats};
    use crate::domain::payment::Status;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    #[test]
    fn aggregates_stats() {
        let stats = Stats::aggregate([
            (Status::Paid, 2, money("1500.50")),
            (Status::Pending, 1, money("800")),
            (Status::Overdue, 1, money("200")),
        ]);

        assert_eq!(stats.total, 4);
        assert_eq!((stats.paid, stats.pending, stats.overdue), (2, 1, 1));
        assert_eq!(stats.total_collected, money("1500.50"));
        assert_eq!(stats.total_pending, money("1000"));
        assert_eq!(stats.collection_rate.value(), 50.into());
    }

    #[test]
    fn no_payments_means_zero_collection() {
        let stats = Stats::aggregate(iter::empty());

        assert_eq!(stats.total, 0);
        assert_eq!(stats.total_collected, Money::ZERO);
        assert!(stats.collection_rate.value().is_zero());
    }

    #[test]
    fn receipts_are_sequenced_from_one() {
        assert_eq!(ReceiptCount(0).next(), 1);
        assert_eq!(ReceiptCount(41).next(), 42);
    }
}
