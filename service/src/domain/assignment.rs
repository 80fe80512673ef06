//! [`Assignment`] definitions.

#[cfg(doc)]
use common::{Date, DateTime};
use common::{unit, DateOf, DateTimeOf, Money};

#[cfg(doc)]
use crate::domain::User;
use crate::domain::{property, user};

use super::{define_id, define_text};

/// Lease binding a tenant [`User`] to a [`Property`] with an agreed rent.
///
/// [`Property`]: crate::domain::Property
#[derive(Clone, Debug)]
pub struct Assignment {
    /// ID of this [`Assignment`].
    pub id: Id,

    /// ID of the tenant [`User`].
    pub tenant_id: user::Id,

    /// ID of the leased [`Property`].
    ///
    /// [`Property`]: crate::domain::Property
    pub property_id: property::Id,

    /// ID of the [`User`] who created this [`Assignment`], if still known.
    pub agent_id: Option<user::Id>,

    /// [`Date`] this [`Assignment`] starts at.
    pub start_date: StartDate,

    /// [`Date`] this [`Assignment`] ends at, if fixed.
    pub end_date: Option<EndDate>,

    /// Monthly rent agreed for this [`Assignment`], excluding charges.
    pub rent_amount: Money,

    /// Security deposit paid for this [`Assignment`].
    pub deposit: Money,

    /// Indicator whether this [`Assignment`] is still in force.
    pub is_active: bool,

    /// [`Notes`] on this [`Assignment`].
    pub notes: Notes,

    /// [`DateTime`] when this [`Assignment`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Assignment`] was last modified.
    pub updated_at: ModificationDateTime,
}

impl Assignment {
    /// Checks whether the [`EndDate`] of this [`Assignment`] (if any) is not
    /// before its [`StartDate`].
    #[must_use]
    pub fn has_valid_period(&self) -> bool {
        is_valid_period(self.start_date, self.end_date)
    }
}

/// Checks whether the provided [`EndDate`] (if any) is not before the
/// provided [`StartDate`].
#[must_use]
pub fn is_valid_period(start: StartDate, end: Option<EndDate>) -> bool {
    end.map_or(true, |end| end.coerce::<()>() >= start.coerce())
}

define_id! {
    #[doc = "ID of an [`Assignment`]."]
    Id
}

define_text! {
    #[doc = "Free-form notes on an [`Assignment`]."]
    Notes(..=10_000)
}

/// [`Date`] an [`Assignment`] starts at.
pub type StartDate = DateOf<(Assignment, unit::Start)>;

/// [`Date`] an [`Assignment`] ends at.
pub type EndDate = DateOf<(Assignment, unit::End)>;

/// [`DateTime`] when an [`Assignment`] was created.
pub type CreationDateTime = DateTimeOf<(Assignment, unit::Creation)>;

/// [`DateTime`] when an [`Assignment`] was last modified.
pub type ModificationDateTime = DateTimeOf<(Assignment, unit::Modification)>;

#[cfg(test)]
mod spec {
    use common::Date;

    use super::{is_valid_period, EndDate, StartDate};

    fn start(s: &str) -> StartDate {
        s.parse::<Date>().unwrap().coerce()
    }

    fn end(s: &str) -> EndDate {
        s.parse::<Date>().unwrap().coerce()
    }

    #[test]
    fn validates_period() {
        assert!(is_valid_period(start("2025-01-01"), None));
        assert!(is_valid_period(start("2025-01-01"), Some(end("2025-01-01"))));
        assert!(is_valid_period(start("2025-01-01"), Some(end("2025-12-31"))));
        assert!(!is_valid_period(
            start("2025-01-02"),
            Some(end("2025-01-01")),
        ));
    }
}
