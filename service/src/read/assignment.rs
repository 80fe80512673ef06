//! [`Assignment`] read model definition.

use common::Money;

use crate::domain::{Assignment, Property, User};

/// Active [`Assignment`] as seen by its tenant.
#[derive(Clone, Debug)]
pub struct Lease {
    /// Active [`Assignment`] itself.
    pub assignment: Assignment,

    /// Leased [`Property`].
    pub property: Property,

    /// Agent [`User`] managing the leased [`Property`], if still present.
    pub agent: Option<User>,
}

impl Lease {
    /// Returns the rent due monthly under this [`Lease`], including the
    /// [`Property`] charges.
    #[must_use]
    pub fn total_rent(&self) -> Money {
        self.assignment.rent_amount + self.property.charges
    }
}

/// Active [`Assignment`] a monthly payment should be issued for.
#[derive(Clone, Debug)]
pub struct Billable {
    /// Active [`Assignment`] itself.
    pub assignment: Assignment,

    /// Monthly charges of the leased [`Property`].
    pub charges: Money,
}

impl Billable {
    /// Returns the amount of the monthly payment.
    #[must_use]
    pub fn amount(&self) -> Money {
        self.assignment.rent_amount + self.charges
    }
}

pub mod list {
    //! [`Assignment`]s list definitions.

    use common::define_pagination;

    use crate::domain::{property, user, Assignment};

    define_pagination!(Assignment, Filter);

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// Whether the [`Assignment`]s should (or should not) be active.
        pub is_active: Option<bool>,

        /// ID of the leased [`Property`].
        ///
        /// [`Property`]: crate::domain::Property
        pub property_id: Option<property::Id>,

        /// ID of the tenant [`User`].
        ///
        /// [`User`]: crate::domain::User
        pub tenant_id: Option<user::Id>,
    }
}
