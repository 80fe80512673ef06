//! [`User`] read model definition.
//!
//! [`User`]: crate::domain::User

use crate::domain::{Property, User};

/// Tenant [`User`] together with the [`Property`] of their active lease.
#[derive(Clone, Debug)]
pub struct Tenant {
    /// Tenant [`User`] itself.
    pub user: User,

    /// [`Property`] the tenant currently rents, if any.
    pub current_property: Option<Property>,
}

/// Counts of [`User`]s visible in a [`Scope`].
///
/// [`Scope`]: crate::policy::Scope
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Counts {
    /// Total number of [`User`]s.
    pub total: u64,

    /// Number of agents.
    pub agents: u64,

    /// Number of tenants.
    pub tenants: u64,
}

pub mod list {
    //! [`User`]s list definitions.

    use common::define_pagination;

    use crate::{
        domain::{user, User},
        read::Search,
    };

    define_pagination!(User, Filter);

    /// Filter for [`Selector`].
    #[derive(Clone, Debug, Default)]
    pub struct Filter {
        /// [`user::Role`] the [`User`]s should have.
        pub role: Option<user::Role>,

        /// [`Search`] among emails, first and last names.
        pub search: Option<Search>,

        /// Whether the [`User`]s should (or should not) have an active lease.
        pub has_property: Option<bool>,
    }
}
