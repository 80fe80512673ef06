//! [`Query`] collection related to [`User`]s.

use common::operations::By;

use crate::{
    domain::{user, User},
    policy, read,
};
#[cfg(doc)]
use crate::{policy::Actor, Query};

use super::{DatabaseQuery, ScopedQuery};

/// Queries a [`User`] by its [`user::Id`].
pub type ById = DatabaseQuery<By<Option<User>, user::Id>>;

/// Queries any [`User`] by its [`user::Id`] on behalf of an administrating
/// [`Actor`].
pub type Managed =
    ScopedQuery<policy::user::Manage, By<Option<User>, user::Id>>;

/// Queries a list of [`User`]s on behalf of an administrating [`Actor`].
pub type List = ScopedQuery<
    policy::user::Manage,
    By<read::user::list::Page, read::user::list::Selector>,
>;

/// Queries a list of agents on behalf of an administrating [`Actor`].
///
/// The [`read::user::list::Filter::role`] is expected to be
/// [`user::Role::Agent`].
pub type Agents = ScopedQuery<
    policy::agent::Manage,
    By<read::user::list::Page, read::user::list::Selector>,
>;
