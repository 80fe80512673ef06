//! [`Query`] collection related to [`Property`]s.

use common::operations::By;

use crate::{
    domain::{property, Property},
    policy, read,
};
#[cfg(doc)]
use crate::{policy::Actor, Query};

use super::ScopedQuery;

/// Queries a [`Property`] by its [`property::Id`] on behalf of an [`Actor`].
pub type ById =
    ScopedQuery<policy::property::View, By<Option<Property>, property::Id>>;

/// Queries a list of [`Property`]s on behalf of an [`Actor`].
pub type List = ScopedQuery<
    policy::property::View,
    By<read::property::list::Page, read::property::list::Selector>,
>;

/// Queries [`read::property::Stats`] on behalf of an [`Actor`].
pub type Stats =
    ScopedQuery<policy::property::Stats, By<read::property::Stats, ()>>;
