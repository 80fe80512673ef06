//! [`Query`] collection related to [`Assignment`]s.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{assignment, property, user, Assignment, Property, User},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read::{self, Active},
    Service,
};

use super::{Error, Query, ScopedQuery};

/// Queries an [`Assignment`] by its [`assignment::Id`] on behalf of an
/// [`Actor`].
pub type ById = ScopedQuery<
    policy::assignment::View,
    By<Option<Assignment>, assignment::Id>,
>;

/// Queries a list of [`Assignment`]s on behalf of an [`Actor`].
pub type List = ScopedQuery<
    policy::assignment::View,
    By<read::assignment::list::Page, read::assignment::list::Selector>,
>;

/// [`Query`] of the active [`read::assignment::Lease`] of a tenant [`Actor`].
#[derive(Clone, Copy, Debug)]
pub struct MyLease {
    /// Tenant [`Actor`] to query the [`read::assignment::Lease`] of.
    pub actor: Actor,
}

impl<Db> Query<MyLease> for Service<Db>
where
    Db: Database<
            Select<By<Option<Active<Assignment>>, user::Id>>,
            Ok = Option<Active<Assignment>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Option<read::assignment::Lease>;
    type Err = Traced<Error>;

    async fn execute(&self, query: MyLease) -> Result<Self::Ok, Self::Err> {
        let MyLease { actor } = query;

        let Scope::Tenant(tenant_id) = actor
            .authorize::<policy::tenant::Own>()
            .map_err(tracerr::from_and_wrap!(=> Error))?
        else {
            return Err(tracerr::new!(Error::Forbidden(policy::Forbidden)));
        };

        let Some(Active(assignment)) = self
            .database()
            .execute(Select(By::<Option<Active<Assignment>>, _>::new(
                tenant_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))?
        else {
            return Ok(None);
        };

        let Some(property) = self
            .database()
            .execute(Select(By::<Option<Property>, _>::new(
                assignment.property_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))?
        else {
            return Ok(None);
        };

        let agent = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(property.agent_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))?;

        Ok(Some(read::assignment::Lease {
            assignment,
            property,
            agent,
        }))
    }
}
