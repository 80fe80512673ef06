//! [`Query`] collection related to the tenant directory.

use std::collections::HashMap;

use common::{
    operations::{By, Select},
    pagination::Page,
};
use tracerr::Traced;

use crate::{
    domain::{user, Property, User},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read::{self, Active},
    Service,
};

use super::{Error, Query};

/// [`Query`] of a list of tenants, each with their current [`Property`].
#[derive(Clone, Debug)]
pub struct List {
    /// [`Actor`] performing this [`Query`].
    pub actor: Actor,

    /// [`read::user::list::Selector`] of the tenants.
    ///
    /// Its [`read::user::list::Filter::role`] is always overridden.
    pub selector: read::user::list::Selector,
}

impl<Db> Query<List> for Service<Db>
where
    Db: Database<
            Select<
                By<
                    read::user::list::Page,
                    (read::user::list::Selector, Scope),
                >,
            >,
            Ok = read::user::list::Page,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<user::Id, Active<Property>>, Vec<user::Id>>>,
            Ok = HashMap<user::Id, Active<Property>>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Page<read::user::Tenant>;
    type Err = Traced<Error>;

    async fn execute(&self, query: List) -> Result<Self::Ok, Self::Err> {
        let List {
            actor,
            mut selector,
        } = query;

        let scope = actor
            .authorize::<policy::tenant::View>()
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        selector.filter.role = Some(user::Role::Tenant);

        let page = self
            .database()
            .execute(Select(By::new((selector, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))?;

        let ids = page.items.iter().map(|u| u.id).collect::<Vec<_>>();
        let mut properties = self
            .database()
            .execute(Select(By::new(ids)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))?;

        Ok(page.map(|user| read::user::Tenant {
            current_property: properties.remove(&user.id).map(|Active(p)| p),
            user,
        }))
    }
}

/// [`Query`] of a single tenant with their current [`Property`].
#[derive(Clone, Copy, Debug)]
pub struct ById {
    /// [`Actor`] performing this [`Query`].
    pub actor: Actor,

    /// ID of the tenant [`User`].
    pub tenant_id: user::Id,
}

impl<Db> Query<ById> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, (user::Id, Scope)>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<user::Id, Active<Property>>, Vec<user::Id>>>,
            Ok = HashMap<user::Id, Active<Property>>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Option<read::user::Tenant>;
    type Err = Traced<Error>;

    async fn execute(&self, query: ById) -> Result<Self::Ok, Self::Err> {
        let ById { actor, tenant_id } = query;

        let scope = actor
            .authorize::<policy::tenant::View>()
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        let Some(user) = self
            .database()
            .execute(Select(By::new((tenant_id, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))?
            .filter(|u| u.role == user::Role::Tenant)
        else {
            return Ok(None);
        };

        let current_property = self
            .database()
            .execute(Select(
                By::<HashMap<user::Id, Active<Property>>, _>::new(vec![
                    user.id,
                ]),
            ))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))?
            .remove(&user.id)
            .map(|Active(p)| p);

        Ok(Some(read::user::Tenant {
            user,
            current_property,
        }))
    }
}
