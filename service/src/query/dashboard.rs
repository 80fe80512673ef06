//! [`Dashboard`] definition.

use common::{
    operations::{By, Select},
    Month,
};
use tracerr::Traced;

use crate::{
    domain::user::Role,
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read, Service,
};

use super::{Error, Query};

/// [`Query`] of the dashboard statistics of an [`Actor`], depending on its
/// [`Role`].
#[derive(Clone, Copy, Debug)]
pub struct Dashboard {
    /// [`Actor`] to query the dashboard of.
    pub actor: Actor,
}

/// Output of the [`Dashboard`] [`Query`].
#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Platform-wide [`User`] counts for an admin.
    ///
    /// [`User`]: crate::domain::User
    Admin(read::user::Counts),

    /// Portfolio figures for an agent.
    Agent {
        /// [`read::property::Stats`] of the agent's properties.
        properties: read::property::Stats,

        /// Number of tenants in the agent's directory.
        tenants: u64,
    },

    /// Figures over all own payments of a tenant.
    Tenant(read::payment::Stats),
}

impl<Db> Query<Dashboard> for Service<Db>
where
    Db: Database<
            Select<By<read::user::Counts, ((), Scope)>>,
            Ok = read::user::Counts,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::property::Stats, ((), Scope)>>,
            Ok = read::property::Stats,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::payment::Stats, (Option<Month>, Scope)>>,
            Ok = read::payment::Stats,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<Error>;

    async fn execute(&self, query: Dashboard) -> Result<Self::Ok, Self::Err> {
        let Dashboard { actor } = query;

        Ok(match actor.role {
            Role::Admin => {
                let scope = actor
                    .authorize::<policy::user::Manage>()
                    .map_err(tracerr::from_and_wrap!(=> Error))?;
                Output::Admin(
                    self.database()
                        .execute(Select(By::<read::user::Counts, _>::new((
                            (),
                            scope,
                        ))))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> Error))?,
                )
            }
            Role::Agent => {
                let scope = actor
                    .authorize::<policy::property::Stats>()
                    .map_err(tracerr::from_and_wrap!(=> Error))?;
                let properties = self
                    .database()
                    .execute(Select(By::<read::property::Stats, _>::new((
                        (),
                        scope,
                    ))))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> Error))?;

                let scope = actor
                    .authorize::<policy::tenant::View>()
                    .map_err(tracerr::from_and_wrap!(=> Error))?;
                let counts = self
                    .database()
                    .execute(Select(By::<read::user::Counts, _>::new((
                        (),
                        scope,
                    ))))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> Error))?;

                Output::Agent {
                    properties,
                    tenants: counts.tenants,
                }
            }
            Role::Tenant => {
                let scope = actor
                    .authorize::<policy::payment::Stats>()
                    .map_err(tracerr::from_and_wrap!(=> Error))?;
                Output::Tenant(
                    self.database()
                        .execute(Select(By::<read::payment::Stats, _>::new((
                            None, scope,
                        ))))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> Error))?,
                )
            }
        })
    }
}
