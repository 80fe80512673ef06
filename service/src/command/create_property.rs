//! [`Command`] for creating a new [`Property`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::property::{
    Address, City, Description, Kind, Name, PostalCode, Rooms, Surface,
};
use crate::{
    domain::{property, user, Property, User},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Property`].
#[derive(Clone, Debug)]
pub struct CreateProperty {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the agent [`User`] managing a new [`Property`].
    ///
    /// Ignored for agents, who always manage the [`Property`]s they create.
    pub agent_id: Option<user::Id>,

    /// [`Name`] of a new [`Property`].
    pub name: property::Name,

    /// [`Address`] of a new [`Property`].
    pub address: property::Address,

    /// [`City`] of a new [`Property`].
    pub city: property::City,

    /// [`PostalCode`] of a new [`Property`].
    pub postal_code: property::PostalCode,

    /// [`Kind`] of a new [`Property`].
    pub kind: property::Kind,

    /// [`Surface`] of a new [`Property`].
    pub surface: Option<property::Surface>,

    /// [`Rooms`] of a new [`Property`].
    pub rooms: Option<property::Rooms>,

    /// Monthly rent of a new [`Property`], excluding charges.
    pub monthly_rent: Money,

    /// Monthly charges of a new [`Property`].
    pub charges: Money,

    /// [`Description`] of a new [`Property`].
    pub description: property::Description,
}

impl<Db> Command<CreateProperty> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Insert<Property>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateProperty,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateProperty {
            actor,
            agent_id,
            name,
            address,
            city,
            postal_code,
            kind,
            surface,
            rooms,
            monthly_rent,
            charges,
            description,
        } = cmd;

        let scope = actor
            .authorize::<policy::property::Manage>()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let agent_id = match scope {
            Scope::Agent(id) => id,
            Scope::All => {
                let id = agent_id
                    .ok_or(E::AgentRequired)
                    .map_err(tracerr::wrap!())?;
                let is_agent = tx
                    .execute(Select(By::<Option<User>, _>::new(id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .is_some_and(|u| u.role == user::Role::Agent);
                if !is_agent {
                    return Err(tracerr::new!(E::NotAnAgent(id)));
                }
                id
            }
            Scope::Tenant(_) => {
                return Err(tracerr::new!(E::Forbidden(policy::Forbidden)));
            }
        };

        let now = DateTime::now();
        let property = Property {
            id: property::Id::new(),
            name,
            address,
            city,
            postal_code,
            kind,
            surface,
            rooms,
            monthly_rent,
            charges,
            description,
            agent_id,
            is_available: true,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };

        tx.execute(Insert(property.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(property)
    }
}

/// Error of [`CreateProperty`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Agent of a new [`Property`] is not specified.
    #[display("`agent_id` is required")]
    AgentRequired,

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to create [`Property`]s.
    #[display("`Property` creation is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`User`] is not an existing agent.
    #[display("`User(id: {_0})` is not an agent")]
    #[from(ignore)]
    NotAnAgent(#[error(not(source))] user::Id),
}
