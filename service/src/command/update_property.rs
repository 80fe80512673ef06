//! [`Command`] for updating a [`Property`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
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

/// [`Command`] for updating a [`Property`].
///
/// [`Property::is_available`] is not writable, being maintained by leases.
#[derive(Clone, Debug)]
pub struct UpdateProperty {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Property`] to update.
    pub property_id: property::Id,

    /// New agent managing the [`Property`], if changed.
    ///
    /// Only admins may reassign a [`Property`].
    pub agent_id: Option<user::Id>,

    /// New [`Name`], if changed.
    pub name: Option<property::Name>,

    /// New [`Address`], if changed.
    pub address: Option<property::Address>,

    /// New [`City`], if changed.
    pub city: Option<property::City>,

    /// New [`PostalCode`], if changed.
    pub postal_code: Option<property::PostalCode>,

    /// New [`Kind`], if changed.
    pub kind: Option<property::Kind>,

    /// New [`Surface`], if changed.
    pub surface: Option<Option<property::Surface>>,

    /// New [`Rooms`], if changed.
    pub rooms: Option<Option<property::Rooms>>,

    /// New monthly rent, if changed.
    pub monthly_rent: Option<Money>,

    /// New monthly charges, if changed.
    pub charges: Option<Money>,

    /// New [`Description`], if changed.
    pub description: Option<property::Description>,
}

impl<Db> Command<UpdateProperty> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Property>, (property::Id, Scope)>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Property, property::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Update<Property>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateProperty,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateProperty {
            actor,
            property_id,
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

        // Avoid concurrent actions upon the same `Property`.
        tx.execute(Lock(By::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut property = tx
            .execute(Select(By::new((property_id, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())?;

        if let (Scope::All, Some(id)) = (scope, agent_id) {
            let is_agent = tx
                .execute(Select(By::<Option<User>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .is_some_and(|u| u.role == user::Role::Agent);
            if !is_agent {
                return Err(tracerr::new!(E::NotAnAgent(id)));
            }
            property.agent_id = id;
        }
        if let Some(name) = name {
            property.name = name;
        }
        if let Some(address) = address {
            property.address = address;
        }
        if let Some(city) = city {
            property.city = city;
        }
        if let Some(code) = postal_code {
            property.postal_code = code;
        }
        if let Some(kind) = kind {
            property.kind = kind;
        }
        if let Some(surface) = surface {
            property.surface = surface;
        }
        if let Some(rooms) = rooms {
            property.rooms = rooms;
        }
        if let Some(rent) = monthly_rent {
            property.monthly_rent = rent;
        }
        if let Some(charges) = charges {
            property.charges = charges;
        }
        if let Some(description) = description {
            property.description = description;
        }
        property.updated_at = DateTime::now().coerce();

        tx.execute(Update(property.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(property)
    }
}

/// Error of [`UpdateProperty`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to update [`Property`]s.
    #[display("`Property` update is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`User`] is not an existing agent.
    #[display("`User(id: {_0})` is not an agent")]
    #[from(ignore)]
    NotAnAgent(#[error(not(source))] user::Id),

    /// [`Property`] doesn't exist or is out of scope.
    #[display("`Property(id: {_0})` does not exist")]
    #[from(ignore)]
    PropertyNotExists(#[error(not(source))] property::Id),
}
