//! [`Command`] for creating a new [`Assignment`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::assignment::{EndDate, Notes, StartDate};
use crate::{
    domain::{assignment, property, user, Assignment, Property, User},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read::{self, Active},
    Service,
};

use super::Command;

/// Name of the unique constraint allowing a single active [`Assignment`] per
/// tenant and [`Property`].
const ACTIVE_CONSTRAINT: &str = "tenant_assignments_active_unique";

/// [`Command`] for leasing a [`Property`] to a tenant.
#[derive(Clone, Debug)]
pub struct CreateAssignment {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the tenant [`User`].
    pub tenant_id: user::Id,

    /// ID of the [`Property`] to lease.
    pub property_id: property::Id,

    /// [`StartDate`] of a new [`Assignment`].
    pub start_date: assignment::StartDate,

    /// [`EndDate`] of a new [`Assignment`], if fixed.
    pub end_date: Option<assignment::EndDate>,

    /// Monthly rent of a new [`Assignment`], excluding charges.
    pub rent_amount: Money,

    /// Security deposit of a new [`Assignment`].
    pub deposit: Money,

    /// [`Notes`] on a new [`Assignment`].
    pub notes: assignment::Notes,
}

impl<Db> Command<CreateAssignment> for Service<Db>
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
            Select<
                By<
                    Option<Active<Assignment>>,
                    (user::Id, property::Id),
                >,
            >,
            Ok = Option<Active<Assignment>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::property::IsRented, property::Id>>,
            Ok = read::property::IsRented,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Property, property::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Assignment>, Err = Traced<database::Error>>
        + Database<Update<Property>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Assignment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateAssignment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateAssignment {
            actor,
            tenant_id,
            property_id,
            start_date,
            end_date,
            rent_amount,
            deposit,
            notes,
        } = cmd;

        let scope = actor
            .authorize::<policy::assignment::Manage>()
            .map_err(tracerr::from_and_wrap!(=> E))?;
        if !assignment::is_valid_period(start_date, end_date) {
            return Err(tracerr::new!(E::InvalidPeriod));
        }

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

        let is_tenant = tx
            .execute(Select(By::<Option<User>, _>::new(tenant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .is_some_and(|u| u.role == user::Role::Tenant);
        if !is_tenant {
            return Err(tracerr::new!(E::NotATenant(tenant_id)));
        }

        let existing = tx
            .execute(Select(By::<Option<Active<Assignment>>, _>::new((
                tenant_id,
                property_id,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(Active(a)) = existing {
            return Err(tracerr::new!(E::ActiveAssignmentExists(a.id)));
        }

        let now = DateTime::now();
        let assignment = Assignment {
            id: assignment::Id::new(),
            tenant_id,
            property_id,
            agent_id: Some(actor.id),
            start_date,
            end_date,
            rent_amount,
            deposit,
            is_active: true,
            notes,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };

        let inserted = tx.execute(Insert(assignment.clone())).await;
        if let Err(e) = &inserted {
            if e.as_ref().is_unique_violation(Some(ACTIVE_CONSTRAINT)) {
                return Err(tracerr::new!(E::ActiveAssignmentExists(
                    assignment.id,
                )));
            }
        }
        inserted
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let is_rented = tx
            .execute(Select(By::<read::property::IsRented, _>::new(
                property_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if property.sync_availability(*is_rented) {
            property.updated_at = now.coerce();
            tx.execute(Update(property))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tracing::info!(
            assignment_id = %assignment.id,
            %tenant_id,
            %property_id,
            "lease created",
        );

        Ok(assignment)
    }
}

/// Error of [`CreateAssignment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// The tenant already has an active [`Assignment`] on the [`Property`].
    #[display("Active `Assignment(id: {_0})` already exists")]
    #[from(ignore)]
    ActiveAssignmentExists(#[error(not(source))] assignment::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to lease [`Property`]s.
    #[display("`Assignment` creation is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`EndDate`] is before [`StartDate`].
    #[display("`end_date` must not precede `start_date`")]
    InvalidPeriod,

    /// [`User`] is not an existing tenant.
    #[display("`User(id: {_0})` is not a tenant")]
    #[from(ignore)]
    NotATenant(#[error(not(source))] user::Id),

    /// [`Property`] doesn't exist or is out of scope.
    #[display("`Property(id: {_0})` does not exist")]
    #[from(ignore)]
    PropertyNotExists(#[error(not(source))] property::Id),
}
