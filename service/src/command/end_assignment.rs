//! [`Command`] for ending an [`Assignment`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{assignment, property, Assignment, Property},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read, Service,
};

use super::Command;

/// [`Command`] for deactivating an [`Assignment`].
///
/// Availability of the leased [`Property`] is recomputed afterwards. The
/// [`Assignment`] itself is kept along with its payments.
#[derive(Clone, Copy, Debug)]
pub struct EndAssignment {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Assignment`] to end.
    pub assignment_id: assignment::Id,
}

impl<Db> Command<EndAssignment> for Service<Db>
where
    Db: Database<
            Select<By<Option<Assignment>, (assignment::Id, Scope)>>,
            Ok = Option<Assignment>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Assignment>, assignment::Id>>,
            Ok = Option<Assignment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::property::IsRented, property::Id>>,
            Ok = read::property::IsRented,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Property, property::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Assignment, assignment::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Update<Assignment>, Err = Traced<database::Error>>
        + Database<Update<Property>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Assignment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: EndAssignment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let EndAssignment {
            actor,
            assignment_id,
        } = cmd;

        let scope = actor
            .authorize::<policy::assignment::Manage>()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let property_id = self
            .database()
            .execute(Select(By::new((assignment_id, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AssignmentNotExists(assignment_id))
            .map_err(tracerr::wrap!())?
            .property_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent availability changes of the same `Property`.
        tx.execute(Lock(By::<Property, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        // Avoid concurrent actions upon the same `Assignment`.
        tx.execute(Lock(By::<Assignment, _>::new(assignment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut assignment = tx
            .execute(Select(By::<Option<Assignment>, _>::new(assignment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AssignmentNotExists(assignment_id))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        if assignment.is_active {
            assignment.is_active = false;
            assignment.updated_at = now.coerce();
            tx.execute(Update(assignment.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let is_rented = tx
            .execute(Select(By::<read::property::IsRented, _>::new(
                property_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let property = tx
            .execute(Select(By::<Option<Property>, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(mut property) = property {
            if property.sync_availability(*is_rented) {
                property.updated_at = now.coerce();
                tx.execute(Update(property))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
            }
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tracing::info!(%assignment_id, ended_by = %actor.id, "lease ended");

        Ok(assignment)
    }
}

/// Error of [`EndAssignment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Assignment`] doesn't exist or is out of scope.
    #[display("`Assignment(id: {_0})` does not exist")]
    #[from(ignore)]
    AssignmentNotExists(#[error(not(source))] assignment::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to end [`Assignment`]s.
    #[display("Ending `Assignment` is forbidden: {_0}")]
    Forbidden(policy::Forbidden),
}
