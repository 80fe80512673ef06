//! [`Command`] for updating an [`Assignment`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::assignment::{EndDate, Notes, StartDate};
use crate::{
    domain::{assignment, Assignment},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    Service,
};

use super::Command;

/// [`Command`] for updating the terms of an [`Assignment`].
#[derive(Clone, Debug)]
pub struct UpdateAssignment {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Assignment`] to update.
    pub assignment_id: assignment::Id,

    /// New [`StartDate`], if changed.
    pub start_date: Option<assignment::StartDate>,

    /// New [`EndDate`], if changed.
    ///
    /// `Some(None)` makes the [`Assignment`] open-ended.
    pub end_date: Option<Option<assignment::EndDate>>,

    /// New monthly rent, if changed.
    pub rent_amount: Option<Money>,

    /// New security deposit, if changed.
    pub deposit: Option<Money>,

    /// New [`Notes`], if changed.
    pub notes: Option<assignment::Notes>,
}

impl<Db> Command<UpdateAssignment> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Assignment>, (assignment::Id, Scope)>>,
            Ok = Option<Assignment>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Assignment, assignment::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Update<Assignment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Assignment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateAssignment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateAssignment {
            actor,
            assignment_id,
            start_date,
            end_date,
            rent_amount,
            deposit,
            notes,
        } = cmd;

        let scope = actor
            .authorize::<policy::assignment::Manage>()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Assignment`.
        tx.execute(Lock(By::new(assignment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut assignment = tx
            .execute(Select(By::new((assignment_id, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AssignmentNotExists(assignment_id))
            .map_err(tracerr::wrap!())?;

        if let Some(date) = start_date {
            assignment.start_date = date;
        }
        if let Some(date) = end_date {
            assignment.end_date = date;
        }
        if !assignment.has_valid_period() {
            return Err(tracerr::new!(E::InvalidPeriod));
        }
        if let Some(amount) = rent_amount {
            assignment.rent_amount = amount;
        }
        if let Some(amount) = deposit {
            assignment.deposit = amount;
        }
        if let Some(notes) = notes {
            assignment.notes = notes;
        }
        assignment.updated_at = DateTime::now().coerce();

        tx.execute(Update(assignment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(assignment)
    }
}

/// Error of [`UpdateAssignment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Assignment`] doesn't exist or is out of scope.
    #[display("`Assignment(id: {_0})` does not exist")]
    #[from(ignore)]
    AssignmentNotExists(#[error(not(source))] assignment::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to update [`Assignment`]s.
    #[display("`Assignment` update is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`EndDate`] is before [`StartDate`].
    #[display("`end_date` must not precede `start_date`")]
    InvalidPeriod,
}
