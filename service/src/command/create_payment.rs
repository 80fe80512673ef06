//! [`Command`] for creating a new [`Payment`].

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted},
    DateTime, Money, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::payment::{DueDate, Notes};
use crate::{
    domain::{assignment, payment, Assignment, Payment},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read, Service,
};

use super::{prepare_payment, Command};

/// [`Command`] for creating a new [`Payment`] of an active [`Assignment`].
#[derive(Clone, Debug)]
pub struct CreatePayment {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Assignment`] a new [`Payment`] belongs to.
    pub assignment_id: assignment::Id,

    /// Amount due.
    pub amount: Money,

    /// [`DueDate`] of a new [`Payment`].
    pub due_date: payment::DueDate,

    /// [`Notes`] on a new [`Payment`].
    pub notes: payment::Notes,
}

impl<Db> Command<CreatePayment> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Assignment>, (assignment::Id, Scope)>>,
            Ok = Option<Assignment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::payment::ReceiptCount, Month>>,
            Ok = read::payment::ReceiptCount,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Assignment, assignment::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<read::payment::ReceiptCount, Month>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreatePayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreatePayment {
            actor,
            assignment_id,
            amount,
            due_date,
            notes,
        } = cmd;

        let scope = actor
            .authorize::<policy::payment::Manage>()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Assignment`.
        tx.execute(Lock(By::<Assignment, _>::new(assignment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let assignment = tx
            .execute(Select(By::new((assignment_id, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AssignmentNotExists(assignment_id))
            .map_err(tracerr::wrap!())?;
        if !assignment.is_active {
            return Err(tracerr::new!(E::AssignmentInactive(assignment_id)));
        }

        let now = DateTime::now();
        let mut payment = Payment {
            id: payment::Id::new(),
            assignment_id,
            amount,
            due_date,
            payment_date: None,
            status: payment::Status::Pending,
            method: None,
            reference: payment::Reference::new(),
            receipt_number: None,
            notes,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };
        prepare_payment(&tx, &mut payment)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(payment)
    }
}

/// Error of [`CreatePayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Assignment`] is not active anymore.
    #[display("`Assignment(id: {_0})` is not active")]
    #[from(ignore)]
    AssignmentInactive(#[error(not(source))] assignment::Id),

    /// [`Assignment`] doesn't exist or is out of scope.
    #[display("`Assignment(id: {_0})` does not exist")]
    #[from(ignore)]
    AssignmentNotExists(#[error(not(source))] assignment::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to create [`Payment`]s.
    #[display("`Payment` creation is forbidden: {_0}")]
    Forbidden(policy::Forbidden),
}
