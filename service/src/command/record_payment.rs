//! [`Command`] for recording a settled [`Payment`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Date, DateTime, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::payment::{Method, Notes, SettlementDate, Status};
use crate::{
    domain::{payment, Payment},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read, Service,
};

use super::{prepare_payment, Command};

/// [`Command`] for recording a [`Payment`] as [`Status::Paid`] on behalf of
/// its tenant.
///
/// Recording an already [`Status::Paid`] [`Payment`] keeps its
/// [`payment::ReceiptNumber`].
#[derive(Clone, Debug)]
pub struct RecordPayment {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Payment`] to record.
    pub payment_id: payment::Id,

    /// [`SettlementDate`] of the [`Payment`].
    ///
    /// Today, if [`None`].
    pub payment_date: Option<payment::SettlementDate>,

    /// [`Method`] the [`Payment`] was settled with.
    ///
    /// [`Method::Other`], if [`None`].
    pub method: Option<payment::Method>,

    /// New [`Notes`] on the [`Payment`], if changed.
    pub notes: Option<payment::Notes>,
}

impl<Db> Command<RecordPayment> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Payment>, (payment::Id, Scope)>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::payment::ReceiptCount, Month>>,
            Ok = read::payment::ReceiptCount,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Payment, payment::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<read::payment::ReceiptCount, Month>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Update<Payment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RecordPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RecordPayment {
            actor,
            payment_id,
            payment_date,
            method,
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

        // Avoid concurrent actions upon the same `Payment`.
        tx.execute(Lock(By::<Payment, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut payment = tx
            .execute(Select(By::new((payment_id, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(payment_id))
            .map_err(tracerr::wrap!())?;

        payment.settle(
            payment_date.unwrap_or_else(|| Date::today().coerce()),
            method.unwrap_or(payment::Method::Other),
        );
        if let Some(notes) = notes {
            payment.notes = notes;
        }
        payment.updated_at = DateTime::now().coerce();

        prepare_payment(&tx, &mut payment)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Update(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tracing::info!(
            %payment_id,
            receipt_number = ?payment.receipt_number,
            recorded_by = %actor.id,
            "payment recorded",
        );

        Ok(payment)
    }
}

/// Error of [`RecordPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to record [`Payment`]s.
    #[display("Recording `Payment` is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`Payment`] doesn't exist or is out of scope.
    #[display("`Payment(id: {_0})` does not exist")]
    #[from(ignore)]
    PaymentNotExists(#[error(not(source))] payment::Id),
}
