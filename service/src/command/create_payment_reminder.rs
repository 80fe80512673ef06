//! [`Command`] for sending a [`Reminder`] about a [`Payment`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{payment::Status, reminder::Message};
use crate::{
    domain::{payment, reminder, Payment, Reminder},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    Service,
};

use super::Command;

/// [`Command`] for sending a [`Reminder`] about an unpaid [`Payment`].
#[derive(Clone, Debug)]
pub struct CreatePaymentReminder {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Payment`] to remind about.
    pub payment_id: payment::Id,

    /// [`reminder::Kind`] of a new [`Reminder`].
    pub kind: reminder::Kind,

    /// [`Message`] of a new [`Reminder`].
    ///
    /// Composed out of the [`Payment`] details, if [`None`].
    pub message: Option<reminder::Message>,
}

impl<Db> Command<CreatePaymentReminder> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Payment>, (payment::Id, Scope)>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<Reminder>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Reminder;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreatePaymentReminder,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreatePaymentReminder {
            actor,
            payment_id,
            kind,
            message,
        } = cmd;

        let scope = actor
            .authorize::<policy::payment::Manage>()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let payment = tx
            .execute(Select(By::new((payment_id, scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(payment_id))
            .map_err(tracerr::wrap!())?;
        if payment.status == payment::Status::Paid {
            return Err(tracerr::new!(E::AlreadyPaid(payment::AlreadyPaid(
                payment_id,
            ))));
        }

        let reminder = Reminder {
            id: reminder::Id::new(),
            payment_id,
            kind,
            message: message.unwrap_or_else(|| {
                reminder::Message::default_for(kind, &payment)
            }),
            sent_at: DateTime::now().coerce(),
        };

        tx.execute(Insert(reminder.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(reminder)
    }
}

/// Error of [`CreatePaymentReminder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Payment`] is [`Status::Paid`] already.
    AlreadyPaid(payment::AlreadyPaid),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to send [`Reminder`]s.
    #[display("Sending `Reminder` is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`Payment`] doesn't exist or is out of scope.
    #[display("`Payment(id: {_0})` does not exist")]
    #[from(ignore)]
    PaymentNotExists(#[error(not(source))] payment::Id),
}
