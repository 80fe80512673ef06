//! [`Command`] for updating a [`Payment`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime, Money, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::payment::{
    AlreadyPaid, DueDate, Method, Notes, SettlementDate, Status,
};
use crate::{
    domain::{payment, Payment},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read, Service,
};

use super::{prepare_payment, Command};

/// [`Command`] for updating a [`Payment`].
///
/// The [`Status`] of the [`Payment`] is re-derived afterwards.
#[derive(Clone, Debug)]
pub struct UpdatePayment {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Payment`] to update.
    pub payment_id: payment::Id,

    /// New amount due, if changed.
    pub amount: Option<Money>,

    /// New [`DueDate`], if changed.
    pub due_date: Option<payment::DueDate>,

    /// New [`Status`], if changed.
    ///
    /// Setting [`Status::Paid`] requires both a [`SettlementDate`] and a
    /// [`Method`] to be known.
    pub status: Option<payment::Status>,

    /// New [`SettlementDate`], if changed.
    pub payment_date: Option<payment::SettlementDate>,

    /// New [`Method`], if changed.
    pub method: Option<payment::Method>,

    /// New [`Notes`], if changed.
    pub notes: Option<payment::Notes>,
}

impl<Db> Command<UpdatePayment> for Service<Db>
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
        cmd: UpdatePayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdatePayment {
            actor,
            payment_id,
            amount,
            due_date,
            status,
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

        apply_changes(
            &mut payment,
            Changes {
                amount,
                due_date,
                status,
                payment_date,
                method,
                notes,
            },
        )
        .map_err(tracerr::wrap!())?;
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

        Ok(payment)
    }
}

/// Changes requested by an [`UpdatePayment`] [`Command`].
struct Changes {
    amount: Option<Money>,
    due_date: Option<payment::DueDate>,
    status: Option<payment::Status>,
    payment_date: Option<payment::SettlementDate>,
    method: Option<payment::Method>,
    notes: Option<payment::Notes>,
}

/// Applies the provided [`Changes`] to the provided [`Payment`].
fn apply_changes(
    payment: &mut Payment,
    changes: Changes,
) -> Result<(), Traced<ExecutionError>> {
    use ExecutionError as E;

    let Changes {
        amount,
        due_date,
        status,
        payment_date,
        method,
        notes,
    } = changes;

    if let Some(amount) = amount {
        payment.amount = amount;
    }
    if let Some(date) = due_date {
        payment.due_date = date;
    }
    if let Some(notes) = notes {
        payment.notes = notes;
    }

    match status {
        Some(payment::Status::Paid) => {
            let date = payment_date
                .or(payment.payment_date)
                .ok_or(E::PaymentDetailsRequired("payment_date"))
                .map_err(tracerr::wrap!())?;
            let method = method
                .or(payment.method)
                .ok_or(E::PaymentDetailsRequired("payment_method"))
                .map_err(tracerr::wrap!())?;
            payment.settle(date, method);
        }
        Some(status) => {
            payment
                .set_status(status)
                .map_err(tracerr::from_and_wrap!(=> E))?;
            if let Some(date) = payment_date {
                payment.payment_date = Some(date);
            }
            if let Some(method) = method {
                payment.method = Some(method);
            }
        }
        None => {
            if let Some(date) = payment_date {
                payment.payment_date = Some(date);
            }
            if let Some(method) = method {
                payment.method = Some(method);
            }
        }
    }
    Ok(())
}

/// Error of [`UpdatePayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Payment`] is [`Status::Paid`] already.
    AlreadyPaid(payment::AlreadyPaid),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to update [`Payment`]s.
    #[display("`Payment` update is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// Field required for settling a [`Payment`] is missing.
    #[display("`{_0}` is required for a paid `Payment`")]
    #[from(ignore)]
    PaymentDetailsRequired(#[error(not(source))] &'static str),

    /// [`Payment`] doesn't exist or is out of scope.
    #[display("`Payment(id: {_0})` does not exist")]
    #[from(ignore)]
    PaymentNotExists(#[error(not(source))] payment::Id),
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{Date, DateTime, Money};

    use super::{apply_changes, Changes, ExecutionError};
    use crate::domain::{
        assignment,
        payment::{self, Method, Status},
        Payment,
    };

    fn payment(status: Status) -> Payment {
        Payment {
            id: payment::Id::new(),
            assignment_id: assignment::Id::new(),
            amount: Money::from_str("900").unwrap(),
            due_date: "2025-03-05".parse::<Date>().unwrap().coerce(),
            payment_date: None,
            status,
            method: None,
            reference: payment::Reference::new(),
            receipt_number: None,
            notes: payment::Notes::new("").unwrap(),
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
        }
    }

    fn changes(status: Option<Status>) -> Changes {
        Changes {
            amount: None,
            due_date: None,
            status,
            payment_date: None,
            method: None,
            notes: None,
        }
    }

    #[test]
    fn paid_status_requires_details() {
        let mut p = payment(Status::Pending);

        let err = apply_changes(&mut p, changes(Some(Status::Paid)))
            .unwrap_err()
            .into_inner();
        assert!(matches!(
            err,
            ExecutionError::PaymentDetailsRequired("payment_date"),
        ));

        let mut c = changes(Some(Status::Paid));
        c.payment_date = Some("2025-03-01".parse::<Date>().unwrap().coerce());
        let err = apply_changes(&mut p, c).unwrap_err().into_inner();
        assert!(matches!(
            err,
            ExecutionError::PaymentDetailsRequired("payment_method"),
        ));
    }

    #[test]
    fn settles_with_details() {
        let mut p = payment(Status::Overdue);
        let mut c = changes(Some(Status::Paid));
        c.payment_date = Some("2025-03-10".parse::<Date>().unwrap().coerce());
        c.method = Some(Method::Check);

        apply_changes(&mut p, c).unwrap();

        assert_eq!(p.status, Status::Paid);
        assert_eq!(p.method, Some(Method::Check));
        assert!(p.needs_receipt());
    }

    #[test]
    fn paid_cannot_become_pending() {
        let mut p = payment(Status::Paid);

        let err = apply_changes(&mut p, changes(Some(Status::Pending)))
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::AlreadyPaid(_)));
        assert_eq!(p.status, Status::Paid);
    }
}
