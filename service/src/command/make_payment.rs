//! [`Command`] for paying a [`Payment`] by its tenant.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Date, DateTime, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::payment::{Method, Status};
use crate::{
    domain::{payment, Payment},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read, Service,
};

use super::{prepare_payment, Command};

/// [`Command`] for paying a [`Payment`] by its tenant today.
///
/// No money is moved: the [`Payment`] is only declared [`Status::Paid`].
#[derive(Clone, Copy, Debug)]
pub struct MakePayment {
    /// Tenant [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`Payment`] to pay.
    pub payment_id: payment::Id,

    /// [`Method`] the [`Payment`] is settled with.
    ///
    /// [`Method::Card`], if [`None`].
    pub method: Option<payment::Method>,
}

impl<Db> Command<MakePayment> for Service<Db>
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

    async fn execute(&self, cmd: MakePayment) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let MakePayment {
            actor,
            payment_id,
            method,
        } = cmd;

        let scope = actor
            .authorize::<policy::payment::Pay>()
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
        if payment.status == payment::Status::Paid {
            return Err(tracerr::new!(E::AlreadyPaid(payment::AlreadyPaid(
                payment_id,
            ))));
        }

        payment.settle(
            Date::today().coerce(),
            method.unwrap_or(payment::Method::Card),
        );
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
            "payment made by tenant",
        );

        Ok(payment)
    }
}

/// Error of [`MakePayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Payment`] is [`Status::Paid`] already.
    AlreadyPaid(payment::AlreadyPaid),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not a tenant.
    #[display("Paying is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`Payment`] doesn't exist or is not due by the tenant.
    #[display("`Payment(id: {_0})` does not exist")]
    #[from(ignore)]
    PaymentNotExists(#[error(not(source))] payment::Id),
}

#[cfg(test)]
mod spec {
    use common::{Date, Month};
    use futures::executor::block_on;

    use crate::{
        command::GenerateMonthlyPayments,
        domain::{
            payment::{self, ReceiptNumber},
            user::{self, Role},
        },
        infra::database::memory::Memory,
        Actor, Command as _,
    };

    use super::{ExecutionError, MakePayment};

    fn actor(id: user::Id, role: Role) -> Actor {
        Actor { id, role }
    }

    #[test]
    fn issues_sequential_receipts() {
        let db = Memory::default();
        let service = db.service();
        let agent = user::Id::new();
        let leases = [(); 3].map(|()| {
            let tenant = user::Id::new();
            (tenant, db.lease(agent, tenant, "700"))
        });
        _ = block_on(service.execute(GenerateMonthlyPayments {
            actor: actor(agent, Role::Agent),
            month: Month::new(2031, 1),
            day: None,
        }))
        .unwrap();

        let month = Date::today().month();
        for (n, (tenant, lease)) in (1..).zip(leases) {
            let id = db
                .payments()
                .into_iter()
                .find(|p| p.assignment_id == lease)
                .map(|p| p.id)
                .unwrap();
            let paid = block_on(service.execute(MakePayment {
                actor: actor(tenant, Role::Tenant),
                payment_id: id,
                method: None,
            }))
            .unwrap();

            assert_eq!(paid.status, payment::Status::Paid);
            assert_eq!(paid.method, Some(payment::Method::Card));
            assert_eq!(
                paid.receipt_number,
                Some(ReceiptNumber::new(month, n)),
            );
        }
    }

    #[test]
    fn keeps_receipt_when_paid_twice() {
        let db = Memory::default();
        let service = db.service();
        let tenant = user::Id::new();
        _ = db.lease(user::Id::new(), tenant, "700");
        _ = block_on(service.execute(GenerateMonthlyPayments {
            actor: actor(user::Id::new(), Role::Admin),
            month: Month::new(2031, 1),
            day: None,
        }))
        .unwrap();
        let id = db.payments()[0].id;
        let pay = MakePayment {
            actor: actor(tenant, Role::Tenant),
            payment_id: id,
            method: Some(payment::Method::BankTransfer),
        };

        let receipt = block_on(service.execute(pay)).unwrap().receipt_number;
        let err = block_on(service.execute(pay)).unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AlreadyPaid(_)));
        assert_eq!(db.payments()[0].receipt_number, receipt);
    }

    #[test]
    fn hides_payments_of_other_tenants() {
        let db = Memory::default();
        let service = db.service();
        _ = db.lease(user::Id::new(), user::Id::new(), "700");
        _ = block_on(service.execute(GenerateMonthlyPayments {
            actor: actor(user::Id::new(), Role::Admin),
            month: Month::new(2031, 1),
            day: None,
        }))
        .unwrap();

        let err = block_on(service.execute(MakePayment {
            actor: actor(user::Id::new(), Role::Tenant),
            payment_id: db.payments()[0].id,
            method: None,
        }))
        .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::PaymentNotExists(_),
        ));
    }
}
