//! [`Command`] for generating monthly rent [`Payment`]s.

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted},
    Date, DateTime, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{payment::DueDate, Assignment};
use crate::{
    domain::{assignment, payment, Payment},
    infra::{database, Database},
    policy::{self, Actor, Scope},
    read, Service,
};

use super::{prepare_payment, Command};

/// Day of month [`Payment`]s are due at, if not specified.
pub const DEFAULT_DUE_DAY: u8 = 5;

/// [`Command`] for issuing a rent [`Payment`] for every active
/// [`Assignment`] in scope, unless one is due in the target [`Month`]
/// already.
///
/// The whole batch is persisted atomically.
#[derive(Clone, Copy, Debug)]
pub struct GenerateMonthlyPayments {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// [`Month`] to generate [`Payment`]s for.
    ///
    /// The month following the current one, if [`None`].
    pub month: Option<Month>,

    /// Day of the [`Month`] the [`Payment`]s are due at.
    ///
    /// Clamped into `1..=28`, and [`DEFAULT_DUE_DAY`] if [`None`].
    pub day: Option<u8>,
}

/// Output of [`GenerateMonthlyPayments`] [`Command`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Output {
    /// Number of created [`Payment`]s.
    pub created: u64,

    /// Number of [`Assignment`]s skipped for having a [`Payment`] in the
    /// target [`Month`] already.
    pub skipped: u64,

    /// [`DueDate`] of the created [`Payment`]s.
    pub due_date: payment::DueDate,
}

impl<Db> Command<GenerateMonthlyPayments> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Vec<read::assignment::Billable>, Scope>>,
            Ok = Vec<read::assignment::Billable>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, (assignment::Id, Month)>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::payment::ReceiptCount, Month>>,
            Ok = read::payment::ReceiptCount,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<assignment::Assignment, assignment::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<read::payment::ReceiptCount, Month>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: GenerateMonthlyPayments,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let GenerateMonthlyPayments { actor, month, day } = cmd;

        let scope = actor
            .authorize::<policy::payment::Generate>()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let due_date = due_date(Date::today(), month, day);
        let month = due_date.month();

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let billables = tx
            .execute(Select(By::new(scope)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let (mut created, mut skipped) = (0, 0);
        for billable in billables {
            let assignment_id = billable.assignment.id;

            // Avoid concurrent payments issuing for the same `Assignment`.
            tx.execute(Lock(By::new(assignment_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let existing = tx
                .execute(Select(By::<Option<Payment>, _>::new((
                    assignment_id,
                    month,
                ))))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if existing.is_some() {
                skipped += 1;
                continue;
            }

            let now = DateTime::now();
            let mut payment = Payment {
                id: payment::Id::new(),
                assignment_id,
                amount: billable.amount(),
                due_date,
                payment_date: None,
                status: payment::Status::Pending,
                method: None,
                reference: payment::Reference::new(),
                receipt_number: None,
                notes: payment::Notes::for_rent_of(month),
                created_at: now.coerce(),
                updated_at: now.coerce(),
            };
            prepare_payment(&tx, &mut payment)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            tx.execute(Insert(payment))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            created += 1;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tracing::info!(
            %month,
            created,
            skipped,
            generated_by = %actor.id,
            "monthly payments generated",
        );

        Ok(Output {
            created,
            skipped,
            due_date,
        })
    }
}

/// Computes the [`DueDate`] of the [`Payment`]s generated in the provided
/// [`Month`] at the provided day, relatively to the provided `today`.
#[must_use]
pub fn due_date(
    today: Date,
    month: Option<Month>,
    day: Option<u8>,
) -> payment::DueDate {
    month
        .unwrap_or_else(|| Month::following(today))
        .day(day.unwrap_or(DEFAULT_DUE_DAY))
}

/// Error of [`GenerateMonthlyPayments`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to generate [`Payment`]s.
    #[display("`Payment`s generation is forbidden: {_0}")]
    Forbidden(policy::Forbidden),
}

#[cfg(test)]
mod spec {
    use common::{Date, Month};
    use futures::executor::block_on;

    use crate::{
        domain::user::{self, Role},
        infra::database::memory::Memory,
        Actor, Command as _,
    };

    use super::{due_date, GenerateMonthlyPayments};

    fn generate(
        actor: Actor,
        month: Option<Month>,
    ) -> GenerateMonthlyPayments {
        GenerateMonthlyPayments {
            actor,
            month,
            day: None,
        }
    }

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn defaults_to_5th_of_next_month() {
        assert_eq!(
            due_date(date("2025-01-31"), None, None).to_string(),
            "2025-02-05",
        );
    }

    #[test]
    fn defaults_across_year_boundary() {
        assert_eq!(
            due_date(date("2024-12-15"), None, None).to_string(),
            "2025-01-05",
        );
    }

    #[test]
    fn clamps_due_day() {
        let month = Month::new(2025, 2);

        assert_eq!(
            due_date(date("2025-01-10"), month, Some(31)).to_string(),
            "2025-02-28",
        );
        assert_eq!(
            due_date(date("2025-01-10"), month, Some(0)).to_string(),
            "2025-02-01",
        );
        assert_eq!(
            due_date(date("2025-01-10"), month, Some(15)).to_string(),
            "2025-02-15",
        );
    }

    #[test]
    fn uses_requested_month() {
        assert_eq!(
            due_date(date("2025-01-10"), Month::parse_lenient("2025-06"), None)
                .to_string(),
            "2025-06-05",
        );
        assert_eq!(
            due_date(date("2025-01-10"), Month::parse_lenient("bogus"), None)
                .to_string(),
            "2025-02-05",
        );
    }

    #[test]
    fn generates_once_per_lease_and_month() {
        let db = Memory::default();
        let service = db.service();
        let admin = Actor {
            id: user::Id::new(),
            role: Role::Admin,
        };
        let (agent, other) = (user::Id::new(), user::Id::new());
        _ = db.lease(agent, user::Id::new(), "800");
        _ = db.lease(agent, user::Id::new(), "650.50");
        _ = db.lease(other, user::Id::new(), "1200");
        let month = Month::new(2031, 3);

        let out = block_on(service.execute(generate(admin, month))).unwrap();
        assert_eq!((out.created, out.skipped), (3, 0));
        assert_eq!(out.due_date.to_string(), "2031-03-05");

        let out = block_on(service.execute(generate(admin, month))).unwrap();
        assert_eq!((out.created, out.skipped), (0, 3));
        assert_eq!(db.payments().len(), 3);

        let next = Month::new(2031, 4);
        let out = block_on(service.execute(generate(admin, next))).unwrap();
        assert_eq!((out.created, out.skipped), (3, 0));
        assert_eq!(db.payments().len(), 6);
    }

    #[test]
    fn generates_within_agent_scope_only() {
        let db = Memory::default();
        let service = db.service();
        let (agent, other) = (user::Id::new(), user::Id::new());
        let own = db.lease(agent, user::Id::new(), "800");
        _ = db.lease(other, user::Id::new(), "1200");
        let actor = Actor {
            id: agent,
            role: Role::Agent,
        };

        let out = block_on(service.execute(generate(actor, None))).unwrap();

        assert_eq!((out.created, out.skipped), (1, 0));
        let payments = db.payments();
        assert_eq!(payments[0].assignment_id, own);
        assert_eq!(payments[0].amount.to_string(), "800.00");
        assert!(payments[0].receipt_number.is_none());
    }

    #[test]
    fn forbids_tenants_to_generate() {
        let db = Memory::default();
        let tenant = Actor {
            id: user::Id::new(),
            role: Role::Tenant,
        };

        let res = block_on(db.service().execute(generate(tenant, None)));

        assert!(res.is_err());
        assert!(db.payments().is_empty());
    }
}
