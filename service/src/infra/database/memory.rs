//! In-memory [`Database`] backing [`Command`] and [`Query`] tests.
//!
//! Locks and transactions are no-ops: every write is visible immediately.
//!
//! [`Command`]: crate::Command
//! [`Query`]: crate::Query

use std::{
    str::FromStr as _,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Update},
    Date, DateTime, Money, Month,
};
use tracerr::Traced;

use crate::{
    domain::{assignment, payment, property, user, Assignment, Payment},
    infra::{database, Database},
    policy::Scope,
    read::{self, assignment::Billable},
    Config, Service,
};

/// Shared in-memory state of leases and [`Payment`]s.
#[derive(Clone, Debug, Default)]
pub(crate) struct Memory(Arc<Mutex<State>>);

/// Contents of a [`Memory`] database.
#[derive(Debug, Default)]
struct State {
    /// Active leases along with the agents of their properties.
    leases: Vec<(user::Id, Billable)>,

    /// Issued [`Payment`]s.
    payments: Vec<Payment>,
}

impl State {
    /// Checks whether the [`Assignment`] with the provided ID is reachable
    /// within the provided [`Scope`].
    fn reaches(&self, id: assignment::Id, scope: Scope) -> bool {
        self.leases.iter().any(|(agent, b)| {
            b.assignment.id == id
                && match scope {
                    Scope::All => true,
                    Scope::Agent(a) => *agent == a,
                    Scope::Tenant(t) => b.assignment.tenant_id == t,
                }
        })
    }
}

impl Memory {
    /// Creates a new [`Service`] backed by this [`Memory`].
    pub(crate) fn service(&self) -> Service<Self> {
        let secret = b"secret";
        Service::new(
            Config {
                jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                    secret,
                ),
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    secret,
                ),
                access_token_ttl: Duration::from_secs(60),
                refresh_token_ttl: Duration::from_secs(3600),
            },
            self.clone(),
        )
    }

    /// Stores a new active lease of the provided tenant managed by the
    /// provided agent, returning its [`Assignment`] ID.
    pub(crate) fn lease(
        &self,
        agent: user::Id,
        tenant: user::Id,
        rent: &str,
    ) -> assignment::Id {
        let now = DateTime::now();
        let assignment = Assignment {
            id: assignment::Id::new(),
            tenant_id: tenant,
            property_id: property::Id::new(),
            agent_id: Some(agent),
            start_date: Date::today().coerce(),
            end_date: None,
            rent_amount: Money::from_str(rent).unwrap(),
            deposit: Money::ZERO,
            is_active: true,
            notes: assignment::Notes::new("").unwrap(),
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };
        let id = assignment.id;
        self.state().leases.push((
            agent,
            Billable {
                assignment,
                charges: Money::ZERO,
            },
        ));
        id
    }

    /// Returns all the stored [`Payment`]s.
    pub(crate) fn payments(&self) -> Vec<Payment> {
        self.state().payments.clone()
    }

    /// Locks the [`State`] of this [`Memory`].
    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Database<Transact> for Memory {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl<T> Database<Lock<T>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Lock<T>) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Select<By<Vec<Billable>, Scope>>> for Memory {
    type Ok = Vec<Billable>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Billable>, Scope>>,
    ) -> Result<Self::Ok, Self::Err> {
        let scope = by.into_inner();
        let state = self.state();
        Ok(state
            .leases
            .iter()
            .filter(|(_, b)| state.reaches(b.assignment.id, scope))
            .map(|(_, b)| b.clone())
            .collect())
    }
}

impl Database<Select<By<Option<Payment>, (assignment::Id, Month)>>>
    for Memory
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, (assignment::Id, Month)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (id, month) = by.into_inner();
        Ok(self
            .state()
            .payments
            .iter()
            .find(|p| p.assignment_id == id && p.due_date.month() == month)
            .cloned())
    }
}

impl Database<Select<By<Option<Payment>, (payment::Id, Scope)>>> for Memory {
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, (payment::Id, Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (id, scope) = by.into_inner();
        let state = self.state();
        Ok(state
            .payments
            .iter()
            .find(|p| p.id == id && state.reaches(p.assignment_id, scope))
            .cloned())
    }
}

impl Database<Select<By<read::payment::ReceiptCount, Month>>> for Memory {
    type Ok = read::payment::ReceiptCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::payment::ReceiptCount, Month>>,
    ) -> Result<Self::Ok, Self::Err> {
        let month = by.into_inner();
        let count = self
            .state()
            .payments
            .iter()
            .filter(|p| {
                p.receipt_number.is_some()
                    && p.created_at.date::<()>().month() == month
            })
            .count();
        Ok(read::payment::ReceiptCount(
            u32::try_from(count).unwrap_or(u32::MAX),
        ))
    }
}

impl Database<Insert<Payment>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.state().payments.push(payment);
        Ok(())
    }
}

impl Database<Update<Payment>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state();
        if let Some(p) =
            state.payments.iter_mut().find(|p| p.id == payment.id)
        {
            *p = payment;
        }
        Ok(())
    }
}
