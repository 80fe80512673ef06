//! [`Query`] definition.

pub mod assignment;
pub mod dashboard;
pub mod payment;
pub mod property;
pub mod tenant;
pub mod user;

use std::marker::PhantomData;

use common::operations::{By, Select};
use derive_more::{Display, Error as StdError, From};
use tracerr::Traced;

use crate::{
    infra::{database, Database},
    policy::{self, Actor, Rule, Scope},
    Service,
};

pub use self::dashboard::Dashboard;

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`].
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<T>(T);

impl<W, B> DatabaseQuery<By<W, B>> {
    /// Creates a new [`DatabaseQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, W, B> Query<DatabaseQuery<By<W, B>>> for Service<Db>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(by): DatabaseQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(by))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`] within the [`Scope`]
/// an [`Actor`] is allowed by the `R`ule.
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct ScopedQuery<R, T> {
    /// [`Actor`] performing this [`ScopedQuery`].
    actor: Actor,

    /// Selector to be narrowed down to the [`Scope`].
    select: T,

    /// [`Rule`] resolving the [`Scope`].
    _rule: PhantomData<R>,
}

impl<R, W, B> ScopedQuery<R, By<W, B>> {
    /// Creates a new [`ScopedQuery`] selecting a `W` by the provided `B` on
    /// behalf of the provided [`Actor`].
    #[must_use]
    pub fn by(actor: Actor, by: B) -> Self {
        Self {
            actor,
            select: By::new(by),
            _rule: PhantomData,
        }
    }
}

impl<Db, R, W, B> Query<ScopedQuery<R, By<W, B>>> for Service<Db>
where
    R: Rule,
    Db: Database<
        Select<By<W, (B, Scope)>>,
        Ok = W,
        Err = Traced<database::Error>,
    >,
{
    type Ok = W;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        query: ScopedQuery<R, By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ScopedQuery { actor, select, .. } = query;

        let scope = actor
            .authorize::<R>()
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        self.database()
            .execute(Select(By::new((select.into_inner(), scope))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> Error))
    }
}

/// Error of a [`Query`] performed on behalf of an [`Actor`].
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Actor`] is not allowed to perform the [`Query`].
    #[display("`Query` is forbidden: {_0}")]
    Forbidden(policy::Forbidden),
}
