//! [`Tx`] client definitions.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

use super::{impl_lazy_connection, NonTx};

/// Transactional Postgres database client.
///
/// Begins its transaction on the first use only, reusing the
/// [`Connection`] already acquired by the [`NonTx`] client it was created
/// from, if any.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to acquire a [`Connection`] from.
    pool: connection::Pool,

    /// Shared state of this [`Tx`] client and its clones.
    state: Arc<State>,
}

/// Shared state of a [`Tx`] client.
#[derive(Debug)]
struct State {
    /// [`NonTx`] client to reuse the [`Connection`] of, until the transaction
    /// begins.
    origin: Mutex<Option<NonTx>>,

    /// Running [`connection::Tx`], if begun and not committed yet.
    running: RwLock<Option<connection::Tx>>,
}

impl Tx {
    /// Creates a new [`Tx`] client out of the provided [`NonTx`] client.
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            pool: client.pool.clone(),
            state: Arc::new(State {
                origin: Mutex::new(Some(client)),
                running: RwLock::new(None),
            }),
        }
    }

    /// Returns the running [`connection::Tx`] of this [`Tx`] client, beginning
    /// it if not yet.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        if let Ok(tx) = RwLockReadGuard::try_map(
            self.state.running.read().await,
            Option::as_ref,
        ) {
            return Ok(tx);
        }

        let mut running = self.state.running.write().await;
        if running.is_none() {
            let reused = match self.state.origin.lock().await.take() {
                Some(client) => client.release().await,
                None => None,
            };
            let conn = match reused {
                Some(conn) => conn,
                None => self
                    .pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)?,
            };
            *running = Some(
                connection::Tx::begin(conn)
                    .await
                    .map_err(tracerr::wrap!())?,
            );
        }
        Ok(RwLockReadGuard::map(running.downgrade(), |tx| {
            tx.as_ref().expect("begun above")
        }))
    }

    /// Commits the transaction of this [`Tx`] client.
    ///
    /// Does nothing if the transaction hasn't begun.
    ///
    /// # Errors
    ///
    /// If failed to commit the transaction.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let running = self.state.running.write().await.take();
        match running {
            Some(tx) => tx.commit().await.map_err(tracerr::wrap!()),
            None => Ok(()),
        }
    }
}

impl_lazy_connection!(Tx);
