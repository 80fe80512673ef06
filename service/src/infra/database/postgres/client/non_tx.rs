//! [`NonTx`] client definitions.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

use super::impl_lazy_connection;

/// Non-transactional Postgres database client.
///
/// Acquires a pooled [`Connection`] on its first use only.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to acquire [`Connection`]s from.
    pub(crate) pool: connection::Pool,

    /// Acquired [`Connection`], if any.
    acquired: Arc<RwLock<Option<connection::NonTx>>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client acquiring its [`Connection`] from the
    /// provided [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self {
            pool,
            acquired: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the [`Connection`] of this [`NonTx`] client, acquiring it from
    /// the [`connection::Pool`] if not yet.
    pub(crate) async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::NonTx>, Traced<database::Error>>
    {
        if let Ok(conn) = RwLockReadGuard::try_map(
            self.acquired.read().await,
            Option::as_ref,
        ) {
            return Ok(conn);
        }

        let mut acquired = self.acquired.write().await;
        if acquired.is_none() {
            *acquired = Some(
                self.pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)?,
            );
        }
        Ok(RwLockReadGuard::map(acquired.downgrade(), |conn| {
            conn.as_ref().expect("acquired above")
        }))
    }

    /// Releases the acquired [`Connection`] of this [`NonTx`] client, so the
    /// next use acquires a new one.
    #[must_use]
    pub(crate) async fn release(&self) -> Option<connection::NonTx> {
        self.acquired.write().await.take()
    }
}

impl_lazy_connection!(NonTx);
