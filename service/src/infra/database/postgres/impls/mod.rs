//! [`Database`] implementations.

#![allow(
    clippy::items_after_statements,
    reason = "`const SQL` after statements"
)]
#![allow(clippy::too_many_lines, reason = "SQL-related code a bit verbose")]

mod assignment;
mod payment;
mod property;
mod reminder;
mod user;

use async_trait::async_trait;
use common::{
    operations::{Commit, Transact},
    pagination::Arguments,
};
use postgres_types::{FromSql, ToSql};
use refinery_core::{
    traits::r#async::{AsyncQuery, AsyncTransaction},
    AsyncMigrate, Migration,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    infra::{database, postgres, Database},
    policy::Scope,
};

use super::{NonTx, Postgres, Tx};

impl Database<Transact> for Postgres<NonTx> {
    type Ok = Postgres<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Postgres(Tx::from_non_tx(self.0.clone())))
    }
}

impl Database<Transact> for Postgres<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Postgres<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.commit().await.map_err(tracerr::wrap!())
    }
}

/// Renders an `AND ...` SQL condition restricting rows to the provided
/// [`Scope`], pushing the required parameter into the provided `ps`.
///
/// `agent` and `tenant` render the condition out of the index of the pushed
/// parameter. Nothing is rendered for [`Scope::All`].
fn scope_filter<'p>(
    scope: &'p Scope,
    ps: &mut Vec<&'p (dyn ToSql + Sync)>,
    agent: impl FnOnce(usize) -> String,
    tenant: impl FnOnce(usize) -> String,
) -> String {
    match scope {
        Scope::All => String::new(),
        Scope::Agent(id) => {
            ps.push(id);
            format!("AND {}", agent(ps.len()))
        }
        Scope::Tenant(id) => {
            ps.push(id);
            format!("AND {}", tenant(ps.len()))
        }
    }
}

/// Wraps the provided `matched` SQL (selecting `id` along with the columns
/// used in the provided `order`) into a query returning the `total` number
/// of matched rows and `ids` of the requested page of them.
///
/// `$1` and `$2` parameters are reserved for the page limit and offset.
fn page_sql(matched: &str, order: &str) -> String {
    format!(
        "WITH matched AS ({matched}) \
         SELECT (SELECT COUNT(*) FROM matched)::INT8 AS total, \
                ARRAY(\
                    SELECT id \
                    FROM matched \
                    ORDER BY {order} \
                    LIMIT $1::INT8 OFFSET $2::INT8\
                ) AS ids",
    )
}

/// Returns the page limit and offset parameters out of the provided
/// [`Arguments`].
fn page_bounds(arguments: &Arguments) -> (i64, i64) {
    (
        i64::try_from(arguments.limit()).unwrap(),
        i64::try_from(arguments.offset()).unwrap(),
    )
}

/// Parses the `total` and `ids` out of the provided [`page_sql()`] [`Row`].
fn page_ids<Id>(row: &Row) -> (u64, Vec<Id>)
where
    for<'r> Id: FromSql<'r>,
{
    let total = row.get::<_, i64>("total");
    (u64::try_from(total).unwrap_or_default(), row.get("ids"))
}

/// Converts the provided SQL `COUNT` into a [`u64`].
fn count(row: &Row, column: &str) -> u64 {
    u64::try_from(row.get::<_, i64>(column)).unwrap_or_default()
}

#[async_trait]
impl AsyncTransaction for Postgres {
    type Error = Traced<database::Error>;

    async fn execute(
        &mut self,
        queries: &[&str],
    ) -> Result<usize, Self::Error> {
        let mut conn = self
            .0
            .pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)?;
        AsyncTransaction::execute(&mut **conn, queries)
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }
}

#[async_trait]
impl AsyncQuery<Vec<Migration>> for Postgres {
    async fn query(
        &mut self,
        query: &str,
    ) -> Result<Vec<Migration>, <Self as AsyncTransaction>::Error> {
        let mut conn = self
            .0
            .pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)?;
        AsyncQuery::query(&mut **conn, query)
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }
}

impl AsyncMigrate for Postgres {}

#[cfg(test)]
mod spec {
    use postgres_types::ToSql;

    use super::{page_sql, scope_filter};
    use crate::{domain::user, policy::Scope};

    fn render(scope: &Scope) -> (String, usize) {
        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&1_i64, &0_i64];
        let sql = scope_filter(
            scope,
            &mut ps,
            |idx| format!("p.agent_id = ${idx}::UUID"),
            |idx| format!("a.tenant_id = ${idx}::UUID"),
        );
        (sql, ps.len())
    }

    #[test]
    fn renders_scope_filters() {
        let id = user::Id::new();

        assert_eq!(render(&Scope::All), (String::new(), 2));
        assert_eq!(
            render(&Scope::Agent(id)),
            ("AND p.agent_id = $3::UUID".into(), 3),
        );
        assert_eq!(
            render(&Scope::Tenant(id)),
            ("AND a.tenant_id = $3::UUID".into(), 3),
        );
    }

    #[test]
    fn wraps_page_query() {
        let sql = page_sql("SELECT id, created_at FROM t", "created_at DESC");

        assert!(sql.starts_with("WITH matched AS (SELECT id, created_at"));
        assert!(sql.contains("ORDER BY created_at DESC LIMIT $1::INT8"));
    }
}
