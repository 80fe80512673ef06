//! [`Assignment`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Lock, Select, Update};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{assignment, property, user, Assignment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    policy::Scope,
    read::{self, Active},
};

use super::{page_bounds, page_ids, page_sql, scope_filter};

/// Columns of the `tenant_assignments` table, prefixed with `a.`.
const COLUMNS: &str = "\
    a.id, a.tenant_id, a.property_id, a.agent_id, \
    a.start_date, a.end_date, a.rent_amount, a.deposit, \
    a.is_active, a.notes, a.created_at, a.updated_at";

/// Parses an [`Assignment`] out of the provided [`Row`] selected with
/// [`COLUMNS`].
fn from_row(row: &Row) -> Assignment {
    Assignment {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        property_id: row.get("property_id"),
        agent_id: row.get("agent_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        rent_amount: row.get("rent_amount"),
        deposit: row.get("deposit"),
        is_active: row.get("is_active"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Renders an `AND ...` condition narrowing `a` [`Assignment`]s (joined
/// with their `p` properties) to the provided [`Scope`].
fn scoped<'p>(
    scope: &'p Scope,
    ps: &mut Vec<&'p (dyn ToSql + Sync)>,
) -> String {
    scope_filter(
        scope,
        ps,
        |idx| format!("p.agent_id = ${idx}::UUID"),
        |idx| format!("a.tenant_id = ${idx}::UUID"),
    )
}

impl<C, IDs> Database<Select<By<HashMap<assignment::Id, Assignment>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[assignment::Id]>,
{
    type Ok = HashMap<assignment::Id, Assignment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<assignment::Id, Assignment>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[assignment::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM tenant_assignments a \
             WHERE a.id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
             LIMIT $2::INT4",
        );
        Ok(self
            .query(&sql, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                let assignment = from_row(row);
                (assignment.id, assignment)
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Assignment>, assignment::Id>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<assignment::Id, Assignment>, [assignment::Id; 1]>>,
        Ok = HashMap<assignment::Id, Assignment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Assignment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Assignment>, assignment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<Option<Assignment>, (assignment::Id, Scope)>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Assignment>, assignment::Id>>,
        Ok = Option<Assignment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Assignment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Assignment>, (assignment::Id, Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (id, scope) = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&id];
        let sql = format!(
            "SELECT a.id \
             FROM tenant_assignments a \
             JOIN properties p ON p.id = a.property_id \
             WHERE a.id = $1::UUID \
                   {scope}",
            scope = scoped(&scope, &mut ps),
        );
        if self
            .query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .is_none()
        {
            return Ok(None);
        }

        self.execute(Select(By::new(id)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<Active<Assignment>>, user::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Active<Assignment>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Active<Assignment>>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let tenant_id: user::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM tenant_assignments a \
             WHERE a.tenant_id = $1::UUID \
               AND a.is_active \
             ORDER BY a.start_date DESC, a.id DESC \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&tenant_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|r| r.as_ref().map(from_row).map(Active))
    }
}

impl<C>
    Database<
        Select<By<Option<Active<Assignment>>, (user::Id, property::Id)>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Active<Assignment>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<Active<Assignment>>, (user::Id, property::Id)>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (tenant_id, property_id) = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM tenant_assignments a \
             WHERE a.tenant_id = $1::UUID \
               AND a.property_id = $2::UUID \
               AND a.is_active \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&tenant_id, &property_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|r| r.as_ref().map(from_row).map(Active))
    }
}

impl<C> Database<Insert<Assignment>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Assignment>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(assignment): Insert<Assignment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(assignment))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Assignment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(assignment): Update<Assignment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Assignment {
            id,
            tenant_id,
            property_id,
            agent_id,
            start_date,
            end_date,
            rent_amount,
            deposit,
            is_active,
            notes,
            created_at,
            updated_at,
        } = assignment;

        const SQL: &str = "\
            INSERT INTO tenant_assignments (\
                id, tenant_id, property_id, agent_id, \
                start_date, end_date, \
                rent_amount, deposit, \
                is_active, notes, \
                created_at, updated_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, \
                $5::DATE, $6::DATE, \
                $7::NUMERIC, $8::NUMERIC, \
                $9::BOOL, $10::TEXT, \
                $11::TIMESTAMPTZ, $12::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET agent_id = EXCLUDED.agent_id, \
                start_date = EXCLUDED.start_date, \
                end_date = EXCLUDED.end_date, \
                rent_amount = EXCLUDED.rent_amount, \
                deposit = EXCLUDED.deposit, \
                is_active = EXCLUDED.is_active, \
                notes = EXCLUDED.notes, \
                updated_at = EXCLUDED.updated_at";
        self.exec(
            SQL,
            &[
                &id,
                &tenant_id,
                &property_id,
                &agent_id,
                &start_date,
                &end_date,
                &rent_amount,
                &deposit,
                &is_active,
                &notes,
                &created_at,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Assignment, assignment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Assignment, assignment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: assignment::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO tenant_assignments_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C>
    Database<
        Select<
            By<
                read::assignment::list::Page,
                (read::assignment::list::Selector, Scope),
            >,
        >,
    > for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<assignment::Id, Assignment>, Vec<assignment::Id>>>,
        Ok = HashMap<assignment::Id, Assignment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::assignment::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<
                read::assignment::list::Page,
                (read::assignment::list::Selector, Scope),
            >,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (
            read::assignment::list::Selector {
                arguments,
                filter:
                    read::assignment::list::Filter {
                        is_active,
                        property_id,
                        tenant_id,
                    },
            },
            scope,
        ) = by.into_inner();

        let (limit, offset) = page_bounds(&arguments);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit, &offset];
        let active_idx = is_active.as_ref().map(|a| {
            ps.push(a);
            ps.len()
        });
        let property_idx = property_id.as_ref().map(|id| {
            ps.push(id);
            ps.len()
        });
        let tenant_idx = tenant_id.as_ref().map(|id| {
            ps.push(id);
            ps.len()
        });
        let scope = scoped(&scope, &mut ps);

        let matched = format!(
            "SELECT a.id, a.start_date \
             FROM tenant_assignments a \
             JOIN properties p ON p.id = a.property_id \
             WHERE TRUE \
                   {active_filtering} \
                   {property_filtering} \
                   {tenant_filtering} \
                   {scope}",
            active_filtering =
                active_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND a.is_active = ${idx}::BOOL"))
                }),
            property_filtering =
                property_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND a.property_id = ${idx}::UUID"))
                }),
            tenant_filtering =
                tenant_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND a.tenant_id = ${idx}::UUID"))
                }),
        );
        let sql = page_sql(&matched, "start_date DESC, id DESC");
        let row = self
            .query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .expect("always exists");
        let (total, ids) = page_ids::<assignment::Id>(&row);

        let mut assignments = self
            .execute(Select(By::<HashMap<_, Assignment>, _>::new(ids.clone())))
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::assignment::list::Page::new(
            arguments,
            ids.into_iter().filter_map(|id| assignments.remove(&id)),
            total,
        ))
    }
}

impl<C> Database<Select<By<Vec<read::assignment::Billable>, Scope>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<read::assignment::Billable>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<read::assignment::Billable>, Scope>>,
    ) -> Result<Self::Ok, Self::Err> {
        let scope = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![];
        let sql = format!(
            "SELECT {COLUMNS}, p.charges \
             FROM tenant_assignments a \
             JOIN properties p ON p.id = a.property_id \
             WHERE a.is_active \
                   {scope} \
             ORDER BY a.created_at, a.id",
            scope = scoped(&scope, &mut ps),
        );
        Ok(self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| read::assignment::Billable {
                assignment: from_row(row),
                charges: row.get("charges"),
            })
            .collect())
    }
}
