//! [`Payment`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Date, Money, Month,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{assignment, payment, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    policy::Scope,
    read,
};

use super::{count, page_bounds, page_ids, page_sql, scope_filter};

/// Columns of the `payments` table, prefixed with `pm.`.
const COLUMNS: &str = "\
    pm.id, pm.assignment_id, pm.amount, pm.due_date, pm.payment_date, \
    pm.status, pm.payment_method, pm.reference, pm.receipt_number, \
    pm.notes, pm.created_at, pm.updated_at";

/// Parses a [`Payment`] out of the provided [`Row`] selected with
/// [`COLUMNS`].
fn from_row(row: &Row) -> Payment {
    Payment {
        id: row.get("id"),
        assignment_id: row.get("assignment_id"),
        amount: row.get("amount"),
        due_date: row.get("due_date"),
        payment_date: row.get("payment_date"),
        status: row.get("status"),
        method: row.get("payment_method"),
        reference: row.get("reference"),
        receipt_number: row.get("receipt_number"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Renders an `AND ...` condition narrowing `pm` [`Payment`]s (joined with
/// their `a` assignments and `p` properties) to the provided [`Scope`].
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

/// Returns the first day of the provided [`Month`] and the first day of the
/// next one.
fn month_bounds(month: Month) -> (Date, Date) {
    (month.first_day(), month.next().first_day())
}

/// Joins `pm` [`Payment`]s with their `a` assignments and `p` properties.
const JOINED: &str = "\
    payments pm \
    JOIN tenant_assignments a ON a.id = pm.assignment_id \
    JOIN properties p ON p.id = a.property_id";

impl<C, IDs> Database<Select<By<HashMap<payment::Id, Payment>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[payment::Id]>,
{
    type Ok = HashMap<payment::Id, Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<payment::Id, Payment>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[payment::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments pm \
             WHERE pm.id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
             LIMIT $2::INT4",
        );
        Ok(self
            .query(&sql, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                let payment = from_row(row);
                (payment.id, payment)
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<payment::Id, Payment>, [payment::Id; 1]>>,
        Ok = HashMap<payment::Id, Payment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<Option<Payment>, (payment::Id, Scope)>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Payment>, payment::Id>>,
        Ok = Option<Payment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, (payment::Id, Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (id, scope) = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&id];
        let sql = format!(
            "SELECT pm.id \
             FROM {JOINED} \
             WHERE pm.id = $1::UUID \
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

impl<C> Database<Select<By<Option<Payment>, (assignment::Id, Month)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, (assignment::Id, Month)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (assignment_id, month) = by.into_inner();
        let (since, until) = month_bounds(month);

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments pm \
             WHERE pm.assignment_id = $1::UUID \
               AND pm.due_date >= $2::DATE \
               AND pm.due_date < $3::DATE \
             ORDER BY pm.due_date, pm.id \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&assignment_id, &since, &until])
            .await
            .map_err(tracerr::wrap!())
            .map(|r| r.as_ref().map(from_row))
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Payment>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(payment))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            assignment_id,
            amount,
            due_date,
            payment_date,
            status,
            method,
            reference,
            receipt_number,
            notes,
            created_at,
            updated_at,
        } = payment;

        const SQL: &str = "\
            INSERT INTO payments (\
                id, assignment_id, \
                amount, due_date, payment_date, \
                status, payment_method, \
                reference, receipt_number, notes, \
                created_at, updated_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, \
                $3::NUMERIC, $4::DATE, $5::DATE, \
                $6::INT2, $7::INT2, \
                $8::UUID, $9::VARCHAR, $10::TEXT, \
                $11::TIMESTAMPTZ, $12::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET amount = EXCLUDED.amount, \
                due_date = EXCLUDED.due_date, \
                payment_date = EXCLUDED.payment_date, \
                status = EXCLUDED.status, \
                payment_method = EXCLUDED.payment_method, \
                receipt_number = EXCLUDED.receipt_number, \
                notes = EXCLUDED.notes, \
                updated_at = EXCLUDED.updated_at";
        self.exec(
            SQL,
            &[
                &id,
                &assignment_id,
                &amount,
                &due_date,
                &payment_date,
                &status,
                &method,
                &reference,
                &receipt_number,
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

impl<C> Database<Lock<By<Payment, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Payment, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: payment::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO payments_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<read::payment::ReceiptCount, Month>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<read::payment::ReceiptCount, Month>>,
    ) -> Result<Self::Ok, Self::Err> {
        let month = by.into_inner().to_string();

        const SQL: &str = "\
            INSERT INTO payments_receipt_lock \
            VALUES ($1::VARCHAR) \
            ON CONFLICT (month) DO UPDATE SET month = EXCLUDED.month";
        self.exec(SQL, &[&month])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<read::payment::ReceiptCount, Month>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::payment::ReceiptCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::payment::ReceiptCount, Month>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (since, until) = month_bounds(by.into_inner());

        const SQL: &str = "\
            SELECT COUNT(*)::INT8 AS receipts \
            FROM payments \
            WHERE receipt_number IS NOT NULL \
              AND created_at >= $1::DATE \
              AND created_at < $2::DATE";
        let row = self
            .query_opt(SQL, &[&since, &until])
            .await
            .map_err(tracerr::wrap!())?
            .expect("always exists");

        Ok(read::payment::ReceiptCount(
            u32::try_from(count(&row, "receipts")).unwrap_or(u32::MAX),
        ))
    }
}

impl<C>
    Database<
        Select<
            By<
                read::payment::list::Page,
                (read::payment::list::Selector, Scope),
            >,
        >,
    > for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<payment::Id, Payment>, Vec<payment::Id>>>,
        Ok = HashMap<payment::Id, Payment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::payment::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<
                read::payment::list::Page,
                (read::payment::list::Selector, Scope),
            >,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (
            read::payment::list::Selector {
                arguments,
                filter:
                    read::payment::list::Filter {
                        status,
                        month,
                        property_id,
                        tenant_id,
                    },
            },
            scope,
        ) = by.into_inner();

        let (limit, offset) = page_bounds(&arguments);
        let month = month.map(month_bounds);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit, &offset];
        let status_idx = status.as_ref().map(|s| {
            ps.push(s);
            ps.len()
        });
        let month_idx = month.as_ref().map(|(since, until)| {
            ps.push(since);
            ps.push(until);
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
            "SELECT pm.id, pm.due_date \
             FROM {JOINED} \
             WHERE TRUE \
                   {status_filtering} \
                   {month_filtering} \
                   {property_filtering} \
                   {tenant_filtering} \
                   {scope}",
            status_filtering =
                status_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND pm.status = ${idx}::INT2"))
                }),
            month_filtering = month_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!(
                    "AND pm.due_date >= ${}::DATE \
                     AND pm.due_date < ${idx}::DATE",
                    idx - 1,
                ))
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
        let sql = page_sql(&matched, "due_date DESC, id DESC");
        let row = self
            .query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .expect("always exists");
        let (total, ids) = page_ids::<payment::Id>(&row);

        let mut payments = self
            .execute(Select(By::<HashMap<_, Payment>, _>::new(ids.clone())))
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::payment::list::Page::new(
            arguments,
            ids.into_iter().filter_map(|id| payments.remove(&id)),
            total,
        ))
    }
}

impl<C> Database<Select<By<read::payment::Stats, (Option<Month>, Scope)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::payment::Stats;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::payment::Stats, (Option<Month>, Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (month, scope) = by.into_inner();
        let month = month.map(month_bounds);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![];
        let month_idx = month.as_ref().map(|(since, until)| {
            ps.push(since);
            ps.push(until);
            ps.len()
        });
        let sql = format!(
            "SELECT pm.status, \
                    COUNT(*)::INT8 AS payments, \
                    COALESCE(SUM(pm.amount), 0)::NUMERIC AS amount \
             FROM {JOINED} \
             WHERE TRUE \
                   {month_filtering} \
                   {scope} \
             GROUP BY pm.status",
            month_filtering = month_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!(
                    "AND pm.due_date >= ${}::DATE \
                     AND pm.due_date < ${idx}::DATE",
                    idx - 1,
                ))
            }),
            scope = scoped(&scope, &mut ps),
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::payment::Stats::aggregate(rows.iter().map(|row| {
            (
                row.get::<_, payment::Status>("status"),
                count(row, "payments"),
                row.get::<_, Money>("amount"),
            )
        })))
    }
}

impl<C> Database<Select<By<Option<read::payment::Current>, ((), Scope)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<read::payment::Current>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<read::payment::Current>, ((), Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ((), scope) = by.into_inner();

        let paid = payment::Status::Paid;
        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&paid];
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM {JOINED} \
             WHERE pm.status <> $1::INT2 \
                   {scope} \
             ORDER BY pm.due_date, pm.id \
             LIMIT 1",
            scope = scoped(&scope, &mut ps),
        );
        self.query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())
            .map(|r| r.as_ref().map(from_row).map(read::payment::Current))
    }
}
