//! [`User`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Lock, Select, Update};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{
        database::{
            self,
            postgres::{Connection, LikePattern},
            Postgres,
        },
        Database,
    },
    policy::Scope,
    read,
};

use super::{count, page_bounds, page_ids, page_sql, scope_filter};

/// Columns of the `users` table, prefixed with `u.`.
const COLUMNS: &str = "\
    u.id, u.email, u.first_name, u.last_name, u.phone, u.role, \
    u.password_hash, u.created_at, u.updated_at, u.deleted_at";

/// Parses a [`User`] out of the provided [`Row`] selected with [`COLUMNS`].
fn from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        role: row.get("role"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

/// Renders an `AND ...` condition narrowing `u` [`User`]s to the provided
/// [`Scope`].
///
/// Agents see tenants of their [`Property`]s only, while tenants see
/// themselves only.
///
/// [`Property`]: crate::domain::Property
fn scoped<'p>(
    scope: &'p Scope,
    ps: &mut Vec<&'p (dyn ToSql + Sync)>,
) -> String {
    scope_filter(
        scope,
        ps,
        |idx| {
            format!(
                "EXISTS (\
                    SELECT 1 \
                    FROM tenant_assignments sa \
                    JOIN properties sp ON sp.id = sa.property_id \
                    WHERE sa.tenant_id = u.id \
                      AND sp.agent_id = ${idx}::UUID\
                )",
            )
        },
        |idx| format!("u.id = ${idx}::UUID"),
    )
}

impl<C, IDs> Database<Select<By<HashMap<user::Id, User>, IDs>>> for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[user::Id]>,
{
    type Ok = HashMap<user::Id, User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<user::Id, User>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[user::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM users u \
             WHERE u.id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
               AND u.deleted_at IS NULL \
             LIMIT $2::INT4",
        );
        Ok(self
            .query(&sql, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                let user = from_row(row);
                (user.id, user)
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<User>, user::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<user::Id, User>, [user::Id; 1]>>,
        Ok = HashMap<user::Id, User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<Option<User>, (user::Id, Scope)>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, (user::Id, Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (id, scope) = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&id];
        let sql = format!(
            "SELECT u.id \
             FROM users u \
             WHERE u.id = $1::UUID \
               AND u.deleted_at IS NULL \
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

impl<'l, C> Database<Select<By<Option<User>, &'l user::Email>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM users \
            WHERE email = $1::VARCHAR \
              AND deleted_at IS NULL \
            LIMIT 1";
        let Some(row) = self
            .query_opt(SQL, &[&email])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        let user_id = row.get("id");
        self.execute(Select(By::new(user_id)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<User>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<User>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(user)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<User>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            email,
            first_name,
            last_name,
            phone,
            role,
            password_hash,
            created_at,
            updated_at,
            deleted_at,
        } = user;

        const SQL: &str = "\
            INSERT INTO users (\
                id, email, \
                first_name, last_name, phone, \
                role, password_hash, \
                created_at, updated_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, \
                $3::VARCHAR, $4::VARCHAR, $5::VARCHAR, \
                $6::INT2, $7::VARCHAR, \
                $8::TIMESTAMPTZ, $9::TIMESTAMPTZ, $10::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET email = EXCLUDED.email, \
                first_name = EXCLUDED.first_name, \
                last_name = EXCLUDED.last_name, \
                phone = EXCLUDED.phone, \
                role = EXCLUDED.role, \
                password_hash = EXCLUDED.password_hash, \
                updated_at = EXCLUDED.updated_at, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &id,
                &email,
                &first_name,
                &last_name,
                &phone,
                &role,
                &password_hash,
                &created_at,
                &updated_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<User, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<User, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO users_lock \
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
            By<read::user::list::Page, (read::user::list::Selector, Scope)>,
        >,
    > for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<user::Id, User>, Vec<user::Id>>>,
        Ok = HashMap<user::Id, User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::user::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::user::list::Page, (read::user::list::Selector, Scope)>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (
            read::user::list::Selector {
                arguments,
                filter:
                    read::user::list::Filter {
                        role,
                        search,
                        has_property,
                    },
            },
            scope,
        ) = by.into_inner();

        let (limit, offset) = page_bounds(&arguments);
        let search = search.as_ref().map(LikePattern::new);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit, &offset];
        let role_idx = role.as_ref().map(|r| {
            ps.push(r);
            ps.len()
        });
        let search_idx = search.as_ref().map(|s| {
            ps.push(s);
            ps.len()
        });
        let scope = scoped(&scope, &mut ps);

        let matched = format!(
            "SELECT u.id, u.created_at \
             FROM users u \
             WHERE u.deleted_at IS NULL \
                   {role_filtering} \
                   {search_filtering} \
                   {property_filtering} \
                   {scope}",
            role_filtering = role_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!("AND u.role = ${idx}::INT2"))
            }),
            search_filtering =
                search_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!(
                        "AND (u.email ILIKE ${idx}::VARCHAR \
                              OR u.first_name ILIKE ${idx}::VARCHAR \
                              OR u.last_name ILIKE ${idx}::VARCHAR)",
                    ))
                }),
            property_filtering =
                has_property.into_iter().format_with("", |has, f| {
                    let not = if has { "" } else { "NOT" };
                    f(&format_args!(
                        "AND {not} EXISTS (\
                            SELECT 1 \
                            FROM tenant_assignments ha \
                            WHERE ha.tenant_id = u.id AND ha.is_active\
                        )",
                    ))
                }),
        );
        let sql = page_sql(&matched, "created_at DESC, id DESC");
        let row = self
            .query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .expect("always exists");
        let (total, ids) = page_ids::<user::Id>(&row);

        let mut users = self
            .execute(Select(By::<HashMap<_, User>, _>::new(ids.clone())))
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::user::list::Page::new(
            arguments,
            ids.into_iter().filter_map(|id| users.remove(&id)),
            total,
        ))
    }
}

impl<C> Database<Select<By<read::user::Counts, ((), Scope)>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::user::Counts;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::user::Counts, ((), Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ((), scope) = by.into_inner();

        let (agent, tenant) = (user::Role::Agent, user::Role::Tenant);
        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&agent, &tenant];
        let sql = format!(
            "SELECT COUNT(*)::INT8 AS total, \
                    COUNT(*) FILTER (WHERE u.role = $1::INT2)::INT8 \
                        AS agents, \
                    COUNT(*) FILTER (WHERE u.role = $2::INT2)::INT8 \
                        AS tenants \
             FROM users u \
             WHERE u.deleted_at IS NULL \
                   {scope}",
            scope = scoped(&scope, &mut ps),
        );
        let row = self
            .query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .expect("always exists");

        Ok(read::user::Counts {
            total: count(&row, "total"),
            agents: count(&row, "agents"),
            tenants: count(&row, "tenants"),
        })
    }
}
