//! [`Property`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{By, Delete, Insert, Lock, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{property, user, Property},
    infra::{
        database::{
            self,
            postgres::{Connection, LikePattern},
            Postgres,
        },
        Database,
    },
    policy::Scope,
    read::{self, Active},
};

use super::{count, page_bounds, page_ids, page_sql, scope_filter};

/// Columns of the `properties` table, prefixed with `p.`.
const COLUMNS: &str = "\
    p.id, p.name, p.address, p.city, p.postal_code, p.kind, \
    p.surface, p.rooms, p.monthly_rent, p.charges, p.description, \
    p.agent_id, p.is_available, p.created_at, p.updated_at";

/// Parses a [`Property`] out of the provided [`Row`] selected with
/// [`COLUMNS`].
fn from_row(row: &Row) -> Property {
    Property {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        city: row.get("city"),
        postal_code: row.get("postal_code"),
        kind: row.get("kind"),
        surface: row.get("surface"),
        rooms: row.get("rooms"),
        monthly_rent: row.get("monthly_rent"),
        charges: row.get("charges"),
        description: row.get("description"),
        agent_id: row.get("agent_id"),
        is_available: row.get("is_available"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Renders an `AND ...` condition narrowing `p` [`Property`]s to the
/// provided [`Scope`].
fn scoped<'p>(
    scope: &'p Scope,
    ps: &mut Vec<&'p (dyn ToSql + Sync)>,
) -> String {
    scope_filter(
        scope,
        ps,
        |idx| format!("p.agent_id = ${idx}::UUID"),
        |idx| {
            format!(
                "EXISTS (\
                    SELECT 1 \
                    FROM tenant_assignments sa \
                    WHERE sa.property_id = p.id \
                      AND sa.tenant_id = ${idx}::UUID\
                )",
            )
        },
    )
}

impl<C, IDs> Database<Select<By<HashMap<property::Id, Property>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[property::Id]>,
{
    type Ok = HashMap<property::Id, Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<property::Id, Property>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[property::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM properties p \
             WHERE p.id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
             LIMIT $2::INT4",
        );
        Ok(self
            .query(&sql, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                let property = from_row(row);
                (property.id, property)
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Property>, property::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<property::Id, Property>, [property::Id; 1]>>,
        Ok = HashMap<property::Id, Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<Option<Property>, (property::Id, Scope)>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Property>, property::Id>>,
        Ok = Option<Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, (property::Id, Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (id, scope) = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&id];
        let sql = format!(
            "SELECT p.id \
             FROM properties p \
             WHERE p.id = $1::UUID \
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

impl<C> Database<Insert<Property>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Property>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(property))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Property>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(property): Update<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        let Property {
            id,
            name,
            address,
            city,
            postal_code,
            kind,
            surface,
            rooms,
            monthly_rent,
            charges,
            description,
            agent_id,
            is_available,
            created_at,
            updated_at,
        } = property;

        const SQL: &str = "\
            INSERT INTO properties (\
                id, name, \
                address, city, postal_code, \
                kind, surface, rooms, \
                monthly_rent, charges, \
                description, agent_id, is_available, \
                created_at, updated_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, \
                $3::VARCHAR, $4::VARCHAR, $5::VARCHAR, \
                $6::INT2, $7::NUMERIC, $8::INT2, \
                $9::NUMERIC, $10::NUMERIC, \
                $11::TEXT, $12::UUID, $13::BOOL, \
                $14::TIMESTAMPTZ, $15::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                address = EXCLUDED.address, \
                city = EXCLUDED.city, \
                postal_code = EXCLUDED.postal_code, \
                kind = EXCLUDED.kind, \
                surface = EXCLUDED.surface, \
                rooms = EXCLUDED.rooms, \
                monthly_rent = EXCLUDED.monthly_rent, \
                charges = EXCLUDED.charges, \
                description = EXCLUDED.description, \
                agent_id = EXCLUDED.agent_id, \
                is_available = EXCLUDED.is_available, \
                updated_at = EXCLUDED.updated_at";
        self.exec(
            SQL,
            &[
                &id,
                &name,
                &address,
                &city,
                &postal_code,
                &kind,
                &surface,
                &rooms,
                &monthly_rent,
                &charges,
                &description,
                &agent_id,
                &is_available,
                &created_at,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Delete<By<Property, property::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: property::Id = by.into_inner();

        // `Assignment`s, `Payment`s and `Reminder`s are removed in cascade.
        const SQL: &str = "\
            DELETE FROM properties \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<Property, property::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: property::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO properties_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<read::property::IsRented, property::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::property::IsRented;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::property::IsRented, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let property_id: property::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM tenant_assignments \
            WHERE property_id = $1::UUID \
              AND is_active \
            LIMIT 1";
        self.query_opt(SQL, &[&property_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|r| read::property::IsRented(r.is_some()))
    }
}

impl<C>
    Database<
        Select<
            By<
                read::property::list::Page,
                (read::property::list::Selector, Scope),
            >,
        >,
    > for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<property::Id, Property>, Vec<property::Id>>>,
        Ok = HashMap<property::Id, Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::property::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<
                read::property::list::Page,
                (read::property::list::Selector, Scope),
            >,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (
            read::property::list::Selector {
                arguments,
                filter:
                    read::property::list::Filter {
                        city,
                        kind,
                        is_available,
                        search,
                        min_rent,
                        max_rent,
                    },
            },
            scope,
        ) = by.into_inner();

        let (limit, offset) = page_bounds(&arguments);
        let city = city.as_ref().map(LikePattern::new);
        let search = search.as_ref().map(LikePattern::new);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit, &offset];
        let city_idx = city.as_ref().map(|c| {
            ps.push(c);
            ps.len()
        });
        let kind_idx = kind.as_ref().map(|k| {
            ps.push(k);
            ps.len()
        });
        let available_idx = is_available.as_ref().map(|a| {
            ps.push(a);
            ps.len()
        });
        let search_idx = search.as_ref().map(|s| {
            ps.push(s);
            ps.len()
        });
        let min_rent_idx = min_rent.as_ref().map(|r| {
            ps.push(r);
            ps.len()
        });
        let max_rent_idx = max_rent.as_ref().map(|r| {
            ps.push(r);
            ps.len()
        });
        let scope = scoped(&scope, &mut ps);

        let matched = format!(
            "SELECT p.id, p.created_at \
             FROM properties p \
             WHERE TRUE \
                   {city_filtering} \
                   {kind_filtering} \
                   {available_filtering} \
                   {search_filtering} \
                   {min_rent_filtering} \
                   {max_rent_filtering} \
                   {scope}",
            city_filtering = city_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!("AND p.city ILIKE ${idx}::VARCHAR"))
            }),
            kind_filtering = kind_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!("AND p.kind = ${idx}::INT2"))
            }),
            available_filtering =
                available_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND p.is_available = ${idx}::BOOL"))
                }),
            search_filtering =
                search_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!(
                        "AND (p.name ILIKE ${idx}::VARCHAR \
                              OR p.address ILIKE ${idx}::VARCHAR \
                              OR p.city ILIKE ${idx}::VARCHAR)",
                    ))
                }),
            min_rent_filtering =
                min_rent_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND p.monthly_rent >= ${idx}::NUMERIC"))
                }),
            max_rent_filtering =
                max_rent_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND p.monthly_rent <= ${idx}::NUMERIC"))
                }),
        );
        let sql = page_sql(&matched, "created_at DESC, id DESC");
        let row = self
            .query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .expect("always exists");
        let (total, ids) = page_ids::<property::Id>(&row);

        let mut properties = self
            .execute(Select(By::<HashMap<_, Property>, _>::new(ids.clone())))
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::property::list::Page::new(
            arguments,
            ids.into_iter().filter_map(|id| properties.remove(&id)),
            total,
        ))
    }
}

impl<C> Database<Select<By<read::property::Stats, ((), Scope)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::property::Stats;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::property::Stats, ((), Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ((), scope) = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![];
        let sql = format!(
            "WITH scoped AS (\
                SELECT p.monthly_rent, \
                       EXISTS (\
                           SELECT 1 \
                           FROM tenant_assignments ra \
                           WHERE ra.property_id = p.id AND ra.is_active\
                       ) AS is_rented \
                FROM properties p \
                WHERE TRUE \
                      {scope}\
             ) \
             SELECT COUNT(*)::INT8 AS total, \
                    COUNT(*) FILTER (WHERE is_rented)::INT8 AS rented, \
                    COALESCE(\
                        SUM(monthly_rent) FILTER (WHERE is_rented), 0\
                    )::NUMERIC AS revenue \
             FROM scoped",
            scope = scoped(&scope, &mut ps),
        );
        let row = self
            .query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .expect("always exists");

        Ok(read::property::Stats::new(
            count(&row, "total"),
            count(&row, "rented"),
            row.get::<_, Money>("revenue"),
        ))
    }
}

impl<C> Database<Select<By<HashMap<user::Id, Active<Property>>, Vec<user::Id>>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<property::Id, Property>, Vec<property::Id>>>,
        Ok = HashMap<property::Id, Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = HashMap<user::Id, Active<Property>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<HashMap<user::Id, Active<Property>>, Vec<user::Id>>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let tenant_ids = by.into_inner();
        if tenant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        // The latest active lease is the current one.
        const SQL: &str = "\
            SELECT DISTINCT ON (tenant_id) tenant_id, property_id \
            FROM tenant_assignments \
            WHERE is_active \
              AND tenant_id = ANY($1::UUID[]) \
            ORDER BY tenant_id, start_date DESC";
        let leases = self
            .query(SQL, &[&tenant_ids])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                (
                    row.get::<_, user::Id>("tenant_id"),
                    row.get::<_, property::Id>("property_id"),
                )
            })
            .collect::<Vec<_>>();

        let mut properties = self
            .execute(Select(By::<HashMap<_, Property>, _>::new(
                leases.iter().map(|(_, id)| *id).unique().collect_vec(),
            )))
            .await
            .map_err(tracerr::wrap!())?;

        Ok(leases
            .into_iter()
            .filter_map(|(tenant_id, property_id)| {
                let property = properties.get(&property_id)?.clone();
                Some((tenant_id, Active(property)))
            })
            .collect())
    }
}
