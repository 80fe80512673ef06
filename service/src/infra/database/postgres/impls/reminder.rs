//! [`Reminder`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{payment, Payment, Reminder},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    policy::Scope,
};

impl<C> Database<Insert<Reminder>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(reminder): Insert<Reminder>,
    ) -> Result<Self::Ok, Self::Err> {
        let Reminder {
            id,
            payment_id,
            kind,
            message,
            sent_at,
        } = reminder;

        const SQL: &str = "\
            INSERT INTO payment_reminders (\
                id, payment_id, kind, message, sent_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::INT2, $4::TEXT, $5::TIMESTAMPTZ\
            )";
        self.exec(SQL, &[&id, &payment_id, &kind, &message, &sent_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Option<Vec<Reminder>>, (payment::Id, Scope)>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Payment>, (payment::Id, Scope)>>,
        Ok = Option<Payment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Vec<Reminder>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Vec<Reminder>>, (payment::Id, Scope)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (payment_id, scope) = by.into_inner();

        if self
            .execute(Select(By::<Option<Payment>, _>::new((payment_id, scope))))
            .await
            .map_err(tracerr::wrap!())?
            .is_none()
        {
            return Ok(None);
        }

        const SQL: &str = "\
            SELECT id, payment_id, kind, message, sent_at \
            FROM payment_reminders \
            WHERE payment_id = $1::UUID \
            ORDER BY sent_at DESC, id DESC";
        Ok(Some(
            self.query(SQL, &[&payment_id])
                .await
                .map_err(tracerr::wrap!())?
                .into_iter()
                .map(|row| Reminder {
                    id: row.get("id"),
                    payment_id: row.get("payment_id"),
                    kind: row.get("kind"),
                    message: row.get("message"),
                    sent_at: row.get("sent_at"),
                })
                .collect(),
        ))
    }
}
