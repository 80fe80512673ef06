//! [`Command`] for updating a [`User`] profile.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Email, Name, Phone, Role};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    policy::{self, Actor},
    Service,
};

use super::Command;

/// Name of the unique constraint on [`User`] emails.
const EMAIL_CONSTRAINT: &str = "users_email_unique";

/// [`Command`] for updating a [`User`] profile.
///
/// The [`Role`] of a [`User`] is never changed.
#[derive(Clone, Debug)]
pub struct UpdateUser {
    /// [`Actor`] performing this [`Command`].
    pub actor: Actor,

    /// ID of the [`User`] to update.
    ///
    /// Anyone may update their own profile, while only admins may update
    /// others.
    pub user_id: user::Id,

    /// New first [`Name`], if changed.
    pub first_name: Option<user::Name>,

    /// New last [`Name`], if changed.
    pub last_name: Option<user::Name>,

    /// New [`Phone`], if changed.
    ///
    /// `Some(None)` removes the [`Phone`].
    pub phone: Option<Option<user::Phone>>,

    /// New [`Email`], if changed.
    pub email: Option<user::Email>,
}

impl<Db> Command<UpdateUser> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Select<By<Option<User>, &'l user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<User, user::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Update<User>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: UpdateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateUser {
            actor,
            user_id,
            first_name,
            last_name,
            phone,
            email,
        } = cmd;

        if actor.id != user_id {
            _ = actor
                .authorize::<policy::user::Manage>()
                .map_err(tracerr::from_and_wrap!(=> E))?;
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `User`.
        tx.execute(Lock(By::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut user = tx
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(user_id))
            .map_err(tracerr::wrap!())?;

        if let Some(email) = email.filter(|e| *e != user.email) {
            let occupied = tx
                .execute(Select(By::new(&email)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .is_some();
            if occupied {
                return Err(tracerr::new!(E::EmailOccupied(email)));
            }
            user.email = email;
        }
        if let Some(name) = first_name {
            user.first_name = name;
        }
        if let Some(name) = last_name {
            user.last_name = name;
        }
        if let Some(phone) = phone {
            user.phone = phone;
        }
        user.updated_at = DateTime::now().coerce();

        let updated = tx.execute(Update(user.clone())).await;
        if let Err(e) = &updated {
            if e.as_ref().is_unique_violation(Some(EMAIL_CONSTRAINT)) {
                return Err(tracerr::new!(E::EmailOccupied(user.email)));
            }
        }
        updated.map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(user)
    }
}

/// Error of [`UpdateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Email`] is already occupied by another [`User`].
    #[display("`{_0}` email is occupied")]
    #[from(ignore)]
    EmailOccupied(#[error(not(source))] user::Email),

    /// [`Actor`] is not allowed to update the [`User`].
    #[display("`User` update is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}
