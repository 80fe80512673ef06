//! [`Command`] for creating a new [`User`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Email, Name, Password, Phone, Role};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    policy::{self, Actor},
    Service,
};

use super::Command;

/// Name of the unique constraint on [`User`] emails.
const EMAIL_CONSTRAINT: &str = "users_email_unique";

/// [`Command`] for creating a new [`User`].
#[derive(Debug)]
pub struct CreateUser {
    /// [`Initiator`] of the creation.
    pub initiator: Initiator,

    /// [`Role`] of a new [`User`], fixed by the way it is created.
    pub role: user::Role,

    /// [`Email`] of a new [`User`].
    pub email: user::Email,

    /// First [`Name`] of a new [`User`].
    pub first_name: user::Name,

    /// Last [`Name`] of a new [`User`].
    pub last_name: user::Name,

    /// [`Phone`] of a new [`User`].
    pub phone: Option<user::Phone>,

    /// [`Password`] of a new [`User`].
    ///
    /// Generated randomly if [`None`].
    pub password: Option<SecretBox<user::Password>>,
}

/// Initiator of a [`CreateUser`] [`Command`].
#[derive(Clone, Copy, Debug)]
pub enum Initiator {
    /// Application itself, bootstrapping its first admin.
    System,

    /// Authenticated [`Actor`].
    Actor(Actor),
}

/// Output of [`CreateUser`] [`Command`].
#[derive(Debug)]
pub struct Output {
    /// Created [`User`].
    pub user: User,

    /// [`Password`] generated for the created [`User`], if any.
    pub generated_password: Option<SecretBox<user::Password>>,
}

impl<Db> Command<CreateUser> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<User>, &'l user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<User>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            initiator,
            role,
            email,
            first_name,
            last_name,
            phone,
            password,
        } = cmd;

        authorize(initiator, role).map_err(tracerr::wrap!())?;

        let existing = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Err(tracerr::new!(E::EmailOccupied(email)));
        }

        let (password, generated_password) = match password {
            Some(p) => (p, None),
            None => {
                let p = user::Password::generate();
                (
                    SecretBox::new(Box::new(p.clone())),
                    Some(SecretBox::new(Box::new(p))),
                )
            }
        };
        let password_hash = user::PasswordHash::new(password.expose_secret())
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let now = DateTime::now();
        let user = User {
            id: user::Id::new(),
            email,
            first_name,
            last_name,
            phone,
            role,
            password_hash,
            created_at: now.coerce(),
            updated_at: now.coerce(),
            deleted_at: None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let inserted = tx.execute(Insert(user.clone())).await;
        if let Err(e) = &inserted {
            if e.as_ref().is_unique_violation(Some(EMAIL_CONSTRAINT)) {
                return Err(tracerr::new!(E::EmailOccupied(user.email)));
            }
        }
        inserted
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tracing::info!(user_id = %user.id, %role, "user created");

        Ok(Output {
            user,
            generated_password,
        })
    }
}

/// Checks whether the provided [`Initiator`] may create a [`User`] with the
/// provided [`Role`].
fn authorize(
    initiator: Initiator,
    role: user::Role,
) -> Result<(), Traced<ExecutionError>> {
    use user::Role as R;

    let allowed = match (initiator, role) {
        (Initiator::System, R::Admin) => true,
        (Initiator::System, R::Agent | R::Tenant) => false,
        (Initiator::Actor(_), R::Admin) => false,
        (Initiator::Actor(actor), R::Agent) => {
            actor.authorize::<policy::agent::Manage>().is_ok()
        }
        (Initiator::Actor(actor), R::Tenant) => {
            actor.authorize::<policy::tenant::Create>().is_ok()
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(tracerr::new!(ExecutionError::Forbidden(policy::Forbidden)))
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    #[from(ignore)]
    EmailOccupied(#[error(not(source))] user::Email),

    /// [`Initiator`] is not allowed to create such a [`User`].
    #[display("`User` creation is forbidden: {_0}")]
    Forbidden(policy::Forbidden),

    /// [`Password`] hashing failed.
    #[display("Failed to hash `Password`: {_0}")]
    PasswordHash(#[error(not(source))] argon2::password_hash::Error),
}

#[cfg(test)]
mod spec {
    use super::{authorize, ExecutionError, Initiator};
    use crate::{
        domain::user::{Id, Role},
        policy::Actor,
    };

    fn actor(role: Role) -> Initiator {
        Initiator::Actor(Actor { id: Id::new(), role })
    }

    #[test]
    fn only_admins_create_agents() {
        assert!(authorize(actor(Role::Admin), Role::Agent).is_ok());
        assert!(authorize(actor(Role::Agent), Role::Agent).is_err());
        assert!(authorize(actor(Role::Tenant), Role::Agent).is_err());
    }

    #[test]
    fn admins_and_agents_create_tenants() {
        assert!(authorize(actor(Role::Admin), Role::Tenant).is_ok());
        assert!(authorize(actor(Role::Agent), Role::Tenant).is_ok());
        assert!(matches!(
            authorize(actor(Role::Tenant), Role::Tenant)
                .unwrap_err()
                .into_inner(),
            ExecutionError::Forbidden(_),
        ));
    }

    #[test]
    fn admins_are_bootstrapped_only() {
        assert!(authorize(Initiator::System, Role::Admin).is_ok());
        assert!(authorize(actor(Role::Admin), Role::Admin).is_err());
        assert!(authorize(Initiator::System, Role::Tenant).is_err());
    }
}
