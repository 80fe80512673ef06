//! [`Command`] for creating a [`Session`].

use std::time::Duration;

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{session::Token, Email, Password};
use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a pair of access and refresh [`Session`]s.
#[derive(Clone, Debug, From)]
pub enum CreateUserSession {
    /// Create new [`Session`]s by [`User`] credentials.
    ByCredentials {
        /// [`Email`] of a [`User`].
        email: user::Email,

        /// [`Password`] of a [`User`].
        password: SecretBox<user::Password>,
    },

    /// Create new [`Session`]s by a refresh [`Token`], rotating it.
    ByRefreshToken(session::Token),
}

/// Output of [`CreateUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Access [`Token`] of the created [`Session`].
    pub access: session::Token,

    /// Refresh [`Token`] of the created [`Session`].
    pub refresh: session::Token,

    /// [`User`] whose [`Session`] has been created.
    pub user: User,

    /// [`DateTime`] when the access [`Token`] expires.
    pub expires_at: session::ExpirationDateTime,
}

impl<Db> Command<CreateUserSession> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Select<By<Option<User>, &'l user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use CreateUserSession as Cmd;
        use ExecutionError as E;

        let user = match cmd {
            Cmd::ByCredentials { email, password } => {
                let user = self
                    .database()
                    .execute(Select(By::new(&email)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::WrongCredentials)
                    .map_err(tracerr::wrap!())?;

                if !user.password_hash.verify(password.expose_secret()) {
                    return Err(tracerr::new!(E::WrongCredentials));
                }

                user
            }
            Cmd::ByRefreshToken(token) => {
                let session = jsonwebtoken::decode::<Session>(
                    token.as_ref(),
                    &self.config.jwt_decoding_key,
                    &Validation::default(),
                )
                .map_err(tracerr::from_and_wrap!(=> E))?
                .claims;
                if session.kind != session::Kind::Refresh {
                    return Err(tracerr::new!(E::WrongCredentials));
                }

                self.database()
                    .execute(Select(By::new(session.user_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::UserNotExists(session.user_id))
                    .map_err(tracerr::wrap!())?
            }
        };

        let (access, expires_at) = self
            .encode_session(
                &user,
                session::Kind::Access,
                self.config.access_token_ttl,
            )
            .map_err(tracerr::wrap!())?;
        let (refresh, _) = self
            .encode_session(
                &user,
                session::Kind::Refresh,
                self.config.refresh_token_ttl,
            )
            .map_err(tracerr::wrap!())?;

        Ok(Output {
            access,
            refresh,
            user,
            expires_at,
        })
    }
}

impl<Db> Service<Db> {
    /// Encodes a new [`Session`] of the provided [`session::Kind`] for the
    /// provided [`User`], expiring in the provided [`Duration`].
    fn encode_session(
        &self,
        user: &User,
        kind: session::Kind,
        ttl: Duration,
    ) -> Result<
        (session::Token, session::ExpirationDateTime),
        Traced<ExecutionError>,
    > {
        let expires_at = (DateTime::now() + ttl).coerce();
        let token = jsonwebtoken::encode::<Session>(
            &jsonwebtoken::Header::default(),
            &Session {
                user_id: user.id,
                expires_at,
                kind,
            },
            &self.config.jwt_encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> ExecutionError))?;

        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        let token = unsafe { session::Token::new_unchecked(token) };

        Ok((token, expires_at))
    }
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] error.
    #[display("JSON Web Token operation failed: {_0}")]
    JsonWebToken(jsonwebtoken::errors::Error),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`CreateUserSession`] contains wrong credentials.
    #[display("Wrong `User` credentials")]
    WrongCredentials,
}
