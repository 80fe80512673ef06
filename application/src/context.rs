//! [`Context`]-related definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use service::{
    command::{self, Command as _},
    domain::user::session,
    Actor,
};
use tokio::sync::OnceCell;

use crate::{define_error, AsError, Error, Service};

/// Request context.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// Parts of the HTTP request.
    parts: http::request::Parts,

    /// Authenticated [`Actor`] performing the request.
    actor: OnceCell<Actor>,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the [`Actor`] performing the current HTTP request.
    ///
    /// The [`Actor`]'s role is loaded from the [`Service`] rather than
    /// trusted from the token.
    ///
    /// # Errors
    ///
    /// Errors if:
    /// - the current HTTP request is not authorized;
    /// - the provided authentication token is invalid or expired.
    pub async fn actor(&self) -> Result<Actor, Error> {
        self.actor
            .get_or_try_init(|| self.authenticate())
            .await
            .copied()
    }

    /// Performs the [`Actor`] authentication.
    ///
    /// # Errors
    ///
    /// Errors if the provided authentication token is invalid.
    async fn authenticate(&self) -> Result<Actor, Error> {
        let res = self
            .parts
            .clone()
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await;
        match res {
            Ok(TypedHeader(Authorization(bearer))) => {
                #[expect(unsafe_code, reason = "specified in correct header")]
                let token = unsafe {
                    session::Token::new_unchecked(bearer.token().to_owned())
                };
                self.service
                    .execute(command::AuthorizeUserSession { token })
                    .await
                    .map_err(AsError::into_error)
            }
            Err(e) if e.is_missing() => {
                Err(AuthError::AuthorizationRequired.into())
            }
            Err(e) => Err(e.into_error()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;

        Ok(Self {
            service,
            parts: parts.clone(),
            actor: OnceCell::new(),
        })
    }
}

impl AsError for command::authorize_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenDecodeError(_)
            | Self::UserNotExists(_)
            | Self::WrongTokenKind(_) => {
                Some(AuthError::AuthorizationRequired.into())
            }
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "WRONG_CREDENTIALS"]
        #[status = UNAUTHORIZED]
        #[message = "Provided credentials do not match any user"]
        WrongCredentials,
    }
}

#[cfg(test)]
mod spec {
    use service::{
        command::authorize_user_session::ExecutionError,
        domain::user::{self, session},
    };

    use crate::AsError as _;

    #[test]
    fn rejects_unusable_tokens_as_unauthorized() {
        for err in [
            ExecutionError::WrongTokenKind(session::Kind::Refresh),
            ExecutionError::UserNotExists(user::Id::new()),
        ] {
            let err = err.as_error();

            assert_eq!(err.code, "AUTHORIZATION_REQUIRED");
            assert_eq!(err.status_code, http::StatusCode::UNAUTHORIZED);
        }
    }
}
