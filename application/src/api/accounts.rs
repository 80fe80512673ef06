//! Accounts endpoints: authentication, profiles and user management.

use axum::{
    routing::{get, post},
    Router,
};
use derive_more::Debug;
use http::StatusCode;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use secrecy::{ExposeSecret as _, SecretBox};
use serde::{Deserialize, Serialize};
use service::{
    command::{self, create_user::Initiator, Command as _},
    domain::user::{self, session},
    policy,
    query::{self, Query as _},
    read::{self, Search},
    Actor,
};

use crate::{
    api::{self, Json, Message, Path, Query},
    context::AuthError,
    define_error, AsError, Context, Error,
};

/// Creates a new [`Router`] of the accounts endpoints.
pub(super) fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/profile", get(profile).patch(update_profile))
        .route("/change-password", post(change_password))
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/agents", get(list_agents))
        .route("/agents/create", post(create_agent))
        .route("/tenants/create", post(create_tenant))
        .route("/stats", get(stats))
}

/// Publicly visible user account.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    /// ID of this [`User`].
    pub id: user::Id,

    /// Email of this [`User`], used as login.
    pub email: user::Email,

    /// First name of this [`User`].
    pub first_name: user::Name,

    /// Last name of this [`User`].
    pub last_name: user::Name,

    /// First and last names of this [`User`] joined.
    pub full_name: String,

    /// Phone number of this [`User`], if any.
    pub phone: Option<user::Phone>,

    /// Role of this [`User`].
    pub role: user::Role,

    /// [`DateTime`] when this [`User`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: user::CreationDateTime,

    /// [`DateTime`] when this [`User`] was last updated.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: user::ModificationDateTime,
}

impl From<service::domain::User> for User {
    fn from(user: service::domain::User) -> Self {
        Self {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Credentials to log in with.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email of the user.
    pub email: String,

    /// Password of the user.
    #[debug(skip)]
    pub password: String,
}

/// Pair of issued session tokens.
#[derive(Clone, Debug, Serialize)]
pub struct Tokens {
    /// Access token authorizing API requests.
    #[debug(skip)]
    pub access: String,

    /// Refresh token for obtaining new [`Tokens`].
    #[debug(skip)]
    pub refresh: String,

    /// [`DateTime`] when the access token expires.
    ///
    /// [`DateTime`]: common::DateTime
    pub expires_at: session::ExpirationDateTime,
}

impl From<&command::create_user_session::Output> for Tokens {
    fn from(output: &command::create_user_session::Output) -> Self {
        Self {
            access: output.access.to_string(),
            refresh: output.refresh.to_string(),
            expires_at: output.expires_at,
        }
    }
}

/// Response of a successful login.
#[derive(Clone, Debug, Serialize)]
pub struct LoginResponse {
    /// Issued [`Tokens`].
    #[serde(flatten)]
    pub tokens: Tokens,

    /// Logged in [`User`].
    pub user: User,
}

/// Logs a user in by their credentials.
///
/// # Errors
///
/// With `WRONG_CREDENTIALS` if the credentials match no user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "login", email = %req.email, otel.name = api::SPAN_NAME),
)]
async fn login(
    ctx: Context,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    let LoginRequest { email, password } = req;
    let (Some(email), Some(password)) =
        (user::Email::new(email), user::Password::new(password))
    else {
        return Err(AuthError::WrongCredentials.into());
    };

    let output = ctx
        .service()
        .execute(command::CreateUserSession::ByCredentials {
            email,
            password: SecretBox::new(Box::new(password)),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(LoginResponse {
        tokens: Tokens::from(&output),
        user: output.user.into(),
    }))
}

/// Refresh token to rotate.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token issued on login or previous refresh.
    #[debug(skip)]
    pub refresh: String,
}

/// Issues new [`Tokens`] in exchange for a refresh token.
///
/// # Errors
///
/// With `WRONG_CREDENTIALS` if the refresh token is invalid or expired.
#[tracing::instrument(
    skip_all,
    fields(api.name = "refresh", otel.name = api::SPAN_NAME),
)]
async fn refresh(
    ctx: Context,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<Tokens>, Error> {
    #[expect(unsafe_code, reason = "verified by `CreateUserSession`")]
    let token = unsafe { session::Token::new_unchecked(req.refresh) };

    ctx.service()
        .execute(command::CreateUserSession::ByRefreshToken(token))
        .await
        .map(|output| Json(Tokens::from(&output)))
        .map_err(AsError::into_error)
}

/// Returns the profile of the authenticated user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "profile", otel.name = api::SPAN_NAME),
)]
async fn profile(ctx: Context) -> Result<Json<User>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::user::ById::by(actor.id))
        .await
        .map_err(AsError::into_error)
        .and_then(api::found)
        .map(|u| Json(u.into()))
}

/// Changes to a user profile.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    /// New first name.
    pub first_name: Option<String>,

    /// New last name.
    pub last_name: Option<String>,

    /// New phone number, or `null` to remove it.
    #[serde(default, deserialize_with = "api::nullable")]
    pub phone: Option<Option<String>>,

    /// New email.
    ///
    /// Ignored when updating own profile.
    pub email: Option<String>,
}

impl ProfileUpdate {
    /// Builds a [`command::UpdateUser`] out of this [`ProfileUpdate`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if any of the fields is invalid.
    fn into_command(
        self,
        actor: Actor,
        user_id: user::Id,
    ) -> Result<command::UpdateUser, Error> {
        let Self {
            first_name,
            last_name,
            phone,
            email,
        } = self;

        Ok(command::UpdateUser {
            actor,
            user_id,
            first_name: api::optional(
                "first_name",
                first_name,
                user::Name::new,
            )?,
            last_name: api::optional("last_name", last_name, user::Name::new)?,
            phone: phone
                .map(|p| api::optional("phone", p, user::Phone::new))
                .transpose()?,
            email: api::optional("email", email, user::Email::new)?,
        })
    }
}

/// Updates the profile of the authenticated user.
///
/// # Errors
///
/// With `INVALID_FIELD` if any of the fields is invalid.
#[tracing::instrument(
    skip_all,
    fields(api.name = "updateProfile", otel.name = api::SPAN_NAME),
)]
async fn update_profile(
    ctx: Context,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<User>, Error> {
    let actor = ctx.actor().await?;
    let update = ProfileUpdate { email: None, ..req };

    ctx.service()
        .execute(update.into_command(actor, actor.id)?)
        .await
        .map(|u| Json(u.into()))
        .map_err(AsError::into_error)
}

/// Passwords to change.
#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    /// Current password.
    #[debug(skip)]
    pub old_password: String,

    /// New password, at least 8 characters long.
    #[debug(skip)]
    pub new_password: String,
}

/// Changes the password of the authenticated user.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_FIELD` - `new_password` is too short;
/// - `WRONG_PASSWORD` - `old_password` does not match the current one.
#[tracing::instrument(
    skip_all,
    fields(api.name = "changePassword", otel.name = api::SPAN_NAME),
)]
async fn change_password(
    ctx: Context,
    Json(req): Json<PasswordChange>,
) -> Result<Json<Message>, Error> {
    let actor = ctx.actor().await?;
    let PasswordChange {
        old_password,
        new_password,
    } = req;

    let new_password =
        api::field("new_password", new_password, user::Password::new)?;
    let old_password = user::Password::new(old_password)
        .ok_or_else(|| Error::from(AccountError::WrongPassword))?;

    _ = ctx
        .service()
        .execute(command::UpdateUserPassword {
            user_id: actor.id,
            new_password: SecretBox::new(Box::new(new_password)),
            old_password: SecretBox::new(Box::new(old_password)),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Message::new("Password changed successfully")))
}

/// Query parameters of the users lists.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UsersFilter {
    /// Role of the users to list.
    pub role: Option<user::Role>,

    /// Case-insensitive substring of the email or names.
    pub search: Option<String>,

    /// Number of the page to return.
    pub page: Option<u32>,

    /// Maximum number of users per page.
    pub per_page: Option<u32>,
}

impl UsersFilter {
    /// Builds a [`read::user::list::Selector`] out of this [`UsersFilter`].
    ///
    /// # Errors
    ///
    /// With `INVALID_PAGINATION` if pagination is out of range.
    fn selector(self) -> Result<read::user::list::Selector, Error> {
        Ok(read::user::list::Selector {
            arguments: api::arguments(self.page, self.per_page)?,
            filter: read::user::list::Filter {
                role: self.role,
                search: self.search.as_deref().and_then(Search::new),
                has_property: None,
            },
        })
    }
}

/// Lists all the users.
#[tracing::instrument(
    skip_all,
    fields(api.name = "listUsers", otel.name = api::SPAN_NAME),
)]
async fn list_users(
    ctx: Context,
    Query(filter): Query<UsersFilter>,
) -> Result<Json<api::List<User>>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::user::List::by(actor, filter.selector()?))
        .await
        .map(|page| Json(page.into()))
        .map_err(AsError::into_error)
}

/// Returns a user by its ID.
#[tracing::instrument(
    skip_all,
    fields(api.name = "getUser", otel.name = api::SPAN_NAME, user.id = %id),
)]
async fn get_user(
    ctx: Context,
    Path(id): Path<user::Id>,
) -> Result<Json<User>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::user::Managed::by(actor, id))
        .await
        .map_err(AsError::into_error)
        .and_then(api::found)
        .map(|u| Json(u.into()))
}

/// Updates a user by its ID.
///
/// # Errors
///
/// With `EMAIL_OCCUPIED` if the new email belongs to another user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "updateUser", otel.name = api::SPAN_NAME, user.id = %id),
)]
async fn update_user(
    ctx: Context,
    Path(id): Path<user::Id>,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<User>, Error> {
    let actor = ctx.actor().await?;
    _ = actor
        .authorize::<policy::user::Manage>()
        .map_err(AsError::into_error)?;

    ctx.service()
        .execute(req.into_command(actor, id)?)
        .await
        .map(|u| Json(u.into()))
        .map_err(AsError::into_error)
}

/// Soft-deletes a user by its ID.
#[tracing::instrument(
    skip_all,
    fields(api.name = "deleteUser", otel.name = api::SPAN_NAME, user.id = %id),
)]
async fn delete_user(
    ctx: Context,
    Path(id): Path<user::Id>,
) -> Result<StatusCode, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(command::DeleteUser { actor, user_id: id })
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(AsError::into_error)
}

/// Lists all the agents.
#[tracing::instrument(
    skip_all,
    fields(api.name = "listAgents", otel.name = api::SPAN_NAME),
)]
async fn list_agents(
    ctx: Context,
    Query(filter): Query<UsersFilter>,
) -> Result<Json<api::List<User>>, Error> {
    let actor = ctx.actor().await?;
    let filter = UsersFilter {
        role: Some(user::Role::Agent),
        ..filter
    };

    ctx.service()
        .execute(query::user::Agents::by(actor, filter.selector()?))
        .await
        .map(|page| Json(page.into()))
        .map_err(AsError::into_error)
}

/// New user account.
///
/// Its role is defined by the endpoint, so any `role` field is ignored.
#[derive(Debug, Deserialize)]
pub struct NewUser {
    /// Email of the user.
    pub email: String,

    /// First name of the user.
    pub first_name: String,

    /// Last name of the user.
    pub last_name: String,

    /// Phone number of the user, if any.
    pub phone: Option<String>,

    /// Password of the user, generated if omitted.
    #[debug(skip)]
    pub password: Option<String>,
}

impl NewUser {
    /// Builds a [`command::CreateUser`] of the provided [`user::Role`] out of
    /// this [`NewUser`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if any of the fields is invalid.
    fn into_command(
        self,
        initiator: Initiator,
        role: user::Role,
    ) -> Result<command::CreateUser, Error> {
        let Self {
            email,
            first_name,
            last_name,
            phone,
            password,
        } = self;

        Ok(command::CreateUser {
            initiator,
            role,
            email: api::field("email", email, user::Email::new)?,
            first_name: api::field("first_name", first_name, user::Name::new)?,
            last_name: api::field("last_name", last_name, user::Name::new)?,
            phone: api::optional("phone", phone, user::Phone::new)?,
            password: api::optional("password", password, user::Password::new)?
                .map(|p| SecretBox::new(Box::new(p))),
        })
    }
}

/// Created user account.
#[derive(Clone, Debug, Serialize)]
pub struct CreatedUser {
    /// Created [`User`].
    pub user: User,

    /// Generated password, returned only once.
    #[debug(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

impl From<command::create_user::Output> for CreatedUser {
    fn from(output: command::create_user::Output) -> Self {
        Self {
            user: output.user.into(),
            generated_password: output
                .generated_password
                .map(|p| p.expose_secret().as_str().to_owned()),
        }
    }
}

/// Creates a new user of the provided [`user::Role`].
async fn create_user(
    ctx: &Context,
    role: user::Role,
    req: NewUser,
) -> Result<(StatusCode, Json<CreatedUser>), Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(Initiator::Actor(actor), role)?)
        .await
        .map(|output| (StatusCode::CREATED, Json(output.into())))
        .map_err(AsError::into_error)
}

/// Creates a new agent account.
///
/// # Errors
///
/// With `EMAIL_OCCUPIED` if the email belongs to another user.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "createAgent",
        email = %req.email,
        otel.name = api::SPAN_NAME,
    ),
)]
async fn create_agent(
    ctx: Context,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<CreatedUser>), Error> {
    create_user(&ctx, user::Role::Agent, req).await
}

/// Creates a new tenant account.
///
/// # Errors
///
/// With `EMAIL_OCCUPIED` if the email belongs to another user.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "createTenant",
        email = %req.email,
        otel.name = api::SPAN_NAME,
    ),
)]
async fn create_tenant(
    ctx: Context,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<CreatedUser>), Error> {
    create_user(&ctx, user::Role::Tenant, req).await
}

/// Dashboard statistics, depending on the role of the user.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(untagged)]
pub enum Dashboard {
    /// Platform-wide user counts.
    Admin {
        /// Number of all the users.
        total_users: u64,

        /// Number of agents.
        total_agents: u64,

        /// Number of tenants.
        total_tenants: u64,
    },

    /// Portfolio figures of an agent.
    Agent {
        /// Number of the agent's properties.
        total_properties: u64,

        /// Number of the agent's tenants.
        total_tenants: u64,

        /// Percentage of the agent's properties being rented.
        occupancy_rate: common::Percent,
    },

    /// Own payment figures of a tenant.
    Tenant {
        /// Number of pending payments.
        pending_count: u64,

        /// Number of overdue payments.
        overdue_count: u64,

        /// Sum of all unpaid amounts.
        total_pending: common::Money,
    },
}

impl From<query::dashboard::Output> for Dashboard {
    fn from(output: query::dashboard::Output) -> Self {
        use query::dashboard::Output as O;

        match output {
            O::Admin(counts) => Self::Admin {
                total_users: counts.total,
                total_agents: counts.agents,
                total_tenants: counts.tenants,
            },
            O::Agent {
                properties,
                tenants,
            } => Self::Agent {
                total_properties: properties.total,
                total_tenants: tenants,
                occupancy_rate: properties.occupancy_rate,
            },
            O::Tenant(stats) => Self::Tenant {
                pending_count: stats.pending,
                overdue_count: stats.overdue,
                total_pending: stats.total_pending,
            },
        }
    }
}

/// Returns the [`Dashboard`] of the authenticated user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "stats", otel.name = api::SPAN_NAME),
)]
async fn stats(ctx: Context) -> Result<Json<Dashboard>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::Dashboard { actor })
        .await
        .map(|output| Json(output.into()))
        .map_err(AsError::into_error)
}

define_error! {
    enum AccountError {
        #[code = "EMAIL_OCCUPIED"]
        #[status = CONFLICT]
        #[message = "Email is occupied by another user"]
        #[field = "email"]
        EmailOccupied,

        #[code = "WRONG_PASSWORD"]
        #[status = CONFLICT]
        #[message = "Provided `old_password` does not match the current one"]
        #[field = "old_password"]
        WrongPassword,
    }
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EmailOccupied(_) => Some(AccountError::EmailOccupied.into()),
            Self::Forbidden(e) => e.try_as_error(),
            Self::PasswordHash(_) => None,
        }
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebToken(e) => matches!(
                e.kind(),
                JwtErrorKind::InvalidToken
                    | JwtErrorKind::InvalidSignature
                    | JwtErrorKind::ExpiredSignature
                    | JwtErrorKind::ImmatureSignature
                    | JwtErrorKind::InvalidAlgorithm
                    | JwtErrorKind::Base64(_)
                    | JwtErrorKind::Json(_)
                    | JwtErrorKind::Utf8(_),
            )
            .then(|| AuthError::WrongCredentials.into()),
            Self::UserNotExists(_) | Self::WrongCredentials => {
                Some(AuthError::WrongCredentials.into())
            }
        }
    }
}

impl AsError for command::update_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EmailOccupied(_) => Some(AccountError::EmailOccupied.into()),
            Self::Forbidden(e) => e.try_as_error(),
            Self::UserNotExists(_) => Some(api::LookupError::NotFound.into()),
        }
    }
}

impl AsError for command::update_user_password::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::PasswordHash(_) => None,
            Self::UserNotExists(_) => Some(api::LookupError::NotFound.into()),
            Self::WrongPassword => Some(AccountError::WrongPassword.into()),
        }
    }
}

impl AsError for command::delete_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::UserNotExists(_) => Some(api::LookupError::NotFound.into()),
        }
    }
}

#[cfg(test)]
mod spec {
    use service::{
        command::{self, create_user::Initiator},
        domain::user::{self, Role},
        Actor,
    };

    use crate::AsError as _;

    use super::{NewUser, ProfileUpdate};

    fn new_user(json: &str) -> NewUser {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn forces_role_of_endpoint() {
        let req = new_user(
            r#"{
                "email": "jane@example.com",
                "first_name": "Jane",
                "last_name": "Doe",
                "role": "admin"
            }"#,
        );
        let cmd = req.into_command(Initiator::System, Role::Tenant).unwrap();

        assert_eq!(cmd.role, Role::Tenant);
        assert!(cmd.password.is_none());
        assert!(cmd.phone.is_none());
    }

    #[test]
    fn names_invalid_new_user_field() {
        let req = new_user(
            r#"{
                "email": "not-an-email",
                "first_name": "Jane",
                "last_name": "Doe"
            }"#,
        );
        let err = req
            .into_command(Initiator::System, Role::Agent)
            .unwrap_err();

        assert_eq!(err.code, "INVALID_FIELD");
        assert_eq!(err.field, Some("email"));

        let req = new_user(
            r#"{
                "email": "jane@example.com",
                "first_name": "Jane",
                "last_name": "Doe",
                "password": "short"
            }"#,
        );
        let err = req
            .into_command(Initiator::System, Role::Agent)
            .unwrap_err();

        assert_eq!(err.field, Some("password"));
    }

    #[test]
    fn clears_phone_on_null() {
        let actor = Actor {
            id: user::Id::new(),
            role: Role::Agent,
        };
        let update: ProfileUpdate =
            serde_json::from_str(r#"{"phone": null, "first_name": "Jo"}"#)
                .unwrap();
        let cmd = update.into_command(actor, actor.id).unwrap();

        assert!(matches!(cmd.phone, Some(None)));
        assert!(cmd.first_name.is_some());
        assert!(cmd.last_name.is_none());
    }

    #[test]
    fn maps_account_errors() {
        let occupied = command::create_user::ExecutionError::EmailOccupied(
            user::Email::new("jane@example.com").unwrap(),
        )
        .as_error();
        assert_eq!(occupied.code, "EMAIL_OCCUPIED");
        assert_eq!(occupied.status_code, http::StatusCode::CONFLICT);

        let wrong = command::update_user_password::ExecutionError::WrongPassword
            .as_error();
        assert_eq!(wrong.code, "WRONG_PASSWORD");
        assert_eq!(wrong.status_code, http::StatusCode::CONFLICT);

        let creds =
            command::create_user_session::ExecutionError::WrongCredentials
                .as_error();
        assert_eq!(creds.code, "WRONG_CREDENTIALS");
        assert_eq!(creds.status_code, http::StatusCode::UNAUTHORIZED);
    }
}
