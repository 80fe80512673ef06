//! Tenants endpoints: tenant directory and leases.

use axum::{
    routing::{get, post},
    Router,
};
use common::Money;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{assignment, property, user},
    query::{self, Query as _},
    read::{self, Search},
    Actor,
};

use crate::{
    api::{self, accounts::User, properties::Property, Json, Path, Query},
    define_error, AsError, Context, Error,
};

/// Creates a new [`Router`] of the tenants endpoints.
pub(super) fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/my-property", get(my_property))
        .route("/assignments", get(list_assignments))
        .route("/assignments/create", post(create_assignment))
        .route(
            "/assignments/:id",
            get(get_assignment).patch(update_assignment),
        )
        .route("/assignments/:id/end", post(end_assignment))
        .route("/:id", get(get_one))
}

/// Tenant along with the property of their active lease.
#[derive(Clone, Debug, Serialize)]
pub struct Tenant {
    /// Tenant account itself.
    #[serde(flatten)]
    pub user: User,

    /// Property the tenant currently rents, if any.
    pub current_property: Option<Property>,
}

impl From<read::user::Tenant> for Tenant {
    fn from(tenant: read::user::Tenant) -> Self {
        Self {
            user: tenant.user.into(),
            current_property: tenant.current_property.map(Into::into),
        }
    }
}

/// Query parameters of the tenants list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TenantsFilter {
    /// Case-insensitive substring of the email or names.
    pub search: Option<String>,

    /// Whether the tenants should (or should not) rent a property now.
    pub has_property: Option<bool>,

    /// Number of the page to return.
    pub page: Option<u32>,

    /// Maximum number of tenants per page.
    pub per_page: Option<u32>,
}

impl TenantsFilter {
    /// Builds a [`read::user::list::Selector`] out of this
    /// [`TenantsFilter`].
    ///
    /// # Errors
    ///
    /// With `INVALID_PAGINATION` if pagination is out of range.
    fn selector(self) -> Result<read::user::list::Selector, Error> {
        Ok(read::user::list::Selector {
            arguments: api::arguments(self.page, self.per_page)?,
            filter: read::user::list::Filter {
                role: Some(user::Role::Tenant),
                search: self.search.as_deref().and_then(Search::new),
                has_property: self.has_property,
            },
        })
    }
}

/// Lists the tenants visible to the authenticated user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "listTenants", otel.name = api::SPAN_NAME),
)]
async fn list(
    ctx: Context,
    Query(filter): Query<TenantsFilter>,
) -> Result<Json<api::List<Tenant>>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::tenant::List {
            actor,
            selector: filter.selector()?,
        })
        .await
        .map(|page| Json(page.into()))
        .map_err(AsError::into_error)
}

/// Returns a tenant by its ID.
#[tracing::instrument(
    skip_all,
    fields(api.name = "getTenant", otel.name = api::SPAN_NAME, user.id = %id),
)]
async fn get_one(
    ctx: Context,
    Path(id): Path<user::Id>,
) -> Result<Json<Tenant>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::tenant::ById {
            actor,
            tenant_id: id,
        })
        .await
        .map_err(AsError::into_error)
        .and_then(api::found)
        .map(|t| Json(t.into()))
}

/// Lease of a property by a tenant.
#[derive(Clone, Debug, Serialize)]
pub struct Assignment {
    /// ID of this [`Assignment`].
    pub id: assignment::Id,

    /// ID of the tenant.
    pub tenant_id: user::Id,

    /// ID of the leased property.
    pub property_id: property::Id,

    /// ID of the user who created this [`Assignment`], if still present.
    pub agent_id: Option<user::Id>,

    /// Date this [`Assignment`] starts at.
    pub start_date: assignment::StartDate,

    /// Date this [`Assignment`] ends at, if fixed.
    pub end_date: Option<assignment::EndDate>,

    /// Monthly rent, excluding charges.
    pub rent_amount: Money,

    /// Security deposit.
    pub deposit: Money,

    /// Indicator whether this [`Assignment`] is in force.
    pub is_active: bool,

    /// Free-form notes.
    pub notes: assignment::Notes,

    /// [`DateTime`] when this [`Assignment`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: assignment::CreationDateTime,

    /// [`DateTime`] when this [`Assignment`] was last updated.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: assignment::ModificationDateTime,
}

impl From<service::domain::Assignment> for Assignment {
    fn from(a: service::domain::Assignment) -> Self {
        Self {
            id: a.id,
            tenant_id: a.tenant_id,
            property_id: a.property_id,
            agent_id: a.agent_id,
            start_date: a.start_date,
            end_date: a.end_date,
            rent_amount: a.rent_amount,
            deposit: a.deposit,
            is_active: a.is_active,
            notes: a.notes,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Query parameters of the assignments list.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct AssignmentsFilter {
    /// Whether the assignments should (or should not) be in force.
    pub is_active: Option<bool>,

    /// ID of the leased property.
    pub property_id: Option<property::Id>,

    /// ID of the tenant.
    pub tenant_id: Option<user::Id>,

    /// Number of the page to return.
    pub page: Option<u32>,

    /// Maximum number of assignments per page.
    pub per_page: Option<u32>,
}

impl AssignmentsFilter {
    /// Builds a [`read::assignment::list::Selector`] out of this
    /// [`AssignmentsFilter`].
    ///
    /// # Errors
    ///
    /// With `INVALID_PAGINATION` if pagination is out of range.
    fn selector(self) -> Result<read::assignment::list::Selector, Error> {
        Ok(read::assignment::list::Selector {
            arguments: api::arguments(self.page, self.per_page)?,
            filter: read::assignment::list::Filter {
                is_active: self.is_active,
                property_id: self.property_id,
                tenant_id: self.tenant_id,
            },
        })
    }
}

/// Lists the assignments visible to the authenticated user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "listAssignments", otel.name = api::SPAN_NAME),
)]
async fn list_assignments(
    ctx: Context,
    Query(filter): Query<AssignmentsFilter>,
) -> Result<Json<api::List<Assignment>>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::assignment::List::by(actor, filter.selector()?))
        .await
        .map(|page| Json(page.into()))
        .map_err(AsError::into_error)
}

/// New lease of a property.
#[derive(Debug, Deserialize)]
pub struct NewAssignment {
    /// ID of the tenant.
    pub tenant_id: user::Id,

    /// ID of the property to lease.
    pub property_id: property::Id,

    /// Date the lease starts at.
    pub start_date: assignment::StartDate,

    /// Date the lease ends at, if fixed.
    pub end_date: Option<assignment::EndDate>,

    /// Monthly rent, excluding charges.
    pub rent_amount: Money,

    /// Security deposit.
    pub deposit: Option<Money>,

    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

impl NewAssignment {
    /// Builds a [`command::CreateAssignment`] out of this [`NewAssignment`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if the notes are too long.
    fn into_command(
        self,
        actor: Actor,
    ) -> Result<command::CreateAssignment, Error> {
        Ok(command::CreateAssignment {
            actor,
            tenant_id: self.tenant_id,
            property_id: self.property_id,
            start_date: self.start_date,
            end_date: self.end_date,
            rent_amount: self.rent_amount,
            deposit: self.deposit.unwrap_or(Money::ZERO),
            notes: api::field("notes", self.notes, assignment::Notes::new)?,
        })
    }
}

/// Leases a property to a tenant.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_A_TENANT` - `tenant_id` does not refer to a tenant;
/// - `INVALID_PERIOD` - `end_date` precedes `start_date`;
/// - `ACTIVE_ASSIGNMENT_EXISTS` - the tenant already leases the property.
#[tracing::instrument(
    skip_all,
    fields(api.name = "createAssignment", otel.name = api::SPAN_NAME),
)]
async fn create_assignment(
    ctx: Context,
    Json(req): Json<NewAssignment>,
) -> Result<(StatusCode, Json<Assignment>), Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor)?)
        .await
        .map(|a| (StatusCode::CREATED, Json(a.into())))
        .map_err(AsError::into_error)
}

/// Returns an assignment by its ID.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "getAssignment",
        otel.name = api::SPAN_NAME,
        assignment.id = %id,
    ),
)]
async fn get_assignment(
    ctx: Context,
    Path(id): Path<assignment::Id>,
) -> Result<Json<Assignment>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::assignment::ById::by(actor, id))
        .await
        .map_err(AsError::into_error)
        .and_then(api::found)
        .map(|a| Json(a.into()))
}

/// Changes to the terms of a lease.
#[derive(Debug, Default, Deserialize)]
pub struct AssignmentUpdate {
    /// New start date.
    pub start_date: Option<assignment::StartDate>,

    /// New end date, or `null` to make the lease open-ended.
    #[serde(default, deserialize_with = "api::nullable")]
    pub end_date: Option<Option<assignment::EndDate>>,

    /// New monthly rent.
    pub rent_amount: Option<Money>,

    /// New security deposit.
    pub deposit: Option<Money>,

    /// New notes.
    pub notes: Option<String>,
}

impl AssignmentUpdate {
    /// Builds a [`command::UpdateAssignment`] out of this
    /// [`AssignmentUpdate`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if the notes are too long.
    fn into_command(
        self,
        actor: Actor,
        assignment_id: assignment::Id,
    ) -> Result<command::UpdateAssignment, Error> {
        Ok(command::UpdateAssignment {
            actor,
            assignment_id,
            start_date: self.start_date,
            end_date: self.end_date,
            rent_amount: self.rent_amount,
            deposit: self.deposit,
            notes: api::optional("notes", self.notes, assignment::Notes::new)?,
        })
    }
}

/// Updates the terms of an assignment.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "updateAssignment",
        otel.name = api::SPAN_NAME,
        assignment.id = %id,
    ),
)]
async fn update_assignment(
    ctx: Context,
    Path(id): Path<assignment::Id>,
    Json(req): Json<AssignmentUpdate>,
) -> Result<Json<Assignment>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor, id)?)
        .await
        .map(|a| Json(a.into()))
        .map_err(AsError::into_error)
}

/// Response to ending a lease.
#[derive(Clone, Debug, Serialize)]
pub struct Ended {
    /// Human-readable confirmation.
    pub message: String,

    /// Ended assignment.
    pub assignment: Assignment,
}

/// Ends an assignment, freeing its property unless leased otherwise.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "endAssignment",
        otel.name = api::SPAN_NAME,
        assignment.id = %id,
    ),
)]
async fn end_assignment(
    ctx: Context,
    Path(id): Path<assignment::Id>,
) -> Result<Json<Ended>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(command::EndAssignment {
            actor,
            assignment_id: id,
        })
        .await
        .map(|a| {
            Json(Ended {
                message: "Assignment ended".into(),
                assignment: a.into(),
            })
        })
        .map_err(AsError::into_error)
}

/// Contact details of the agent managing a leased property.
#[derive(Clone, Debug, Serialize)]
pub struct AgentContact {
    /// Full name of the agent.
    pub full_name: String,

    /// Email of the agent.
    pub email: user::Email,

    /// Phone number of the agent, if any.
    pub phone: Option<user::Phone>,
}

/// Active lease of the authenticated tenant.
#[derive(Clone, Debug, Serialize)]
pub struct Lease {
    /// Active assignment itself.
    pub assignment: Assignment,

    /// Leased property.
    pub property: Property,

    /// Agent managing the property, if still present.
    pub agent: Option<AgentContact>,

    /// Monthly rent of the lease including charges.
    pub total_rent: Money,
}

impl From<read::assignment::Lease> for Lease {
    fn from(lease: read::assignment::Lease) -> Self {
        Self {
            total_rent: lease.total_rent(),
            agent: lease.agent.map(|a| AgentContact {
                full_name: a.full_name(),
                email: a.email,
                phone: a.phone,
            }),
            assignment: lease.assignment.into(),
            property: lease.property.into(),
        }
    }
}

/// Returns the active lease of the authenticated tenant.
///
/// # Errors
///
/// With `NO_ACTIVE_ASSIGNMENT` if the tenant leases nothing right now.
#[tracing::instrument(
    skip_all,
    fields(api.name = "myProperty", otel.name = api::SPAN_NAME),
)]
async fn my_property(ctx: Context) -> Result<Json<Lease>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::assignment::MyLease { actor })
        .await
        .map_err(AsError::into_error)?
        .map(|lease| Json(lease.into()))
        .ok_or_else(|| LeaseError::NoActiveAssignment.into())
}

define_error! {
    enum LeaseError {
        #[code = "ACTIVE_ASSIGNMENT_EXISTS"]
        #[status = CONFLICT]
        #[message = "Tenant already has an active assignment on the property"]
        ActiveAssignmentExists,

        #[code = "INVALID_PERIOD"]
        #[status = BAD_REQUEST]
        #[message = "`end_date` must not precede `start_date`"]
        #[field = "end_date"]
        InvalidPeriod,

        #[code = "NOT_A_TENANT"]
        #[status = BAD_REQUEST]
        #[message = "Referenced user is not a tenant"]
        #[field = "tenant_id"]
        NotATenant,

        #[code = "NO_ACTIVE_ASSIGNMENT"]
        #[status = NOT_FOUND]
        #[message = "No active assignment found"]
        NoActiveAssignment,
    }
}

impl AsError for command::create_assignment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::ActiveAssignmentExists(_) => {
                Some(LeaseError::ActiveAssignmentExists.into())
            }
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::InvalidPeriod => Some(LeaseError::InvalidPeriod.into()),
            Self::NotATenant(_) => Some(LeaseError::NotATenant.into()),
            Self::PropertyNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
        }
    }
}

impl AsError for command::update_assignment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AssignmentNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::InvalidPeriod => Some(LeaseError::InvalidPeriod.into()),
        }
    }
}

impl AsError for command::end_assignment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AssignmentNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::Money;
    use service::{
        command,
        domain::{
            assignment, property,
            user::{self, Role},
        },
        Actor,
    };

    use crate::AsError as _;

    use super::{AssignmentUpdate, NewAssignment, TenantsFilter};

    fn agent() -> Actor {
        Actor {
            id: user::Id::new(),
            role: Role::Agent,
        }
    }

    #[test]
    fn lists_tenants_only() {
        let filter = TenantsFilter {
            search: Some("  ".into()),
            has_property: Some(false),
            ..TenantsFilter::default()
        };
        let selector = filter.selector().unwrap();

        assert_eq!(selector.filter.role, Some(Role::Tenant));
        assert!(selector.filter.search.is_none());
        assert_eq!(selector.filter.has_property, Some(false));
    }

    #[test]
    fn defaults_deposit_and_notes() {
        let req: NewAssignment = serde_json::from_value(serde_json::json!({
            "tenant_id": user::Id::new(),
            "property_id": property::Id::new(),
            "start_date": "2025-01-01",
            "rent_amount": "850",
        }))
        .unwrap();
        let cmd = req.into_command(agent()).unwrap();

        assert_eq!(cmd.deposit, Money::ZERO);
        assert_eq!(cmd.rent_amount, Money::from_str("850").unwrap());
        assert!(cmd.end_date.is_none());
        assert_eq!(cmd.notes.to_string(), "");
    }

    #[test]
    fn reopens_lease_on_null_end_date() {
        let req: AssignmentUpdate =
            serde_json::from_str(r#"{"end_date": null}"#).unwrap();
        let cmd = req.into_command(agent(), assignment::Id::new()).unwrap();

        assert!(matches!(cmd.end_date, Some(None)));
        assert!(cmd.start_date.is_none());
    }

    #[test]
    fn maps_lease_errors() {
        use command::create_assignment::ExecutionError as E;

        let err = E::InvalidPeriod.as_error();
        assert_eq!(err.code, "INVALID_PERIOD");
        assert_eq!(err.field, Some("end_date"));

        let err = E::NotATenant(user::Id::new()).as_error();
        assert_eq!(err.field, Some("tenant_id"));

        let err = E::ActiveAssignmentExists(assignment::Id::new()).as_error();
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);

        let err = command::end_assignment::ExecutionError::AssignmentNotExists(
            assignment::Id::new(),
        )
        .as_error();
        assert_eq!(err.code, "NOT_FOUND");
    }
}
