//! Properties endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use common::{Money, Percent};
use derive_more::Debug;
use http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{property, user},
    query::{self, Query as _},
    read::{self, Search},
    Actor,
};

use crate::{
    api::{self, Json, Path, Query},
    define_error, AsError, Context, Error,
};

/// Creates a new [`Router`] of the properties endpoints.
pub(super) fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/create", post(create))
        .route("/stats", get(stats))
        .route("/:id", get(get_one).patch(update).delete(delete))
}

/// Rentable property.
#[derive(Clone, Debug, Serialize)]
pub struct Property {
    /// ID of this [`Property`].
    pub id: property::Id,

    /// Name of this [`Property`].
    pub name: property::Name,

    /// Street address of this [`Property`].
    pub address: property::Address,

    /// City of this [`Property`].
    pub city: property::City,

    /// Postal code of this [`Property`].
    pub postal_code: property::PostalCode,

    /// Full postal address of this [`Property`].
    pub full_address: String,

    /// Kind of this [`Property`].
    pub property_type: property::Kind,

    /// Surface of this [`Property`] in square meters, if known.
    pub surface: Option<property::Surface>,

    /// Number of rooms in this [`Property`], if known.
    pub rooms: Option<property::Rooms>,

    /// Monthly rent excluding charges.
    pub monthly_rent: Money,

    /// Monthly charges.
    pub charges: Money,

    /// Monthly rent including charges.
    pub total_rent: Money,

    /// Description of this [`Property`].
    pub description: property::Description,

    /// ID of the agent managing this [`Property`].
    pub agent_id: user::Id,

    /// Indicator whether this [`Property`] has no active lease.
    pub is_available: bool,

    /// [`DateTime`] when this [`Property`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: property::CreationDateTime,

    /// [`DateTime`] when this [`Property`] was last updated.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: property::ModificationDateTime,
}

impl From<service::domain::Property> for Property {
    fn from(property: service::domain::Property) -> Self {
        Self {
            full_address: property.full_address(),
            total_rent: property.total_rent(),
            id: property.id,
            name: property.name,
            address: property.address,
            city: property.city,
            postal_code: property.postal_code,
            property_type: property.kind,
            surface: property.surface,
            rooms: property.rooms,
            monthly_rent: property.monthly_rent,
            charges: property.charges,
            description: property.description,
            agent_id: property.agent_id,
            is_available: property.is_available,
            created_at: property.created_at,
            updated_at: property.updated_at,
        }
    }
}

/// Query parameters of the properties list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Filter {
    /// Case-insensitive substring of the city.
    pub city: Option<String>,

    /// Kind of the properties.
    pub property_type: Option<property::Kind>,

    /// Availability of the properties.
    pub is_available: Option<bool>,

    /// Case-insensitive substring of the name, address or city.
    pub search: Option<String>,

    /// Minimal monthly rent.
    pub min_rent: Option<Money>,

    /// Maximal monthly rent.
    pub max_rent: Option<Money>,

    /// Number of the page to return.
    pub page: Option<u32>,

    /// Maximum number of properties per page.
    pub per_page: Option<u32>,
}

impl Filter {
    /// Builds a [`read::property::list::Selector`] out of this [`Filter`].
    ///
    /// # Errors
    ///
    /// With `INVALID_PAGINATION` if pagination is out of range.
    fn selector(self) -> Result<read::property::list::Selector, Error> {
        Ok(read::property::list::Selector {
            arguments: api::arguments(self.page, self.per_page)?,
            filter: read::property::list::Filter {
                city: self.city.as_deref().and_then(Search::new),
                kind: self.property_type,
                is_available: self.is_available,
                search: self.search.as_deref().and_then(Search::new),
                min_rent: self.min_rent,
                max_rent: self.max_rent,
            },
        })
    }
}

/// Lists the properties visible to the authenticated user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "listProperties", otel.name = api::SPAN_NAME),
)]
async fn list(
    ctx: Context,
    Query(filter): Query<Filter>,
) -> Result<Json<api::List<Property>>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::property::List::by(actor, filter.selector()?))
        .await
        .map(|page| Json(page.into()))
        .map_err(AsError::into_error)
}

/// New property.
#[derive(Debug, Deserialize)]
pub struct NewProperty {
    /// ID of the managing agent.
    ///
    /// Required for admins, ignored for agents.
    pub agent_id: Option<user::Id>,

    /// Name of the property.
    pub name: String,

    /// Street address of the property.
    pub address: String,

    /// City of the property.
    pub city: String,

    /// Postal code of the property.
    pub postal_code: String,

    /// Kind of the property.
    pub property_type: property::Kind,

    /// Surface in square meters, if known.
    pub surface: Option<Decimal>,

    /// Number of rooms, if known.
    pub rooms: Option<i16>,

    /// Monthly rent excluding charges.
    pub monthly_rent: Money,

    /// Monthly charges.
    #[serde(default)]
    pub charges: Option<Money>,

    /// Description of the property.
    #[serde(default)]
    pub description: String,
}

impl NewProperty {
    /// Builds a [`command::CreateProperty`] out of this [`NewProperty`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if any of the fields is invalid.
    fn into_command(
        self,
        actor: Actor,
    ) -> Result<command::CreateProperty, Error> {
        use property as p;

        Ok(command::CreateProperty {
            actor,
            agent_id: self.agent_id,
            name: api::field("name", self.name, p::Name::new)?,
            address: api::field("address", self.address, p::Address::new)?,
            city: api::field("city", self.city, p::City::new)?,
            postal_code: api::field(
                "postal_code",
                self.postal_code,
                p::PostalCode::new,
            )?,
            kind: self.property_type,
            surface: api::optional("surface", self.surface, p::Surface::new)?,
            rooms: api::optional("rooms", self.rooms, p::Rooms::new)?,
            monthly_rent: self.monthly_rent,
            charges: self.charges.unwrap_or(Money::ZERO),
            description: api::field(
                "description",
                self.description,
                p::Description::new,
            )?,
        })
    }
}

/// Creates a new property.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_FIELD` - `agent_id` is missing for an admin;
/// - `NOT_AN_AGENT` - `agent_id` does not refer to an agent.
#[tracing::instrument(
    skip_all,
    fields(api.name = "createProperty", otel.name = api::SPAN_NAME),
)]
async fn create(
    ctx: Context,
    Json(req): Json<NewProperty>,
) -> Result<(StatusCode, Json<Property>), Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor)?)
        .await
        .map(|p| (StatusCode::CREATED, Json(p.into())))
        .map_err(AsError::into_error)
}

/// Returns a property by its ID.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "getProperty",
        otel.name = api::SPAN_NAME,
        property.id = %id,
    ),
)]
async fn get_one(
    ctx: Context,
    Path(id): Path<property::Id>,
) -> Result<Json<Property>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::property::ById::by(actor, id))
        .await
        .map_err(AsError::into_error)
        .and_then(api::found)
        .map(|p| Json(p.into()))
}

/// Changes to a property.
///
/// Availability is maintained by leases, so it cannot be changed here.
#[derive(Debug, Default, Deserialize)]
pub struct PropertyUpdate {
    /// New managing agent, admins only.
    pub agent_id: Option<user::Id>,

    /// New name.
    pub name: Option<String>,

    /// New street address.
    pub address: Option<String>,

    /// New city.
    pub city: Option<String>,

    /// New postal code.
    pub postal_code: Option<String>,

    /// New kind.
    pub property_type: Option<property::Kind>,

    /// New surface, or `null` to remove it.
    #[serde(default, deserialize_with = "api::nullable")]
    pub surface: Option<Option<Decimal>>,

    /// New number of rooms, or `null` to remove it.
    #[serde(default, deserialize_with = "api::nullable")]
    pub rooms: Option<Option<i16>>,

    /// New monthly rent.
    pub monthly_rent: Option<Money>,

    /// New monthly charges.
    pub charges: Option<Money>,

    /// New description.
    pub description: Option<String>,
}

impl PropertyUpdate {
    /// Builds a [`command::UpdateProperty`] out of this [`PropertyUpdate`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if any of the fields is invalid.
    fn into_command(
        self,
        actor: Actor,
        property_id: property::Id,
    ) -> Result<command::UpdateProperty, Error> {
        use property as p;

        Ok(command::UpdateProperty {
            actor,
            property_id,
            agent_id: self.agent_id,
            name: api::optional("name", self.name, p::Name::new)?,
            address: api::optional("address", self.address, p::Address::new)?,
            city: api::optional("city", self.city, p::City::new)?,
            postal_code: api::optional(
                "postal_code",
                self.postal_code,
                p::PostalCode::new,
            )?,
            kind: self.property_type,
            surface: self
                .surface
                .map(|s| api::optional("surface", s, p::Surface::new))
                .transpose()?,
            rooms: self
                .rooms
                .map(|r| api::optional("rooms", r, p::Rooms::new))
                .transpose()?,
            monthly_rent: self.monthly_rent,
            charges: self.charges,
            description: api::optional(
                "description",
                self.description,
                p::Description::new,
            )?,
        })
    }
}

/// Updates a property by its ID.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "updateProperty",
        otel.name = api::SPAN_NAME,
        property.id = %id,
    ),
)]
async fn update(
    ctx: Context,
    Path(id): Path<property::Id>,
    Json(req): Json<PropertyUpdate>,
) -> Result<Json<Property>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor, id)?)
        .await
        .map(|p| Json(p.into()))
        .map_err(AsError::into_error)
}

/// Deletes a property by its ID, along with its leases and payments.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "deleteProperty",
        otel.name = api::SPAN_NAME,
        property.id = %id,
    ),
)]
async fn delete(
    ctx: Context,
    Path(id): Path<property::Id>,
) -> Result<StatusCode, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(command::DeleteProperty {
            actor,
            property_id: id,
        })
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(AsError::into_error)
}

/// Occupancy statistics of properties.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Stats {
    /// Number of all the properties.
    pub total_properties: u64,

    /// Number of properties without an active lease.
    pub available_properties: u64,

    /// Number of properties with an active lease.
    pub rented_properties: u64,

    /// Sum of monthly rents of the rented properties.
    pub total_monthly_revenue: Money,

    /// Percentage of rented properties.
    pub occupancy_rate: Percent,
}

impl From<read::property::Stats> for Stats {
    fn from(stats: read::property::Stats) -> Self {
        Self {
            total_properties: stats.total,
            available_properties: stats.available,
            rented_properties: stats.rented,
            total_monthly_revenue: stats.total_monthly_revenue,
            occupancy_rate: stats.occupancy_rate,
        }
    }
}

/// Returns [`Stats`] of the properties visible to the authenticated user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "propertyStats", otel.name = api::SPAN_NAME),
)]
async fn stats(ctx: Context) -> Result<Json<Stats>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::property::Stats::by(actor, ()))
        .await
        .map(|stats| Json(stats.into()))
        .map_err(AsError::into_error)
}

define_error! {
    enum PropertyError {
        #[code = "NOT_AN_AGENT"]
        #[status = BAD_REQUEST]
        #[message = "Referenced user is not an agent"]
        #[field = "agent_id"]
        NotAnAgent,
    }
}

impl AsError for command::create_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AgentRequired => Some(Error::invalid_field("agent_id")),
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::NotAnAgent(_) => Some(PropertyError::NotAnAgent.into()),
        }
    }
}

impl AsError for command::update_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::NotAnAgent(_) => Some(PropertyError::NotAnAgent.into()),
            Self::PropertyNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
        }
    }
}

impl AsError for command::delete_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::PropertyNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{Money, Percent};
    use service::{
        command,
        domain::{
            property,
            user::{self, Role},
        },
        read, Actor,
    };

    use crate::AsError as _;

    use super::{NewProperty, PropertyUpdate, Stats};

    fn agent() -> Actor {
        Actor {
            id: user::Id::new(),
            role: Role::Agent,
        }
    }

    #[test]
    fn builds_property_with_defaults() {
        let req: NewProperty = serde_json::from_str(
            r#"{
                "name": "Loft Bastille",
                "address": "12 rue de la Roquette",
                "city": "Paris",
                "postal_code": "75011",
                "property_type": "loft",
                "monthly_rent": "1450.00",
                "surface": 54.5,
                "is_available": false
            }"#,
        )
        .unwrap();
        let cmd = req.into_command(agent()).unwrap();

        assert_eq!(cmd.kind, property::Kind::Loft);
        assert_eq!(cmd.charges, Money::ZERO);
        assert_eq!(cmd.monthly_rent, Money::from_str("1450").unwrap());
        assert!(cmd.surface.is_some());
        assert!(cmd.rooms.is_none());
        assert_eq!(cmd.description.to_string(), "");
    }

    #[test]
    fn names_invalid_property_field() {
        let req: NewProperty = serde_json::from_str(
            r#"{
                "name": "Studio",
                "address": "1 place Bellecour",
                "city": "Lyon",
                "postal_code": "69002",
                "property_type": "studio",
                "monthly_rent": 600,
                "rooms": 0
            }"#,
        )
        .unwrap();
        let err = req.into_command(agent()).unwrap_err();

        assert_eq!(err.code, "INVALID_FIELD");
        assert_eq!(err.field, Some("rooms"));
    }

    #[test]
    fn clears_optional_details() {
        let req: PropertyUpdate =
            serde_json::from_str(r#"{"surface": null, "charges": "25"}"#)
                .unwrap();
        let cmd = req.into_command(agent(), property::Id::new()).unwrap();

        assert!(matches!(cmd.surface, Some(None)));
        assert!(cmd.rooms.is_none());
        assert_eq!(cmd.charges, Some(Money::from_str("25").unwrap()));
    }

    #[test]
    fn renders_occupancy() {
        let stats = Stats::from(read::property::Stats::new(
            25,
            20,
            Money::from_str("24000").unwrap(),
        ));
        let json = serde_json::to_value(stats).unwrap();

        assert_eq!(json["total_properties"], 25);
        assert_eq!(json["available_properties"], 5);
        assert_eq!(json["occupancy_rate"], 80.0);
        assert_eq!(stats.occupancy_rate, Percent::ratio(20, 25));
    }

    #[test]
    fn maps_property_errors() {
        let err = command::create_property::ExecutionError::AgentRequired
            .as_error();
        assert_eq!(err.field, Some("agent_id"));

        let err = command::update_property::ExecutionError::NotAnAgent(
            user::Id::new(),
        )
        .as_error();
        assert_eq!(err.code, "NOT_AN_AGENT");

        let err = command::delete_property::ExecutionError::PropertyNotExists(
            property::Id::new(),
        )
        .as_error();
        assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
    }
}
