//! REST API definitions.

pub mod accounts;
pub mod payments;
pub mod properties;
pub mod tenants;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    response::{IntoResponse, Response},
    Router,
};
use common::pagination::{Arguments, Page};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::{define_error, Error};

/// Name of the [`tracing::Span`] for the REST handlers.
const SPAN_NAME: &str = "REST handler";

/// Creates a new [`Router`] serving the whole REST API under `/api`.
#[must_use]
pub fn router() -> Router {
    Router::new().nest(
        "/api",
        Router::new()
            .nest("/accounts", accounts::router())
            .nest("/properties", properties::router())
            .nest("/tenants", tenants::router())
            .nest("/payments", payments::router()),
    )
}

/// JSON request body extractor and response.
///
/// Malformed bodies are rejected with an [`Error`].
#[derive(Clone, Copy, Debug, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// JSON request body extractor falling back to [`Default`] on an empty
/// body.
///
/// Non-empty bodies are parsed as strictly as by the [`Json`] extractor.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Error> {
        let body = Bytes::from_request(req, state).await?;
        parse_or_default(&body).map(Self)
    }
}

/// Parses the provided JSON `body`, if it's not blank.
///
/// # Errors
///
/// With `INVALID_REQUEST` if the `body` is not a valid JSON of `T`.
fn parse_or_default<T>(body: &[u8]) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    axum::Json::from_bytes(body)
        .map(|axum::Json(v)| v)
        .map_err(Error::from)
}

/// Query string extractor rejecting malformed queries with an [`Error`].
#[derive(Clone, Copy, Debug, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct Query<T>(pub T);

/// Path parameters extractor rejecting malformed ones with an [`Error`].
#[derive(Clone, Copy, Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct Path<T>(pub T);

/// Paginated list of items.
#[derive(Clone, Debug, Serialize)]
pub struct List<T> {
    /// Total number of items matching the request.
    pub count: u64,

    /// Number of the returned page, starting from 1.
    pub page: u32,

    /// Maximum number of items per page.
    pub per_page: u32,

    /// Items of the returned page.
    pub results: Vec<T>,
}

impl<I, T: From<I>> From<Page<I>> for List<T> {
    fn from(page: Page<I>) -> Self {
        Self {
            count: page.total_count,
            page: page.arguments.page(),
            per_page: page.arguments.per_page(),
            results: page.items.into_iter().map(T::from).collect(),
        }
    }
}

/// Response carrying a human-readable message only.
#[derive(Clone, Debug, Serialize)]
pub struct Message {
    /// Text of this [`Message`].
    pub message: String,
}

impl Message {
    /// Creates a new [`Message`] out of the provided text.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Builds pagination [`Arguments`] out of the `page` and `per_page` query
/// parameters.
///
/// # Errors
///
/// With `INVALID_PAGINATION` if either of them is out of range.
pub fn arguments(
    page: Option<u32>,
    per_page: Option<u32>,
) -> Result<Arguments, Error> {
    Arguments::new(page, per_page)
        .ok_or_else(|| PaginationError::OutOfRange.into())
}

/// Parses the `value` of the request `field` with the provided constructor.
///
/// # Errors
///
/// With `INVALID_FIELD` naming the `field` if the `value` is rejected.
pub fn field<V, T>(
    field: &'static str,
    value: V,
    new: impl FnOnce(V) -> Option<T>,
) -> Result<T, Error> {
    new(value).ok_or_else(|| Error::invalid_field(field))
}

/// Same as [`field()`], but for an optional `value`.
///
/// # Errors
///
/// With `INVALID_FIELD` naming the `field` if the `value` is rejected.
pub fn optional<V, T>(
    name: &'static str,
    value: Option<V>,
    new: impl FnOnce(V) -> Option<T>,
) -> Result<Option<T>, Error> {
    value.map(|v| field(name, v, new)).transpose()
}

/// Converts a lookup result into an [`Error`] if nothing has been found.
///
/// # Errors
///
/// With `NOT_FOUND` if the `value` is [`None`].
pub fn found<T>(value: Option<T>) -> Result<T, Error> {
    value.ok_or_else(|| LookupError::NotFound.into())
}

/// Deserializes a field that may be omitted, `null`, or set.
///
/// Meant to be used along with `#[serde(default)]`, so an omitted field
/// becomes [`None`] and an explicit `null` becomes `Some(None)`.
///
/// # Errors
///
/// If the underlying value fails to deserialize.
pub fn nullable<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

define_error! {
    enum LookupError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Requested resource does not exist"]
        NotFound,
    }
}

define_error! {
    enum PaginationError {
        #[code = "INVALID_PAGINATION"]
        #[status = BAD_REQUEST]
        #[message = "`page` must be positive and `per_page` within 1..=100"]
        OutOfRange,
    }
}

#[cfg(test)]
mod spec {
    use common::pagination::Page;
    use serde::Deserialize;

    use super::{arguments, field, found, parse_or_default, List};

    #[test]
    fn renders_list_envelope() {
        let args = arguments(Some(2), Some(3)).unwrap();
        let list = List::<u8>::from(Page::<u8>::new(args, [7u8, 8], 5));

        assert_eq!(
            serde_json::to_value(list).unwrap(),
            serde_json::json!({
                "count": 5,
                "page": 2,
                "per_page": 3,
                "results": [7, 8],
            }),
        );
    }

    #[test]
    fn rejects_bad_pagination() {
        assert_eq!(arguments(None, None).unwrap().per_page(), 20);
        assert_eq!(
            arguments(Some(0), None).unwrap_err().code,
            "INVALID_PAGINATION",
        );
        assert_eq!(
            arguments(None, Some(101)).unwrap_err().status_code,
            http::StatusCode::BAD_REQUEST,
        );
    }

    #[test]
    fn names_invalid_field() {
        let err = field("rooms", -1, |v: i32| (v > 0).then_some(v))
            .unwrap_err();

        assert_eq!(err.code, "INVALID_FIELD");
        assert_eq!(err.field, Some("rooms"));
        let ok = field("rooms", 3, |v: i32| (v > 0).then_some(v));
        assert_eq!(ok.unwrap(), 3);
    }

    #[test]
    fn maps_missing_to_not_found() {
        let err = found::<()>(None).unwrap_err();

        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn distinguishes_null_from_omitted() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "super::nullable")]
            phone: Option<Option<String>>,
        }

        let omitted: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"phone":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"phone":"1"}"#).unwrap();

        assert_eq!(omitted.phone, None);
        assert_eq!(null.phone, Some(None));
        assert_eq!(set.phone, Some(Some("1".to_owned())));
    }

    #[test]
    fn defaults_only_blank_bodies() {
        #[derive(Debug, Default, Deserialize, PartialEq)]
        struct Body {
            day: Option<u8>,
        }

        assert_eq!(parse_or_default::<Body>(b"").unwrap(), Body::default());
        assert_eq!(parse_or_default::<Body>(b" \n").unwrap(), Body::default());
        assert_eq!(
            parse_or_default::<Body>(br#"{"day":3}"#).unwrap(),
            Body { day: Some(3) },
        );

        let err = parse_or_default::<Body>(br#"{"day":"x"}"#).unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");
        let err = parse_or_default::<Body>(b"{").unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");
    }
}
