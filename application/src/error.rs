//! [`Error`]-related definitions.

use std::fmt;

use axum::{
    extract::rejection::{
        BytesRejection, JsonRejection, PathRejection, QueryRejection,
    },
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::typed_header::TypedHeaderRejection;
use derive_more::Error as StdError;
use itertools::Itertools as _;
use serde::Serialize;
use service::{infra::database, policy, query};
use tracerr::{Trace, Traced};
use tracing as log;

/// Defines a new error type.
///
/// A variant may name the request field it relates to with an optional
/// `#[field = "..."]` attribute.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[status = $status_code:ident]
                #[message = $message:literal]
                $(#[field = $field:literal])?
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        #[repr(u16)]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            status_code: ::http::StatusCode::$status_code,
                            field: $crate::define_error!(@field $($field)?),
                            message: $message.to_string(),
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
    (@field) => {
        None
    };
    (@field $field:literal) => {
        Some($field)
    };
}

/// REST API [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// [`http::StatusCode`] of this [`Error`].
    pub status_code: http::StatusCode,

    /// Name of the request field this [`Error`] relates to, if any.
    pub field: Option<&'static str>,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// [`Error`] message.
    pub message: String,
}

impl Error {
    /// Create a new [`Error`] representing an internal server error.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_SERVER_ERROR",
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            field: None,
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Creates a new [`Error`] about an invalid value of the provided
    /// request `field`.
    #[must_use]
    pub fn invalid_field(field: &'static str) -> Self {
        Self {
            code: "INVALID_FIELD",
            status_code: http::StatusCode::BAD_REQUEST,
            field: Some(field),
            message: format!("Invalid value of `{field}`"),
            backtrace: None,
        }
    }

    /// Returns the JSON [`Body`] of this [`Error`] sent to the client.
    ///
    /// Details of internal errors never leave the server.
    fn body(&self) -> Body<'_> {
        if self.status_code.is_server_error() {
            Body {
                code: "INTERNAL_SERVER_ERROR",
                message: "Internal server error",
                field: None,
            }
        } else {
            Body {
                code: self.code,
                message: &self.message,
                field: self.field,
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            status_code: _,
            field,
            backtrace,
            message,
        } = self;

        write!(
            f,
            "[{code}]{}: {message}{}",
            field.iter().format_with("", |n, f| f(&format_args!("({n})"))),
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("{trace}"))),
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            log::error!("{self}");
        }
        (self.status_code, Json(self.body())).into_response()
    }
}

/// JSON body of an [`Error`] response.
#[derive(Debug, Serialize)]
struct Body<'a> {
    /// [`Error`] code.
    code: Code,

    /// Human-readable message.
    message: &'a str,

    /// Related request field.
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        self.as_ref().try_as_error().map(|mut e| {
            e.backtrace = Some(self.trace().clone());
            e
        })
    }

    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        let mut error = self
            .as_ref()
            .try_as_error()
            .unwrap_or_else(|| Error::internal(self));
        error.backtrace = Some(self.trace().clone());
        error
    }
}

define_error! {
    enum RequestError {
        #[code = "INVALID_REQUEST"]
        #[status = BAD_REQUEST]
        #[message = "Malformed request"]
        Malformed,
    }
}

define_error! {
    enum PolicyError {
        #[code = "ACCESS_RESTRICTED"]
        #[status = FORBIDDEN]
        #[message = "Access restricted"]
        Forbidden,
    }
}

/// Implements [`AsError`] for the provided extractor rejections, turning
/// them into [`RequestError::Malformed`] with the rejection text.
macro_rules! impl_rejection {
    ($($ty:ty),* $(,)?) => {$(
        impl AsError for $ty {
            fn try_as_error(&self) -> Option<Error> {
                let mut error = Error::from(RequestError::Malformed);
                error.message = self.body_text();
                Some(error)
            }
        }

        impl From<$ty> for Error {
            fn from(rejection: $ty) -> Self {
                rejection.into_error()
            }
        }
    )*};
}

impl_rejection!(BytesRejection, JsonRejection, PathRejection, QueryRejection);

impl AsError for TypedHeaderRejection {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = Error::from(RequestError::Malformed);
        error.message = self.to_string();
        Some(error)
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for policy::Forbidden {
    fn try_as_error(&self) -> Option<Error> {
        Some(PolicyError::Forbidden.into())
    }
}

impl AsError for query::Error {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
        }
    }
}

#[cfg(test)]
mod spec {
    use service::{
        infra::{database, postgres},
        policy, query,
    };

    use super::{AsError as _, Error, PolicyError};

    fn db_error() -> database::Error {
        postgres::Error::PoolError(postgres::connection::PoolError::Closed)
            .into()
    }

    #[test]
    fn maps_forbidden_to_403() {
        let err = query::Error::Forbidden(policy::Forbidden).as_error();

        assert_eq!(err.code, "ACCESS_RESTRICTED");
        assert_eq!(err.status_code, http::StatusCode::FORBIDDEN);
        assert_eq!(err.field, None);
    }

    #[test]
    fn maps_database_errors_to_opaque_500() {
        let err = query::Error::Db(db_error()).as_error();

        assert_eq!(err.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(err.status_code, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("Pool"));

        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "code": "INTERNAL_SERVER_ERROR",
                "message": "Internal server error",
            }),
        );
    }

    #[test]
    fn attaches_trace() {
        let err = tracerr::new!(query::Error::Forbidden(policy::Forbidden));

        assert!(err.as_error().backtrace.is_some());
        assert!(tracerr::new!(query::Error::Db(db_error()))
            .as_error()
            .backtrace
            .is_some());
    }

    #[test]
    fn serializes_field() {
        let err = Error::invalid_field("email");
        let body = serde_json::to_value(err.body()).unwrap();

        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_FIELD");
        assert_eq!(body["field"], "email");

        let body =
            serde_json::to_value(Error::from(PolicyError::Forbidden).body())
                .unwrap();
        assert!(body.get("field").is_none());
    }
}
