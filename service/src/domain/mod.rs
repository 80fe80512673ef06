//! Domain definitions.

pub mod assignment;
pub mod payment;
pub mod property;
pub mod reminder;
pub mod user;

pub use self::{
    assignment::Assignment, payment::Payment, property::Property,
    reminder::Reminder, user::User,
};

/// Defines a [`String`] newtype whose length is bounded.
///
/// `$min..=$max` form additionally rejects values with leading or trailing
/// whitespace, while `..=$max` form accepts any text up to `$max` chars.
macro_rules! define_text {
    (
        #[doc = $doc:literal]
        $name:ident($min:literal..=$max:literal)
    ) => {
        $crate::domain::define_text!(@impl $doc, $name, |s: &str| {
            s.trim() == s && ($min..=$max).contains(&s.chars().count())
        });
    };
    (
        #[doc = $doc:literal]
        $name:ident(..=$max:literal)
    ) => {
        $crate::domain::define_text!(@impl $doc, $name, |s: &str| {
            s.chars().count() <= $max
        });
    };
    (@impl $doc:literal, $name:ident, $check:expr) => {
        #[doc = $doc]
        #[derive(
            ::derive_more::AsRef,
            Clone,
            Debug,
            ::derive_more::Display,
            Eq,
            Hash,
            PartialEq,
            ::serde::Serialize,
        )]
        #[as_ref(forward)]
        #[cfg_attr(
            feature = "postgres",
            derive(::postgres_types::FromSql, ::postgres_types::ToSql),
            postgres(transparent)
        )]
        pub struct $name(String);

        impl $name {
            #[doc = concat!(
                "Creates a new [`", stringify!($name), "`] if the given ",
                "`value` is valid.",
            )]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let value = value.into();
                Self::check(&value).then_some(Self(value))
            }

            #[doc = concat!(
                "Checks whether the given `value` is a valid [`",
                stringify!($name), "`].",
            )]
            fn check(value: &str) -> bool {
                let check: fn(&str) -> bool = $check;
                check(value)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = &'static str;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s).ok_or(concat!("invalid `", stringify!($name), "`"))
            }
        }
    };
}
pub(crate) use define_text;

/// Defines a UUID-based ID newtype.
macro_rules! define_id {
    (#[doc = $doc:literal] $name:ident) => {
        #[doc = $doc]
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            ::serde::Deserialize,
            ::derive_more::Display,
            Eq,
            ::derive_more::From,
            ::derive_more::FromStr,
            Hash,
            ::derive_more::Into,
            Ord,
            PartialEq,
            PartialOrd,
            ::serde::Serialize,
        )]
        #[cfg_attr(
            feature = "postgres",
            derive(::postgres_types::FromSql, ::postgres_types::ToSql),
            postgres(transparent)
        )]
        pub struct $name(::uuid::Uuid);

        impl $name {
            #[doc = concat!(
                "Creates a new random [`", stringify!($name), "`].",
            )]
            #[must_use]
            pub fn new() -> Self {
                Self(::uuid::Uuid::new_v4())
            }
        }
    };
}
pub(crate) use define_id;
