//! [`LikePattern`] definition.

use derive_more::Display;
use postgres_types::ToSql;

/// `ILIKE` pattern matching any text containing the given input literally.
#[derive(Clone, Debug, Display, Eq, PartialEq, ToSql)]
#[postgres(transparent)]
pub struct LikePattern(String);

impl LikePattern {
    /// Creates a new [`LikePattern`] out of the given `input`.
    #[must_use]
    pub fn new(input: impl AsRef<str>) -> Self {
        let escaped = input
            .as_ref()
            .replace('\\', r"\\")
            .replace('%', r"\%")
            .replace('_', r"\_");
        Self(format!("%{escaped}%"))
    }
}

#[cfg(test)]
mod spec {
    use super::LikePattern;

    #[test]
    fn wraps_input() {
        assert_eq!(LikePattern::new("Paris").to_string(), "%Paris%");
    }

    #[test]
    fn escapes_wildcards() {
        assert_eq!(
            LikePattern::new(r"50%_off\").to_string(),
            r"%50\%\_off\\%",
        );
    }
}
