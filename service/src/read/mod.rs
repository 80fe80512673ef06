//! Read entities definitions.

pub mod assignment;
pub mod payment;
pub mod property;
pub mod user;

use derive_more::{AsRef, Display};

/// Wrapper around an entity indicating that it is currently in force.
#[derive(Clone, Copy, Debug)]
pub struct Active<T>(pub T);

/// Text to search for as a case-insensitive substring.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(forward)]
pub struct Search(String);

impl Search {
    /// Maximum length of a [`Search`] text in chars.
    const MAX_LEN: usize = 200;

    /// Creates a new [`Search`] out of the provided `input`.
    ///
    /// Surrounding whitespace is trimmed. [`None`] is returned if nothing is
    /// left to search for.
    #[must_use]
    pub fn new(input: &str) -> Option<Self> {
        let input = input.trim();
        (!input.is_empty() && input.chars().count() <= Self::MAX_LEN)
            .then(|| Self(input.to_owned()))
    }
}

#[cfg(test)]
mod spec {
    use super::Search;

    #[test]
    fn trims_search() {
        assert_eq!(Search::new("  Paris ").unwrap().to_string(), "Paris");
        assert!(Search::new("   ").is_none());
        assert!(Search::new(&"a".repeat(201)).is_none());
    }
}
