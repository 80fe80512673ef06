//! Abstractions for page-number pagination.

use std::num::NonZeroU32;

/// Pagination arguments: a 1-based page number and a page size.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Arguments {
    /// 1-based number of the requested page.
    page: NonZeroU32,

    /// Number of items on a page.
    per_page: NonZeroU32,
}

impl Arguments {
    /// Page size used when none is requested.
    pub const DEFAULT_PER_PAGE: u32 = 20;

    /// Largest page size allowed.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Creates new [`Arguments`], applying defaults for absent values.
    ///
    /// [`None`] is returned if `page` is `0`, or `per_page` is `0` or
    /// greater than [`Arguments::MAX_PER_PAGE`].
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Option<Self> {
        let page = NonZeroU32::new(page.unwrap_or(1))?;
        let per_page =
            NonZeroU32::new(per_page.unwrap_or(Self::DEFAULT_PER_PAGE))?;
        (per_page.get() <= Self::MAX_PER_PAGE).then_some(Self { page, per_page })
    }

    /// Returns the 1-based number of the requested page.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.get()
    }

    /// Returns the requested page size.
    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page.get()
    }

    /// Returns the number of items to skip before the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.get() - 1) * u64::from(self.per_page.get())
    }

    /// Returns the maximum number of items on the requested page.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page.get())
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            page: NonZeroU32::MIN,
            per_page: NonZeroU32::new(Self::DEFAULT_PER_PAGE)
                .unwrap_or(NonZeroU32::MIN),
        }
    }
}

/// A page of items together with the total number of matching items.
#[derive(Clone, Debug)]
pub struct Page<I> {
    /// Items on this [`Page`].
    pub items: Vec<I>,

    /// Total number of items matching the selection, across all pages.
    pub total_count: u64,

    /// [`Arguments`] this [`Page`] was selected with.
    pub arguments: Arguments,
}

impl<I> Page<I> {
    /// Creates a new [`Page`].
    #[must_use]
    pub fn new(
        arguments: Arguments,
        items: impl IntoIterator<Item = impl Into<I>>,
        total_count: u64,
    ) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            total_count,
            arguments,
        }
    }

    /// Maps items of this [`Page`], keeping its counters.
    #[must_use]
    pub fn map<T>(self, f: impl FnMut(I) -> T) -> Page<T> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            arguments: self.arguments,
        }
    }

    /// Indicates whether more items exist past this [`Page`].
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.arguments.offset() + (self.items.len() as u64) < self.total_count
    }
}

/// Pagination selector.
#[derive(Clone, Copy, Debug)]
pub struct Selector<F> {
    /// Pagination [`Arguments`].
    pub arguments: Arguments,

    /// Additional filter being applied to the result.
    pub filter: F,
}

/// Defines pagination types.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_pagination {
    ($node:ty, $filter:ty) => {
        #[doc = "A [`Page`] of nodes."]
        pub type Page = $crate::pagination::Page<$node>;

        #[doc = "Arguments for selecting a [`Page`]."]
        pub type Arguments = $crate::pagination::Arguments;

        #[doc = "[`Page`] selector."]
        pub type Selector = $crate::pagination::Selector<$filter>;
    };
}

#[cfg(test)]
mod spec {
    use super::{Arguments, Page};

    #[test]
    fn defaults() {
        let args = Arguments::new(None, None).unwrap();

        assert_eq!(args, Arguments::default());
        assert_eq!(args.page(), 1);
        assert_eq!(args.per_page(), 20);
        assert_eq!(args.offset(), 0);
        assert_eq!(args.limit(), 20);
    }

    #[test]
    fn offsets() {
        let args = Arguments::new(Some(3), Some(25)).unwrap();

        assert_eq!(args.offset(), 50);
        assert_eq!(args.limit(), 25);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Arguments::new(Some(0), None).is_none());
        assert!(Arguments::new(None, Some(0)).is_none());
        assert!(Arguments::new(None, Some(101)).is_none());
        assert!(Arguments::new(None, Some(100)).is_some());
    }

    #[test]
    fn detects_next_page() {
        let args = Arguments::new(Some(2), Some(2)).unwrap();

        assert!(Page::<u8>::new(args, [1u8, 2], 5).has_next_page());
        assert!(!Page::<u8>::new(args, [1u8, 2], 4).has_next_page());
        assert!(!Page::<u8>::new(args, [1u8; 0], 1).has_next_page());
    }
}
