//! Calendar date utilities.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{cmp::Ordering, fmt, marker::PhantomData, str::FromStr};

use derive_more::{Debug, Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::{format_description::BorrowedFormatItem, macros::format_description};

/// ISO 8601 calendar date format (`YYYY-MM-DD`).
const ISO: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]");

/// Untyped calendar date.
pub type Date = DateOf;

/// Calendar date without a time zone.
#[derive(Debug)]
pub struct DateOf<Of: ?Sized = ()> {
    /// Inner representation of the date.
    inner: time::Date,

    /// Type parameter describing the kind of date.
    #[debug(skip)]
    _of: PhantomData<Of>,
}

impl<Of: ?Sized> DateOf<Of> {
    /// Returns the current UTC date.
    #[must_use]
    pub fn today() -> Self {
        time::OffsetDateTime::now_utc().date().into()
    }

    /// Creates a new [`DateOf`] from the provided calendar components.
    ///
    /// [`None`] is returned if the components don't form a valid date.
    #[must_use]
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = time::Month::try_from(month).ok()?;
        time::Date::from_calendar_date(year, month, day)
            .ok()
            .map(Into::into)
    }

    /// Returns the year of this date.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.inner.year()
    }

    /// Returns the day of month of this date.
    #[must_use]
    pub fn day(&self) -> u8 {
        self.inner.day()
    }

    /// Returns the [`Month`] this date belongs to.
    #[must_use]
    pub fn month(&self) -> Month {
        Month {
            year: self.inner.year(),
            month: self.inner.month(),
        }
    }

    /// Coerces one kind of [`DateOf`] into another.
    #[must_use]
    pub fn coerce<NewOf: ?Sized>(self) -> DateOf<NewOf> {
        DateOf {
            inner: self.inner,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> Copy for DateOf<Of> {}
impl<Of: ?Sized> Clone for DateOf<Of> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Of: ?Sized> Eq for DateOf<Of> {}
impl<Of: ?Sized> PartialEq for DateOf<Of> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<Of: ?Sized> Ord for DateOf<Of> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<Of: ?Sized> PartialOrd for DateOf<Of> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Of: ?Sized> From<time::Date> for DateOf<Of> {
    fn from(inner: time::Date) -> Self {
        Self {
            inner,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> From<DateOf<Of>> for time::Date {
    fn from(d: DateOf<Of>) -> Self {
        d.inner
    }
}

impl<Of: ?Sized> fmt::Display for DateOf<Of> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.inner.format(ISO).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl<Of: ?Sized> FromStr for DateOf<Of> {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time::Date::parse(s, ISO).map(Into::into)
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> FromSql<'_> for DateOf<Of> {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Into::into)
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> ToSql for DateOf<Of> {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.inner.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
impl<Of: ?Sized> serde::Serialize for DateOf<Of> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de, Of: ?Sized> serde::Deserialize<'de> for DateOf<Of> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse()
            .map_err(|e| D::Error::custom(format!("invalid date `{s}`: {e}")))
    }
}

/// Calendar month of a particular year.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Month {
    /// Year of this [`Month`].
    year: i32,

    /// Month of the year.
    month: time::Month,
}

impl Month {
    /// Latest day of month every [`Month`] has.
    pub const LAST_COMMON_DAY: u8 = 28;

    /// Creates a new [`Month`] out of the provided year and month number
    /// (`1..=12`).
    #[must_use]
    pub fn new(year: i32, month: u8) -> Option<Self> {
        let month = time::Month::try_from(month).ok()?;
        // Keep in range of `time::Date`.
        time::Date::from_calendar_date(year, month, 1).ok()?;
        Some(Self { year, month })
    }

    /// Parses a `YYYY-MM` string, returning [`None`] on any malformed input.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Option<Self> {
        let (year, month) = s.trim().split_once('-')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    /// Returns the [`Month`] following the one the provided date belongs to.
    #[must_use]
    pub fn following<Of: ?Sized>(today: DateOf<Of>) -> Self {
        today.month().next()
    }

    /// Returns the [`Month`] following this one.
    #[must_use]
    pub fn next(self) -> Self {
        match self.month {
            time::Month::December => Self {
                year: self.year + 1,
                month: time::Month::January,
            },
            m => Self {
                year: self.year,
                month: m.next(),
            },
        }
    }

    /// Returns the year of this [`Month`].
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Returns the number (`1..=12`) of this [`Month`] in its year.
    #[must_use]
    pub fn number(&self) -> u8 {
        u8::from(self.month)
    }

    /// Returns the English name of this [`Month`] (`January`, ...).
    #[must_use]
    pub fn name(&self) -> String {
        self.month.to_string()
    }

    /// Returns the first day of this [`Month`].
    #[must_use]
    pub fn first_day<Of: ?Sized>(&self) -> DateOf<Of> {
        self.day(1)
    }

    /// Returns the date of the provided day in this [`Month`].
    ///
    /// The day is clamped into `1..=28`, so it exists in every month.
    #[must_use]
    pub fn day<Of: ?Sized>(&self, day: u8) -> DateOf<Of> {
        let day = day.clamp(1, Self::LAST_COMMON_DAY);
        time::Date::from_calendar_date(self.year, self.month, day)
            .map_or_else(|_| unreachable!("checked in `Month::new`"), Into::into)
    }

    /// Indicates whether the provided date belongs to this [`Month`].
    #[must_use]
    pub fn contains<Of: ?Sized>(&self, date: DateOf<Of>) -> bool {
        date.month() == *self
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.number())
    }
}

/// Error of parsing a [`Month`] from a string.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("expected `YYYY-MM` month")]
pub struct MonthParseError;

impl FromStr for Month {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s).ok_or(MonthParseError)
    }
}

#[cfg(test)]
mod spec {
    use super::{Date, Month};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_formats_iso_dates() {
        let d = date("2025-02-05");
        assert_eq!(d, Date::from_ymd(2025, 2, 5).unwrap());
        assert_eq!(d.to_string(), "2025-02-05");

        assert!("2025-02-30".parse::<Date>().is_err());
        assert!("05/02/2025".parse::<Date>().is_err());
    }

    #[test]
    fn following_month_is_always_the_next_one() {
        assert_eq!(
            Month::following(date("2025-01-31")),
            Month::new(2025, 2).unwrap(),
        );
        assert_eq!(
            Month::following(date("2025-03-01")),
            Month::new(2025, 4).unwrap(),
        );
        assert_eq!(
            Month::following(date("2024-12-15")),
            Month::new(2025, 1).unwrap(),
        );
    }

    #[test]
    fn parses_months_leniently() {
        assert_eq!(
            Month::parse_lenient("2025-03"),
            Some(Month::new(2025, 3).unwrap()),
        );
        assert_eq!(
            Month::parse_lenient("2025-3"),
            Some(Month::new(2025, 3).unwrap()),
        );
        assert_eq!(Month::parse_lenient("2025-13"), None);
        assert_eq!(Month::parse_lenient("2025"), None);
        assert_eq!(Month::parse_lenient("march"), None);
        assert_eq!(Month::parse_lenient(""), None);
    }

    #[test]
    fn clamps_day_into_common_range() {
        let feb = Month::new(2025, 2).unwrap();

        assert_eq!(feb.day::<()>(5), date("2025-02-05"));
        assert_eq!(feb.day::<()>(31), date("2025-02-28"));
        assert_eq!(feb.day::<()>(0), date("2025-02-01"));
        assert_eq!(feb.first_day::<()>(), date("2025-02-01"));
    }

    #[test]
    fn displays_month() {
        let m = Month::new(2025, 2).unwrap();

        assert_eq!(m.to_string(), "2025-02");
        assert_eq!(m.name(), "February");
        assert!(m.contains(date("2025-02-28")));
        assert!(!m.contains(date("2025-03-01")));
    }
}
