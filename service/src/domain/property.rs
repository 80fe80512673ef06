//! [`Property`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{Display, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::Serialize;

#[cfg(doc)]
use crate::domain::User;
use crate::domain::user;

use super::{define_id, define_text};

/// Real estate property managed by an agent.
#[derive(Clone, Debug)]
pub struct Property {
    /// ID of this [`Property`].
    pub id: Id,

    /// [`Name`] of this [`Property`].
    pub name: Name,

    /// Street [`Address`] of this [`Property`].
    pub address: Address,

    /// [`City`] this [`Property`] is located in.
    pub city: City,

    /// [`PostalCode`] of this [`Property`].
    pub postal_code: PostalCode,

    /// [`Kind`] of this [`Property`].
    pub kind: Kind,

    /// [`Surface`] of this [`Property`], if known.
    pub surface: Option<Surface>,

    /// Number of rooms in this [`Property`], if known.
    pub rooms: Option<Rooms>,

    /// Monthly rent of this [`Property`], excluding charges.
    pub monthly_rent: Money,

    /// Monthly charges of this [`Property`].
    pub charges: Money,

    /// [`Description`] of this [`Property`].
    pub description: Description,

    /// ID of the agent [`User`] managing this [`Property`].
    pub agent_id: user::Id,

    /// Indicator whether this [`Property`] has no active lease.
    pub is_available: bool,

    /// [`DateTime`] when this [`Property`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Property`] was last modified.
    pub updated_at: ModificationDateTime,
}

impl Property {
    /// Returns the full postal address of this [`Property`].
    #[must_use]
    pub fn full_address(&self) -> String {
        format!("{}, {} {}", self.address, self.postal_code, self.city)
    }

    /// Returns the rent including charges.
    #[must_use]
    pub fn total_rent(&self) -> Money {
        self.monthly_rent + self.charges
    }

    /// Syncs [`Property::is_available`] with whether this [`Property`] has
    /// an active lease.
    ///
    /// Returns `true` if [`Property::is_available`] has changed.
    pub fn sync_availability(&mut self, is_rented: bool) -> bool {
        let changed = self.is_available == is_rented;
        self.is_available = !is_rented;
        changed
    }
}

define_id! {
    #[doc = "ID of a [`Property`]."]
    Id
}

define_text! {
    #[doc = "Name of a [`Property`]."]
    Name(1..=200)
}

define_text! {
    #[doc = "Street address of a [`Property`]."]
    Address(1..=255)
}

define_text! {
    #[doc = "City of a [`Property`]."]
    City(1..=100)
}

define_text! {
    #[doc = "Postal code of a [`Property`]."]
    PostalCode(1..=10)
}

define_text! {
    #[doc = "Free-form description of a [`Property`]."]
    Description(..=10_000)
}

define_kind! {
    #[doc = "Kind of a [`Property`]."]
    enum Kind {
        #[doc = "Apartment."]
        Apartment = 1,

        #[doc = "House."]
        House = 2,

        #[doc = "Studio."]
        Studio = 3,

        #[doc = "Loft."]
        Loft = 4,

        #[doc = "Commercial premises."]
        Commercial = 5,

        #[doc = "Parking lot."]
        Parking = 6,

        #[doc = "Anything else."]
        Other = 7,
    }
}

/// Surface of a [`Property`] in square meters.
#[derive(Clone, Copy, Debug, Display, Eq, Into, PartialEq, Serialize)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Surface(Decimal);

impl Surface {
    /// Creates a new [`Surface`] if the given `value` is positive and fits
    /// into 2 decimal places.
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        (value > Decimal::ZERO
            && value.scale() <= 2
            && value < Decimal::from(1_000_000))
        .then_some(Self(value))
    }
}

/// Number of rooms in a [`Property`].
#[derive(Clone, Copy, Debug, Display, Eq, Into, PartialEq, Serialize)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Rooms(i16);

impl Rooms {
    /// Creates a new [`Rooms`] if the given `count` is positive.
    #[must_use]
    pub fn new(count: i16) -> Option<Self> {
        (count > 0).then_some(Self(count))
    }
}

/// [`DateTime`] when a [`Property`] was created.
pub type CreationDateTime = DateTimeOf<(Property, unit::Creation)>;

/// [`DateTime`] when a [`Property`] was last modified.
pub type ModificationDateTime = DateTimeOf<(Property, unit::Modification)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{DateTime, Money};

    use super::{
        Address, City, Description, Kind, Name, PostalCode, Property, Surface,
    };
    use crate::domain::user;

    fn property() -> Property {
        Property {
            id: super::Id::new(),
            name: Name::new("Appartement Haussmann").unwrap(),
            address: Address::new("15 rue de la Paix").unwrap(),
            city: City::new("Paris").unwrap(),
            postal_code: PostalCode::new("75002").unwrap(),
            kind: Kind::Apartment,
            surface: Surface::new("85.5".parse().unwrap()),
            rooms: None,
            monthly_rent: Money::from_str("1500").unwrap(),
            charges: Money::from_str("150.50").unwrap(),
            description: Description::new("").unwrap(),
            agent_id: user::Id::new(),
            is_available: true,
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn derives_address_and_rent() {
        let p = property();

        assert_eq!(p.full_address(), "15 rue de la Paix, 75002 Paris");
        assert_eq!(p.total_rent(), Money::from_str("1650.50").unwrap());
    }

    #[test]
    fn syncs_availability_with_leases() {
        let mut p = property();

        assert!(!p.sync_availability(false));
        assert!(p.is_available);
        assert!(p.sync_availability(true));
        assert!(!p.is_available);
        assert!(p.sync_availability(false));
        assert!(p.is_available);
    }

    #[test]
    fn validates_texts() {
        assert!(Name::new("").is_none());
        assert!(Name::new(" padded").is_none());
        assert!(PostalCode::new("12345678901").is_none());
        assert!(Description::new(" free  text ").is_some());
    }

    #[test]
    fn parses_kinds() {
        assert_eq!("commercial".parse::<Kind>().unwrap(), Kind::Commercial);
        assert_eq!(Kind::Parking.to_string(), "parking");
        assert!("castle".parse::<Kind>().is_err());
    }
}
