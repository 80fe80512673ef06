//! [`Payment`] definitions.

#[cfg(doc)]
use common::{Date, DateTime};
use common::{define_kind, unit, DateOf, DateTimeOf, Money, Month};
use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::Serialize;

use crate::domain::assignment;
#[cfg(doc)]
use crate::domain::Assignment;

use super::{define_id, define_text};

/// Monthly rent payment of an [`Assignment`].
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the [`Assignment`] this [`Payment`] belongs to.
    pub assignment_id: assignment::Id,

    /// Amount due.
    pub amount: Money,

    /// [`Date`] this [`Payment`] is due at.
    pub due_date: DueDate,

    /// [`Date`] this [`Payment`] was settled at.
    pub payment_date: Option<SettlementDate>,

    /// [`Status`] of this [`Payment`].
    pub status: Status,

    /// [`Method`] this [`Payment`] was settled with.
    pub method: Option<Method>,

    /// Unique opaque [`Reference`] of this [`Payment`].
    pub reference: Reference,

    /// [`ReceiptNumber`] issued once this [`Payment`] is [`Status::Paid`].
    pub receipt_number: Option<ReceiptNumber>,

    /// [`Notes`] on this [`Payment`].
    pub notes: Notes,

    /// [`DateTime`] when this [`Payment`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Payment`] was last modified.
    pub updated_at: ModificationDateTime,
}

impl Payment {
    /// Re-derives the [`Status`] of this unpaid [`Payment`] from its
    /// [`DueDate`] and the provided `today`.
    ///
    /// A [`Status::Pending`] payment past its due date becomes
    /// [`Status::Overdue`], while a [`Status::Overdue`] one whose due date
    /// has been moved to `today` or later becomes [`Status::Pending`] again.
    /// [`Status::Paid`] payments are left untouched.
    pub fn derive_status<Of: ?Sized>(&mut self, today: DateOf<Of>) {
        let is_past_due = self.due_date.coerce::<()>() < today.coerce();
        self.status = match self.status {
            Status::Pending if is_past_due => Status::Overdue,
            Status::Overdue if !is_past_due => Status::Pending,
            s @ (Status::Pending | Status::Overdue | Status::Paid) => s,
        };
    }

    /// Indicates whether this [`Payment`] is unpaid past its [`DueDate`].
    #[must_use]
    pub fn is_late<Of: ?Sized>(&self, today: DateOf<Of>) -> bool {
        self.status != Status::Paid
            && self.due_date.coerce::<()>() < today.coerce()
    }

    /// Indicates whether a [`ReceiptNumber`] must be issued for this
    /// [`Payment`] before persisting it.
    #[must_use]
    pub fn needs_receipt(&self) -> bool {
        self.status == Status::Paid && self.receipt_number.is_none()
    }

    /// Changes the [`Status`] of this [`Payment`].
    ///
    /// # Errors
    ///
    /// With [`AlreadyPaid`] if this [`Payment`] is [`Status::Paid`] and the
    /// new [`Status`] is not.
    pub fn set_status(&mut self, status: Status) -> Result<(), AlreadyPaid> {
        if self.status == Status::Paid && status != Status::Paid {
            return Err(AlreadyPaid(self.id));
        }
        self.status = status;
        Ok(())
    }

    /// Marks this [`Payment`] as [`Status::Paid`] at the provided [`Date`]
    /// with the provided [`Method`].
    ///
    /// Settling an already [`Status::Paid`] payment keeps its
    /// [`ReceiptNumber`].
    pub fn settle(&mut self, date: SettlementDate, method: Method) {
        self.status = Status::Paid;
        self.payment_date = Some(date);
        self.method = Some(method);
    }
}

/// Error of moving a [`Status::Paid`] [`Payment`] out of this [`Status`].
#[derive(Clone, Copy, Debug, Display, derive_more::Error)]
#[display("`Payment(id: {_0})` is already paid")]
pub struct AlreadyPaid(#[error(not(source))] pub Id);

define_id! {
    #[doc = "ID of a [`Payment`]."]
    Id
}

define_id! {
    #[doc = "Opaque unique reference of a [`Payment`]."]
    Reference
}

define_text! {
    #[doc = "Free-form notes on a [`Payment`]."]
    Notes(..=10_000)
}

impl Notes {
    /// Composes [`Notes`] of a monthly rent [`Payment`] for the provided
    /// [`Month`].
    #[must_use]
    pub fn for_rent_of(month: Month) -> Self {
        Self(format!("Loyer {} {}", month.name(), month.year()))
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Awaiting payment before its due date."]
        Pending = 1,

        #[doc = "Unpaid past its due date."]
        Overdue = 2,

        #[doc = "Settled."]
        Paid = 3,
    }
}

define_kind! {
    #[doc = "Method a [`Payment`] is settled with."]
    enum Method {
        #[doc = "Bank transfer."]
        BankTransfer = 1,

        #[doc = "Bank card."]
        Card = 2,

        #[doc = "Check."]
        Check = 3,

        #[doc = "Cash."]
        Cash = 4,

        #[doc = "Any other method."]
        Other = 5,
    }
}

/// Human-readable proof-of-payment identifier in a `REC-YYYYMM-NNNN`
/// format, sequential within a calendar month.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ReceiptNumber(String);

impl ReceiptNumber {
    /// Creates a new [`ReceiptNumber`] with the provided 1-based `sequence`
    /// number within the provided [`Month`].
    #[must_use]
    pub fn new(month: Month, sequence: u32) -> Self {
        Self(format!(
            "REC-{:04}{:02}-{sequence:04}",
            month.year(),
            month.number(),
        ))
    }
}

/// [`Date`] a [`Payment`] is due at.
pub type DueDate = DateOf<(Payment, unit::Due)>;

/// [`Date`] a [`Payment`] was settled at.
pub type SettlementDate = DateOf<(Payment, unit::Settlement)>;

/// [`DateTime`] when a [`Payment`] was created.
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;

/// [`DateTime`] when a [`Payment`] was last modified.
pub type ModificationDateTime = DateTimeOf<(Payment, unit::Modification)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{Date, DateTime, Money, Month};

    use super::{
        Id, Method, Notes, Payment, ReceiptNumber, Reference, Status,
    };
    use crate::domain::assignment;

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn payment(due: &str, status: Status) -> Payment {
        Payment {
            id: Id::new(),
            assignment_id: assignment::Id::new(),
            amount: Money::from_str("1650").unwrap(),
            due_date: date(due).coerce(),
            payment_date: None,
            status,
            method: None,
            reference: Reference::new(),
            receipt_number: None,
            notes: Notes::new("").unwrap(),
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn pending_past_due_becomes_overdue() {
        let mut p = payment("2025-02-05", Status::Pending);
        p.derive_status(date("2025-02-06"));

        assert_eq!(p.status, Status::Overdue);
        assert!(p.is_late(date("2025-02-06")));
    }

    #[test]
    fn pending_due_today_stays_pending() {
        let mut p = payment("2025-02-05", Status::Pending);
        p.derive_status(date("2025-02-05"));

        assert_eq!(p.status, Status::Pending);
        assert!(!p.is_late(date("2025-02-05")));
    }

    #[test]
    fn overdue_with_moved_due_date_is_pending_again() {
        let mut p = payment("2025-03-05", Status::Overdue);
        p.derive_status(date("2025-02-10"));

        assert_eq!(p.status, Status::Pending);
    }

    #[test]
    fn overdue_stays_overdue_while_past_due() {
        let mut p = payment("2025-02-05", Status::Overdue);
        p.derive_status(date("2025-04-01"));

        assert_eq!(p.status, Status::Overdue);
    }

    #[test]
    fn paid_is_never_flipped() {
        let mut p = payment("2025-02-05", Status::Paid);
        p.derive_status(date("2025-04-01"));

        assert_eq!(p.status, Status::Paid);
        assert!(!p.is_late(date("2025-04-01")));
    }

    #[test]
    fn paid_cannot_be_reverted() {
        let mut p = payment("2025-02-05", Status::Pending);
        p.settle(date("2025-02-01").coerce(), Method::Card);

        assert!(p.needs_receipt());
        assert!(p.set_status(Status::Paid).is_ok());
        assert!(p.set_status(Status::Pending).is_err());
        assert_eq!(p.status, Status::Paid);
    }

    #[test]
    fn formats_receipt_numbers() {
        let month = Month::new(2025, 2).unwrap();

        assert_eq!(ReceiptNumber::new(month, 1).to_string(), "REC-202502-0001");
        assert_eq!(
            ReceiptNumber::new(month, 1234).to_string(),
            "REC-202502-1234",
        );
        assert_eq!(
            ReceiptNumber::new(month, 12345).to_string(),
            "REC-202502-12345",
        );
    }

    #[test]
    fn composes_rent_notes() {
        let month = Month::new(2025, 2).unwrap();

        assert_eq!(Notes::for_rent_of(month).to_string(), "Loyer February 2025");
    }

    #[test]
    fn kinds_are_snake_case() {
        assert_eq!(Method::BankTransfer.to_string(), "bank_transfer");
        assert_eq!("overdue".parse::<Status>().unwrap(), Status::Overdue);
    }
}
