//! [`Reminder`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};

use crate::domain::payment;
#[cfg(doc)]
use crate::domain::Payment;

use super::{define_id, define_text};

/// Reminder sent about a [`Payment`]. Never mutated once created.
#[derive(Clone, Debug)]
pub struct Reminder {
    /// ID of this [`Reminder`].
    pub id: Id,

    /// ID of the [`Payment`] this [`Reminder`] is about.
    pub payment_id: payment::Id,

    /// [`Kind`] of this [`Reminder`].
    pub kind: Kind,

    /// [`Message`] of this [`Reminder`].
    pub message: Message,

    /// [`DateTime`] when this [`Reminder`] was sent.
    pub sent_at: SendingDateTime,
}

define_id! {
    #[doc = "ID of a [`Reminder`]."]
    Id
}

define_kind! {
    #[doc = "Kind of a [`Reminder`]."]
    enum Kind {
        #[doc = "The [`Payment`] is due soon."]
        Upcoming = 1,

        #[doc = "The [`Payment`] is due today."]
        Due = 2,

        #[doc = "The [`Payment`] is past due."]
        Overdue = 3,
    }
}

define_text! {
    #[doc = "Text of a [`Reminder`]."]
    Message(..=10_000)
}

impl Message {
    /// Composes the default [`Message`] of the provided [`Kind`] about the
    /// provided [`Payment`].
    #[must_use]
    pub fn default_for(kind: Kind, payment: &payment::Payment) -> Self {
        let (amount, due) = (payment.amount, payment.due_date);
        Self(match kind {
            Kind::Upcoming => {
                format!("Reminder: a payment of {amount} is due on {due}.")
            }
            Kind::Due => {
                format!("Reminder: a payment of {amount} is due today ({due}).")
            }
            Kind::Overdue => format!(
                "Reminder: the payment of {amount} due on {due} is overdue.",
            ),
        })
    }
}

/// [`DateTime`] when a [`Reminder`] was sent.
pub type SendingDateTime = DateTimeOf<(Reminder, unit::Sending)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{Date, DateTime, Money};

    use super::{Kind, Message};
    use crate::domain::{assignment, payment, Payment};

    #[test]
    fn composes_default_message() {
        let p = Payment {
            id: payment::Id::new(),
            assignment_id: assignment::Id::new(),
            amount: Money::from_str("1650").unwrap(),
            due_date: "2025-02-05".parse::<Date>().unwrap().coerce(),
            payment_date: None,
            status: payment::Status::Overdue,
            method: None,
            reference: payment::Reference::new(),
            receipt_number: None,
            notes: payment::Notes::new("").unwrap(),
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
        };

        assert_eq!(
            Message::default_for(Kind::Overdue, &p).to_string(),
            "Reminder: the payment of 1650.00 due on 2025-02-05 is overdue.",
        );
        assert_eq!(
            Message::default_for(Kind::Due, &p).to_string(),
            "Reminder: a payment of 1650.00 is due today (2025-02-05).",
        );
    }
}
