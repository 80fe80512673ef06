//! [`Query`] collection related to [`Payment`]s.

use common::{operations::By, Month};

use crate::{
    domain::{payment, Payment, Reminder},
    policy, read,
};
#[cfg(doc)]
use crate::{policy::Actor, Query};

use super::ScopedQuery;

/// Queries a [`Payment`] by its [`payment::Id`] on behalf of an [`Actor`].
pub type ById =
    ScopedQuery<policy::payment::View, By<Option<Payment>, payment::Id>>;

/// Queries a list of [`Payment`]s on behalf of an [`Actor`].
pub type List = ScopedQuery<
    policy::payment::View,
    By<read::payment::list::Page, read::payment::list::Selector>,
>;

/// Queries a list of own [`Payment`]s of a tenant [`Actor`].
pub type Mine = ScopedQuery<
    policy::tenant::Own,
    By<read::payment::list::Page, read::payment::list::Selector>,
>;

/// Queries the earliest unpaid [`Payment`] of a tenant [`Actor`].
pub type Current =
    ScopedQuery<policy::tenant::Own, By<Option<read::payment::Current>, ()>>;

/// Queries [`read::payment::Stats`] of [`Payment`]s due in a [`Month`] (or
/// all of them) on behalf of an [`Actor`].
pub type Stats = ScopedQuery<
    policy::payment::Stats,
    By<read::payment::Stats, Option<Month>>,
>;

/// Queries [`Reminder`]s sent about a [`Payment`] on behalf of an [`Actor`].
///
/// [`None`] is returned if the [`Payment`] is not visible to the [`Actor`].
pub type Reminders = ScopedQuery<
    policy::payment::View,
    By<Option<Vec<Reminder>>, payment::Id>,
>;

#[cfg(test)]
mod spec {
    use common::Month;
    use futures::executor::block_on;

    use crate::{
        command::GenerateMonthlyPayments,
        domain::user::{self, Role},
        infra::database::memory::Memory,
        Actor, Command as _, Query as _,
    };

    use super::ById;

    #[test]
    fn scopes_payment_lookup_to_own_agent() {
        let db = Memory::default();
        let service = db.service();
        let (owner, stranger) = (user::Id::new(), user::Id::new());
        let tenant = user::Id::new();
        _ = db.lease(owner, tenant, "900");
        _ = block_on(service.execute(GenerateMonthlyPayments {
            actor: Actor {
                id: owner,
                role: Role::Agent,
            },
            month: Month::new(2031, 5),
            day: Some(10),
        }))
        .unwrap();
        let id = db.payments()[0].id;

        let lookup = |id_of: user::Id, role| {
            block_on(service.execute(ById::by(Actor { id: id_of, role }, id)))
                .unwrap()
                .map(|p| p.id)
        };

        assert_eq!(lookup(owner, Role::Agent), Some(id));
        assert_eq!(lookup(stranger, Role::Agent), None);
        assert_eq!(lookup(tenant, Role::Tenant), Some(id));
        assert_eq!(lookup(user::Id::new(), Role::Tenant), None);
        assert_eq!(lookup(stranger, Role::Admin), Some(id));
    }
}
