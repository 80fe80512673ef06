//! Authorization policy deciding what an [`Actor`] may see and do.
//!
//! Every (resource, action) pair is a [`Rule`] resolving an [`Actor`] into
//! a [`Decision`]. An allowing [`Decision`] carries the [`Scope`] of records
//! the [`Actor`] may reach, which is then applied to database selectors.

use derive_more::{Display, Error};

use crate::domain::user::{Id as UserId, Role};
#[cfg(doc)]
use crate::domain::User;

/// Authenticated caller, as resolved on the server side.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Actor {
    /// ID of the calling [`User`].
    pub id: UserId,

    /// [`Role`] of the calling [`User`].
    pub role: Role,
}

impl Actor {
    /// Resolves the [`Scope`] this [`Actor`] is allowed by the [`Rule`] `R`.
    ///
    /// # Errors
    ///
    /// With [`Forbidden`] if the [`Rule`] denies this [`Actor`].
    pub fn authorize<R: Rule>(&self) -> Result<Scope, Forbidden> {
        match R::decide(self) {
            Decision::Allow(scope) => Ok(scope),
            Decision::Deny => Err(Forbidden),
        }
    }
}

/// Subset of records an [`Actor`] may reach.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// Every record.
    All,

    /// Records reachable through properties owned by the agent.
    Agent(UserId),

    /// Records reachable through the tenant's own leases.
    Tenant(UserId),
}

/// Outcome of a [`Rule`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Allowed within the [`Scope`].
    Allow(Scope),

    /// Denied.
    Deny,
}

/// Authorization rule of a (resource, action) pair.
pub trait Rule {
    /// Decides whether the provided [`Actor`] is allowed.
    fn decide(actor: &Actor) -> Decision;
}

/// Error of an [`Actor`] not being allowed by a [`Rule`].
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("Access restricted")]
pub struct Forbidden;

/// Defines [`Rule`]s as unit structs with a [`Decision`] per [`Role`].
macro_rules! define_rules {
    ($(
        #[doc = $doc:literal]
        $name:ident {
            admin => $admin:ident,
            agent => $agent:ident,
            tenant => $tenant:ident $(,)?
        }
    )*) => {$(
        #[doc = $doc]
        #[derive(Clone, Copy, Debug)]
        pub struct $name;

        impl $crate::policy::Rule for $name {
            fn decide(
                actor: &$crate::policy::Actor,
            ) -> $crate::policy::Decision {
                use $crate::domain::user::Role;

                match actor.role {
                    Role::Admin => define_rules!(@decide $admin, actor),
                    Role::Agent => define_rules!(@decide $agent, actor),
                    Role::Tenant => define_rules!(@decide $tenant, actor),
                }
            }
        }
    )*};
    (@decide All, $actor:ident) => {
        $crate::policy::Decision::Allow($crate::policy::Scope::All)
    };
    (@decide Agent, $actor:ident) => {
        $crate::policy::Decision::Allow(
            $crate::policy::Scope::Agent($actor.id),
        )
    };
    (@decide Tenant, $actor:ident) => {
        $crate::policy::Decision::Allow(
            $crate::policy::Scope::Tenant($actor.id),
        )
    };
    (@decide Deny, $actor:ident) => {{
        _ = $actor;
        $crate::policy::Decision::Deny
    }};
}

pub mod property {
    //! [`Rule`]s over properties.
    //!
    //! [`Rule`]: super::Rule

    define_rules! {
        #[doc = "Viewing properties."]
        View { admin => All, agent => Agent, tenant => Tenant }

        #[doc = "Creating, updating and deleting properties."]
        Manage { admin => All, agent => Agent, tenant => Deny }

        #[doc = "Viewing property statistics."]
        Stats { admin => All, agent => Agent, tenant => Deny }
    }
}

pub mod assignment {
    //! [`Rule`]s over leases.
    //!
    //! [`Rule`]: super::Rule

    define_rules! {
        #[doc = "Viewing leases."]
        View { admin => All, agent => Agent, tenant => Tenant }

        #[doc = "Creating, updating and ending leases."]
        Manage { admin => All, agent => Agent, tenant => Deny }
    }
}

pub mod tenant {
    //! [`Rule`]s over the tenant directory.
    //!
    //! [`Rule`]: super::Rule

    define_rules! {
        #[doc = "Viewing the tenant directory."]
        View { admin => All, agent => Agent, tenant => Deny }

        #[doc = "Creating tenant accounts."]
        Create { admin => All, agent => All, tenant => Deny }

        #[doc = "Viewing own lease and payments as a tenant."]
        Own { admin => Deny, agent => Deny, tenant => Tenant }
    }
}

pub mod payment {
    //! [`Rule`]s over payments.
    //!
    //! [`Rule`]: super::Rule

    define_rules! {
        #[doc = "Viewing payments and their reminders."]
        View { admin => All, agent => Agent, tenant => Tenant }

        #[doc = "Creating, updating and recording payments, and sending \
                 reminders."]
        Manage { admin => All, agent => Agent, tenant => Deny }

        #[doc = "Generating monthly payments."]
        Generate { admin => All, agent => Agent, tenant => Deny }

        #[doc = "Viewing payment statistics."]
        Stats { admin => All, agent => Agent, tenant => Tenant }

        #[doc = "Paying own payments."]
        Pay { admin => Deny, agent => Deny, tenant => Tenant }
    }
}

pub mod agent {
    //! [`Rule`]s over agent accounts.
    //!
    //! [`Rule`]: super::Rule

    define_rules! {
        #[doc = "Creating and listing agents."]
        Manage { admin => All, agent => Deny, tenant => Deny }
    }
}

pub mod user {
    //! [`Rule`]s over user accounts.
    //!
    //! [`Rule`]: super::Rule

    define_rules! {
        #[doc = "Listing, viewing, updating and deleting any user."]
        Manage { admin => All, agent => Deny, tenant => Deny }
    }
}

#[cfg(test)]
mod spec {
    use super::{
        agent, assignment, payment, property, tenant, user, Actor, Decision,
        Forbidden, Rule, Scope,
    };
    use crate::domain::user::{Id, Role};

    fn actor(role: Role) -> Actor {
        Actor { id: Id::new(), role }
    }

    #[test]
    fn admin_sees_everything_but_cannot_pay() {
        let admin = actor(Role::Admin);

        assert_eq!(property::View::decide(&admin), Decision::Allow(Scope::All));
        assert_eq!(payment::Stats::decide(&admin), Decision::Allow(Scope::All));
        assert_eq!(user::Manage::decide(&admin), Decision::Allow(Scope::All));
        assert_eq!(agent::Manage::decide(&admin), Decision::Allow(Scope::All));
        assert_eq!(payment::Pay::decide(&admin), Decision::Deny);
    }

    #[test]
    fn agent_is_scoped_to_own_properties() {
        let agent = actor(Role::Agent);
        let own = Decision::Allow(Scope::Agent(agent.id));

        assert_eq!(property::Manage::decide(&agent), own);
        assert_eq!(assignment::Manage::decide(&agent), own);
        assert_eq!(payment::Generate::decide(&agent), own);
        assert_eq!(tenant::View::decide(&agent), own);
        assert_eq!(tenant::Create::decide(&agent), Decision::Allow(Scope::All));
        assert_eq!(agent::Manage::decide(&agent), Decision::Deny);
        assert_eq!(user::Manage::decide(&agent), Decision::Deny);
        assert_eq!(payment::Pay::decide(&agent), Decision::Deny);
        assert_eq!(tenant::Own::decide(&agent), Decision::Deny);
    }

    #[test]
    fn tenant_is_scoped_to_own_leases() {
        let tenant = actor(Role::Tenant);
        let own = Decision::Allow(Scope::Tenant(tenant.id));

        assert_eq!(property::View::decide(&tenant), own);
        assert_eq!(assignment::View::decide(&tenant), own);
        assert_eq!(payment::View::decide(&tenant), own);
        assert_eq!(payment::Stats::decide(&tenant), own);
        assert_eq!(payment::Pay::decide(&tenant), own);
        assert_eq!(tenant::Own::decide(&tenant), own);
        assert_eq!(property::Manage::decide(&tenant), Decision::Deny);
        assert_eq!(property::Stats::decide(&tenant), Decision::Deny);
        assert_eq!(payment::Manage::decide(&tenant), Decision::Deny);
        assert_eq!(tenant::View::decide(&tenant), Decision::Deny);
        assert_eq!(tenant::Create::decide(&tenant), Decision::Deny);
    }

    #[test]
    fn authorize_resolves_scope() {
        let tenant = actor(Role::Tenant);

        assert_eq!(
            tenant.authorize::<payment::Pay>().unwrap(),
            Scope::Tenant(tenant.id),
        );
        assert!(matches!(
            tenant.authorize::<payment::Manage>(),
            Err(Forbidden),
        ));
    }
}
