use crate::engine::Engine;
use crate::engine::identity::DbUser;
use crate::engine::integrations::Integration;
use crate::engine::store::Tenant;

/// In-memory engine with one provisioned tenant and one integration.
///
/// The first integration of a fresh tenant always gets id `1`.
pub struct TestTenant {
    pub engine: Engine,
    pub tenant: Tenant,
    pub integration_id: String,
}

impl TestTenant {
    pub fn new() -> Self {
        Self::named("acme")
    }

    pub fn named(name: &str) -> Self {
        crate::logging::init_for_tests();
        let engine = Engine::in_memory().unwrap();
        let tenant = provision(&engine, name);
        let integration_id = engine
            .integrations
            .insert(&tenant, &Integration::new("primary", "github"))
            .unwrap();
        Self {
            engine,
            tenant,
            integration_id,
        }
    }

    /// Registers an identity under the default integration.
    pub fn user(&self, cloud_id: &str, display_name: &str) -> String {
        self.engine
            .users
            .upsert(
                &self.tenant,
                &DbUser::new(&self.integration_id, cloud_id, display_name),
            )
            .unwrap()
    }

    /// Creates a team holding the given identities and returns its
    /// `team_id:<uuid>` filter token.
    pub fn team(&self, name: &str, members: &[String]) -> String {
        let team_id = self.engine.teams.create(&self.tenant, name).unwrap();
        self.engine
            .teams
            .add_members(&self.tenant, &team_id, members)
            .unwrap();
        format!("team_id:{team_id}")
    }

    /// Adds another integration and returns its id.
    pub fn integration(&self, name: &str, application: &str) -> String {
        self.engine
            .integrations
            .insert(&self.tenant, &Integration::new(name, application))
            .unwrap()
    }
}

/// Attaches and provisions `name` on an existing engine.
pub fn provision(engine: &Engine, name: &str) -> Tenant {
    let tenant = Tenant::parse(name).unwrap();
    engine.ensure_tenant(&tenant).unwrap();
    tenant
}
