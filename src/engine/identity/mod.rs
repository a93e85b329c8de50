pub mod teams;
pub mod users;

pub use teams::{Team, TeamService};
pub use users::{DbUser, IdentityResolver, TenantIdentityResolver, UserIdentityService};

#[cfg(test)]
mod users_test;
