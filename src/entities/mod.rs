pub mod prelude;

pub mod group_memberships;
pub mod properties;
pub mod user_roles;
pub mod users;
