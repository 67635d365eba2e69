pub use super::group_memberships::Entity as GroupMemberships;
pub use super::properties::Entity as Properties;
pub use super::user_roles::Entity as UserRoles;
pub use super::users::Entity as Users;
