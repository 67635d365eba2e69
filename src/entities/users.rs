use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Unique among all records, active or not.
    #[sea_orm(unique)]
    pub login: String,

    pub name: Option<String>,

    /// Compared case-insensitively, see `UserRepository::email_exists`.
    pub email: Option<String>,

    /// Newline-separated SCM identities, wrapped with the separator on both
    /// ends ("\nfoo\nbar\n") so lookups can anchor on whole entries.
    pub scm_accounts: Option<String>,

    pub is_root: bool,

    /// Users are flagged inactive instead of being deleted.
    pub active: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
