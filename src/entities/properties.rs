use sea_orm::entity::prelude::*;

/// Key/value settings, either scoped to a user or global when `user_id` is
/// unset.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "properties")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub prop_key: String,

    pub user_id: Option<i64>,

    pub text_value: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
