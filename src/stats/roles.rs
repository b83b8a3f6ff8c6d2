use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub role_id: i64,
    pub guild_id: i64,
    pub name: String,
    /// 0xRRGGBB; zero means the role has no colour.
    pub color: i32,
    pub raw_permissions: i64,
    pub position: i32,
    pub is_hoisted: bool,
    pub is_managed: bool,
    pub is_mentionable: bool,
    pub is_deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
