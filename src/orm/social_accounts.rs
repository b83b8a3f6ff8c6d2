use sea_orm::entity::prelude::*;

/// Link between a local user and their Discord identity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "social_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: i32,
    pub provider: String,
    /// Discord snowflake.
    #[sea_orm(unique)]
    pub uid: i64,
    /// Serialized Discord profile and guild list from the latest login.
    #[sea_orm(column_type = "Text")]
    pub extra_data: String,
    pub date_joined: DateTime,
    pub last_login: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
