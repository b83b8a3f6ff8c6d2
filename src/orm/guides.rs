use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "guides")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub overview: String,
    #[sea_orm(column_type = "Text")]
    pub content_raw: String,
    /// Sanitized HTML, regenerated whenever `content_raw` changes.
    #[sea_orm(column_type = "Text")]
    pub content_rendered: String,
    pub pub_datetime: DateTime,
    pub edit_datetime: DateTime,
    pub author_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::guide_editors::Entity")]
    GuideEditors,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::guide_editors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuideEditors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
