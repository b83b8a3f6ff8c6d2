use crate::orm::{user_groups, users};
use crate::stats::MembershipStore;
use sea_orm::entity::prelude::{DeriveActiveEnum, EnumIter};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};

/// Site role assigned on login from guild standing.
/// Compatible with sea_orm enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum GroupType {
    /// Not a guild member.
    #[sea_orm(string_value = "guest")]
    Guest,
    /// Current guild member.
    #[sea_orm(string_value = "member")]
    Member,
    /// Holds the configured administrator role.
    #[sea_orm(string_value = "staff")]
    Staff,
}

impl GroupType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Guest => "Guest",
            Self::Member => "Member",
            Self::Staff => "Staff",
        }
    }

    pub fn is_member(&self) -> bool {
        !matches!(self, Self::Guest)
    }
}

/// Decides the group for a Discord user. The admin role outranks membership.
pub async fn classify(store: &dyn MembershipStore, discord_id: i64) -> Result<GroupType, DbErr> {
    if store.is_admin(discord_id).await? {
        Ok(GroupType::Staff)
    } else if store.is_member(discord_id).await? {
        Ok(GroupType::Member)
    } else {
        Ok(GroupType::Guest)
    }
}

/// Replaces the user's group and mirrors the result onto `users.is_member`.
pub async fn assign_group(
    db: &DatabaseConnection,
    user_id: i32,
    group: GroupType,
) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    user_groups::Entity::delete_many()
        .filter(user_groups::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    user_groups::ActiveModel {
        user_id: Set(user_id),
        group: Set(group),
    }
    .insert(&txn)
    .await?;

    users::Entity::update_many()
        .col_expr(users::Column::IsMember, Expr::value(group.is_member()))
        .filter(users::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;

    txn.commit().await
}

/// Classifies a freshly authenticated user and stores the outcome.
pub async fn classify_user(
    db: &DatabaseConnection,
    store: &dyn MembershipStore,
    user_id: i32,
    discord_id: i64,
) -> Result<GroupType, DbErr> {
    let group = classify(store, discord_id).await?;
    assign_group(db, user_id, group).await?;
    log::debug!("User {} classified as {:?}.", user_id, group);
    Ok(group)
}

/// Returns the groups recorded for a user.
pub async fn get_groups_for_user(db: &DatabaseConnection, user_id: i32) -> Vec<GroupType> {
    match user_groups::Entity::find()
        .filter(user_groups::Column::UserId.eq(user_id))
        .all(db)
        .await
    {
        Ok(rows) => rows.into_iter().map(|row| row.group).collect(),
        Err(e) => {
            log::warn!("DbErr pulling user_groups for user {}: {:?}", user_id, e);
            Vec::new()
        }
    }
}
