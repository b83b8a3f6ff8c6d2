//! Read-only view of the Discord stats mirror.
//!
//! The mirror is populated by a separate bot. Nothing here writes to it.

pub mod guild_membership;
pub mod role_membership;
pub mod roles;
pub mod users;

use crate::config::GuildConfig;
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// A user's standing in the configured guild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildMember {
    pub user_id: i64,
    pub is_member: bool,
    pub nick: Option<String>,
}

impl From<guild_membership::Model> for GuildMember {
    fn from(model: guild_membership::Model) -> Self {
        Self {
            user_id: model.user_id,
            is_member: model.is_member,
            nick: model.nick,
        }
    }
}

/// A guild role held by a user, for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildRole {
    pub id: i64,
    pub name: String,
    pub color: i32,
    pub position: i32,
}

impl GuildRole {
    /// CSS colour for the role, or None when the role is uncoloured.
    pub fn css_color(&self) -> Option<String> {
        match self.color {
            0 => None,
            color => Some(format!("#{:06x}", color & 0x00ff_ffff)),
        }
    }
}

/// Membership queries against the stats mirror.
/// Every query is scoped to the configured guild.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    fn guild(&self) -> &GuildConfig;

    /// Membership row for the Discord user, if the mirror has one.
    async fn guild_membership(&self, discord_id: i64) -> Result<Option<GuildMember>, DbErr>;

    /// Whether the Discord user holds the role in the guild.
    async fn has_role(&self, discord_id: i64, role_id: i64) -> Result<bool, DbErr>;

    /// Number of current guild members.
    async fn member_count(&self) -> Result<usize, DbErr>;

    /// The subset of `discord_ids` that are current guild members.
    async fn members_among(&self, discord_ids: &[i64]) -> Result<Vec<i64>, DbErr>;

    /// Live roles the Discord user holds, highest first.
    async fn roles_for(&self, discord_id: i64) -> Result<Vec<GuildRole>, DbErr>;

    async fn is_member(&self, discord_id: i64) -> Result<bool, DbErr> {
        Ok(self
            .guild_membership(discord_id)
            .await?
            .map_or(false, |member| member.is_member))
    }

    async fn is_admin(&self, discord_id: i64) -> Result<bool, DbErr> {
        let role_id = self.guild().admin_role_id;
        self.has_role(discord_id, role_id).await
    }
}

/// Ids bound per `IN (..)` lookup; keeps queries under backend parameter limits.
pub const MEMBER_LOOKUP_CHUNK: usize = 500;

/// MembershipStore backed by the mirror database.
pub struct StatsDatabase {
    db: DatabaseConnection,
    guild: GuildConfig,
}

impl StatsDatabase {
    pub fn new(db: DatabaseConnection, guild: GuildConfig) -> Self {
        Self { db, guild }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl MembershipStore for StatsDatabase {
    fn guild(&self) -> &GuildConfig {
        &self.guild
    }

    async fn guild_membership(&self, discord_id: i64) -> Result<Option<GuildMember>, DbErr> {
        Ok(guild_membership::Entity::find()
            .filter(guild_membership::Column::UserId.eq(discord_id))
            .filter(guild_membership::Column::GuildId.eq(self.guild.guild_id))
            .one(&self.db)
            .await?
            .map(GuildMember::from))
    }

    async fn has_role(&self, discord_id: i64, role_id: i64) -> Result<bool, DbErr> {
        let count = role_membership::Entity::find()
            .filter(role_membership::Column::UserId.eq(discord_id))
            .filter(role_membership::Column::RoleId.eq(role_id))
            .filter(role_membership::Column::GuildId.eq(self.guild.guild_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn member_count(&self) -> Result<usize, DbErr> {
        guild_membership::Entity::find()
            .filter(guild_membership::Column::GuildId.eq(self.guild.guild_id))
            .filter(guild_membership::Column::IsMember.eq(true))
            .count(&self.db)
            .await
    }

    async fn members_among(&self, discord_ids: &[i64]) -> Result<Vec<i64>, DbErr> {
        #[derive(FromQueryResult)]
        struct MemberId {
            user_id: i64,
        }

        let mut members = Vec::new();
        for chunk in discord_ids.chunks(MEMBER_LOOKUP_CHUNK) {
            let found = guild_membership::Entity::find()
                .select_only()
                .column(guild_membership::Column::UserId)
                .filter(guild_membership::Column::GuildId.eq(self.guild.guild_id))
                .filter(guild_membership::Column::IsMember.eq(true))
                .filter(guild_membership::Column::UserId.is_in(chunk.to_vec()))
                .into_model::<MemberId>()
                .all(&self.db)
                .await?;
            members.extend(found.into_iter().map(|member| member.user_id));
        }
        Ok(members)
    }

    async fn roles_for(&self, discord_id: i64) -> Result<Vec<GuildRole>, DbErr> {
        #[derive(FromQueryResult)]
        struct RoleId {
            role_id: i64,
        }

        let role_ids: Vec<i64> = role_membership::Entity::find()
            .select_only()
            .column(role_membership::Column::RoleId)
            .filter(role_membership::Column::UserId.eq(discord_id))
            .filter(role_membership::Column::GuildId.eq(self.guild.guild_id))
            .into_model::<RoleId>()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|role| role.role_id)
            .collect();

        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(roles::Entity::find()
            .filter(roles::Column::RoleId.is_in(role_ids))
            .filter(roles::Column::IsDeleted.eq(false))
            .order_by_desc(roles::Column::Position)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|role| GuildRole {
                id: role.role_id,
                name: role.name,
                color: role.color,
                position: role.position,
            })
            .collect())
    }
}
