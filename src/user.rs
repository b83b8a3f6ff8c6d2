use crate::oauth::DiscordLogin;
use crate::orm::{guide_editors, guides, profiles, social_accounts, user_groups, users};
use chrono::prelude::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

/// Session key holding the authenticated user's id.
pub const SESSION_USER_KEY: &str = "user_id";

/// Provider name stored on social accounts.
pub const DISCORD_PROVIDER: &str = "discord";

/// Longest accepted profile bio, in characters.
pub const BIO_MAX_LEN: usize = 500;

/// A mini struct for holding only what information we need about a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub discord_id: Option<i64>,
    pub avatar_url: String,
}

impl UserSummary {
    pub fn new(user: &users::Model, discord_id: Option<i64>) -> Self {
        Self {
            id: user.id,
            name: user.username.to_owned(),
            discord_id,
            avatar_url: avatar_url(discord_id, user.avatar_hash.as_deref(), user.discriminator),
        }
    }

    pub fn profile_url(&self) -> Option<String> {
        self.discord_id.map(|id| format!("/profile/{}", id))
    }
}

/// Discord CDN avatar, or the stock avatar for users without one.
pub fn avatar_url(discord_id: Option<i64>, avatar_hash: Option<&str>, discriminator: i32) -> String {
    match (discord_id, avatar_hash) {
        (Some(id), Some(hash)) => format!("https://cdn.discordapp.com/avatars/{}/{}.png", id, hash),
        _ => format!(
            "https://cdn.discordapp.com/embed/avatars/{}.png",
            discriminator.rem_euclid(5)
        ),
    }
}

/// Loads the session user.
pub async fn find_client_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<UserSummary>, DbErr> {
    let user = match users::Entity::find_by_id(user_id).one(db).await? {
        Some(user) => user,
        None => return Ok(None),
    };
    let account = social_accounts::Entity::find()
        .filter(social_accounts::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    Ok(Some(UserSummary::new(&user, account.map(|a| a.uid))))
}

/// Summaries for a set of users, keyed by user id.
pub async fn summaries_by_id(
    db: &DatabaseConnection,
    user_ids: Vec<i32>,
) -> Result<HashMap<i32, UserSummary>, DbErr> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let accounts: HashMap<i32, i64> = social_accounts::Entity::find()
        .filter(social_accounts::Column::UserId.is_in(user_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|account| (account.user_id, account.uid))
        .collect();

    Ok(users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids))
        .order_by_asc(users::Column::Username)
        .all(db)
        .await?
        .iter()
        .map(|user| {
            let summary = UserSummary::new(user, accounts.get(&user.id).copied());
            (user.id, summary)
        })
        .collect())
}

/// Every local user linked to a Discord account, by Discord id.
pub async fn linked_discord_ids(db: &DatabaseConnection) -> Result<HashMap<i64, i32>, DbErr> {
    Ok(social_accounts::Entity::find()
        .filter(social_accounts::Column::Provider.eq(DISCORD_PROVIDER))
        .all(db)
        .await?
        .into_iter()
        .map(|account| (account.uid, account.user_id))
        .collect())
}

/// A user as seen through their public profile page.
#[derive(Clone, Debug)]
pub struct UserProfile {
    pub user: users::Model,
    pub account: social_accounts::Model,
    pub profile: Option<profiles::Model>,
}

impl UserProfile {
    pub fn summary(&self) -> UserSummary {
        UserSummary::new(&self.user, Some(self.account.uid))
    }

    pub fn is_restricted(&self) -> bool {
        self.profile
            .as_ref()
            .map_or(false, |profile| profile.restrict_processing)
    }

    pub fn bio(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|profile| profile.bio.as_deref())
    }
}

/// Profiles are addressed by Discord id.
pub async fn find_profile_by_discord_id(
    db: &DatabaseConnection,
    discord_id: i64,
) -> Result<Option<UserProfile>, DbErr> {
    let (account, user) = match social_accounts::Entity::find()
        .filter(social_accounts::Column::Uid.eq(discord_id))
        .find_also_related(users::Entity)
        .one(db)
        .await?
    {
        Some((account, Some(user))) => (account, user),
        _ => return Ok(None),
    };

    let profile = profiles::Entity::find_by_id(user.id).one(db).await?;
    Ok(Some(UserProfile {
        user,
        account,
        profile,
    }))
}

/// Upserts the profile row for a user.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: i32,
    restrict_processing: bool,
    bio: Option<String>,
) -> Result<profiles::Model, DbErr> {
    match profiles::Entity::find_by_id(user_id).one(db).await? {
        Some(profile) => {
            let mut profile: profiles::ActiveModel = profile.into();
            profile.restrict_processing = Set(restrict_processing);
            profile.bio = Set(bio);
            profile.update(db).await
        }
        None => {
            profiles::ActiveModel {
                user_id: Set(user_id),
                restrict_processing: Set(restrict_processing),
                bio: Set(bio),
            }
            .insert(db)
            .await
        }
    }
}

/// Creates or refreshes the local user for a Discord login.
/// Returns the user and whether it was newly created.
pub async fn login_discord_user(
    db: &DatabaseConnection,
    discord_id: i64,
    login: &DiscordLogin,
) -> Result<(users::Model, bool), DbErr> {
    let now = Utc::now().naive_utc();
    let profile = &login.profile;
    let extra_data = login.extra_data.to_string();
    let txn = db.begin().await?;

    let existing = social_accounts::Entity::find()
        .filter(social_accounts::Column::Uid.eq(discord_id))
        .find_also_related(users::Entity)
        .one(&txn)
        .await?;

    let result = match existing {
        Some((account, Some(user))) => {
            let mut user: users::ActiveModel = user.into();
            user.username = Set(profile.username.to_owned());
            user.discriminator = Set(profile.discriminator());
            user.avatar_hash = Set(profile.avatar.to_owned());
            user.email = Set(profile.email.to_owned());
            user.last_login_at = Set(now);
            let user = user.update(&txn).await?;

            let mut account: social_accounts::ActiveModel = account.into();
            account.extra_data = Set(extra_data);
            account.last_login = Set(now);
            account.update(&txn).await?;

            (user, false)
        }
        Some((account, None)) => {
            return Err(DbErr::RecordNotFound(format!(
                "social account {} has no user",
                account.id
            )));
        }
        None => {
            let user = users::ActiveModel {
                username: Set(profile.username.to_owned()),
                email: Set(profile.email.to_owned()),
                discriminator: Set(profile.discriminator()),
                avatar_hash: Set(profile.avatar.to_owned()),
                is_member: Set(false),
                created_at: Set(now),
                last_login_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            social_accounts::ActiveModel {
                user_id: Set(user.id),
                provider: Set(DISCORD_PROVIDER.to_owned()),
                uid: Set(discord_id),
                extra_data: Set(extra_data),
                date_joined: Set(now),
                last_login: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            profiles::ActiveModel {
                user_id: Set(user.id),
                restrict_processing: Set(false),
                bio: Set(None),
            }
            .insert(&txn)
            .await?;

            (user, true)
        }
    };

    txn.commit().await?;
    Ok(result)
}

/// Removes a user and everything they own: guides, editorships, groups, profile and social link.
pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    let guide_ids: Vec<i32> = guides::Entity::find()
        .filter(guides::Column::AuthorId.eq(user_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|guide| guide.id)
        .collect();

    if !guide_ids.is_empty() {
        guide_editors::Entity::delete_many()
            .filter(guide_editors::Column::GuideId.is_in(guide_ids))
            .exec(&txn)
            .await?;
    }
    guide_editors::Entity::delete_many()
        .filter(guide_editors::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    guides::Entity::delete_many()
        .filter(guides::Column::AuthorId.eq(user_id))
        .exec(&txn)
        .await?;
    user_groups::Entity::delete_many()
        .filter(user_groups::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    profiles::Entity::delete_many()
        .filter(profiles::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    social_accounts::Entity::delete_many()
        .filter(social_accounts::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    users::Entity::delete_many()
        .filter(users::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;

    txn.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_from_hash() {
        assert_eq!(
            avatar_url(Some(123), Some("abc"), 1),
            "https://cdn.discordapp.com/avatars/123/abc.png"
        );
    }

    #[test]
    fn stock_avatar_uses_discriminator() {
        assert_eq!(
            avatar_url(Some(123), None, 7),
            "https://cdn.discordapp.com/embed/avatars/2.png"
        );
        assert_eq!(
            avatar_url(None, Some("abc"), 0),
            "https://cdn.discordapp.com/embed/avatars/0.png"
        );
    }

    #[test]
    fn summary_profile_url() {
        let user = users::Model {
            id: 4,
            username: "ferris".to_owned(),
            email: None,
            discriminator: 1,
            avatar_hash: None,
            is_member: true,
            created_at: Utc::now().naive_utc(),
            last_login_at: Utc::now().naive_utc(),
        };
        assert_eq!(
            UserSummary::new(&user, Some(77)).profile_url().as_deref(),
            Some("/profile/77")
        );
        assert_eq!(UserSummary::new(&user, None).profile_url(), None);
    }
}
