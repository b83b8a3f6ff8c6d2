//! Authorization predicates.
//!
//! Guild standing is always read live from the stats mirror; the group stored
//! at login is only used for display. Lookup failures surface as errors and are
//! never treated as a grant.

use crate::middleware::ClientCtx;
use crate::orm::profiles;
use crate::stats::MembershipStore;
use actix_web::{error, Error};
use sea_orm::DbErr;

pub const LOGIN_REQUIRED: &str = "You need to be logged in to do that.";
pub const MEMBERSHIP_REQUIRED: &str = "You need to be a member of our Guild to do that.";
pub const NOT_PERMITTED: &str = "You do not have permission to do that.";
pub const PROFILE_HIDDEN: &str = "You are not allowed to view this profile at this time.";

/// Whether the requester is a current guild member.
/// Guests and users without a linked Discord account are not.
pub async fn is_member(store: &dyn MembershipStore, client: &ClientCtx) -> Result<bool, DbErr> {
    match client.get_discord_id() {
        Some(discord_id) => store.is_member(discord_id).await,
        None => Ok(false),
    }
}

/// Whether the requester holds the guild's administrator role.
pub async fn is_admin(store: &dyn MembershipStore, client: &ClientCtx) -> Result<bool, DbErr> {
    match client.get_discord_id() {
        Some(discord_id) => store.is_admin(discord_id).await,
        None => Ok(false),
    }
}

pub fn is_author(client: &ClientCtx, author_id: i32) -> bool {
    client.get_id() == Some(author_id)
}

pub fn is_editor(client: &ClientCtx, editor_ids: &[i32]) -> bool {
    match client.get_id() {
        Some(id) => editor_ids.contains(&id),
        None => false,
    }
}

/// Id of the signed-in user, or 403.
pub fn require_user(client: &ClientCtx) -> Result<i32, Error> {
    client
        .get_id()
        .ok_or_else(|| error::ErrorForbidden(LOGIN_REQUIRED))
}

/// Id of the signed-in guild member, or 403.
pub async fn require_member(store: &dyn MembershipStore, client: &ClientCtx) -> Result<i32, Error> {
    let user_id = require_user(client)?;
    match is_member(store, client).await {
        Ok(true) => Ok(user_id),
        Ok(false) => Err(error::ErrorForbidden(MEMBERSHIP_REQUIRED)),
        Err(e) => {
            log::error!("Membership lookup for user {} failed: {}", user_id, e);
            Err(error::ErrorInternalServerError("Could not check guild membership."))
        }
    }
}

/// What the requester may do with one guide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuideAccess {
    pub is_author: bool,
    pub is_editor: bool,
    /// Only resolved for requesters who are not the author.
    pub is_admin: bool,
}

impl GuideAccess {
    pub fn can_edit(&self) -> bool {
        self.is_author || self.is_editor || self.is_admin
    }

    pub fn can_delete(&self) -> bool {
        self.is_author || self.is_admin
    }

    pub fn can_manage_editors(&self) -> bool {
        self.is_author || self.is_admin
    }
}

/// Resolves the requester's rights over a guide. The stats mirror is only
/// consulted when the local author check does not already grant everything.
pub async fn guide_access(
    store: &dyn MembershipStore,
    client: &ClientCtx,
    author_id: i32,
    editor_ids: &[i32],
) -> Result<GuideAccess, DbErr> {
    if !client.is_user() {
        return Ok(GuideAccess::default());
    }

    let author = is_author(client, author_id);
    let editor = is_editor(client, editor_ids);
    let admin = if author {
        false
    } else {
        is_admin(store, client).await?
    };

    Ok(GuideAccess {
        is_author: author,
        is_editor: editor,
        is_admin: admin,
    })
}

/// Restricted profiles are only visible to their owner.
pub fn can_view_profile(
    client: &ClientCtx,
    owner_id: i32,
    profile: Option<&profiles::Model>,
) -> bool {
    match profile {
        Some(profile) if profile.restrict_processing => client.get_id() == Some(owner_id),
        _ => true,
    }
}
