use crate::markdown;
use crate::orm::{guide_editors, guides};
use crate::stats::MembershipStore;
use crate::user::{self, UserSummary};
use chrono::prelude::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::BTreeSet;

pub const TITLE_MAX_LEN: usize = 100;
pub const OVERVIEW_MAX_LEN: usize = 200;
/// Largest urlencoded guide form accepted, in bytes.
pub const FORM_LIMIT: usize = 2_621_440;

/// Guides shown on the home page and in feeds.
pub const LATEST_LIMIT: u64 = 5;

/// A guide with the people allowed to change it.
#[derive(Clone, Debug)]
pub struct GuideDetail {
    pub guide: guides::Model,
    pub author: UserSummary,
    pub editors: Vec<UserSummary>,
}

impl GuideDetail {
    pub fn editor_ids(&self) -> Vec<i32> {
        self.editors.iter().map(|editor| editor.id).collect()
    }
}

/// A guide row for listings.
#[derive(Clone, Debug)]
pub struct GuideListItem {
    pub guide: guides::Model,
    pub author: Option<UserSummary>,
}

impl GuideListItem {
    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(|author| author.name.to_owned())
            .unwrap_or_else(|| "Unknown".to_owned())
    }
}

/// Submitted guide fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuideInput {
    pub title: String,
    pub overview: String,
    pub content: String,
    pub editors: Vec<i32>,
}

impl GuideInput {
    /// Reads urlencoded pairs. `editors` may repeat; unparseable ids are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut input = Self::default();
        let mut editors = BTreeSet::new();
        for (key, value) in pairs {
            match key.as_str() {
                "title" => input.title = value,
                "overview" => input.overview = value,
                "content" => input.content = value,
                "editors" => {
                    if let Ok(id) = value.trim().parse::<i32>() {
                        editors.insert(id);
                    }
                }
                _ => {}
            }
        }
        input.editors = editors.into_iter().collect();
        input
    }

    /// Trims fields and enforces required fields and length limits.
    pub fn validate(mut self) -> Result<Self, String> {
        self.title = self.title.trim().to_owned();
        self.overview = self.overview.trim().to_owned();

        if self.title.is_empty() {
            return Err("Title is required.".to_owned());
        }
        if self.title.chars().count() > TITLE_MAX_LEN {
            return Err(format!("Title must be at most {} characters.", TITLE_MAX_LEN));
        }
        if self.overview.is_empty() {
            return Err("Overview is required.".to_owned());
        }
        if self.overview.chars().count() > OVERVIEW_MAX_LEN {
            return Err(format!(
                "Overview must be at most {} characters.",
                OVERVIEW_MAX_LEN
            ));
        }
        if self.content.trim().is_empty() {
            return Err("Content is required.".to_owned());
        }
        Ok(self)
    }
}

/// Users who may be picked as editors: linked accounts of current guild
/// members, never the guide's author.
pub async fn eligible_editors(
    db: &DatabaseConnection,
    store: &dyn MembershipStore,
    author_id: i32,
) -> Result<Vec<UserSummary>, DbErr> {
    let linked = user::linked_discord_ids(db).await?;
    let discord_ids: Vec<i64> = linked.keys().copied().collect();
    let user_ids: Vec<i32> = store
        .members_among(&discord_ids)
        .await?
        .iter()
        .filter_map(|discord_id| linked.get(discord_id).copied())
        .filter(|&user_id| user_id != author_id)
        .collect();

    let mut editors: Vec<UserSummary> = user::summaries_by_id(db, user_ids)
        .await?
        .into_values()
        .collect();
    editors.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(editors)
}

/// Keeps only requested editors that appear in `eligible`.
pub fn filter_editors(requested: &[i32], eligible: &[UserSummary]) -> Vec<i32> {
    requested
        .iter()
        .copied()
        .filter(|id| eligible.iter().any(|editor| editor.id == *id))
        .collect()
}

async fn editor_ids_for<C>(db: &C, guide_id: i32) -> Result<Vec<i32>, DbErr>
where
    C: ConnectionTrait,
{
    Ok(guide_editors::Entity::find()
        .filter(guide_editors::Column::GuideId.eq(guide_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.user_id)
        .collect())
}

/// Loads a guide with its author and editors.
pub async fn load_guide(db: &DatabaseConnection, guide_id: i32) -> Result<Option<GuideDetail>, DbErr> {
    let guide = match guides::Entity::find_by_id(guide_id).one(db).await? {
        Some(guide) => guide,
        None => return Ok(None),
    };

    let editor_ids = editor_ids_for(db, guide_id).await?;
    let mut ids = editor_ids.clone();
    ids.push(guide.author_id);
    let mut people = user::summaries_by_id(db, ids).await?;

    let author = people
        .remove(&guide.author_id)
        .ok_or_else(|| DbErr::RecordNotFound(format!("author of guide {}", guide_id)))?;
    let mut editors: Vec<UserSummary> = editor_ids
        .iter()
        .filter_map(|id| people.remove(id))
        .collect();
    editors.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    Ok(Some(GuideDetail {
        guide,
        author,
        editors,
    }))
}

async fn with_authors(
    db: &DatabaseConnection,
    guides: Vec<guides::Model>,
) -> Result<Vec<GuideListItem>, DbErr> {
    let author_ids: Vec<i32> = guides
        .iter()
        .map(|guide| guide.author_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let authors = user::summaries_by_id(db, author_ids).await?;

    Ok(guides
        .into_iter()
        .map(|guide| GuideListItem {
            author: authors.get(&guide.author_id).cloned(),
            guide,
        })
        .collect())
}

/// All guides, newest first.
pub async fn list_guides(db: &DatabaseConnection) -> Result<Vec<GuideListItem>, DbErr> {
    let guides = guides::Entity::find()
        .order_by_desc(guides::Column::PubDatetime)
        .order_by_desc(guides::Column::Id)
        .all(db)
        .await?;
    with_authors(db, guides).await
}

/// The newest guides, for the home page and feeds.
pub async fn latest_guides(db: &DatabaseConnection, limit: u64) -> Result<Vec<GuideListItem>, DbErr> {
    let guides = guides::Entity::find()
        .order_by_desc(guides::Column::PubDatetime)
        .order_by_desc(guides::Column::Id)
        .limit(limit)
        .all(db)
        .await?;
    with_authors(db, guides).await
}

pub async fn guides_by_author(
    db: &DatabaseConnection,
    author_id: i32,
) -> Result<Vec<guides::Model>, DbErr> {
    guides::Entity::find()
        .filter(guides::Column::AuthorId.eq(author_id))
        .order_by_desc(guides::Column::PubDatetime)
        .all(db)
        .await
}

pub async fn count_by_author(db: &DatabaseConnection, author_id: i32) -> Result<usize, DbErr> {
    guides::Entity::find()
        .filter(guides::Column::AuthorId.eq(author_id))
        .count(db)
        .await
}

async fn set_editors<C>(db: &C, guide_id: i32, editor_ids: &[i32]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    guide_editors::Entity::delete_many()
        .filter(guide_editors::Column::GuideId.eq(guide_id))
        .exec(db)
        .await?;

    for &user_id in editor_ids.iter().collect::<BTreeSet<_>>() {
        guide_editors::Entity::insert(guide_editors::ActiveModel {
            guide_id: Set(guide_id),
            user_id: Set(user_id),
        })
        .exec(db)
        .await?;
    }
    Ok(())
}

/// Publishes a guide. Content is rendered once here and stored.
pub async fn create_guide(
    db: &DatabaseConnection,
    author_id: i32,
    input: &GuideInput,
    editor_ids: &[i32],
) -> Result<guides::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;

    let guide = guides::ActiveModel {
        title: Set(input.title.to_owned()),
        overview: Set(input.overview.to_owned()),
        content_raw: Set(input.content.to_owned()),
        content_rendered: Set(markdown::render(&input.content)),
        pub_datetime: Set(now),
        edit_datetime: Set(now),
        author_id: Set(author_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    set_editors(&txn, guide.id, editor_ids).await?;
    txn.commit().await?;
    Ok(guide)
}

/// Applies an edit. Editors are replaced only when `editor_ids` is given.
pub async fn update_guide(
    db: &DatabaseConnection,
    guide: guides::Model,
    input: &GuideInput,
    editor_ids: Option<&[i32]>,
) -> Result<guides::Model, DbErr> {
    let content_changed = guide.content_raw != input.content;
    let guide_id = guide.id;
    let txn = db.begin().await?;

    let mut active: guides::ActiveModel = guide.into();
    active.title = Set(input.title.to_owned());
    active.overview = Set(input.overview.to_owned());
    if content_changed {
        active.content_raw = Set(input.content.to_owned());
        active.content_rendered = Set(markdown::render(&input.content));
    }
    active.edit_datetime = Set(Utc::now().naive_utc());
    let guide = active.update(&txn).await?;

    if let Some(editor_ids) = editor_ids {
        set_editors(&txn, guide_id, editor_ids).await?;
    }

    txn.commit().await?;
    Ok(guide)
}

/// Removes a guide and its editor links.
pub async fn delete_guide(db: &DatabaseConnection, guide_id: i32) -> Result<(), DbErr> {
    let txn = db.begin().await?;
    guide_editors::Entity::delete_many()
        .filter(guide_editors::Column::GuideId.eq(guide_id))
        .exec(&txn)
        .await?;
    guides::Entity::delete_many()
        .filter(guides::Column::Id.eq(guide_id))
        .exec(&txn)
        .await?;
    txn.commit().await
}
