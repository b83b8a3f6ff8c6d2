pub mod guide_editors;
pub mod guides;
pub mod profiles;
pub mod social_accounts;
pub mod user_groups;
pub mod users;
