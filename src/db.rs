use crate::orm::{guide_editors, guides, profiles, social_accounts, user_groups, users};
use crate::stats;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;

/// Opens a connection pool for the database URL.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    let pool = Database::connect(opt).await?;
    log::debug!("Connected to {:?} database.", pool.get_database_backend());
    Ok(pool)
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Creates the site's own tables. Referenced tables come first.
pub async fn create_site_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, social_accounts::Entity).await?;
    create_table(db, user_groups::Entity).await?;
    create_table(db, profiles::Entity).await?;
    create_table(db, guides::Entity).await?;
    create_table(db, guide_editors::Entity).await?;
    Ok(())
}

/// Creates the stats mirror tables.
/// Production reads a mirror owned by the stats bot; this is for local development and tests.
pub async fn create_stats_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, stats::users::Entity).await?;
    create_table(db, stats::roles::Entity).await?;
    create_table(db, stats::guild_membership::Entity).await?;
    create_table(db, stats::role_membership::Entity).await?;
    Ok(())
}
