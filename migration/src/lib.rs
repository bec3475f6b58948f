pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users_and_categories;
mod m20260301_000002_create_proposals;
mod m20260301_000003_create_votes_and_comments;
mod m20260301_000004_create_api_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_users_and_categories::Migration),
            Box::new(m20260301_000002_create_proposals::Migration),
            Box::new(m20260301_000003_create_votes_and_comments::Migration),
            Box::new(m20260301_000004_create_api_logs::Migration),
        ]
    }
}
