pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users;
mod m20250101_000002_create_courses;
mod m20250101_000003_create_materials;
mod m20250101_000004_create_assignments;
mod m20250101_000005_create_attempts;
mod m20250101_000006_create_grades;
mod m20250101_000007_create_activity;
mod m20250101_000008_create_chat_messages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users::Migration),
            Box::new(m20250101_000002_create_courses::Migration),
            Box::new(m20250101_000003_create_materials::Migration),
            Box::new(m20250101_000004_create_assignments::Migration),
            Box::new(m20250101_000005_create_attempts::Migration),
            Box::new(m20250101_000006_create_grades::Migration),
            Box::new(m20250101_000007_create_activity::Migration),
            Box::new(m20250101_000008_create_chat_messages::Migration),
        ]
    }
}
