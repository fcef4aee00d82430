use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS social_app;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO social_app, public;")
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // CASCADE removes every object created by later migrations as well.
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS social_app CASCADE;")
            .await?;

        Ok(())
    }
}
