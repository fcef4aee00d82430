use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE TYPE social_app.sex AS ENUM ('Male', 'Female', 'Other')")
            .await?;

        // One profile per user; deleting the user removes its profile.
        let create_table_sql = r#"
            CREATE TABLE IF NOT EXISTS social_app.profiles (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES social_app.users(id) ON DELETE CASCADE,

                first_name VARCHAR(30) NOT NULL,
                last_name VARCHAR(30) NOT NULL,
                sex social_app.sex NOT NULL DEFAULT 'Male',
                bio VARCHAR(500) NOT NULL DEFAULT '',
                birthdate DATE,
                avatar VARCHAR(2048),
                cover_image VARCHAR(2048),

                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT profiles_user_id_key UNIQUE (user_id)
            )
        "#;

        manager
            .get_connection()
            .execute_unprepared(create_table_sql)
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_profiles_first_name
                 ON social_app.profiles(first_name)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS social_app.profiles")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS social_app.sex")
            .await?;

        Ok(())
    }
}
