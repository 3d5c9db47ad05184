use async_trait::async_trait;
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::error::RecordError;
use crate::recorder::{ClaimRecord, ClaimRecorder};

/// PostgreSQL-backed claim store. One row per completed claim.
pub struct PostgresClaimRecorder {
    pool: Pool<Postgres>,
}

impl PostgresClaimRecorder {
    pub async fn connect(database_url: &str) -> Result<Self, RecordError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS claim_records (
                id UUID PRIMARY KEY,
                user_email TEXT NOT NULL,
                user_name TEXT NOT NULL,
                submitted_at TIMESTAMPTZ NOT NULL,
                fnol_data JSONB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS claim_records_user_email_idx ON claim_records (user_email)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ClaimRecorder for PostgresClaimRecorder {
    async fn save(&self, record: &ClaimRecord) -> Result<(), RecordError> {
        let fnol_data = serde_json::to_value(&record.fnol_data)?;

        sqlx::query(
            r#"
            INSERT INTO claim_records (id, user_email, user_name, submitted_at, fnol_data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.user.email)
        .bind(&record.user.name)
        .bind(record.submitted_at)
        .bind(fnol_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
