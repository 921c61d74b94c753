//! PostgreSQL schema migrations. Idempotent; run on every connect.

use sqlx::PgPool;

pub async fn run_pg_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS serials (
            id BIGSERIAL PRIMARY KEY,
            serial_number TEXT NOT NULL UNIQUE,
            source_filename TEXT,
            extracted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            status TEXT NOT NULL DEFAULT 'confirmed'
                CHECK (status IN ('confirmed', 'imported', 'flagged'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_serials_extracted ON serials (extracted_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_serials_status ON serials (status)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations complete");
    Ok(())
}
