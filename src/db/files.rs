use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{FileRecord, LocationUpdate};

/// Access to the CMS upload records (`plugin::upload.file`)
#[async_trait::async_trait]
pub trait FileRepository: Send + Sync {
    /// All records, ordered by id
    async fn find_all(&self) -> AppResult<Vec<FileRecord>>;

    /// Writes every location field of one record in a single statement
    async fn update_location(&self, id: i64, update: &LocationUpdate) -> AppResult<()>;
}

/// Strapi `files` table on PostgreSQL
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FileRepository for PgFileRepository {
    async fn find_all(&self) -> AppResult<Vec<FileRecord>> {
        // JSON `null` is folded into SQL NULL so it decodes as `None`
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT
                id::bigint AS id,
                COALESCE(name, '') AS name,
                COALESCE(hash, '') AS hash,
                ext,
                COALESCE(mime, '') AS mime,
                COALESCE(url, '') AS url,
                CASE WHEN jsonb_typeof(formats::jsonb) = 'object' THEN formats::jsonb END AS formats,
                COALESCE(provider, '') AS provider,
                CASE WHEN jsonb_typeof(provider_metadata::jsonb) = 'null' THEN NULL
                     ELSE provider_metadata::jsonb END AS provider_metadata
            FROM files
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Loaded {} file records", records.len());
        Ok(records)
    }

    async fn update_location(&self, id: i64, update: &LocationUpdate) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET url = $1,
                provider = $2,
                provider_metadata = $3,
                formats = $4,
                updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(&update.url)
        .bind(update.provider.as_str())
        .bind(Json(&update.provider_metadata))
        .bind(update.formats.as_ref().map(Json))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("file record {}", id)));
        }
        Ok(())
    }
}
