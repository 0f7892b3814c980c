//! Durable, content-addressed cache of extraction results.
//!
//! Maps the SHA-256 of a description's raw text to the structured fields the
//! extraction service returned for it. Written once per distinct description,
//! read on every subsequent encounter, never evicted — source text is treated
//! as immutable once authored. This is what makes repeated full reimports of
//! an unchanged export free with respect to the external service.
//!
//! Cache I/O failures are logged and treated as a miss; they never abort the
//! row being processed.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;

use crate::extraction::ExtractedFields;

pub struct ExtractionCache {
    pool: SqlitePool,
}

impl ExtractionCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a previously computed extraction by description hash.
    pub async fn get(&self, hash: &str) -> Option<ExtractedFields> {
        let payload: Option<String> = match sqlx::query_scalar(
            "SELECT payload FROM extraction_cache WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!("extraction cache read failed, treating as miss: {e}");
                return None;
            }
        };

        let payload = payload?;
        match serde_json::from_str(&payload) {
            Ok(fields) => Some(fields),
            Err(e) => {
                warn!("extraction cache entry for {hash} is undecodable, treating as miss: {e}");
                None
            }
        }
    }

    /// Store an extraction result under its description hash.
    pub async fn put(&self, hash: &str, fields: &ExtractedFields) {
        let payload = match serde_json::to_string(fields) {
            Ok(p) => p,
            Err(e) => {
                warn!("extraction cache encode failed for {hash}: {e}");
                return;
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO extraction_cache (hash, payload, created_at) VALUES (?, ?, ?)
            ON CONFLICT(hash) DO UPDATE SET payload = excluded.payload
            "#,
        )
        .bind(hash)
        .bind(&payload)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("extraction cache write failed for {hash}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ExtractionCache::new(memory_pool().await);
        assert!(cache.get("abc").await.is_none());

        let fields = ExtractedFields {
            expiration_notice: "Expires 6/1/2026".to_string(),
            notes: "Weekdays only".to_string(),
            description: "A spa day.".to_string(),
        };
        cache.put("abc", &fields).await;

        let hit = cache.get("abc").await.expect("entry should be present");
        assert_eq!(hit.expiration_notice, "Expires 6/1/2026");
        assert_eq!(hit.description, "A spa day.");
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let pool = memory_pool().await;
        sqlx::query("INSERT INTO extraction_cache (hash, payload, created_at) VALUES ('bad', 'not json', 0)")
            .execute(&pool)
            .await
            .unwrap();

        let cache = ExtractionCache::new(pool);
        assert!(cache.get("bad").await.is_none());
    }
}
