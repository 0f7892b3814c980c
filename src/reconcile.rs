//! Catalog reconciliation — the central import algorithm.
//!
//! Maps incoming catalog rows onto persisted items and line items using
//! content hashing for change detection: unchanged rows are skipped outright,
//! changed rows are re-enriched, re-normalized, re-formatted, and updated in
//! place, and rows that disappeared from the export are pruned as orphans.
//! Re-running on unchanged input costs nothing.
//!
//! Orphan deletion is deferred until every row in the run has been examined,
//! so a parsing defect upstream can never be misread as "every record was
//! removed" and wipe the store.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

use crate::cache::ExtractionCache;
use crate::config::Config;
use crate::db;
use crate::enrich::Enricher;
use crate::extraction::{ExtractionClient, OpenAiExtractor};
use crate::markup;
use crate::models::{content_hash, parse_value, LineItemDraft, RowRecord, RunStats, SkippedRow};
use crate::normalize::normalize;
use crate::rows;

/// How a row was classified before processing.
enum RowClass {
    /// A real row, keyed by its parsed business identifier.
    Valid(i64),
    /// Placeholder or malformed; excluded from processing and from
    /// orphan-cleanup consideration.
    Rejected(String),
}

/// Classify a row. Placeholders are unused template rows in the source
/// spreadsheet: blank/zero business identifier, or blank/zero value.
fn classify(row: &RowRecord) -> RowClass {
    let raw = row.business_id_raw.trim();
    if raw.is_empty() {
        return RowClass::Rejected("placeholder row (blank business identifier)".to_string());
    }

    let business_id = match raw.trim_start_matches('#').parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            warn!("row {}: unparsable business identifier '{raw}'", row.line);
            return RowClass::Rejected(format!("unparsable business identifier '{raw}'"));
        }
    };

    if business_id <= 0 {
        return RowClass::Rejected("placeholder row (zero business identifier)".to_string());
    }
    if row.value_raw.trim().is_empty() {
        return RowClass::Rejected("placeholder row (blank value)".to_string());
    }
    if parse_value(&row.value_raw) == 0 {
        return RowClass::Rejected("placeholder row (zero value)".to_string());
    }

    RowClass::Valid(business_id)
}

pub struct Reconciler {
    pool: SqlitePool,
    enricher: Enricher,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, enricher: Enricher) -> Self {
        Self { pool, enricher }
    }

    /// Reconcile one export against the store and return aggregate counts.
    pub async fn reconcile(&self, records: &[RowRecord]) -> Result<RunStats> {
        let mut stats = RunStats {
            rows_examined: records.len(),
            ..Default::default()
        };

        // Group valid rows by business identifier, preserving original row
        // order. Within a group, row order assigns the 1-based position that
        // aligns a row with its previously stored line item across runs.
        let mut order: Vec<i64> = Vec::new();
        let mut groups: HashMap<i64, Vec<&RowRecord>> = HashMap::new();
        for record in records {
            match classify(record) {
                RowClass::Valid(business_id) => {
                    if !groups.contains_key(&business_id) {
                        order.push(business_id);
                    }
                    groups.entry(business_id).or_default().push(record);
                }
                RowClass::Rejected(reason) => {
                    stats.skipped_rows.push(SkippedRow {
                        line: record.line,
                        business_id: record.business_id_raw.clone(),
                        reason,
                    });
                }
            }
        }

        let mut observed: HashSet<(i64, i64)> = HashSet::new();
        for business_id in &order {
            let group = &groups[business_id];

            // Positions count as observed even when persistence fails below:
            // the rows were present in the input, and a transient store error
            // must never cascade into deleting their existing records.
            for position in 1..=group.len() as i64 {
                observed.insert((*business_id, position));
            }

            let item_id = match self.find_or_create_item(*business_id, &mut stats).await {
                Ok(id) => id,
                Err(e) => {
                    warn!("item {business_id}: persistence failed, skipping its rows: {e}");
                    continue;
                }
            };

            for (idx, record) in group.iter().enumerate() {
                let position = idx as i64 + 1;
                if let Err(e) = self.apply_row(&item_id, position, record, &mut stats).await {
                    warn!(
                        "row {} (id {business_id}): persistence failed, continuing: {e}",
                        record.line
                    );
                }
            }
        }

        // Deletions only run after every row has been examined.
        self.prune_orphans(&observed, &mut stats).await?;

        Ok(stats)
    }

    async fn find_or_create_item(&self, business_id: i64, stats: &mut RunStats) -> Result<String> {
        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM items WHERE business_id = ?")
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        sqlx::query("INSERT INTO items (id, business_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(business_id)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

        stats.new_items += 1;
        Ok(id)
    }

    /// Insert, update, or skip one row against its (item, position) slot.
    async fn apply_row(
        &self,
        item_id: &str,
        position: i64,
        record: &RowRecord,
        stats: &mut RunStats,
    ) -> Result<()> {
        let hash = content_hash(&record.raw_text);

        let existing: Option<(String, String)> =
            sqlx::query_as("SELECT id, content_hash FROM line_items WHERE item_id = ? AND position = ?")
                .bind(item_id)
                .bind(position)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            // Hash unchanged: no enrichment or normalization work at all.
            Some((_, existing_hash)) if existing_hash == hash => {
                stats.skipped += 1;
            }
            Some((id, _)) => {
                let draft = self.prepare(record).await;
                sqlx::query(
                    r#"
                    UPDATE line_items
                    SET title = ?, description = ?, value = ?, categories = ?, notes = ?,
                        expiration = ?, content_hash = ?, raw_text = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&draft.title)
                .bind(&draft.description)
                .bind(draft.value)
                .bind(serde_json::to_string(&draft.categories)?)
                .bind(&draft.notes)
                .bind(&draft.expiration)
                .bind(&draft.content_hash)
                .bind(&draft.raw_text)
                .bind(Utc::now().timestamp())
                .bind(&id)
                .execute(&self.pool)
                .await?;
                stats.updated += 1;
            }
            None => {
                let draft = self.prepare(record).await;
                let now = Utc::now().timestamp();
                sqlx::query(
                    r#"
                    INSERT INTO line_items
                        (id, item_id, position, title, description, value, categories,
                         notes, expiration, content_hash, raw_text, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(item_id)
                .bind(position)
                .bind(&draft.title)
                .bind(&draft.description)
                .bind(draft.value)
                .bind(serde_json::to_string(&draft.categories)?)
                .bind(&draft.notes)
                .bind(&draft.expiration)
                .bind(&draft.content_hash)
                .bind(&draft.raw_text)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;
                stats.new_line_items += 1;
            }
        }

        Ok(())
    }

    /// Run a changed row's content through the pipeline:
    /// enrichment, then normalization, then markup formatting.
    async fn prepare(&self, record: &RowRecord) -> LineItemDraft {
        let draft = LineItemDraft::from_row(record);
        let mut draft = self.enricher.process(draft).await;
        draft.description = normalize(&draft.description);
        draft.notes = normalize(&draft.notes);
        draft.expiration = normalize(&draft.expiration);
        draft.description = markup::format_blocks(&draft.description);
        draft
    }

    /// Delete every line item whose (business id, position) was not observed
    /// this run, then every item left with no line items.
    async fn prune_orphans(
        &self,
        observed: &HashSet<(i64, i64)>,
        stats: &mut RunStats,
    ) -> Result<()> {
        let persisted: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT li.id, li.position, i.business_id \
             FROM line_items li JOIN items i ON i.id = li.item_id",
        )
        .fetch_all(&self.pool)
        .await?;

        for (id, position, business_id) in persisted {
            if !observed.contains(&(business_id, position)) {
                sqlx::query("DELETE FROM line_items WHERE id = ?")
                    .bind(&id)
                    .execute(&self.pool)
                    .await?;
                stats.deleted += 1;
            }
        }

        let empty: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM items \
             WHERE NOT EXISTS (SELECT 1 FROM line_items WHERE line_items.item_id = items.id)",
        )
        .fetch_all(&self.pool)
        .await?;

        for (id,) in empty {
            sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(&id)
                .execute(&self.pool)
                .await?;
            stats.deleted_items += 1;
        }

        Ok(())
    }
}

/// CLI entry point: tokenize the export, reconcile, print the run report.
pub async fn run_import(
    config: &Config,
    file: &Path,
    dry_run: bool,
    skip_extraction: bool,
) -> Result<()> {
    // Tokenization failure is fatal and happens before any store mutation.
    let records = rows::read_rows(file, &config.columns)?;

    if dry_run {
        let valid = records
            .iter()
            .filter(|r| matches!(classify(r), RowClass::Valid(_)))
            .count();
        println!("import {} (dry-run)", file.display());
        println!("  rows found: {}", records.len());
        println!("  valid: {}", valid);
        println!("  placeholder/invalid: {}", records.len() - valid);
        return Ok(());
    }

    let pool = db::connect(config).await?;

    let client: Option<Box<dyn ExtractionClient>> =
        if skip_extraction || !config.extraction.is_enabled() {
            None
        } else {
            match OpenAiExtractor::from_config(&config.extraction) {
                Ok(extractor) => Some(Box::new(extractor)),
                Err(e) => {
                    warn!("extraction disabled for this run: {e}");
                    None
                }
            }
        };

    let enricher = Enricher::new(ExtractionCache::new(pool.clone()), client);
    let reconciler = Reconciler::new(pool.clone(), enricher);
    let stats = reconciler.reconcile(&records).await?;

    print_report(file, &stats);

    pool.close().await;
    Ok(())
}

fn print_report(file: &Path, stats: &RunStats) {
    println!("import {}", file.display());
    println!("  rows examined: {}", stats.rows_examined);
    println!("  new items: {}", stats.new_items);
    println!("  new line items: {}", stats.new_line_items);
    println!("  updated line items: {}", stats.updated);
    println!("  skipped (unchanged): {}", stats.skipped);
    println!("  deleted line items: {}", stats.deleted);
    println!("  deleted items: {}", stats.deleted_items);
    if !stats.skipped_rows.is_empty() {
        println!("  skipped rows: {}", stats.skipped_rows.len());
        for skipped in &stats.skipped_rows {
            println!(
                "    row {} (id '{}'): {}",
                skipped.line, skipped.business_id, skipped.reason
            );
        }
    }
    println!("ok");
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

    fn reconciler(pool: &SqlitePool) -> Reconciler {
        // Extraction disabled: these tests exercise the sync algorithm.
        let enricher = Enricher::new(ExtractionCache::new(pool.clone()), None);
        Reconciler::new(pool.clone(), enricher)
    }

    fn row(line: usize, business_id: &str, title: &str, description: &str, value: &str) -> RowRecord {
        RowRecord {
            line,
            business_id_raw: business_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            value_raw: value.to_string(),
            categories: vec![],
            notes: String::new(),
            expiration: String::new(),
            raw_text: format!("{business_id}\t{title}\t{description}\t{value}"),
        }
    }

    async fn line_item_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM line_items")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn item_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_run_creates_everything() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);
        let records = vec![
            row(1, "139", "Spa Day", "Relax and unwind.", "$250"),
            row(2, "139", "Spa Day Deluxe", "Even more relaxing.", "$400"),
            row(3, "139", "Spa Weekend", "Two whole days.", "$900"),
        ];

        let stats = rec.reconcile(&records).await.unwrap();
        assert_eq!(stats.new_items, 1);
        assert_eq!(stats.new_line_items, 3);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.deleted, 0);
        assert_eq!(item_count(&pool).await, 1);
        assert_eq!(line_item_count(&pool).await, 3);
    }

    #[tokio::test]
    async fn test_second_run_on_unchanged_input_skips_everything() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);
        let records = vec![
            row(1, "139", "Spa Day", "Relax and unwind.", "$250"),
            row(2, "140", "Golf Outing", "Eighteen holes.", "$300"),
        ];

        rec.reconcile(&records).await.unwrap();
        let stats = rec.reconcile(&records).await.unwrap();

        assert_eq!(stats.new_items, 0);
        assert_eq!(stats.new_line_items, 0);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.deleted_items, 0);
        assert_eq!(stats.skipped, 2);
    }

    #[tokio::test]
    async fn test_changed_row_updated_removed_row_deleted() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);

        let first = vec![
            row(1, "139", "Spa Day", "Relax and unwind.", "$250"),
            row(2, "139", "Spa Day Deluxe", "Even more relaxing.", "$400"),
            row(3, "139", "Spa Weekend", "Two whole days.", "$900"),
        ];
        rec.reconcile(&first).await.unwrap();

        // Row 1 unchanged, row 2's description changed, row 3 removed.
        let second = vec![
            row(1, "139", "Spa Day", "Relax and unwind.", "$250"),
            row(2, "139", "Spa Day Deluxe", "Now with hot stones.", "$400"),
        ];
        let stats = rec.reconcile(&second).await.unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.deleted_items, 0);
        assert_eq!(item_count(&pool).await, 1);
        assert_eq!(line_item_count(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_removing_last_line_item_removes_item() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);

        let first = vec![
            row(1, "139", "Spa Day", "Relax.", "$250"),
            row(2, "140", "Golf Outing", "Eighteen holes.", "$300"),
        ];
        rec.reconcile(&first).await.unwrap();

        let second = vec![row(1, "139", "Spa Day", "Relax.", "$250")];
        let stats = rec.reconcile(&second).await.unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.deleted_items, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(item_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_placeholder_rows_filtered() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);
        let records = vec![
            row(1, "0", "Template", "", ""),
            row(2, "141", "Wine Basket", "Twelve bottles.", "$0"),
            row(3, "", "Blank", "", "$100"),
            row(4, "142", "Real Item", "Exists.", "$80"),
        ];

        let stats = rec.reconcile(&records).await.unwrap();
        assert_eq!(stats.new_items, 1);
        assert_eq!(stats.new_line_items, 1);
        assert_eq!(stats.skipped_rows.len(), 3);
        assert_eq!(line_item_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_row_turned_placeholder_is_pruned() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);

        rec.reconcile(&[row(1, "143", "Quilt", "Hand made.", "$120")])
            .await
            .unwrap();

        // Same slot now a placeholder: excluded from processing AND from
        // orphan-cleanup consideration, so the stored record goes away.
        let stats = rec
            .reconcile(&[row(1, "143", "Quilt", "Hand made.", "$0")])
            .await
            .unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.deleted_items, 1);
        assert_eq!(line_item_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_unparsable_business_id_reported() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);
        let records = vec![row(1, "abc", "Mystery", "???", "$50")];

        let stats = rec.reconcile(&records).await.unwrap();
        assert_eq!(stats.new_line_items, 0);
        assert_eq!(stats.skipped_rows.len(), 1);
        assert!(stats.skipped_rows[0].reason.contains("unparsable"));
    }

    #[tokio::test]
    async fn test_description_normalized_and_formatted() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);
        let records = vec![row(
            1,
            "144",
            "Lounge Pass",
            "Thank you!Lounge access for two .",
            "$60",
        )];

        rec.reconcile(&records).await.unwrap();

        let description: String = sqlx::query_scalar("SELECT description FROM line_items")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(description, "<p>Thank you! Lounge access for two.</p>");
    }

    #[tokio::test]
    async fn test_positions_assigned_by_row_order() {
        let pool = memory_pool().await;
        let rec = reconciler(&pool);
        let records = vec![
            row(1, "145", "First Variant", "One.", "$10"),
            row(2, "146", "Unrelated", "Other.", "$20"),
            row(3, "145", "Second Variant", "Two.", "$30"),
        ];

        rec.reconcile(&records).await.unwrap();

        let positions: Vec<(i64, String)> = sqlx::query_as(
            "SELECT li.position, li.title FROM line_items li \
             JOIN items i ON i.id = li.item_id WHERE i.business_id = 145 \
             ORDER BY li.position",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0], (1, "First Variant".to_string()));
        assert_eq!(positions[1], (2, "Second Variant".to_string()));
    }
}
