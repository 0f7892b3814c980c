//! Database statistics and health overview.
//!
//! Provides a quick summary of what's stored: item and line-item counts,
//! extraction-cache size, and a per-item breakdown. Used by `bids stats` to
//! give confidence that imports are reconciling as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Per-item breakdown of line-item counts and value.
struct ItemStats {
    business_id: i64,
    line_count: i64,
    total_value: i64,
    last_updated: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(&pool)
        .await?;

    let total_line_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM line_items")
        .fetch_one(&pool)
        .await?;

    let cache_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM extraction_cache")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Bidsheet — Database Stats");
    println!("=========================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Items:         {}", total_items);
    println!("  Line items:    {}", total_line_items);
    println!("  Cache entries: {}", cache_entries);

    let item_rows = sqlx::query(
        r#"
        SELECT
            i.business_id,
            COUNT(li.id) AS line_count,
            COALESCE(SUM(li.value), 0) AS total_value,
            MAX(li.updated_at) AS last_updated
        FROM items i
        LEFT JOIN line_items li ON li.item_id = i.id
        GROUP BY i.business_id
        ORDER BY i.business_id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let item_stats: Vec<ItemStats> = item_rows
        .iter()
        .map(|row| ItemStats {
            business_id: row.get("business_id"),
            line_count: row.get("line_count"),
            total_value: row.get("total_value"),
            last_updated: row.get("last_updated"),
        })
        .collect();

    if !item_stats.is_empty() {
        println!();
        println!("  By item:");
        println!(
            "  {:<10} {:>6} {:>10}   {}",
            "ITEM", "LINES", "VALUE", "LAST UPDATED"
        );
        println!("  {}", "-".repeat(48));

        for s in &item_stats {
            let updated_display = match s.last_updated {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<10} {:>6} {:>10}   {}",
                s.business_id,
                s.line_count,
                format!("${}", s.total_value),
                updated_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
