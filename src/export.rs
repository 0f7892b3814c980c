//! Write prepared receipt content for the downstream renderer.
//!
//! Produces one HTML fragment per line item, named by catalog number,
//! position, and a filename-safe slug of the title — e.g.
//! `139-2-spa-day-deluxe.html`. The renderer (out of scope here) turns
//! each fragment into a printable receipt document.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::models::{slug, Item, LineItem};

/// Export every line item's prepared content as an HTML fragment file.
///
/// If `out_dir` is `Some`, writes there; otherwise uses the configured
/// export directory.
pub async fn run_export(config: &Config, out_dir: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;

    let dir = out_dir.unwrap_or(&config.export.out_dir);
    std::fs::create_dir_all(dir)?;

    let items: Vec<Item> = sqlx::query_as(
        "SELECT id, business_id, created_at, updated_at FROM items ORDER BY business_id",
    )
    .fetch_all(&pool)
    .await?;

    let mut written = 0usize;
    for item in &items {
        let line_items: Vec<LineItem> = sqlx::query_as(
            "SELECT id, item_id, position, title, description, value, categories, \
                    notes, expiration, content_hash, raw_text, created_at, updated_at \
             FROM line_items WHERE item_id = ? ORDER BY position",
        )
        .bind(&item.id)
        .fetch_all(&pool)
        .await?;

        for line_item in &line_items {
            let filename = format!(
                "{}-{}-{}.html",
                item.business_id,
                line_item.position,
                slug(&line_item.title)
            );
            std::fs::write(dir.join(&filename), render_fragment(item, line_item))?;
            written += 1;
        }
    }

    eprintln!("Exported {} line items to {}", written, dir.display());

    pool.close().await;
    Ok(())
}

/// Assemble one line item's receipt content fragment.
fn render_fragment(item: &Item, line_item: &LineItem) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<h2>#{} — {}</h2>\n",
        item.business_id, line_item.title
    ));
    out.push_str(&format!(
        "<p class=\"value\">Fair market value: ${}</p>\n",
        line_item.value
    ));
    if !line_item.description.is_empty() {
        out.push_str(&line_item.description);
        out.push('\n');
    }
    let categories = line_item.category_list();
    if !categories.is_empty() {
        out.push_str(&format!(
            "<p class=\"categories\">Categories: {}</p>\n",
            categories.join(", ")
        ));
    }
    if !line_item.notes.is_empty() {
        out.push_str(&format!("<p class=\"notes\">{}</p>\n", line_item.notes));
    }
    if !line_item.expiration.is_empty() {
        out.push_str(&format!(
            "<p class=\"expiration\">{}</p>\n",
            line_item.expiration
        ));
    }
    out
}
