//! Description enrichment orchestration.
//!
//! For each new or changed line item, the enricher resolves structured
//! sub-fields for the description: first from the durable cache, then from
//! the external extraction service. Extraction failure never blocks the
//! import — the draft passes through unmodified with a warning.

use tracing::{debug, warn};

use crate::cache::ExtractionCache;
use crate::extraction::{ExtractedFields, ExtractionClient};
use crate::models::{content_hash, LineItemDraft};

pub struct Enricher {
    cache: ExtractionCache,
    /// `None` when extraction is disabled or the caller asked to skip it.
    client: Option<Box<dyn ExtractionClient>>,
}

impl Enricher {
    pub fn new(cache: ExtractionCache, client: Option<Box<dyn ExtractionClient>>) -> Self {
        Self { cache, client }
    }

    /// Enrich a draft. No-op when the description is empty or no client is
    /// configured. The service is invoked at most once per distinct
    /// description text, ever — results are cached by description hash.
    pub async fn process(&self, mut draft: LineItemDraft) -> LineItemDraft {
        if draft.description.trim().is_empty() {
            return draft;
        }
        let Some(client) = &self.client else {
            return draft;
        };

        let hash = content_hash(&draft.description);

        if let Some(fields) = self.cache.get(&hash).await {
            debug!("extraction cache hit for {hash}");
            apply_fields(&mut draft, &fields);
            return draft;
        }

        match client.extract(&draft.description).await {
            Ok(fields) => {
                self.cache.put(&hash, &fields).await;
                apply_fields(&mut draft, &fields);
            }
            Err(e) => {
                warn!("extraction failed, keeping description as supplied: {e}");
            }
        }

        draft
    }
}

/// Fold extracted fields into the draft: a non-empty cleaned description
/// replaces the original, the expiration notice fills the field when the
/// export left it blank, and extracted notes append to any existing notes.
fn apply_fields(draft: &mut LineItemDraft, fields: &ExtractedFields) {
    if !fields.description.trim().is_empty() {
        draft.description = fields.description.clone();
    }
    if draft.expiration.trim().is_empty() && !fields.expiration_notice.trim().is_empty() {
        draft.expiration = fields.expiration_notice.clone();
    }
    if !fields.notes.trim().is_empty() {
        if draft.notes.trim().is_empty() {
            draft.notes = fields.notes.clone();
        } else {
            draft.notes.push('\n');
            draft.notes.push_str(&fields.notes);
        }
    }
}
