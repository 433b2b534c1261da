use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use super::category::{Category, parse_line};
use super::key::ContentKey;
use super::store::AssetStore;
use crate::error::ForgeError;
use crate::pacing::PacingPlan;

/// A single line of work from the prompts file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub raw_text: String,
    pub category: Category,
    pub prompt_text: String,
    pub content_key: ContentKey,
    pub target_resolution: u32,
}

impl WorkItem {
    pub fn new(raw_text: &str, plan: &PacingPlan) -> Self {
        let (category, prompt) = parse_line(raw_text);
        Self {
            raw_text: raw_text.to_string(),
            category,
            prompt_text: prompt.to_string(),
            content_key: ContentKey::of(raw_text),
            target_resolution: plan.clamp(category.native_resolution()),
        }
    }
}

/// Result of splitting a catalog against the asset store.
#[derive(Debug)]
pub struct Partition {
    /// Items still to render, in input order.
    pub pending: Vec<WorkItem>,
    /// How many items already had a valid asset.
    pub skipped: usize,
}

/// Loads work items and filters out those already rendered.
pub struct WorkCatalog;

impl WorkCatalog {
    /// Read a prompts file. A missing or unreadable file aborts the session.
    pub fn load(path: &Path, plan: &PacingPlan) -> Result<Vec<WorkItem>, ForgeError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ForgeError::Catalog {
            path: path.to_path_buf(),
            source,
        })?;
        let items = Self::parse(&contents, plan);
        tracing::info!(path = %path.display(), items = items.len(), "Loaded work catalog");
        Ok(items)
    }

    /// Parse newline-delimited prompts. Lines are trimmed, blanks ignored, and
    /// repeated lines collapse onto their first occurrence.
    pub fn parse(contents: &str, plan: &PacingPlan) -> Vec<WorkItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let item = WorkItem::new(line, plan);
            if seen.insert(item.content_key.clone()) {
                items.push(item);
            } else {
                tracing::debug!(key = item.content_key.short(), "Dropping duplicate prompt line");
            }
        }
        items
    }

    /// Keep only items without a valid asset on disk.
    pub fn partition(items: Vec<WorkItem>, store: &AssetStore) -> Partition {
        let total = items.len();
        let pending: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| !store.is_complete(&item.content_key))
            .collect();
        Partition {
            skipped: total - pending.len(),
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};
    use tempfile::TempDir;

    fn write_valid(store: &AssetStore, key: &ContentKey) {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        store.persist(key, &img).unwrap();
    }

    #[test]
    fn parse_skips_blank_lines_and_trims() {
        let items = WorkCatalog::parse("  GEM: ruby  \n\n   \nplain sword\n", &PacingPlan::unconstrained());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].raw_text, "GEM: ruby");
        assert_eq!(items[0].category, Category::Gem);
        assert_eq!(items[0].prompt_text, "ruby");
        assert_eq!(items[1].category, Category::Default);
        assert_eq!(items[1].prompt_text, "plain sword");
    }

    #[test]
    fn key_uses_raw_text_not_prompt() {
        let item = WorkItem::new("WORLD: neon forest", &PacingPlan::unconstrained());
        assert_eq!(item.content_key, ContentKey::of("WORLD: neon forest"));
        assert_ne!(item.content_key, ContentKey::of("neon forest"));
    }

    #[test]
    fn target_resolution_follows_plan() {
        let item = WorkItem::new("MAP: harbor", &PacingPlan::constrained());
        assert_eq!(item.target_resolution, 512);
        let item = WorkItem::new("MAP: harbor", &PacingPlan::unconstrained());
        assert_eq!(item.target_resolution, 1024);
    }

    #[test]
    fn duplicates_collapse_to_first() {
        let items = WorkCatalog::parse("ITEM: axe\nITEM: axe\nitem: axe\n", &PacingPlan::unconstrained());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].raw_text, "ITEM: axe");
        assert_eq!(items[1].raw_text, "item: axe");
    }

    #[test]
    fn load_missing_file_is_catalog_error() {
        let dir = TempDir::new().unwrap();
        let err = WorkCatalog::load(&dir.path().join("nope.txt"), &PacingPlan::constrained()).unwrap_err();
        assert!(matches!(err, ForgeError::Catalog { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.txt");
        std::fs::write(&path, "SLOT: potion\n").unwrap();
        let items = WorkCatalog::load(&path, &PacingPlan::constrained()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, Category::Slot);
    }

    #[test]
    fn partition_preserves_order_and_counts_skipped() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path());
        let items = WorkCatalog::parse("a\nb\nc\nd\n", &PacingPlan::unconstrained());
        write_valid(&store, &items[1].content_key);
        write_valid(&store, &items[3].content_key);

        let partition = WorkCatalog::partition(items, &store);
        assert_eq!(partition.skipped, 2);
        let raws: Vec<_> = partition.pending.iter().map(|i| i.raw_text.as_str()).collect();
        assert_eq!(raws, vec!["a", "c"]);
    }

    #[test]
    fn corrupt_and_empty_files_stay_pending() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path());
        let items = WorkCatalog::parse("empty\ngarbage\ngood\n", &PacingPlan::unconstrained());
        std::fs::write(store.path_for(&items[0].content_key), b"").unwrap();
        std::fs::write(store.path_for(&items[1].content_key), b"not a png at all").unwrap();
        write_valid(&store, &items[2].content_key);

        let partition = WorkCatalog::partition(items, &store);
        assert_eq!(partition.skipped, 1);
        assert_eq!(partition.pending.len(), 2);
        assert_eq!(partition.pending[0].raw_text, "empty");
        assert_eq!(partition.pending[1].raw_text, "garbage");
    }
}
