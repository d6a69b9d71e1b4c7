//! Feeding pages to a full-text search index.
//!
//! The search engine itself lives outside this crate. [`PageIndexer`] decides
//! which pages need (re)indexing, by comparing each page's modification time
//! with the one recorded when it was last handed out, and turns pages into
//! [`IndexedPage`] records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::storage::{PageStore, StorageResult};

/// language assumed for pages whose header names none
pub const DEFAULT_LANGUAGE: &str = "en";

/// What the search index stores for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedPage {
    /// index key: the page's short name
    pub name: String,
    pub title: String,
    /// plain text of the body
    pub body: String,
    /// selects the analyzer on the search side
    pub language: String,
}

impl IndexedPage {
    pub fn from_document(document: &Document) -> Self {
        let language = match document.header.language.as_deref().map(str::trim) {
            Some(language) if !language.is_empty() => language.to_lowercase(),
            _ => DEFAULT_LANGUAGE.to_string(),
        };

        Self {
            name: document.short_name().to_string(),
            title: document.title().to_string(),
            body: document.render_plaintext(),
            language,
        }
    }
}

/// Result of one refresh pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IndexBatch {
    /// new or modified pages
    pub updated: Vec<IndexedPage>,
    /// short names of pages that disappeared since the previous pass
    pub removed: Vec<String>,
    /// pages that could not be read and were left out
    pub skipped: usize,
}

impl IndexBatch {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Tracks what has been indexed so far.
#[derive(Debug, Default)]
pub struct PageIndexer {
    seen: HashMap<String, DateTime<Utc>>,
}

impl PageIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of pages handed out so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// walk every page of `store` and collect what changed since the last pass
    ///
    /// A page that cannot be looked up is logged and skipped; only the page
    /// list itself failing is an error.
    pub fn refresh<S: PageStore + ?Sized>(&mut self, store: &S) -> StorageResult<IndexBatch> {
        let pages = store.list_all_pages()?;
        let mut batch = IndexBatch::default();
        let mut present: HashMap<String, DateTime<Utc>> = HashMap::with_capacity(pages.len());

        for name in pages {
            let document = match store.lookup_page(&name) {
                Ok((document, true)) => document,
                Ok((_, false)) => {
                    warn!(page = %name, "page listed in the tip but missing from the working tree");
                    batch.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(page = %name, error = %e, "cannot load page for indexing");
                    batch.skipped += 1;
                    continue;
                }
            };

            let modified_at = document.modified_at;
            let stale = self
                .seen
                .get(&name)
                .map_or(true, |indexed_at| modified_at > *indexed_at);
            if stale {
                debug!(page = %name, "page needs indexing");
                batch.updated.push(IndexedPage::from_document(&document));
            }
            present.insert(name, modified_at);
        }

        batch.removed = self
            .seen
            .keys()
            .filter(|name| !present.contains_key(*name))
            .cloned()
            .collect();
        batch.removed.sort();
        self.seen = present;

        info!(
            updated = batch.updated.len(),
            removed = batch.removed.len(),
            skipped = batch.skipped,
            "index refresh done"
        );
        Ok(batch)
    }

    /// record a page indexed outside of [`PageIndexer::refresh`], e.g. right after a save
    pub fn mark_indexed(&mut self, document: &Document) -> IndexedPage {
        self.seen
            .insert(document.short_name().to_string(), document.modified_at);
        IndexedPage::from_document(document)
    }

    /// stop tracking a page, e.g. after a delete; true when it was tracked
    pub fn forget(&mut self, name: &str) -> bool {
        self.seen.remove(name).is_some()
    }

    /// drop all tracking so the next refresh reindexes everything
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CommitSignature, GitStorage};
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitStorage) {
        let dir = TempDir::new().unwrap();
        let storage = GitStorage::open(dir.path(), true).unwrap();
        (dir, storage)
    }

    fn save(storage: &GitStorage, path: &str, content: &str) {
        let document = Document::from_bytes(path, content.as_bytes().to_vec()).unwrap();
        let ann = CommitSignature::now("Ann", "ann@example.com");
        storage.save_page(&document, &ann, None).unwrap();
    }

    /// push a file's mtime forward so the change is visible regardless of timer resolution
    fn touch_later(path: &std::path::Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
    }

    #[test]
    fn test_indexed_page_from_document() {
        let document = Document::from_bytes(
            "notes/linux.md",
            b"---\ntitle: Linux\nlanguage: IT\n---\n# Kernel\n\nSome *notes*.".to_vec(),
        )
        .unwrap();

        let page = IndexedPage::from_document(&document);
        assert_eq!(page.name, "notes/linux");
        assert_eq!(page.title, "Linux");
        assert_eq!(page.language, "it");
        assert!(page.body.contains("Kernel"));
        assert!(page.body.contains("Some notes."));
        assert!(!page.body.contains('*'));
    }

    #[test]
    fn test_default_language_and_title() {
        let document = Document::from_bytes("todo.txt", b"buy milk".to_vec()).unwrap();
        let page = IndexedPage::from_document(&document);
        assert_eq!(page.language, DEFAULT_LANGUAGE);
        assert_eq!(page.title, "todo");
        assert_eq!(page.body, "buy milk");
    }

    #[test]
    fn test_refresh_empty_repository() {
        let (_dir, storage) = setup();
        let mut indexer = PageIndexer::new();
        let batch = indexer.refresh(&storage).unwrap();
        assert!(batch.is_empty());
        assert!(indexer.is_empty());
    }

    #[test]
    fn test_refresh_tracks_changes() {
        let (dir, storage) = setup();
        save(&storage, "index.md", "hello");
        save(&storage, "notes/linux.md", "kernel");

        let mut indexer = PageIndexer::new();
        let batch = indexer.refresh(&storage).unwrap();
        let mut names: Vec<_> = batch.updated.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["index", "notes/linux"]);
        assert_eq!(indexer.len(), 2);

        // nothing changed
        assert!(indexer.refresh(&storage).unwrap().is_empty());

        save(&storage, "index.md", "hello again");
        touch_later(&dir.path().join("index.md"));
        let batch = indexer.refresh(&storage).unwrap();
        assert_eq!(batch.updated.len(), 1);
        assert_eq!(batch.updated[0].body.trim_end(), "hello again");

        let ann = CommitSignature::now("Ann", "ann@example.com");
        storage.delete_page("notes/linux", &ann, None).unwrap();
        let batch = indexer.refresh(&storage).unwrap();
        assert!(batch.updated.is_empty());
        assert_eq!(batch.removed, vec!["notes/linux"]);
        assert_eq!(indexer.len(), 1);
    }

    #[test]
    fn test_refresh_skips_unreadable_pages() {
        let (dir, storage) = setup();
        save(&storage, "index.md", "hello");
        save(&storage, "broken.md", "fine for now");
        // committed, then broken on disk: unterminated front matter
        fs::write(dir.path().join("broken.md"), "---\ntitle: x\n").unwrap();

        let mut indexer = PageIndexer::new();
        let batch = indexer.refresh(&storage).unwrap();
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.updated.len(), 1);
        assert_eq!(batch.updated[0].name, "index");
    }

    #[test]
    fn test_forget_and_reset() {
        let (_dir, storage) = setup();
        save(&storage, "index.md", "hello");

        let mut indexer = PageIndexer::new();
        indexer.refresh(&storage).unwrap();
        assert!(indexer.forget("index"));
        assert!(!indexer.forget("index"));
        assert_eq!(indexer.refresh(&storage).unwrap().updated.len(), 1);

        indexer.reset();
        assert_eq!(indexer.refresh(&storage).unwrap().updated.len(), 1);
    }

    #[test]
    fn test_mark_indexed() {
        let (_dir, storage) = setup();
        save(&storage, "index.md", "hello");
        let (document, _) = storage.lookup_page("index").unwrap();

        let mut indexer = PageIndexer::new();
        let page = indexer.mark_indexed(&document);
        assert_eq!(page.name, "index");
        assert!(indexer.refresh(&storage).unwrap().is_empty());
    }
}
