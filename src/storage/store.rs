//! The storage capability the rest of the wiki programs against.

use std::path::PathBuf;

use crate::document::Document;
use crate::storage::commit::CommitRecord;
use crate::storage::error::StorageResult;
use crate::storage::types::{CommitSignature, RevisionId};

/// Persistence, history and diffs for wiki pages.
///
/// Page paths are repository-relative. Where a path has no recognized
/// extension, implementations resolve it the way [`PageStore::lookup_page`]
/// does. Messages left as `None` (or blank) get a generated default.
pub trait PageStore {
    /// join `relative` to the repository root, refusing anything that escapes it
    fn resolve_path(&self, relative: &str) -> StorageResult<PathBuf>;

    /// the page at `path` and whether it exists
    ///
    /// A miss is not an error: it returns an empty document carrying the
    /// default extension so the caller can offer to create it.
    fn lookup_page(&self, path: &str) -> StorageResult<(Document, bool)>;

    /// write the document and commit it on top of the tip
    fn save_page(
        &self,
        document: &Document,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId>;

    fn rename_page(
        &self,
        from: &str,
        to: &str,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId>;

    fn delete_page(
        &self,
        path: &str,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId>;

    /// short names of the pages at the top level of the tip tree
    fn list_pages(&self) -> StorageResult<Vec<String>>;

    /// short names of every page in the tip tree, subdirectories included
    fn list_all_pages(&self) -> StorageResult<Vec<String>>;

    /// content-changing revisions of a page, newest first
    fn logs_for_page(&self, path: &str) -> StorageResult<Vec<CommitRecord>>;

    /// the most recent commit that changed the page's content
    fn last_commit(&self, path: &str) -> StorageResult<CommitRecord>;

    /// unified diffs of the document's file from `old` to `new`
    fn diff_page(
        &self,
        document: &Document,
        old: RevisionId,
        new: RevisionId,
    ) -> StorageResult<Vec<String>>;
}
