//!  Blob operations for historical page reads.
//!
//! The working directory always holds the tip version of each page. Older
//! versions only exist as blobs inside past trees; this module reads them
//! back into [`Document`]s.

use git2::Repository;

use crate::document::Document;
use crate::storage::commit::get_tree_at_commit;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, PagePath, RevisionId};

/// read a blob's content from the repository
pub fn read_blob(repo: &Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw())?;
    Ok(blob.content().to_vec())
}

/// load the version of a page recorded in `revision`
///
/// `modified_at` is the commit's author time.
pub fn read_page_at(repo: &Repository, path: &PagePath, revision: RevisionId) -> StorageResult<Document> {
    let tree = get_tree_at_commit(repo, revision)?;
    let blob_id = tree
        .blob_at(path.as_str())?
        .ok_or_else(|| StorageError::NotFound(format!("{} at {}", path, revision.short())))?;

    let bytes = read_blob(repo, blob_id)?;
    let mut document = Document::from_bytes(path.as_str(), bytes)?;

    let commit = repo.find_commit(revision.raw())?;
    if let Some(when) = chrono::DateTime::from_timestamp(commit.author().when().seconds(), 0) {
        document.modified_at = when;
    }
    Ok(document)
}
