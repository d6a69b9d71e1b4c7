//!  read-only tree access.
//!
//! in Git, a tree is a directory. In the wiki:
//! - the root tree mirrors the working directory of the wiki
//! - a page is a blob whose name carries one of the page extensions
//!
//! page versions are identified by blob id, so "did this page change" is a
//! blob id comparison between two trees.

use git2::{FileMode, ObjectType, Tree, TreeEntry, TreeWalkMode, TreeWalkResult};

use crate::document::{is_page_extension, page_extension, shorten_page_name};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::BlobId;

/// A read only handle to a git tree at a specific commit
///
/// think of it as a snapshot - it won't change even if new commits are made.
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    /// create a TreeHandle from a git2::Tree
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    /// blob id of the file at `path`, or None when the snapshot has no such file
    pub fn blob_at(&self, path: &str) -> StorageResult<Option<BlobId>> {
        let entry = match self.tree.get_path(std::path::Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Git(e)),
        };

        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }
        Ok(Some(BlobId::new(entry.id())))
    }

    /// page files directly under the root, as short names (extension stripped)
    pub fn list_pages(&self) -> Vec<String> {
        self.tree
            .iter()
            .filter(is_page_blob)
            .filter_map(|entry| entry.name().map(|name| shorten_page_name(name).to_string()))
            .collect()
    }

    /// every page file in the snapshot, subdirectories included, as short names
    pub fn list_all_pages(&self) -> StorageResult<Vec<String>> {
        let mut pages = Vec::new();
        self.tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if is_page_blob(entry) {
                if let Some(name) = entry.name() {
                    pages.push(shorten_page_name(&format!("{}{}", root, name)).to_string());
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(pages)
    }

    /// paths of every page file whose content is `blob`
    ///
    /// used to follow a page across a rename that did not change its content.
    pub fn pages_with_blob(&self, blob: BlobId) -> StorageResult<Vec<String>> {
        let mut found = Vec::new();
        self.tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if is_page_blob(entry) && entry.id() == blob.raw() {
                if let Some(name) = entry.name() {
                    found.push(format!("{}{}", root, name));
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(found)
    }
}

/// regular file with a page extension
fn is_page_blob(entry: &TreeEntry<'_>) -> bool {
    let mode = entry.filemode();
    let is_file = mode == i32::from(FileMode::Blob) || mode == i32::from(FileMode::BlobExecutable);

    is_file
        && entry
            .name()
            .and_then(page_extension)
            .is_some_and(is_page_extension)
}
