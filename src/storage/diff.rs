//! Unified diffs of a single page between two revisions.

use git2::{Patch, Repository, Tree};
use tracing::debug;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{PagePath, RevisionId};

/// patches for `path` going from `old` to `new`
///
/// The whole tree-to-tree diff is computed, then only the deltas whose old
/// or new side is `path` are kept, in the order the diff produced them.
/// Rename detection is not run: a rename across the range shows up as a
/// separate delete and add. Diffing a revision against itself yields nothing.
pub fn diff_page(
    repo: &Repository,
    path: &PagePath,
    old: RevisionId,
    new: RevisionId,
) -> StorageResult<Vec<String>> {
    let old_tree = resolve_tree(repo, old)?;
    let new_tree = resolve_tree(repo, new)?;

    let diff = repo
        .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)
        .map_err(|e| StorageError::Diff(e.to_string()))?;

    let mut patches = Vec::new();
    for (idx, delta) in diff.deltas().enumerate() {
        let touches_page = [delta.old_file().path(), delta.new_file().path()]
            .into_iter()
            .flatten()
            .any(|p| p == path.as_path());
        if !touches_page {
            continue;
        }

        let patch = Patch::from_diff(&diff, idx).map_err(|e| StorageError::Diff(e.to_string()))?;
        if let Some(mut patch) = patch {
            let buf = patch.to_buf().map_err(|e| StorageError::Diff(e.to_string()))?;
            patches.push(String::from_utf8_lossy(&buf).into_owned());
        }
    }

    debug!(path = %path, old = %old.short(), new = %new.short(), patches = patches.len(), "diffed page");
    Ok(patches)
}

fn resolve_tree(repo: &Repository, revision: RevisionId) -> StorageResult<Tree<'_>> {
    let commit = repo
        .find_commit(revision.raw())
        .map_err(|e| StorageError::Diff(format!("cannot resolve revision {}: {}", revision, e.message())))?;
    commit
        .tree()
        .map_err(|e| StorageError::Diff(format!("cannot read tree of {}: {}", revision, e.message())))
}
