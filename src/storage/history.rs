//! Page history: which commits changed a page.
//!
//! Both walks key page versions by blob id. A commit that leaves the blob of
//! a page untouched (a no-op save, or a commit that only touched other pages)
//! is not a change of that page.

use std::collections::{HashSet, VecDeque};

use git2::{Commit, Oid, Repository};
use tracing::debug;

use crate::storage::commit::{current_tip, history, CommitRecord};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::TreeHandle;
use crate::storage::types::{BlobId, PagePath, RevisionId};

/// one entry per distinct content version of `path`, newest first
///
/// The walk follows first parents from the tip and stops at the first commit
/// whose tree lacks the path. Each entry carries the oldest commit of the
/// contiguous run holding that content, i.e. the commit that introduced it.
/// Content that reappears further back (a revert) is not listed twice.
///
/// An empty repository or a page that never existed yields an empty list.
pub fn logs_for_page(repo: &Repository, path: &PagePath) -> StorageResult<Vec<CommitRecord>> {
    let tip = match current_tip(repo)? {
        Some(tip) => tip,
        None => return Ok(Vec::new()),
    };

    let mut entries: Vec<CommitRecord> = Vec::new();
    let mut seen: HashSet<BlobId> = HashSet::new();
    let mut current: Option<BlobId> = None;
    // entry the current run extends; None while walking through a revisited version
    let mut run: Option<usize> = None;

    for commit in history(repo, RevisionId::new(tip.id()))?.first_parent_only()? {
        let commit = commit?;
        let blob = match blob_in(&commit, path.as_str())? {
            Some(blob) => blob,
            None => break,
        };

        if current == Some(blob) {
            if let Some(idx) = run {
                entries[idx] = CommitRecord::from_git2(&commit);
            }
            continue;
        }

        current = Some(blob);
        if seen.insert(blob) {
            entries.push(CommitRecord::from_git2(&commit));
            run = Some(entries.len() - 1);
        } else {
            run = None;
        }
    }

    debug!(path = %path, versions = entries.len(), "collected page log");
    Ok(entries)
}

/// the most recent commit that changed the content of `path`
///
/// Breadth-first from the tip over every parent. A parent holding the same
/// blob is queued for a further step back; a parent holding a different blob
/// means the commit being examined made the change. When a parent lacks the
/// path, the commit either created the page or renamed it: the walk keeps
/// going under the old name only when the parent holds the same blob at a
/// path the commit removed, so a pure rename is not reported as a change but
/// a copy of another page's content is. When the queue runs dry, the oldest
/// commit reached introduced the page.
pub fn last_commit(repo: &Repository, path: &PagePath) -> StorageResult<CommitRecord> {
    let tip = current_tip(repo)?.ok_or(StorageError::EmptyRepository)?;
    let reference = blob_in(&tip, path.as_str())?
        .ok_or_else(|| StorageError::NotFound(path.to_string()))?;

    let mut visited: HashSet<Oid> = HashSet::from([tip.id()]);
    let mut queue: VecDeque<(Commit<'_>, String)> = VecDeque::new();
    queue.push_back((tip.clone(), path.as_str().to_string()));
    let mut oldest = tip;

    while let Some((commit, current_path)) = queue.pop_front() {
        for parent in commit.parents() {
            let tree = parent.tree().map_err(|e| StorageError::history(parent.id(), e))?;
            let tree = TreeHandle::new(tree);

            let followed_path = match tree.blob_at(&current_path)? {
                Some(blob) if blob == reference => current_path.clone(),
                Some(_) => return Ok(CommitRecord::from_git2(&commit)),
                None => match renamed_from(&commit, &tree, reference)? {
                    Some(previous_path) => {
                        debug!(from = %previous_path, to = %current_path, "following rename");
                        previous_path
                    }
                    None => return Ok(CommitRecord::from_git2(&commit)),
                },
            };

            if visited.insert(parent.id()) {
                queue.push_back((parent, followed_path));
            }
        }
        oldest = commit;
    }

    Ok(CommitRecord::from_git2(&oldest))
}

/// the path `commit` moved a page holding `blob` away from, if it did
///
/// a candidate must hold `blob` in the parent and be gone from `commit`.
fn renamed_from(
    commit: &Commit<'_>,
    parent_tree: &TreeHandle<'_>,
    blob: BlobId,
) -> StorageResult<Option<String>> {
    let candidates = parent_tree.pages_with_blob(blob)?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let tree = commit.tree().map_err(|e| StorageError::history(commit.id(), e))?;
    let tree = TreeHandle::new(tree);
    for candidate in candidates {
        if tree.blob_at(&candidate)?.is_none() {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// blob of `path` in the tree of `commit`
fn blob_in(commit: &Commit<'_>, path: &str) -> StorageResult<Option<BlobId>> {
    let tree = commit.tree().map_err(|e| StorageError::history(commit.id(), e))?;
    TreeHandle::new(tree)
        .blob_at(path)
        .map_err(|e| StorageError::history(commit.id(), e))
}
