//!  Commit creation and history traversal
//!
//!  commits are the atomic units of change in the wiki:
//! - each save, rename or delete creates exactly one commit
//! - the new commit's parent is the current tip (none for the first commit)
//! - history is a single line, walked newest first
//!
//! this module handles commit creation, tip resolution and history walking

use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, ErrorCode, Repository, Revwalk, Sort};
use serde::Serialize;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::TreeHandle;
use crate::storage::types::{RevisionId, TreeId};

/// information about a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub id: RevisionId,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitRecord {
    /// create CommitRecord from a git2::Commit
    pub(crate) fn from_git2(commit: &Commit<'_>) -> Self {
        let author = commit.author();
        let timestamp = Utc
            .timestamp_opt(author.when().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: RevisionId::new(commit.id()),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<RevisionId>,
    message: String,
    signature: Option<git2::Signature<'static>>,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: None,
            update_ref: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit; `None` leaves the commit parentless
    pub fn parent(mut self, parent: Option<RevisionId>) -> Self {
        self.parents.extend(parent);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: git2::Signature<'static>) -> Self {
        self.signature = Some(signature);
        self
    }

    /// update a ref (branch) to point to this commit
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> StorageResult<RevisionId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;
        let sig = self
            .signature
            .ok_or_else(|| StorageError::Internal("commit requires a signature".to_string()))?;

        let tree = self.repo.find_tree(tree_id.raw())?;

        // collect parent commits
        let parent_commits: Vec<Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            self.update_ref.as_deref(),
            &sig,
            &sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(RevisionId::new(oid))
    }
}

/// the commit HEAD points to, or None when the repository has no commits yet
pub fn current_tip(repo: &Repository) -> StorageResult<Option<Commit<'_>>> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None)
        }
        Err(e) => return Err(StorageError::Git(e)),
    };

    Ok(Some(head.peel_to_commit()?))
}

/// check if the repository has its first ("root") commit
pub fn has_root_commit(repo: &Repository) -> StorageResult<bool> {
    Ok(current_tip(repo)?.is_some())
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: RevisionId) -> StorageResult<CommitRecord> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::NotFound(format!("commit {}", id)))?;

    Ok(CommitRecord::from_git2(&commit))
}

/// get the tree snapshot at a specific commit
pub fn get_tree_at_commit(repo: &Repository, id: RevisionId) -> StorageResult<TreeHandle<'_>> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::NotFound(format!("commit {}", id)))?;

    let tree = commit.tree()?;
    Ok(TreeHandle::new(tree))
}

/// iterate over commit history starting from a commit
pub struct HistoryIterator<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> HistoryIterator<'repo> {
    /// create a new history iterator
    pub fn new(repo: &'repo Repository, start: RevisionId) -> StorageResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.push(start.raw())?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

        Ok(Self { repo, revwalk })
    }

    /// only follow first parents (linear history through merges)
    pub fn first_parent_only(mut self) -> StorageResult<Self> {
        self.revwalk.simplify_first_parent()?;
        Ok(self)
    }
}

impl<'repo> Iterator for HistoryIterator<'repo> {
    type Item = StorageResult<Commit<'repo>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => Some(
                self.repo
                    .find_commit(oid)
                    .map_err(|e| StorageError::history(oid, e)),
            ),
            Err(e) => Some(Err(StorageError::history("revwalk", e))),
        }
    }
}

/// get history for a commit
pub fn history(repo: &Repository, start: RevisionId) -> StorageResult<HistoryIterator<'_>> {
    HistoryIterator::new(repo, start)
}

/// default commit messages for page operations
pub struct CommitMessage;

impl CommitMessage {
    /// message used when the user gave none
    pub const NO_COMMENT: &'static str = "(no comment)";

    /// the user's message, or `fallback` when it is blank
    pub fn or_default(message: Option<&str>, fallback: impl Into<String>) -> String {
        match message.map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => fallback.into(),
        }
    }

    /// the user's message for a save, or `(no comment)`
    pub fn save(message: Option<&str>) -> String {
        Self::or_default(message, Self::NO_COMMENT)
    }

    /// format a message for a rename
    pub fn rename(from: &str, to: &str) -> String {
        format!("rename {} to {}", from, to)
    }

    /// format a message for a delete
    pub fn delete(path: &str) -> String {
        format!("delete {}", path)
    }

    /// message of the baseline commit of a seeded repository
    pub fn initial() -> String {
        "Initialize wiki repository".to_string()
    }
}
