//!   Core Git repository wrapper.
//!
//!  This is the central component of the storage layer. It owns the
//!  `git2::Repository` and the working directory next to it, and provides
//!  the page operations the rest of the wiki uses.
//!
//! Locking: the working tree is shared mutable state. Every mutating
//! operation holds the working-tree write lock for its whole
//! write -> stage -> tree -> commit sequence; lookups hold the read lock.
//! The git handle sits behind its own mutex because `git2::Repository` is
//! not `Sync`. The working-tree lock is always taken first.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{Repository, RepositoryInitOptions};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::document::{Document, DEFAULT_EXTENSION, PAGE_EXTENSIONS};
use crate::storage::blob;
use crate::storage::commit::{self, CommitBuilder, CommitMessage, CommitRecord};
use crate::storage::diff;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::history;
use crate::storage::staging::{prune_empty_parents, write_file, Stage, WorktreeSnapshot};
use crate::storage::store::PageStore;
use crate::storage::tree::TreeHandle;
use crate::storage::types::{CommitSignature, PagePath, RevisionId};

/// branch a new wiki repository starts on
const INITIAL_BRANCH: &str = "master";

/// content of the baseline commit of a seeded repository
const SEED_IGNORE: &str = "*.swp\n*~\n.DS_Store\n";

/// The main Git repository wrapper.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct GitStorage {
    inner: Arc<GitStorageInner>,
}

struct GitStorageInner {
    repo: Mutex<Repository>,
    worktree: RwLock<()>,
    root: PathBuf,
}

impl fmt::Debug for GitStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitStorage")
            .field("root", &self.inner.root)
            .finish_non_exhaustive()
    }
}

impl GitStorage {
    /// Open the repository at `path`, creating an empty one when it is
    /// missing and `create_if_missing` is set.
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> StorageResult<Self> {
        let path = path.as_ref();
        if !path.join(".git").exists() {
            if create_if_missing {
                return Self::init(path);
            }
            return Err(StorageError::NotFound(format!("no repository at {}", path.display())));
        }

        let repo = Repository::open(path).map_err(|e| StorageError::RepositoryCorrupt {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        let storage = Self::from_repository(repo)?;
        debug!(root = %storage.root().display(), "opened wiki repository");
        Ok(storage)
    }

    /// Initialize a new, empty repository.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(INITIAL_BRANCH);
        let repo = Repository::init_opts(path, &opts)?;

        let storage = Self::from_repository(repo)?;
        info!(root = %storage.root().display(), "initialized wiki repository");
        Ok(storage)
    }

    /// Initialize a new repository whose first commit adds a `.gitignore`,
    /// so history queries have a tip from the start.
    ///
    /// An existing repository is opened and left as is when it already has
    /// commits.
    pub fn init_seeded(path: impl AsRef<Path>, signature: &CommitSignature) -> StorageResult<Self> {
        let storage = Self::open(path, true)?;
        if storage.has_root_commit()? {
            return Ok(storage);
        }

        let ignore = PagePath::new(".gitignore")?;
        let git_signature = signature.to_git2_signature()?;
        let abs = storage.abs(&ignore);

        let id = {
            let _worktree = storage.inner.worktree.write();
            let repo = storage.inner.repo.lock();
            let mut snapshot = WorktreeSnapshot::new(storage.root());
            snapshot.record(&ignore)?;
            commit_changes(&repo, snapshot, CommitMessage::initial(), git_signature, |stage| {
                if !abs.exists() {
                    write_file(&abs, SEED_IGNORE.as_bytes())?;
                }
                stage.add(&ignore)
            })?
        };

        info!(revision = %id.short(), "seeded wiki repository");
        Ok(storage)
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open(path, true)
    }

    fn from_repository(repo: Repository) -> StorageResult<Self> {
        let workdir = repo.workdir().ok_or_else(|| StorageError::RepositoryCorrupt {
            path: repo.path().to_path_buf(),
            reason: "bare repository has no working directory".to_string(),
        })?;
        let root = workdir.canonicalize()?;

        Ok(Self {
            inner: Arc::new(GitStorageInner {
                repo: Mutex::new(repo),
                worktree: RwLock::new(()),
                root,
            }),
        })
    }

    /// Get the working directory root.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Execute a function with the repository handle.
    pub(crate) fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== Paths ====================

    /// Join `relative` to the root; traversal out of the root is a `PathEscape`.
    pub fn resolve_path(&self, relative: &str) -> StorageResult<PathBuf> {
        let path = PagePath::new(relative)?;
        Ok(self.abs(&path))
    }

    fn abs(&self, path: &PagePath) -> PathBuf {
        self.inner.root.join(path.as_path())
    }

    /// existing page file for `path` in the working tree
    ///
    /// caller holds the working-tree lock.
    fn locate(&self, path: &PagePath) -> Option<PagePath> {
        candidates(path)
            .into_iter()
            .find(|candidate| self.abs(candidate).is_file())
    }

    /// the file `path` refers to: the existing one if any, else with the default extension
    fn page_file(&self, path: &str) -> StorageResult<PagePath> {
        let path = PagePath::new(path)?;
        if path.has_page_extension() {
            return Ok(path);
        }
        let _worktree = self.inner.worktree.read();
        Ok(self
            .locate(&path)
            .unwrap_or_else(|| path.with_extension(DEFAULT_EXTENSION)))
    }

    // ==================== Pages ====================

    /// Look a page up by logical path.
    ///
    /// With a recognized extension only that exact file is checked; without
    /// one, each extension is tried in [`PAGE_EXTENSIONS`] order and the first
    /// existing file wins. A miss returns `(Document::new(path.md), false)`.
    pub fn lookup_page(&self, path: &str) -> StorageResult<(Document, bool)> {
        let path = PagePath::new(path)?;

        let _worktree = self.inner.worktree.read();
        match self.locate(&path) {
            Some(file) => {
                let document = Document::load(&self.abs(&file), file.as_str())?;
                debug!(path = %file, "page found");
                Ok((document, true))
            }
            None => {
                let file = if path.has_page_extension() {
                    path
                } else {
                    path.with_extension(DEFAULT_EXTENSION)
                };
                debug!(path = %file, "page not found, offering a new one");
                Ok((Document::new(file.into_string()), false))
            }
        }
    }

    /// Write the document's raw bytes and commit them.
    ///
    /// A document path without a recognized extension gets the default one.
    /// If anything fails after the file was written, the file and its index
    /// entry are put back to their tip state.
    pub fn save_page(
        &self,
        document: &Document,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId> {
        let mut page = PagePath::new(&document.path)?;
        if !page.has_page_extension() {
            page = page.with_extension(DEFAULT_EXTENSION);
        }
        let git_signature = signature.to_git2_signature()?;
        let abs = self.abs(&page);

        let _worktree = self.inner.worktree.write();
        let repo = self.inner.repo.lock();
        let mut snapshot = WorktreeSnapshot::new(self.root());
        snapshot.record(&page)?;

        let id = commit_changes(&repo, snapshot, CommitMessage::save(message), git_signature, |stage| {
            write_file(&abs, &document.raw_bytes)?;
            stage.add(&page)
        })?;

        info!(path = %page, revision = %id.short(), author = %signature.name, "saved page");
        Ok(id)
    }

    /// Move a page and commit the move.
    ///
    /// A destination without a recognized extension keeps the source's
    /// extension. The destination must not exist.
    pub fn rename_page(
        &self,
        from: &str,
        to: &str,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId> {
        let from_path = PagePath::new(from)?;
        let mut to_path = PagePath::new(to)?;
        let git_signature = signature.to_git2_signature()?;

        let _worktree = self.inner.worktree.write();
        let source = self
            .locate(&from_path)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        if !to_path.has_page_extension() {
            to_path = to_path.with_extension(source.extension().unwrap_or(DEFAULT_EXTENSION));
        }
        let (abs_from, abs_to) = (self.abs(&source), self.abs(&to_path));
        if abs_to.exists() {
            return Err(StorageError::AlreadyExists(to_path.into_string()));
        }

        let repo = self.inner.repo.lock();
        let mut snapshot = WorktreeSnapshot::new(self.root());
        snapshot.record(&source)?;
        snapshot.record(&to_path)?;

        let message = CommitMessage::or_default(message, CommitMessage::rename(source.as_str(), to_path.as_str()));
        let id = commit_changes(&repo, snapshot, message, git_signature, |stage| {
            if let Some(parent) = abs_to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&abs_from, &abs_to)?;
            stage.add(&to_path)?;
            stage.remove(&source)
        })?;
        prune_empty_parents(self.root(), &abs_from);

        info!(from = %source, to = %to_path, revision = %id.short(), "renamed page");
        Ok(id)
    }

    /// Remove a page and commit the removal.
    pub fn delete_page(
        &self,
        path: &str,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId> {
        let page = PagePath::new(path)?;
        let git_signature = signature.to_git2_signature()?;

        let _worktree = self.inner.worktree.write();
        let file = self
            .locate(&page)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        let abs = self.abs(&file);

        let repo = self.inner.repo.lock();
        let mut snapshot = WorktreeSnapshot::new(self.root());
        snapshot.record(&file)?;

        let message = CommitMessage::or_default(message, CommitMessage::delete(file.as_str()));
        let id = commit_changes(&repo, snapshot, message, git_signature, |stage| {
            fs::remove_file(&abs)?;
            stage.remove(&file)
        })?;
        prune_empty_parents(self.root(), &abs);

        info!(path = %file, revision = %id.short(), "deleted page");
        Ok(id)
    }

    /// Pages at the top level of the tip tree, extension stripped.
    ///
    /// An empty repository has no pages, not an error.
    pub fn list_pages(&self) -> StorageResult<Vec<String>> {
        self.with_tip_tree(|tree| Ok(tree.list_pages()))
    }

    /// Every page in the tip tree, subdirectories included.
    pub fn list_all_pages(&self) -> StorageResult<Vec<String>> {
        self.with_tip_tree(|tree| tree.list_all_pages())
    }

    fn with_tip_tree<F>(&self, f: F) -> StorageResult<Vec<String>>
    where
        F: FnOnce(&TreeHandle<'_>) -> StorageResult<Vec<String>>,
    {
        self.with_repo(|repo| match commit::current_tip(repo)? {
            Some(tip) => f(&TreeHandle::new(tip.tree()?)),
            None => Ok(Vec::new()),
        })
    }

    // ==================== History ====================

    /// Get the current tip, if there is one.
    pub fn head(&self) -> StorageResult<Option<RevisionId>> {
        self.with_repo(|repo| Ok(commit::current_tip(repo)?.map(|tip| RevisionId::new(tip.id()))))
    }

    /// Resolve a revision expression (full or abbreviated id, `HEAD~1`, ...)
    /// to a commit.
    pub fn resolve_revision(&self, expr: &str) -> StorageResult<RevisionId> {
        self.with_repo(|repo| {
            let commit = repo
                .revparse_single(expr)
                .and_then(|object| object.peel_to_commit())
                .map_err(|e| StorageError::InvalidRevision(format!("{}: {}", expr, e.message())))?;
            Ok(RevisionId::new(commit.id()))
        })
    }

    /// Get information about a commit.
    pub fn get_commit(&self, id: RevisionId) -> StorageResult<CommitRecord> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// check if the repository has any commit
    pub fn has_root_commit(&self) -> StorageResult<bool> {
        self.with_repo(commit::has_root_commit)
    }

    /// Content-changing revisions of a page, newest first.
    pub fn logs_for_page(&self, path: &str) -> StorageResult<Vec<CommitRecord>> {
        let page = self.page_file(path)?;
        self.with_repo(|repo| history::logs_for_page(repo, &page))
    }

    /// The most recent commit that changed a page's content.
    pub fn last_commit(&self, path: &str) -> StorageResult<CommitRecord> {
        let page = self.page_file(path)?;
        self.with_repo(|repo| history::last_commit(repo, &page))
    }

    /// Unified diffs of the document's file between two revisions.
    pub fn diff_page(
        &self,
        document: &Document,
        old: RevisionId,
        new: RevisionId,
    ) -> StorageResult<Vec<String>> {
        let page = PagePath::new(&document.path)?;
        self.with_repo(|repo| diff::diff_page(repo, &page, old, new))
    }

    /// A page as it was at `revision`.
    ///
    /// Without a recognized extension, the extensions are tried against that
    /// revision's tree in the usual order.
    pub fn page_at_revision(&self, path: &str, revision: RevisionId) -> StorageResult<Document> {
        let path = PagePath::new(path)?;
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, revision)?;
            for candidate in candidates(&path) {
                if tree.blob_at(candidate.as_str())?.is_some() {
                    return blob::read_page_at(repo, &candidate, revision);
                }
            }
            Err(StorageError::NotFound(format!("{} at {}", path, revision.short())))
        })
    }
}

impl PageStore for GitStorage {
    fn resolve_path(&self, relative: &str) -> StorageResult<PathBuf> {
        GitStorage::resolve_path(self, relative)
    }

    fn lookup_page(&self, path: &str) -> StorageResult<(Document, bool)> {
        GitStorage::lookup_page(self, path)
    }

    fn save_page(
        &self,
        document: &Document,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId> {
        GitStorage::save_page(self, document, signature, message)
    }

    fn rename_page(
        &self,
        from: &str,
        to: &str,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId> {
        GitStorage::rename_page(self, from, to, signature, message)
    }

    fn delete_page(
        &self,
        path: &str,
        signature: &CommitSignature,
        message: Option<&str>,
    ) -> StorageResult<RevisionId> {
        GitStorage::delete_page(self, path, signature, message)
    }

    fn list_pages(&self) -> StorageResult<Vec<String>> {
        GitStorage::list_pages(self)
    }

    fn list_all_pages(&self) -> StorageResult<Vec<String>> {
        GitStorage::list_all_pages(self)
    }

    fn logs_for_page(&self, path: &str) -> StorageResult<Vec<CommitRecord>> {
        GitStorage::logs_for_page(self, path)
    }

    fn last_commit(&self, path: &str) -> StorageResult<CommitRecord> {
        GitStorage::last_commit(self, path)
    }

    fn diff_page(
        &self,
        document: &Document,
        old: RevisionId,
        new: RevisionId,
    ) -> StorageResult<Vec<String>> {
        GitStorage::diff_page(self, document, old, new)
    }
}

/// files `path` may refer to, in lookup order
fn candidates(path: &PagePath) -> Vec<PagePath> {
    if path.has_page_extension() {
        vec![path.clone()]
    } else {
        PAGE_EXTENSIONS.iter().map(|ext| path.with_extension(ext)).collect()
    }
}

/// apply working-copy changes, stage them and commit on top of the tip
///
/// `apply` touches the working copy and stages the touched paths. On any
/// failure the snapshot is restored before the error is returned.
fn commit_changes<F>(
    repo: &Repository,
    snapshot: WorktreeSnapshot,
    message: String,
    signature: git2::Signature<'static>,
    apply: F,
) -> StorageResult<RevisionId>
where
    F: FnOnce(&mut Stage) -> StorageResult<()>,
{
    let tip = commit::current_tip(repo)?;
    let parent = tip.as_ref().map(|c| RevisionId::new(c.id()));

    let result = Stage::open(repo)
        .and_then(|mut stage| {
            apply(&mut stage)?;
            stage.write_tree()
        })
        .and_then(|tree| {
            CommitBuilder::new(repo)
                .tree(tree)
                .parent(parent)
                .message(message)
                .signature(signature)
                .update_ref("HEAD")
                .commit()
        });

    match result {
        Ok(id) => Ok(id),
        Err(e) => {
            warn!(error = %e, "page write failed");
            snapshot.restore(repo, tip.as_ref());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitStorage) {
        let dir = TempDir::new().unwrap();
        let storage = GitStorage::open(dir.path(), true).unwrap();
        (dir, storage)
    }

    fn ann() -> CommitSignature {
        CommitSignature::now("Ann", "ann@example.com")
    }

    fn save(storage: &GitStorage, path: &str, content: &str, message: &str) -> RevisionId {
        let document = Document::from_bytes(path, content.as_bytes().to_vec()).unwrap();
        storage.save_page(&document, &ann(), Some(message)).unwrap()
    }

    fn index_entry(storage: &GitStorage, path: &str) -> Option<git2::Oid> {
        storage
            .with_repo(|repo| {
                let mut index = repo.index()?;
                index.read(true)?;
                Ok(index.get_path(Path::new(path), 0).map(|entry| entry.id))
            })
            .unwrap()
    }

    #[test]
    fn test_open_missing_without_create() {
        let dir = TempDir::new().unwrap();
        let result = GitStorage::open(dir.path().join("wiki"), false);
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_open_corrupt_repository() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".git"), "garbage").unwrap();
        let result = GitStorage::open(dir.path(), false);
        assert!(matches!(result, Err(StorageError::RepositoryCorrupt { .. })));
    }

    #[test]
    fn test_open_or_init_reopens() {
        let dir = TempDir::new().unwrap();
        let first = GitStorage::open_or_init(dir.path()).unwrap();
        let id = save(&first, "index.md", "hello", "first");
        drop(first);

        let second = GitStorage::open(dir.path(), false).unwrap();
        assert_eq!(second.head().unwrap(), Some(id));
    }

    #[test]
    fn test_empty_repository_lists_nothing() {
        let (_dir, storage) = setup();
        assert!(!storage.has_root_commit().unwrap());
        assert!(storage.list_pages().unwrap().is_empty());
        assert!(storage.list_all_pages().unwrap().is_empty());
        assert!(storage.logs_for_page("index").unwrap().is_empty());
    }

    #[test]
    fn test_init_seeded() {
        let dir = TempDir::new().unwrap();
        let storage = GitStorage::init_seeded(dir.path(), &ann()).unwrap();

        assert!(storage.has_root_commit().unwrap());
        assert!(dir.path().join(".gitignore").is_file());
        assert!(storage.list_pages().unwrap().is_empty());

        let head = storage.head().unwrap();
        let again = GitStorage::init_seeded(dir.path(), &ann()).unwrap();
        assert_eq!(again.head().unwrap(), head);
    }

    #[test]
    fn test_resolve_path() {
        let (_dir, storage) = setup();
        let resolved = storage.resolve_path("notes/linux.md").unwrap();
        assert!(resolved.starts_with(storage.root()));
        assert_eq!(resolved, storage.root().join("notes/linux.md"));

        for escape in ["../outside.md", "notes/../../outside.md", "/etc/passwd", ".git/config"] {
            let err = storage.resolve_path(escape).unwrap_err();
            assert!(err.is_security_violation(), "{} should be rejected", escape);
        }
    }

    #[test]
    fn test_save_then_lookup() {
        let (_dir, storage) = setup();
        let content = "---\ntitle: Home\n---\nhello";
        let id = save(&storage, "index.md", content, "import index.md");

        let (page, found) = storage.lookup_page("index").unwrap();
        assert!(found);
        assert_eq!(page.path, "index.md");
        assert_eq!(page.raw_bytes, content.as_bytes());
        assert_eq!(page.title(), "Home");

        assert_eq!(storage.head().unwrap(), Some(id));
        assert_eq!(storage.list_pages().unwrap(), vec!["index"]);
        // working tree and index agree with the commit
        let tip_blob = storage
            .with_repo(|repo| commit::get_tree_at_commit(repo, id)?.blob_at("index.md"))
            .unwrap()
            .map(|blob| blob.raw());
        assert_eq!(index_entry(&storage, "index.md"), tip_blob);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let (dir, storage) = setup();
        save(&storage, "notes/linux/kernel.md", "modules", "kernel notes");

        assert!(dir.path().join("notes/linux/kernel.md").is_file());
        assert!(storage.list_pages().unwrap().is_empty());
        assert_eq!(storage.list_all_pages().unwrap(), vec!["notes/linux/kernel"]);
        assert!(storage.lookup_page("notes/linux/kernel").unwrap().1);
    }

    #[test]
    fn test_save_without_extension_uses_default() {
        let (dir, storage) = setup();
        save(&storage, "todo", "buy milk", "todo");
        assert!(dir.path().join("todo.md").is_file());
    }

    #[test]
    fn test_lookup_miss() {
        let (_dir, storage) = setup();
        let (page, found) = storage.lookup_page("notes/new-page").unwrap();
        assert!(!found);
        assert_eq!(page.path, "notes/new-page.md");
        assert!(page.is_empty());

        let (page, found) = storage.lookup_page("other.rst").unwrap();
        assert!(!found);
        assert_eq!(page.path, "other.rst");
    }

    #[test]
    fn test_lookup_rejects_escape() {
        let (_dir, storage) = setup();
        let err = storage.lookup_page("../../etc/passwd").unwrap_err();
        assert!(err.is_security_violation());
    }

    #[test]
    fn test_lookup_extension_priority() {
        let (_dir, storage) = setup();
        save(&storage, "x.rst", "rst version", "rst");
        for _ in 0..3 {
            let (page, found) = storage.lookup_page("x").unwrap();
            assert!(found);
            assert_eq!(page.path, "x.rst");
        }

        save(&storage, "x.txt", "txt version", "txt");
        assert_eq!(storage.lookup_page("x").unwrap().0.path, "x.rst");

        save(&storage, "x.md", "md version", "md");
        assert_eq!(storage.lookup_page("x").unwrap().0.path, "x.md");

        // an explicit extension is taken as is
        let (page, found) = storage.lookup_page("x.txt").unwrap();
        assert!(found);
        assert_eq!(page.raw_bytes, b"txt version");
    }

    #[test]
    fn test_logs_after_saves() {
        let (_dir, storage) = setup();
        let first = save(&storage, "index.md", "one", "first");
        let second = save(&storage, "index.md", "two", "second");
        save(&storage, "index.md", "two", "no-op");

        let logs = storage.logs_for_page("index").unwrap();
        let ids: Vec<_> = logs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(logs[0].author_name, "Ann");
    }

    #[test]
    fn test_default_save_message() {
        let (_dir, storage) = setup();
        let document = Document::from_bytes("index.md", b"hello".to_vec()).unwrap();
        storage.save_page(&document, &ann(), None).unwrap();

        let logs = storage.logs_for_page("index.md").unwrap();
        assert_eq!(logs[0].message, CommitMessage::NO_COMMENT);
    }

    #[test]
    fn test_rename_scenario() {
        let (dir, storage) = setup();
        let import = save(&storage, "index.md", "hello", "import index.md");
        let renamed = storage
            .rename_page("index.md", "foobar.md", &ann(), Some("Renamed index to foobar"))
            .unwrap();

        assert!(!dir.path().join("index.md").exists());
        assert!(dir.path().join("foobar.md").is_file());
        assert_eq!(storage.list_pages().unwrap(), vec!["foobar"]);
        assert_eq!(index_entry(&storage, "index.md"), None);

        let logs = storage.logs_for_page("foobar.md").unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, renamed);
        assert_eq!(logs[0].message, "Renamed index to foobar");

        let last = storage.last_commit("foobar.md").unwrap();
        assert_eq!(last.id, import);
    }

    #[test]
    fn test_rename_keeps_extension_and_default_message() {
        let (dir, storage) = setup();
        save(&storage, "notes.rst", "rst", "import");
        storage.rename_page("notes", "archive/notes", &ann(), None).unwrap();

        assert!(dir.path().join("archive/notes.rst").is_file());
        let logs = storage.logs_for_page("archive/notes").unwrap();
        assert_eq!(logs[0].message, "rename notes.rst to archive/notes.rst");
    }

    #[test]
    fn test_rename_errors() {
        let (_dir, storage) = setup();
        save(&storage, "a.md", "a", "a");
        save(&storage, "b.md", "b", "b");
        let head = storage.head().unwrap();

        let missing = storage.rename_page("nope", "c", &ann(), None);
        assert!(matches!(missing, Err(StorageError::NotFound(_))));

        let taken = storage.rename_page("a", "b", &ann(), None);
        assert!(matches!(taken, Err(StorageError::AlreadyExists(_))));

        let escape = storage.rename_page("a", "../a", &ann(), None).unwrap_err();
        assert!(escape.is_security_violation());

        assert_eq!(storage.head().unwrap(), head);
    }

    #[test]
    fn test_delete_page() {
        let (dir, storage) = setup();
        save(&storage, "index.md", "hello", "import");
        save(&storage, "other.md", "other", "other");
        storage.delete_page("index", &ann(), None).unwrap();

        let (page, found) = storage.lookup_page("index").unwrap();
        assert!(!found);
        assert_eq!(page.path, "index.md");
        assert!(!dir.path().join("index.md").exists());
        assert_eq!(storage.list_pages().unwrap(), vec!["other"]);
        assert_eq!(index_entry(&storage, "index.md"), None);

        let logs = storage.logs_for_page("index").unwrap();
        assert!(logs.is_empty());

        let again = storage.delete_page("index", &ann(), None);
        assert!(matches!(again, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_delete_last_page_in_directory() {
        let (dir, storage) = setup();
        save(&storage, "notes/deep/linux.md", "kernel", "import");
        save(&storage, "notes/todo.md", "todo", "import");

        storage.delete_page("notes/deep/linux", &ann(), None).unwrap();
        assert!(!dir.path().join("notes/deep").exists());
        assert!(dir.path().join("notes/todo.md").is_file());

        storage.rename_page("notes/todo", "todo", &ann(), None).unwrap();
        assert!(!dir.path().join("notes").exists());
        assert!(dir.path().join("todo.md").is_file());
    }

    #[test]
    fn test_last_commit_for_page_sharing_content() {
        let (_dir, storage) = setup();
        save(&storage, "a.md", "same", "create a");
        let created = save(&storage, "b.md", "same", "create b");

        let last = storage.last_commit("b").unwrap();
        assert_eq!(last.id, created);
        assert_eq!(last.message, "create b");
    }

    #[test]
    fn test_debug_shows_root() {
        let (_dir, storage) = setup();
        let shown = format!("{:?}", storage);
        assert!(shown.starts_with("GitStorage"));
        assert!(shown.contains(&*storage.root().to_string_lossy()));
    }

    #[test]
    fn test_self_diff_is_empty() {
        let (_dir, storage) = setup();
        let id = save(&storage, "index.md", "hello", "import");
        let (page, _) = storage.lookup_page("index").unwrap();

        assert!(storage.diff_page(&page, id, id).unwrap().is_empty());
    }

    #[test]
    fn test_diff_between_saves() {
        let (_dir, storage) = setup();
        let first = save(&storage, "index.md", "hello\n", "first");
        let second = save(&storage, "index.md", "hello\nworld\n", "second");
        let (page, _) = storage.lookup_page("index").unwrap();

        let forward = storage.diff_page(&page, first, second).unwrap();
        assert_eq!(forward.len(), 1);
        assert!(forward[0].contains("\n+world\n"));

        let backward = storage.diff_page(&page, second, first).unwrap();
        assert!(backward[0].contains("\n-world\n"));
    }

    #[test]
    fn test_resolve_revision() {
        let (_dir, storage) = setup();
        let first = save(&storage, "index.md", "one", "first");
        let second = save(&storage, "index.md", "two", "second");

        assert_eq!(storage.resolve_revision("HEAD").unwrap(), second);
        assert_eq!(storage.resolve_revision("HEAD~1").unwrap(), first);
        assert_eq!(storage.resolve_revision(&first.short()).unwrap(), first);
        assert!(matches!(
            storage.resolve_revision("no-such-rev"),
            Err(StorageError::InvalidRevision(_))
        ));
        assert_eq!(storage.get_commit(second).unwrap().message, "second");
    }

    #[test]
    fn test_page_at_revision() {
        let (_dir, storage) = setup();
        let first = save(&storage, "index.md", "---\ntitle: Old\n---\none", "first");
        save(&storage, "index.md", "---\ntitle: New\n---\ntwo", "second");

        let old = storage.page_at_revision("index", first).unwrap();
        assert_eq!(old.title(), "Old");
        assert_eq!(old.body, b"one");

        let missing = storage.page_at_revision("other", first);
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_invalid_signature_touches_nothing() {
        let (dir, storage) = setup();
        let document = Document::from_bytes("index.md", b"hello".to_vec()).unwrap();
        let bad = CommitSignature::now("<Ann>", "ann@example.com");

        assert!(storage.save_page(&document, &bad, None).is_err());
        assert!(!dir.path().join("index.md").exists());
        assert!(!storage.has_root_commit().unwrap());
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let (dir, storage) = setup();
        let first = save(&storage, "index.md", "hello", "first");
        let committed = index_entry(&storage, "index.md");

        // a stale ref lock makes the ref update, and so the commit, fail
        let lock = dir.path().join(".git/refs/heads").join(format!("{}.lock", INITIAL_BRANCH));
        fs::write(&lock, "").unwrap();

        let document = Document::from_bytes("index.md", b"changed".to_vec()).unwrap();
        assert!(storage.save_page(&document, &ann(), None).is_err());
        let document = Document::from_bytes("new.md", b"fresh".to_vec()).unwrap();
        assert!(storage.save_page(&document, &ann(), None).is_err());

        let document = Document::from_bytes("fresh/dir/new.md", b"fresh".to_vec()).unwrap();
        assert!(storage.save_page(&document, &ann(), None).is_err());

        assert_eq!(fs::read(dir.path().join("index.md")).unwrap(), b"hello");
        assert!(!dir.path().join("new.md").exists());
        assert!(!dir.path().join("fresh").exists());
        assert_eq!(index_entry(&storage, "index.md"), committed);
        assert_eq!(index_entry(&storage, "new.md"), None);
        assert_eq!(storage.head().unwrap(), Some(first));

        fs::remove_file(&lock).unwrap();
        let document = Document::from_bytes("index.md", b"changed".to_vec()).unwrap();
        storage.save_page(&document, &ann(), None).unwrap();
        assert_eq!(storage.logs_for_page("index").unwrap().len(), 2);
    }

    #[test]
    fn test_failed_first_commit_rolls_back() {
        let (dir, storage) = setup();
        let lock = dir.path().join(".git/refs/heads").join(format!("{}.lock", INITIAL_BRANCH));
        fs::write(&lock, "").unwrap();

        let document = Document::from_bytes("index.md", b"hello".to_vec()).unwrap();
        assert!(storage.save_page(&document, &ann(), None).is_err());

        assert!(!dir.path().join("index.md").exists());
        assert_eq!(index_entry(&storage, "index.md"), None);
        assert!(!storage.has_root_commit().unwrap());
    }

    #[test]
    fn test_concurrent_saves_are_serialized() {
        let (_dir, storage) = setup();

        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let storage = storage.clone();
                thread::spawn(move || {
                    for page in 0..5 {
                        let path = format!("w{}-p{}.md", writer, page);
                        let document = Document::from_bytes(path, b"content".to_vec()).unwrap();
                        storage.save_page(&document, &ann(), None).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(storage.list_pages().unwrap().len(), 20);

        // one linear history, one commit per save, each adding one page
        let tip = storage.head().unwrap().unwrap();
        let commits = storage
            .with_repo(|repo| {
                let mut count = 0;
                for commit in commit::history(repo, tip)?.first_parent_only()? {
                    let commit = commit?;
                    assert!(commit.parent_count() <= 1);
                    count += 1;
                }
                Ok(count)
            })
            .unwrap();
        assert_eq!(commits, 20);
    }

    #[test]
    fn test_page_store_trait_object() {
        let (_dir, storage) = setup();
        let store: &dyn PageStore = &storage;

        let document = Document::from_bytes("index.md", b"hello".to_vec()).unwrap();
        store.save_page(&document, &ann(), None).unwrap();
        assert_eq!(store.list_pages().unwrap(), vec!["index"]);
        assert!(store.lookup_page("index").unwrap().1);
    }
}
