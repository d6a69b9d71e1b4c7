//! Index staging and working-copy rollback.
//!
//! A page write is a sequence: touch the working copy, stage the paths,
//! write a tree from the index, commit. [`Stage`] covers the index half of
//! that sequence. [`WorktreeSnapshot`] remembers what the touched files
//! looked like before, so a failure anywhere after the working copy changed
//! can put both the files and the index back to the tip state.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use git2::{Commit, ErrorCode, Index, Repository};
use tracing::{debug, warn};

use crate::storage::error::StorageResult;
use crate::storage::types::{PagePath, TreeId};

/// Pending index changes for one commit.
pub struct Stage {
    index: Index,
}

impl Stage {
    /// open the repository index, discarding in-memory state not on disk
    pub fn open(repo: &Repository) -> StorageResult<Self> {
        let mut index = repo.index()?;
        index.read(true)?;
        Ok(Self { index })
    }

    /// stage the working-copy version of `path`
    pub fn add(&mut self, path: &PagePath) -> StorageResult<()> {
        self.index.add_path(path.as_path())?;
        debug!(path = %path, "staged");
        Ok(())
    }

    /// drop `path` from the index; an entry that is already absent is fine
    pub fn remove(&mut self, path: &PagePath) -> StorageResult<()> {
        match self.index.remove_path(path.as_path()) {
            Ok(()) => {
                debug!(path = %path, "unstaged");
                Ok(())
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(path = %path, "not in index, nothing to unstage");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// write the index as a tree and persist the index file
    ///
    /// writing the index file keeps the working copy from showing the
    /// committed paths as untracked.
    pub fn write_tree(mut self) -> StorageResult<TreeId> {
        let tree_id = self.index.write_tree()?;
        self.index.write()?;
        Ok(TreeId::new(tree_id))
    }
}

/// Previous contents of the working-copy files an operation is about to touch.
pub struct WorktreeSnapshot {
    root: PathBuf,
    files: Vec<(PagePath, Option<Vec<u8>>)>,
    /// directories missing at record time, deepest first
    missing_dirs: Vec<PathBuf>,
}

impl WorktreeSnapshot {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            files: Vec::new(),
            missing_dirs: Vec::new(),
        }
    }

    /// remember the current content of `path` (or that it does not exist)
    pub fn record(&mut self, path: &PagePath) -> StorageResult<()> {
        let abs = self.root.join(path.as_path());
        let previous = match fs::read(&abs) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let mut dir = abs.parent();
        while let Some(current) = dir {
            if current == self.root || current.exists() {
                break;
            }
            self.missing_dirs.push(current.to_path_buf());
            dir = current.parent();
        }

        self.files.push((path.clone(), previous));
        Ok(())
    }

    /// put the recorded files back and reset their index entries to `tip`
    ///
    /// best-effort: failures are logged, the caller still gets the error that caused the rollback.
    pub fn restore(self, repo: &Repository, tip: Option<&Commit<'_>>) {
        for (path, previous) in &self.files {
            let abs = self.root.join(path.as_path());
            let result = match previous {
                Some(bytes) => write_file(&abs, bytes),
                None => match fs::remove_file(&abs) {
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = result {
                warn!(path = %path, error = %e, "could not restore working copy file");
            }
        }

        for dir in &self.missing_dirs {
            match fs::remove_dir(dir) {
                Ok(()) => debug!(dir = %dir.display(), "removed directory created by the failed write"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove directory"),
            }
        }

        let paths: Vec<&str> = self.files.iter().map(|(path, _)| path.as_str()).collect();
        if let Err(e) = repo.reset_default(tip.map(|commit| commit.as_object()), paths) {
            warn!(error = %e, "could not reset index entries after a failed commit");
        }
        warn!(files = self.files.len(), "rolled back working copy after a failed write");
    }
}

/// write `bytes` to `path`, creating missing parent directories
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

/// remove the directories above `path` that are left empty, up to `root`
pub(crate) fn prune_empty_parents(root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        // fails on the first directory that still has entries
        if fs::remove_dir(current).is_err() {
            break;
        }
        debug!(dir = %current.display(), "removed empty directory");
        dir = current.parent();
    }
}
