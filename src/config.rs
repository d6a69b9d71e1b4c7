//! Wiki configuration.
//!
//! Loaded from a JSON file; every field has a default, so a partial file (or
//! none at all) works.
//!
//! ```json
//! {
//!   "repository": "./wiki",
//!   "create_if_missing": true,
//!   "seed_ignore_file": true,
//!   "author": { "name": "Ann", "email": "ann@example.com" },
//!   "log_level": "info"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{CommitSignature, GitStorage, StorageResult};

/// configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Identity recorded on commits made through this configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: "Wiki".to_string(),
            email: "wiki@localhost".to_string(),
        }
    }
}

/// Wiki configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    /// Path to the wiki repository.
    pub repository: PathBuf,
    /// Create the repository if it doesn't exist.
    pub create_if_missing: bool,
    /// Give a newly created repository a baseline `.gitignore` commit.
    pub seed_ignore_file: bool,
    pub author: AuthorConfig,
    /// tracing filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            repository: PathBuf::from("."),
            create_if_missing: false,
            seed_ignore_file: true,
            author: AuthorConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl WikiConfig {
    /// Create a new configuration with the given repository path.
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            ..Default::default()
        }
    }

    /// load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Set seed_ignore_file flag.
    pub fn seed_ignore_file(mut self, value: bool) -> Self {
        self.seed_ignore_file = value;
        self
    }

    /// Set the commit author.
    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author = AuthorConfig {
            name: name.into(),
            email: email.into(),
        };
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("'repository' must not be empty".to_string()));
        }
        if self.author.name.trim().is_empty() {
            return Err(ConfigError::Invalid("'author.name' must not be empty".to_string()));
        }
        if self.author.email.trim().is_empty() {
            return Err(ConfigError::Invalid("'author.email' must not be empty".to_string()));
        }
        Ok(())
    }

    /// a signature for the configured author, stamped now
    pub fn signature(&self) -> CommitSignature {
        CommitSignature::now(self.author.name.clone(), self.author.email.clone())
    }

    /// open the configured repository
    ///
    /// A repository created here gets the baseline commit when
    /// `seed_ignore_file` is set.
    pub fn open_storage(&self) -> StorageResult<GitStorage> {
        let missing = !self.repository.join(".git").exists();
        if missing && self.create_if_missing && self.seed_ignore_file {
            GitStorage::init_seeded(&self.repository, &self.signature())
        } else {
            GitStorage::open(&self.repository, self.create_if_missing)
        }
    }
}
