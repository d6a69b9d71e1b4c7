//! storage layer for the wiki
//!
//! this module provides a complete abstraction over git for page storage.
//! The upper layers (indexing, the command line) use this API and never
//! touch git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 GitStorage  (impl PageStore)                │
//! │   (lookup, save, rename, delete, list, log, last, diff)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌──────────────┬──────┴───────┬──────────────┐
//!        │              │              │              │
//!        ▼              ▼              ▼              ▼
//!  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐
//!  │  staging  │  │  history  │  │   diff    │  │   blob    │
//!  │ (writes)  │  │  (logs)   │  │ (patches) │  │ (old revs)│
//!  └───────────┘  └───────────┘  └───────────┘  └───────────┘
//!        │              │              │              │
//!        └──────────────┴──────┬───────┴──────────────┘
//!                              │
//!                   ┌──────────┴──────────┐
//!                   ▼                     ▼
//!             ┌───────────┐         ┌───────────┐
//!             │  commit   │         │   tree    │
//!             │ (history) │         │  (pages)  │
//!             └───────────┘         └───────────┘
//!  ```
//!
//! # Usage
//!
//! ```no_run
//! use gitwiki::document::Document;
//! use gitwiki::storage::{CommitSignature, GitStorage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Initialize or open
//! let wiki = GitStorage::open_or_init("./my_wiki")?;
//! let ann = CommitSignature::now("Ann", "ann@example.com");
//!
//! // Save a page
//! let page = Document::from_bytes("index.md", b"# Hello".to_vec())?;
//! let revision = wiki.save_page(&page, &ann, Some("import index.md"))?;
//!
//! // Read it back
//! let (page, found) = wiki.lookup_page("index")?;
//! assert!(found);
//! assert!(wiki.diff_page(&page, revision, revision)?.is_empty());
//! # Ok(())
//! # }
//! ```

mod blob;
mod commit;
mod diff;
mod error;
mod history;
mod repository;
mod staging;
mod store;
mod tree;
mod types;

// Re-export public API
pub use commit::{CommitMessage, CommitRecord};
pub use error::{StorageError, StorageResult};
pub use repository::GitStorage;
pub use store::PageStore;
pub use types::{BlobId, CommitSignature, InvalidPathError, PagePath, RevisionId, TreeId};
