//! gitwiki - a wiki whose pages live in a Git repository
//!
//! Every page is a file in the working directory of a Git repository, every
//! edit is a commit, and the history of a page is the history of its file.
//!
//! # Example
//!
//! ```no_run
//! use gitwiki::config::WikiConfig;
//! use gitwiki::indexing::PageIndexer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WikiConfig::new("./my_wiki").create_if_missing(true);
//! let wiki = config.open_storage()?;
//!
//! let (mut page, found) = wiki.lookup_page("index")?;
//! if !found {
//!     page.set_raw_bytes(b"# Welcome".to_vec())?;
//!     wiki.save_page(&page, &config.signature(), Some("create index"))?;
//! }
//!
//! let mut indexer = PageIndexer::new();
//! let batch = indexer.refresh(&wiki)?;
//! println!("{} pages to index", batch.updated.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod indexing;
pub mod storage;
