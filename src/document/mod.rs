//! Wiki pages as documents.
//!
//! A [`Document`] is pure data: the repository-relative path of the page file,
//! the parsed front matter, the raw bytes as persisted and the body after the
//! front matter. Reading from disk is the only I/O this module does; the
//! storage layer decides where the bytes go.

mod header;
mod markup;
mod plaintext;

use std::path::Path;

use chrono::{DateTime, Utc};

pub use header::{parse_page_bytes, DocumentError, PageHeader};
pub use markup::{is_page_extension, Markup, DEFAULT_EXTENSION, PAGE_EXTENSIONS};
pub use plaintext::markdown_to_text;

/// Initial content offered when editing a page that does not exist yet.
pub const NEW_PAGE_TEMPLATE: &str = "---
title: \"My page\"
description: \"A brief page description...\"
tags: [ \"general\" ]
language: \"en\"
---
# My document title

My first paragraph.
";

/// A wiki page.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// repository-relative path including the extension (e.g. `notes/linux.md`)
    pub path: String,
    pub header: PageHeader,
    /// full file content: front matter + body
    pub raw_bytes: Vec<u8>,
    /// content after the front matter
    pub body: Vec<u8>,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    /// an empty page that does not exist on disk yet
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            header: PageHeader::default(),
            raw_bytes: Vec::new(),
            body: Vec::new(),
            modified_at: Utc::now(),
        }
    }

    /// build a page from its persisted bytes
    pub fn from_bytes(path: impl Into<String>, raw_bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let (header, body) = parse_page_bytes(&raw_bytes)?;
        Ok(Self {
            path: path.into(),
            header,
            raw_bytes,
            body,
            modified_at: Utc::now(),
        })
    }

    /// load a page file; `modified_at` is the file's mtime
    pub fn load(abs_path: &Path, rel_path: impl Into<String>) -> Result<Self, DocumentError> {
        let raw_bytes = std::fs::read(abs_path)?;
        let modified_at = std::fs::metadata(abs_path)?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let mut document = Self::from_bytes(rel_path, raw_bytes)?;
        document.modified_at = modified_at;
        Ok(document)
    }

    /// replace the content, re-parsing the front matter
    ///
    /// on a parse error the document is left untouched.
    pub fn set_raw_bytes(&mut self, raw_bytes: Vec<u8>) -> Result<(), DocumentError> {
        let (header, body) = parse_page_bytes(&raw_bytes)?;
        self.header = header;
        self.body = body;
        self.raw_bytes = raw_bytes;
        self.modified_at = Utc::now();
        Ok(())
    }

    /// the page name without its extension (`notes/linux.md` -> `notes/linux`)
    pub fn short_name(&self) -> &str {
        shorten_page_name(&self.path)
    }

    /// the file extension, without the dot
    pub fn extension(&self) -> Option<&str> {
        page_extension(&self.path)
    }

    /// header override first, then the file extension
    pub fn markup(&self) -> Option<Markup> {
        self.header
            .markup
            .as_deref()
            .and_then(Markup::from_name)
            .or_else(|| self.extension().and_then(Markup::from_extension))
    }

    pub fn title(&self) -> &str {
        match self.header.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => self.short_name(),
        }
    }

    /// true for the "new page" state returned by a lookup miss
    pub fn is_empty(&self) -> bool {
        self.raw_bytes.is_empty()
    }

    /// indexable text of the page
    ///
    /// Markdown is reduced to text; anything else falls back to the raw
    /// bytes. Never fails: indexing quality is best-effort.
    pub fn render_plaintext(&self) -> String {
        match self.markup() {
            Some(Markup::Markdown) => markdown_to_text(&String::from_utf8_lossy(&self.body)),
            _ => String::from_utf8_lossy(&self.raw_bytes).into_owned(),
        }
    }
}

/// strip the extension of the last path component, if any
pub fn shorten_page_name(name: &str) -> &str {
    match page_extension(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

/// extension of the last path component (`a.b/c` has none)
pub(crate) fn page_extension(name: &str) -> Option<&str> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 == file_name.len() => None,
        Some(idx) => Some(&file_name[idx + 1..]),
    }
}
