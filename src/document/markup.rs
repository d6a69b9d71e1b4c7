//! Page extensions and markup kinds.
//!
//! The extension list is ordered: ambiguous lookups ("notes/linux" with no
//! extension) resolve to the first extension in this list that exists on disk.

use std::fmt;

/// Recognized page extensions, in lookup priority order.
pub const PAGE_EXTENSIONS: [&str; 4] = ["md", "rst", "org", "txt"];

/// Extension given to pages created without one.
pub const DEFAULT_EXTENSION: &str = "md";

/// check if `ext` (without the leading dot) is a page extension
pub fn is_page_extension(ext: &str) -> bool {
    PAGE_EXTENSIONS.contains(&ext)
}

/// The markup language a page is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Markup {
    Markdown,
    ReStructuredText,
    Org,
    PlainText,
}

impl Markup {
    /// markup implied by a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "md" => Some(Self::Markdown),
            "rst" => Some(Self::ReStructuredText),
            "org" => Some(Self::Org),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// markup named by a front-matter `markup:` override
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "rst" | "restructuredtext" => Some(Self::ReStructuredText),
            "org" => Some(Self::Org),
            "text" | "txt" | "plain" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::ReStructuredText => "rst",
            Self::Org => "org",
            Self::PlainText => "text",
        }
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
