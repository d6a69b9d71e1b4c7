//! Front matter parsing.
//!
//! A page may start with a YAML block delimited by `---` lines:
//!
//! ```text
//! ---
//! title: "Index page"
//! language: "it"
//! ---
//! # Index
//! ```
//!
//! Everything after the closing marker line is the page body.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MARKER: &[u8] = b"---";

/// errors raised while parsing page bytes
#[derive(Debug, Error)]
pub enum DocumentError {
    /// the opening `---` has no matching closing line
    #[error("front matter is not terminated: missing closing '---' line")]
    UnterminatedHeader,

    /// the front matter is not valid YAML for a page header
    #[error("invalid front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// reading the page file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The optional front matter of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageHeader {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub language: Option<String>,
    /// overrides the markup implied by the file extension
    pub markup: Option<String>,
}

/// split raw page bytes into the parsed header and the body
///
/// pages without a leading `---` line get a default header and the whole
/// input as body.
pub fn parse_page_bytes(data: &[u8]) -> Result<(PageHeader, Vec<u8>), DocumentError> {
    let rest = match strip_opening_marker(data) {
        Some(rest) => rest,
        None => return Ok((PageHeader::default(), data.to_vec())),
    };

    let mut offset = 0;
    while offset < rest.len() {
        let line_end = rest[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| offset + i);
        let line = &rest[offset..line_end.unwrap_or(rest.len())];

        if is_marker(line) {
            let header = parse_yaml(&rest[..offset])?;
            let body_start = line_end.map_or(rest.len(), |end| end + 1);
            return Ok((header, rest[body_start..].to_vec()));
        }

        offset = line_end.map_or(rest.len(), |end| end + 1);
    }

    Err(DocumentError::UnterminatedHeader)
}

/// returns the bytes after the opening marker line, if the data has one
fn strip_opening_marker(data: &[u8]) -> Option<&[u8]> {
    let line_end = data.iter().position(|&b| b == b'\n');
    let first_line = &data[..line_end.unwrap_or(data.len())];
    if !is_marker(first_line) {
        return None;
    }
    Some(&data[line_end.map_or(data.len(), |end| end + 1)..])
}

fn is_marker(line: &[u8]) -> bool {
    line.trim_ascii_end() == MARKER
}

fn parse_yaml(yaml: &[u8]) -> Result<PageHeader, DocumentError> {
    if yaml.iter().all(u8::is_ascii_whitespace) {
        return Ok(PageHeader::default());
    }
    Ok(serde_yaml::from_slice(yaml)?)
}
