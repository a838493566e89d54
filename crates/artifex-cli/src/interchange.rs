//! Component files that carry the request they were generated from.
//!
//! ```text
//! /* <artifact-specification>
//!
//! I need a component that shows an analog wall clock.
//!
//! </artifact-specification> */
//!
//! import React from 'react';
//! ...
//! ```
//!
//! Files without the leading block are plain source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const OPEN: &str = "/* <artifact-specification>";
const CLOSE: &str = "</artifact-specification> */";

#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("specification text may not contain the closing marker `{CLOSE}`")]
    EmbeddedMarker,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub specification: Option<String>,
    pub source: String,
}

impl Document {
    pub fn new(specification: Option<String>, source: impl Into<String>) -> Self {
        Self {
            specification,
            source: source.into(),
        }
    }

    /// Splits off a leading specification block. Anything not shaped
    /// exactly like one, including an unclosed block, is all source.
    pub fn parse(text: &str) -> Self {
        let Some(rest) = text.strip_prefix('\u{feff}').unwrap_or(text).strip_prefix(OPEN) else {
            return Self::new(None, text);
        };
        let Some(end) = rest.find(CLOSE) else {
            log::debug!(target: "artifex::interchange", "unclosed specification block, reading as source");
            return Self::new(None, text);
        };
        let specification = rest[..end].trim().to_string();
        let mut source = &rest[end + CLOSE.len()..];
        // The closing line, then the blank separator line.
        for _ in 0..2 {
            source = line_break(source).unwrap_or(source);
        }
        Self::new(Some(specification), source)
    }

    /// The inverse of [`Document::parse`].
    pub fn to_text(&self) -> Result<String, InterchangeError> {
        match &self.specification {
            None => Ok(self.source.clone()),
            Some(specification) if specification.contains(CLOSE) => Err(InterchangeError::EmbeddedMarker),
            Some(specification) => Ok(format!(
                "{OPEN}\n\n{}\n\n{CLOSE}\n\n{}",
                specification.trim(),
                self.source
            )),
        }
    }

    pub fn read(path: &Path) -> Result<Self, InterchangeError> {
        let text = fs::read_to_string(path).map_err(|source| InterchangeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn write(&self, path: &Path) -> Result<(), InterchangeError> {
        let text = self.to_text()?;
        fs::write(path, text).map_err(|source| InterchangeError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn line_break(text: &str) -> Option<&str> {
    text.strip_prefix("\r\n").or_else(|| text.strip_prefix('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOCK: &str = "/* <artifact-specification>\n\nI need a clock.\n\n</artifact-specification> */\n\nimport React from 'react';\n";

    #[test]
    fn splits_leading_block() {
        let document = Document::parse(CLOCK);
        assert_eq!(document.specification.as_deref(), Some("I need a clock."));
        assert_eq!(document.source, "import React from 'react';\n");
    }

    #[test]
    fn plain_files_are_all_source() {
        let document = Document::parse("export default () => null;\n");
        assert_eq!(document, Document::new(None, "export default () => null;\n"));
        let comment = "/* just a comment */\nexport default 1;";
        assert_eq!(Document::parse(comment).source, comment);
    }

    #[test]
    fn unclosed_block_is_source() {
        let text = "/* <artifact-specification>\nnever closed";
        assert_eq!(Document::parse(text), Document::new(None, text));
    }

    #[test]
    fn writing_reverses_parsing() {
        let document = Document::parse(CLOCK);
        assert_eq!(document.to_text().unwrap(), CLOCK);
        assert_eq!(Document::new(None, "x").to_text().unwrap(), "x");
    }

    #[test]
    fn crlf_separators() {
        let document = Document::parse("/* <artifact-specification>\r\nspec\r\n</artifact-specification> */\r\n\r\nsource");
        assert_eq!(document.specification.as_deref(), Some("spec"));
        assert_eq!(document.source, "source");
    }

    #[test]
    fn embedded_marker_is_rejected() {
        let document = Document::new(Some(format!("bad {CLOSE}")), "");
        assert!(matches!(document.to_text(), Err(InterchangeError::EmbeddedMarker)));
    }

    #[test]
    fn files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.jsx");
        Document::new(Some("A clock".into()), "export default () => null;\n")
            .write(&path)
            .unwrap();
        let document = Document::read(&path).unwrap();
        assert_eq!(document.specification.as_deref(), Some("A clock"));
        assert_eq!(document.source, "export default () => null;\n");
        assert!(matches!(
            Document::read(&dir.path().join("missing.jsx")),
            Err(InterchangeError::Read { .. })
        ));
    }
}
