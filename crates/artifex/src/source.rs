//! Source text management.
//!
//! A `SourceUnit` is one immutable snapshot of component source text. The
//! text is wrapped in `Arc<str>` so the cache, the loader and diagnostics can
//! share it without copying. Every unit carries a `SourceId`, a hash of the
//! exact text, which is the identity the execution cache keys on.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use rustc_hash::FxHasher;

/// Identity token of one source snapshot.
///
/// Two units with byte-identical text always share an id. The id is only a
/// fast pre-check; the cache still compares the full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub fn of(text: &str) -> Self {
        let mut hasher = FxHasher::default();
        text.hash(&mut hasher);
        SourceId(hasher.finish())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Immutable snapshot of untrusted component source.
#[derive(Clone)]
pub struct SourceUnit {
    text: Arc<str>,
    id: SourceId,
    name: Arc<str>,
}

impl SourceUnit {
    /// Name used in diagnostics when the host does not provide one.
    pub const DEFAULT_NAME: &'static str = "component.jsx";

    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self::named(Self::DEFAULT_NAME, text)
    }

    pub fn named(name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let id = SourceId::of(&text);
        Self {
            text,
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the unit holds no code at all (only whitespace counts as none).
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Converts a byte offset into a 1-based `(line, column)` pair.
    ///
    /// Columns count characters, not bytes. Offsets past the end clamp to
    /// the end of the text.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &self.text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|index| index + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }
}

impl Deref for SourceUnit {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.text
    }
}

impl PartialEq for SourceUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.text == other.text
    }
}

impl Eq for SourceUnit {}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnit")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("len", &self.text.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_shares_identity() {
        let a = SourceUnit::new("export default () => null;");
        let b = SourceUnit::new(String::from("export default () => null;"));
        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn whitespace_changes_identity() {
        let a = SourceUnit::new("export default () => null;");
        let b = SourceUnit::new("export default () => null; ");
        assert_ne!(a, b);
    }

    #[test]
    fn line_col_is_one_based() {
        let unit = SourceUnit::new("const a = 1;\nconst b = <div>;\n");
        assert_eq!(unit.line_col(0), (1, 1));
        assert_eq!(unit.line_col(13), (2, 1));
        assert_eq!(unit.line_col(23), (2, 11));
        assert_eq!(unit.line_col(1000), (3, 1));
    }

    #[test]
    fn line_col_counts_characters() {
        let unit = SourceUnit::new("é = 1");
        assert_eq!(unit.line_col(2), (1, 2));
        assert_eq!(unit.line_col(1), (1, 1));
    }
}
