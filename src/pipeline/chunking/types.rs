use serde::{Deserialize, Serialize};

use crate::models::SectionType;

/// Which detector produced a heading boundary.
/// Declaration order is priority order, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// `SECTION 3: Title`
    SectionMarker,
    /// Canonical heading such as `Exclusions` or `Prior Authorization`
    Keyword,
    /// `4. Title`
    Numbered,
    /// `B. Title`
    Lettered,
    /// Short ALL-CAPS line
    AllCaps,
}

impl BoundaryKind {
    /// Lower is stronger.
    pub fn priority(self) -> u8 {
        self as u8
    }
}

/// A heading candidate found in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// Byte offset of the start of the heading line.
    pub position: usize,
    pub kind: BoundaryKind,
    pub title: String,
}

/// A contiguous, titled span of document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionChunk {
    pub title: String,
    pub text: String,
    pub char_count: usize,
    /// Dense, zero-based, reading order.
    pub order_index: usize,
    /// `None` for the preamble and for documents without headings.
    pub boundary_kind: Option<BoundaryKind>,
}

/// A chunk together with its classifier label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedChunk {
    #[serde(flatten)]
    pub chunk: SectionChunk,
    pub section_type: SectionType,
}
