//! Heading-driven section chunking for policy documents.
//!
//! Every detector contributes boundary candidates independently. Candidates
//! are sorted by position; identical positions collapse to the strongest
//! detector, and near positions collapse only when a merge window is set.
//! Chunks are contiguous slices between boundaries, so nothing from the
//! source is dropped. Oversized chunks are re-split on blank lines.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use super::classify::classify_section;
use super::types::{Boundary, BoundaryKind, ClassifiedChunk, SectionChunk};

pub const FULL_DOCUMENT_TITLE: &str = "Full Document";
pub const PREAMBLE_TITLE: &str = "Preamble";

/// Boundaries this close are logged as near collisions when they are kept.
const NEAR_COLLISION_CHARS: usize = 40;

/// Longest line still treated as an ALL-CAPS heading.
const MAX_CAPS_HEADING_CHARS: usize = 60;

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[ \t]*section[ \t]+\d+(?:[ \t]*[:.][ \t]*|[ \t]+)\S.*$").unwrap()
});

static KEYWORD_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)^[ \t]*(?:coverage[ \t]+criteria|exclusions|requirements|definitions|prior[ \t]+authorization|limitations|appeals(?:[ \t]+process)?)[ \t]*:?[ \t]*$",
    )
    .unwrap()
});

static NUMBERED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d{1,3}\.[ \t]+\S.*$").unwrap());

static LETTERED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[A-Z][.:)][ \t]+\S.*$").unwrap());

static CAPS_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*[A-Z][A-Z0-9 \t&/,()'-]*[A-Z0-9)][ \t]*:?[ \t]*$").unwrap()
});

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub max_chunk_size: usize,
    /// Boundaries closer than this many bytes collapse into the stronger one.
    /// Zero keeps every distinct boundary.
    pub boundary_merge_window: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4000,
            boundary_merge_window: 0,
        }
    }
}

pub struct DocumentChunker {
    config: ChunkerConfig,
}

impl DocumentChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config: ChunkerConfig {
                max_chunk_size: config.max_chunk_size.max(1),
                ..config
            },
        }
    }

    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Split `text` into ordered section chunks. Blank input yields no chunks.
    /// CR and CRLF line endings are read as LF.
    pub fn chunk(&self, text: &str) -> Vec<SectionChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let text = unify_line_endings(text);
        let text = text.as_ref();

        let boundaries =
            resolve_boundaries(detect_boundaries(text), self.config.boundary_merge_window);

        let mut chunks = Vec::new();
        if boundaries.is_empty() {
            self.emit(&mut chunks, text.trim(), FULL_DOCUMENT_TITLE, None);
            info!(chunks = chunks.len(), "No headings detected");
            return chunks;
        }

        let preamble = text[..boundaries[0].position].trim();
        if !preamble.is_empty() {
            self.emit(&mut chunks, preamble, PREAMBLE_TITLE, None);
        }

        for (i, boundary) in boundaries.iter().enumerate() {
            let end = boundaries
                .get(i + 1)
                .map(|next| next.position)
                .unwrap_or(text.len());
            let section_text = text[boundary.position..end].trim();
            self.emit(&mut chunks, section_text, &boundary.title, Some(boundary.kind));
        }

        info!(
            boundaries = boundaries.len(),
            chunks = chunks.len(),
            "Document chunked"
        );
        chunks
    }

    /// Chunk and attach a section type to every chunk.
    pub fn chunk_and_classify(&self, text: &str) -> Vec<ClassifiedChunk> {
        self.chunk(text)
            .into_iter()
            .map(|chunk| {
                let section_type = classify_section(&chunk.title, &chunk.text);
                ClassifiedChunk {
                    chunk,
                    section_type,
                }
            })
            .collect()
    }

    /// Push one chunk, or its parts when it is over the size limit.
    fn emit(
        &self,
        chunks: &mut Vec<SectionChunk>,
        text: &str,
        title: &str,
        kind: Option<BoundaryKind>,
    ) {
        let parts = if text.chars().count() > self.config.max_chunk_size {
            split_paragraphs(text, self.config.max_chunk_size)
        } else {
            vec![text.to_string()]
        };

        let split = parts.len() > 1;
        if split {
            debug!(title, parts = parts.len(), "Oversized section re-split");
        }

        for (k, part) in parts.into_iter().enumerate() {
            let title = if split {
                format!("{title} (Part {})", k + 1)
            } else {
                title.to_string()
            };
            chunks.push(SectionChunk {
                title,
                char_count: part.chars().count(),
                text: part,
                order_index: chunks.len(),
                boundary_kind: kind,
            });
        }
    }
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// Every heading candidate from every detector, in no particular order.
/// Patterns are line-anchored on LF; `DocumentChunker::chunk` unifies line
/// endings before calling this.
pub fn detect_boundaries(text: &str) -> Vec<Boundary> {
    let detectors: [(&Regex, BoundaryKind); 5] = [
        (&*SECTION_MARKER, BoundaryKind::SectionMarker),
        (&*KEYWORD_HEADING, BoundaryKind::Keyword),
        (&*NUMBERED_HEADING, BoundaryKind::Numbered),
        (&*LETTERED_HEADING, BoundaryKind::Lettered),
        (&*CAPS_HEADING, BoundaryKind::AllCaps),
    ];

    let mut found = Vec::new();
    for (regex, kind) in detectors {
        for m in regex.find_iter(text) {
            let line = m.as_str();
            if kind == BoundaryKind::AllCaps && !is_caps_heading(line) {
                continue;
            }
            found.push(Boundary {
                position: m.start(),
                kind,
                title: heading_title(line),
            });
        }
    }
    found
}

/// Sort by position and resolve collisions.
///
/// Same position: keep the strongest detector. Within `merge_window` bytes of
/// the previous kept boundary: keep whichever is stronger, earlier on ties.
fn resolve_boundaries(mut candidates: Vec<Boundary>, merge_window: usize) -> Vec<Boundary> {
    candidates.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(a.kind.priority().cmp(&b.kind.priority()))
    });

    let mut kept: Vec<Boundary> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(last) = kept.last_mut() else {
            kept.push(candidate);
            continue;
        };

        if candidate.position == last.position {
            // Sorted by priority within a position, so `last` already wins.
            continue;
        }

        let distance = candidate.position - last.position;
        if merge_window > 0 && distance <= merge_window {
            debug!(
                kept = %last.title,
                dropped = %candidate.title,
                distance,
                "Merged nearby heading boundaries"
            );
            if candidate.kind.priority() < last.kind.priority() {
                *last = candidate;
            }
            continue;
        }

        if distance < NEAR_COLLISION_CHARS {
            debug!(
                first = %last.title,
                second = %candidate.title,
                distance,
                "Near heading collision kept"
            );
        }
        kept.push(candidate);
    }
    kept
}

fn is_caps_heading(line: &str) -> bool {
    let trimmed = line.trim();
    let letters = trimmed.chars().filter(|c| c.is_ascii_alphabetic()).count();
    letters >= 3 && trimmed.chars().count() <= MAX_CAPS_HEADING_CHARS
}

fn heading_title(line: &str) -> String {
    line.trim().trim_end_matches(':').trim_end().to_string()
}

fn unify_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Greedy paragraph packing. Parts are joined with a blank line and the
/// joiner counts toward the limit. A paragraph longer than `max` stands alone.
fn split_paragraphs(text: &str, max: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0usize;

    for para in PARAGRAPH_BREAK.split(text).map(str::trim).filter(|p| !p.is_empty()) {
        let para_size = para.chars().count();
        let joined_size = if current.is_empty() {
            para_size
        } else {
            current_size + 2 + para_size
        };

        if joined_size > max && !current.is_empty() {
            parts.push(current.join("\n\n"));
            current = vec![para];
            current_size = para_size;
        } else {
            current.push(para);
            current_size = joined_size;
        }
    }

    if !current.is_empty() {
        parts.push(current.join("\n\n"));
    }
    parts
}
