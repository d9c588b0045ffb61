use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").unwrap());

/// Section header repeated throughout the reports; carries no content.
const SECTION_HEADER: &str = "COMENTÁRIOS";

/// Split a converted report into one chunk per numbered publication.
///
/// Capture starts at the first `N.` line; every following non-blank line is
/// kept, newline-terminated, in the chunk of the entry it belongs to.
pub fn split_publications(body: &str) -> Vec<String> {
    let lines: Vec<&str> = body.split('\n').collect();
    let last = lines.len().saturating_sub(1);

    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut capturing = false;

    for (i, line) in lines.iter().enumerate() {
        if is_blank(line) {
            if i == last && !chunk.is_empty() {
                chunks.push(std::mem::take(&mut chunk));
            }
            continue;
        }

        if is_entry_marker(line) {
            if chunks.is_empty() {
                capturing = true;
            }
            if !chunk.is_empty() {
                chunks.push(std::mem::take(&mut chunk));
            }
        }

        if capturing {
            chunk.push_str(line);
            chunk.push('\n');
        }
    }

    // Reports that end on a content line still close their last entry.
    if !chunk.is_empty() {
        debug!("Flushing trailing publication at end of input");
        chunks.push(chunk);
    }

    chunks
}

pub fn is_entry_marker(line: &str) -> bool {
    ENTRY_RE.is_match(line)
}

fn is_blank(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t == SECTION_HEADER
}

// ── Tests ──
