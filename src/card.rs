use serde::Serialize;

/// One publication ready to become a board card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Card {
    /// Preamble lines of the entry, each newline-terminated.
    pub comment: String,
    pub title: String,
    /// Upper-cased owner token; resolves to a board through the directory.
    pub owner: String,
    /// Body text, never newline-terminated.
    pub description: String,
}
