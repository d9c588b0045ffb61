use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::boards::BoardDirectory;
use crate::card::Card;

/// `RESP...: OWNER`; the owner is whatever follows the last colon.
static RESP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^RESP.*:(.*)$").unwrap());

/// Raw line index of the title; everything before it is preamble.
const TITLE_INDEX: usize = 6;

const TITLE_SENTINEL: &str = "NADA";
const BODY_SENTINEL: &str = "NADA A FAZER";

/// How an entry names the person (and so the board) it belongs to.
///
/// Exactly one convention is active per extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TagConvention {
    /// `RESP: ANA` lines; entries saying "NADA A FAZER" are dropped.
    #[default]
    Responsible,
    /// Bare owner lines found in the board directory; a `NADA` title drops the entry.
    BoardName,
}

/// Role of a chunk line, decided by its raw position in the chunk.
///
/// Blank lines still advance the position, so a blank at index 6 leaves the
/// entry without a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRole {
    /// Indices 0..=5.
    Comment,
    /// Index 6.
    Title,
    /// Index 7 onward: tag lines and description text.
    Body,
}

impl LineRole {
    fn at(index: usize) -> Self {
        match index {
            i if i < TITLE_INDEX => LineRole::Comment,
            TITLE_INDEX => LineRole::Title,
            _ => LineRole::Body,
        }
    }
}

#[derive(Default)]
struct Pending {
    comment: String,
    owner: String,
    title: String,
    description: String,
}

impl Pending {
    /// Emit the current owner's card; comment and title stay for the next owner.
    fn split_off(&mut self) -> Card {
        let description = std::mem::take(&mut self.description);
        self.to_card(description)
    }

    fn finish(self) -> Card {
        let Pending {
            comment,
            owner,
            title,
            description,
        } = self;
        Card {
            description: trim_one_newline(description),
            comment,
            owner,
            title,
        }
    }

    fn to_card(&self, description: String) -> Card {
        Card {
            comment: self.comment.clone(),
            owner: self.owner.clone(),
            title: self.title.clone(),
            description: trim_one_newline(description),
        }
    }
}

pub struct FieldExtractor<'a> {
    boards: &'a BoardDirectory,
    convention: TagConvention,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(boards: &'a BoardDirectory, convention: TagConvention) -> Self {
        FieldExtractor { boards, convention }
    }

    pub fn convention(&self) -> TagConvention {
        self.convention
    }

    /// Turn one publication chunk into cards, one per owner tag.
    pub fn extract(&self, chunk: &str) -> Vec<Card> {
        let mut cards = Vec::new();
        let mut pending = Pending::default();

        for (i, raw) in chunk.split('\n').enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            match LineRole::at(i) {
                LineRole::Comment => {
                    pending.comment.push_str(line);
                    pending.comment.push('\n');
                }
                LineRole::Title => {
                    if self.convention == TagConvention::BoardName
                        && line.to_uppercase() == TITLE_SENTINEL
                    {
                        debug!(title = line, "Dropping publication with nothing to do");
                        return Vec::new();
                    }
                    pending.title = line.to_string();
                }
                LineRole::Body => match self.owner_tag(line) {
                    Some(owner) => {
                        if !pending.owner.is_empty() {
                            cards.push(pending.split_off());
                        }
                        pending.owner = owner;
                    }
                    None => {
                        pending.description.push_str(line);
                        pending.description.push('\n');
                    }
                },
            }
        }

        if self.convention == TagConvention::Responsible
            && pending.description.to_uppercase().contains(BODY_SENTINEL)
        {
            debug!(
                title = %pending.title,
                owner = %pending.owner,
                "Dropping publication with nothing to do"
            );
            return cards;
        }

        cards.push(pending.finish());
        cards
    }

    /// Upper-cased owner named by a tag line, `None` for ordinary text.
    fn owner_tag(&self, line: &str) -> Option<String> {
        let upper = line.to_uppercase();
        match self.convention {
            TagConvention::BoardName => self.boards.contains(&upper).then_some(upper),
            TagConvention::Responsible => {
                // a bare `RESP:` still tags, with an empty owner
                let caps = RESP_RE.captures(&upper)?;
                Some(caps[1].trim().to_string())
            }
        }
    }
}

fn trim_one_newline(mut s: String) -> String {
    if s.ends_with('\n') {
        s.pop();
    }
    s
}

// ── Tests ──
