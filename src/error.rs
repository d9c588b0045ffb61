use std::fmt;
use std::io;

use thiserror::Error;

/// Failure turning an uploaded document into plain text.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("malformed document xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("{program} failed: {reason}")]
    External {
        program: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum TrelloError {
    #[error("trello credentials are not configured (TRELLO_API_KEY / TRELLO_API_TOKEN)")]
    MissingCredentials,
    #[error("no board configured for owner '{0}'")]
    UnknownOwner(String),
    #[error("board {board} has no '{list}' list")]
    MissingList { board: String, list: &'static str },
    #[error("trello returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("trello request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The card exists on the board; only its comment is missing.
    #[error("card {card_id} created but its comment failed: {source}")]
    Comment {
        card_id: String,
        source: Box<TrelloError>,
    },
}

impl TrelloError {
    /// Id of a card that was filed despite the error.
    pub fn created_card(&self) -> Option<&str> {
        match self {
            TrelloError::Comment { card_id, .. } => Some(card_id.as_str()),
            _ => None,
        }
    }
}

/// One card that could not be created.
#[derive(Debug)]
pub struct CardFailure {
    pub title: String,
    pub owner: String,
    pub error: TrelloError,
}

/// Every failure from one publishing run.
#[derive(Debug)]
pub struct PublishError {
    pub total: usize,
    /// Cards that exist on the boards, including those whose comment failed.
    pub created: usize,
    pub failures: Vec<CardFailure>,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} cards failed ({} created)",
            self.failures.len(),
            self.total,
            self.created
        )?;
        for failure in &self.failures {
            let owner = if failure.owner.is_empty() {
                "-"
            } else {
                failure.owner.as_str()
            };
            write!(f, "; \"{}\" ({}): {}", failure.title, owner, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for PublishError {}
