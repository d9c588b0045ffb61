use std::future::Future;

use chrono::{DateTime, Local, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::boards::BoardDirectory;
use crate::card::Card;
use crate::error::{CardFailure, PublishError, TrelloError};

pub const DEFAULT_BASE_URL: &str = "https://api.trello.com/1";

/// New cards always land in this list of the owner's board.
pub const TARGET_LIST: &str = "REMANEJAR";

#[derive(Debug, Clone, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardDraft {
    pub name: String,
    pub desc: String,
    pub due: DateTime<Local>,
}

impl CardDraft {
    pub fn from_card(card: &Card, now: DateTime<Local>) -> Self {
        CardDraft {
            name: card.title.clone(),
            desc: card.description.clone(),
            due: end_of_day(now),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCard {
    pub id: String,
    #[serde(default, rename = "shortUrl")]
    pub short_url: String,
}

/// The three remote calls needed to file a card.
pub trait BoardApi {
    fn lists(
        &self,
        board_id: &str,
    ) -> impl Future<Output = Result<Vec<BoardList>, TrelloError>> + Send;

    fn create_card(
        &self,
        list_id: &str,
        draft: &CardDraft,
    ) -> impl Future<Output = Result<CreatedCard, TrelloError>> + Send;

    fn add_comment(
        &self,
        card_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), TrelloError>> + Send;
}

#[derive(Debug, Clone)]
pub struct TrelloClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    token: String,
}

impl TrelloClient {
    pub fn new(base_url: &str, key: &str, token: &str) -> Result<Self, TrelloError> {
        if key.is_empty() || token.is_empty() {
            return Err(TrelloError::MissingCredentials);
        }
        Ok(TrelloClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn auth(&self) -> [(&'static str, &str); 2] {
        [("key", self.key.as_str()), ("token", self.token.as_str())]
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, TrelloError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TrelloError::Api {
        status: status.as_u16(),
        body,
    })
}

impl BoardApi for TrelloClient {
    async fn lists(&self, board_id: &str) -> Result<Vec<BoardList>, TrelloError> {
        let resp = self
            .http
            .get(self.url(&format!("boards/{}/lists", board_id)))
            .query(&self.auth())
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn create_card(&self, list_id: &str, draft: &CardDraft) -> Result<CreatedCard, TrelloError> {
        let resp = self
            .http
            .post(self.url("cards"))
            .query(&self.auth())
            .query(&[("idList", list_id)])
            .json(draft)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), TrelloError> {
        let resp = self
            .http
            .post(self.url(&format!("cards/{}/actions/comments", card_id)))
            .query(&self.auth())
            .query(&[("text", text)])
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Files cards on the owner's board, one remote card per parsed card.
pub struct Publisher<'a, A> {
    api: &'a A,
    boards: &'a BoardDirectory,
}

impl<'a, A: BoardApi + Sync> Publisher<'a, A> {
    pub fn new(api: &'a A, boards: &'a BoardDirectory) -> Self {
        Publisher { api, boards }
    }

    pub async fn publish_one(&self, card: &Card) -> Result<CreatedCard, TrelloError> {
        let board_id = self
            .boards
            .lookup(&card.owner)
            .ok_or_else(|| TrelloError::UnknownOwner(card.owner.clone()))?;

        let lists = self.api.lists(board_id).await?;
        let list = lists
            .iter()
            .find(|l| l.name.to_uppercase() == TARGET_LIST)
            .ok_or_else(|| TrelloError::MissingList {
                board: board_id.to_string(),
                list: TARGET_LIST,
            })?;

        let draft = CardDraft::from_card(card, Local::now());
        let created = self.api.create_card(&list.id, &draft).await?;
        if !card.comment.trim().is_empty() {
            if let Err(e) = self.api.add_comment(&created.id, &card.comment).await {
                return Err(TrelloError::Comment {
                    card_id: created.id,
                    source: Box::new(e),
                });
            }
        }

        info!(
            owner = %card.owner,
            board = board_id,
            card = %created.id,
            url = %created.short_url,
            "Created card: {}",
            card.title
        );
        Ok(created)
    }

    /// Publish every card, continuing past failures; `on_card` sees each outcome.
    pub async fn publish_all<F>(&self, cards: &[Card], mut on_card: F) -> Result<usize, PublishError>
    where
        F: FnMut(&Card, &Result<CreatedCard, TrelloError>) + Send,
    {
        let mut created = 0;
        let mut failures = Vec::new();

        for card in cards {
            let result = self.publish_one(card).await;
            on_card(card, &result);
            match result {
                Ok(_) => created += 1,
                Err(error) => {
                    if error.created_card().is_some() {
                        created += 1;
                    }
                    warn!(owner = %card.owner, error = %error, "Card failed: {}", card.title);
                    failures.push(CardFailure {
                        title: card.title.clone(),
                        owner: card.owner.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(created)
        } else {
            Err(PublishError {
                total: cards.len(),
                created,
                failures,
            })
        }
    }
}

/// Last instant of `now`'s calendar day.
pub fn end_of_day<Tz: TimeZone>(now: DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    now.date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(tz).earliest())
        .map(|midnight| midnight - TimeDelta::nanoseconds(1))
        .unwrap_or(now)
}

// ── Tests ──
