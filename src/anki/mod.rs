//! Flashcard backend: the AnkiConnect HTTP API.
//!
//! The sync workflow talks to a [`NoteBackend`]; [`AnkiConnectClient`] is
//! the production implementation that speaks to the AnkiConnect add-on of a
//! running Anki instance (by default on `http://localhost:8765`).

mod protocol;

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AnkiConfig;

use protocol::{NoteFields, NoteInfo, Reply};

/// Anki note identifier.
pub type NoteId = i64;

/// Errors that can occur while talking to AnkiConnect.
#[derive(Error, Debug)]
pub enum AnkiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("AnkiConnect answered with HTTP {0}")]
    Http(u16),
    #[error("AnkiConnect error: {0}")]
    Api(String),
    #[error("unexpected AnkiConnect reply: {0}")]
    Unexpected(String),
}

/// A flashcard built from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub deck: String,
    /// Card front, the file name without extension.
    pub front: String,
    /// Card back, the extracted Markdown.
    pub back: String,
    pub tags: Vec<String>,
    /// Path of the source file the note was built from.
    pub source: String,
}

/// Operations the sync workflow needs from a flashcard store.
pub trait NoteBackend {
    /// Whether the backend answers at all.
    fn is_available(&self) -> impl Future<Output = bool>;

    fn note_exists(&self, id: NoteId) -> impl Future<Output = Result<bool, AnkiError>>;

    /// Create `deck` unless it already exists.
    fn create_deck(&self, deck: &str) -> impl Future<Output = Result<(), AnkiError>>;

    fn add_note(&self, note: &Note) -> impl Future<Output = Result<NoteId, AnkiError>>;

    /// Replace the fields of an existing note and move it to `note.deck`/`note.tags`.
    fn update_note(&self, id: NoteId, note: &Note) -> impl Future<Output = Result<(), AnkiError>>;

    fn delete_note(&self, id: NoteId) -> impl Future<Output = Result<(), AnkiError>>;

    /// Replace only the front of a note, leaving the back untouched.
    fn rename_note(&self, id: NoteId, front: &str) -> impl Future<Output = Result<(), AnkiError>>;

    /// Move a note to another deck and replace its tags.
    fn move_note(
        &self,
        id: NoteId,
        deck: &str,
        tags: &[String],
    ) -> impl Future<Output = Result<(), AnkiError>>;
}

/// Client for the AnkiConnect add-on.
pub struct AnkiConnectClient {
    http: reqwest::Client,
    url: String,
    model_name: String,
    base_tag: Option<String>,
    timeout: Duration,
}

impl AnkiConnectClient {
    /// Create a new client with the given configuration.
    pub fn new(config: &AnkiConfig) -> Result<Self, AnkiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("docdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            model_name: config.model_name.clone(),
            base_tag: config.base_tag.clone().filter(|t| !t.is_empty()),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    /// Perform one AnkiConnect action and decode its `result`.
    async fn invoke<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<Value>,
    ) -> Result<Option<T>, AnkiError> {
        debug!(action, url = %self.url, "AnkiConnect request");

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&protocol::envelope(action, params))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnkiError::Timeout
                } else {
                    AnkiError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            warn!(action, status, "AnkiConnect request failed");
            return Err(AnkiError::Http(status));
        }

        let reply: Reply<T> = response.json().await?;
        reply.into_result()
    }

    /// Tags sent to Anki: the note's own tags plus the configured base tag.
    fn tags_with_base(&self, tags: &[String]) -> Vec<String> {
        let mut all = tags.to_vec();
        if let Some(base) = &self.base_tag {
            if !all.contains(base) {
                all.push(base.clone());
            }
        }
        all
    }

    async fn notes_info(&self, id: NoteId) -> Result<Option<NoteInfo>, AnkiError> {
        let infos: Vec<NoteInfo> = self
            .invoke("notesInfo", Some(json!({ "notes": [id] })))
            .await?
            .unwrap_or_default();
        Ok(infos.into_iter().next().filter(|info| info.note_id.is_some()))
    }
}

impl NoteBackend for AnkiConnectClient {
    async fn is_available(&self) -> bool {
        match self.invoke::<Value>("version", None).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "AnkiConnect is not available");
                false
            }
        }
    }

    async fn note_exists(&self, id: NoteId) -> Result<bool, AnkiError> {
        Ok(self.notes_info(id).await?.is_some())
    }

    async fn create_deck(&self, deck: &str) -> Result<(), AnkiError> {
        self.invoke::<Value>("createDeck", Some(json!({ "deck": deck })))
            .await?;
        Ok(())
    }

    async fn add_note(&self, note: &Note) -> Result<NoteId, AnkiError> {
        let tags = self.tags_with_base(&note.tags);
        let params = protocol::add_note_params(
            &note.deck,
            &self.model_name,
            NoteFields {
                front: &note.front,
                back: Some(&note.back),
            },
            &tags,
        );

        self.invoke::<NoteId>("addNote", Some(params))
            .await?
            .ok_or_else(|| AnkiError::Unexpected(format!("addNote returned no id for {}", note.source)))
    }

    async fn update_note(&self, id: NoteId, note: &Note) -> Result<(), AnkiError> {
        let params = protocol::update_fields_params(
            id,
            NoteFields {
                front: &note.front,
                back: Some(&note.back),
            },
        );
        self.invoke::<Value>("updateNoteFields", Some(params)).await?;
        self.move_note(id, &note.deck, &note.tags).await
    }

    async fn delete_note(&self, id: NoteId) -> Result<(), AnkiError> {
        self.invoke::<Value>("deleteNotes", Some(json!({ "notes": [id] })))
            .await?;
        Ok(())
    }

    async fn rename_note(&self, id: NoteId, front: &str) -> Result<(), AnkiError> {
        let params = protocol::update_fields_params(id, NoteFields { front, back: None });
        self.invoke::<Value>("updateNoteFields", Some(params)).await?;
        Ok(())
    }

    async fn move_note(&self, id: NoteId, deck: &str, tags: &[String]) -> Result<(), AnkiError> {
        let info = self
            .notes_info(id)
            .await?
            .ok_or_else(|| AnkiError::Unexpected(format!("note {} not found", id)))?;

        // Decks hold cards, not notes: move every card of the note.
        self.invoke::<Value>(
            "changeDeck",
            Some(json!({ "cards": info.cards, "deck": deck })),
        )
        .await?;

        let tags = self.tags_with_base(tags);
        self.invoke::<Value>("updateNoteTags", Some(json!({ "note": id, "tags": tags })))
            .await?;
        Ok(())
    }
}
