//! AnkiConnect wire format (API version 6).
//!
//! Every call is a JSON POST of `{"action", "version", "params"}` answered
//! by `{"result", "error"}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AnkiError, NoteId};

/// AnkiConnect API version spoken by this client.
pub const API_VERSION: u8 = 6;

#[derive(Serialize)]
struct Envelope<'a> {
    action: &'a str,
    version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// Build the request body for `action`.
pub fn envelope(action: &str, params: Option<Value>) -> Value {
    // Serializing a struct of strings and a Value cannot fail.
    serde_json::to_value(Envelope {
        action,
        version: API_VERSION,
        params,
    })
    .unwrap_or(Value::Null)
}

/// Reply envelope. `result` is null for actions with no return value.
#[derive(Debug, Deserialize)]
pub struct Reply<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> Reply<T> {
    /// Turn a reported error into `AnkiError::Api`.
    pub fn into_result(self) -> Result<Option<T>, AnkiError> {
        match self.error {
            Some(message) => Err(AnkiError::Api(message)),
            None => Ok(self.result),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NoteFields<'a> {
    #[serde(rename = "Front")]
    pub front: &'a str,
    #[serde(rename = "Back", skip_serializing_if = "Option::is_none")]
    pub back: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoteOptions {
    allow_duplicate: bool,
    duplicate_scope: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewNote<'a> {
    deck_name: &'a str,
    model_name: &'a str,
    fields: NoteFields<'a>,
    tags: &'a [String],
    options: NoteOptions,
}

/// Params for `addNote`. Duplicates are rejected within the target deck.
pub fn add_note_params(
    deck: &str,
    model: &str,
    fields: NoteFields<'_>,
    tags: &[String],
) -> Value {
    let note = NewNote {
        deck_name: deck,
        model_name: model,
        fields,
        tags,
        options: NoteOptions {
            allow_duplicate: false,
            duplicate_scope: "deck",
        },
    };
    json!({ "note": note })
}

/// Params for `updateNoteFields`.
pub fn update_fields_params(id: NoteId, fields: NoteFields<'_>) -> Value {
    json!({ "note": { "id": id, "fields": fields } })
}

/// One entry of a `notesInfo` reply. Unknown ids come back as `{}`.
#[derive(Debug, Default, Deserialize)]
pub struct NoteInfo {
    #[serde(rename = "noteId", default)]
    pub note_id: Option<NoteId>,
    #[serde(default)]
    pub cards: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_without_params() {
        let body = envelope("version", None);
        assert_eq!(body, json!({ "action": "version", "version": 6 }));
    }

    #[test]
    fn test_envelope_with_params() {
        let body = envelope("createDeck", Some(json!({ "deck": "src::main" })));
        assert_eq!(body["params"]["deck"], "src::main");
        assert_eq!(body["version"], 6);
    }

    #[test]
    fn test_add_note_params_shape() {
        let tags = vec!["src".to_string(), "Foo".to_string()];
        let params = add_note_params(
            "src",
            "Markdown Basic",
            NoteFields {
                front: "Foo",
                back: Some("# Foo\nDoc.\n"),
            },
            &tags,
        );

        let note = &params["note"];
        assert_eq!(note["deckName"], "src");
        assert_eq!(note["modelName"], "Markdown Basic");
        assert_eq!(note["fields"]["Front"], "Foo");
        assert_eq!(note["fields"]["Back"], "# Foo\nDoc.\n");
        assert_eq!(note["tags"], json!(["src", "Foo"]));
        assert_eq!(note["options"]["allowDuplicate"], false);
        assert_eq!(note["options"]["duplicateScope"], "deck");
    }

    #[test]
    fn test_update_fields_params_skips_missing_back() {
        let params = update_fields_params(
            42,
            NoteFields {
                front: "Renamed",
                back: None,
            },
        );
        assert_eq!(
            params,
            json!({ "note": { "id": 42, "fields": { "Front": "Renamed" } } })
        );
    }

    #[test]
    fn test_reply_error_becomes_api_error() {
        let reply: Reply<Value> =
            serde_json::from_str(r#"{"result": null, "error": "deck was not found"}"#).unwrap();
        match reply.into_result() {
            Err(AnkiError::Api(msg)) => assert_eq!(msg, "deck was not found"),
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_result() {
        let reply: Reply<NoteId> =
            serde_json::from_str(r#"{"result": 1496198395707, "error": null}"#).unwrap();
        assert_eq!(reply.into_result().unwrap(), Some(1496198395707));
    }

    /// Decode a reply for any result type, as the client does.
    fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<Option<T>, AnkiError> {
        serde_json::from_str::<Reply<T>>(body).unwrap().into_result()
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct DeckStats {
        name: String,
    }

    #[test]
    fn test_reply_for_result_without_default() {
        let stats: Option<DeckStats> =
            decode(r#"{"result": {"name": "src"}, "error": null}"#).unwrap();
        assert_eq!(
            stats,
            Some(DeckStats {
                name: "src".to_string()
            })
        );

        // Both keys may be missing.
        assert_eq!(decode::<DeckStats>("{}").unwrap(), None);
    }

    #[test]
    fn test_notes_info_unknown_note() {
        let reply: Reply<Vec<NoteInfo>> = serde_json::from_str(
            r#"{"result": [{}, {"noteId": 7, "cards": [70, 71], "tags": []}], "error": null}"#,
        )
        .unwrap();
        let infos = reply.into_result().unwrap().unwrap();
        assert_eq!(infos[0].note_id, None);
        assert_eq!(infos[1].note_id, Some(7));
        assert_eq!(infos[1].cards, vec![70, 71]);
    }
}
