use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{ClientId, Note, NoteId},
    error::GraphqlError,
};

const NOTE_FIELDS: &str = "id name description completed clientId createdAt updatedAt";

pub fn list_notes_document() -> String {
    format!("query ListNotes {{ listNotes {{ items {{ {NOTE_FIELDS} }} }} }}")
}

pub fn create_note_document() -> String {
    format!(
        "mutation CreateNote($input: CreateNoteInput!) {{ createNote(input: $input) {{ {NOTE_FIELDS} }} }}"
    )
}

pub fn update_note_document() -> String {
    format!(
        "mutation UpdateNote($input: UpdateNoteInput!) {{ updateNote(input: $input) {{ {NOTE_FIELDS} }} }}"
    )
}

pub fn delete_note_document() -> String {
    format!(
        "mutation DeleteNote($input: DeleteNoteInput!) {{ deleteNote(input: $input) {{ {NOTE_FIELDS} }} }}"
    )
}

pub fn on_create_note_document() -> String {
    format!("subscription OnCreateNote {{ onCreateNote {{ {NOTE_FIELDS} }} }}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlRequest<V> {
    pub query: String,
    pub variables: V,
}

impl<V> GraphqlRequest<V> {
    pub fn new(query: impl Into<String>, variables: V) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

/// `{ "input": ... }` variables wrapper shared by every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputVariables<T> {
    pub input: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoVariables {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteInput {
    pub id: NoteId,
    pub name: String,
    pub description: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

impl From<&Note> for CreateNoteInput {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            name: note.name.clone(),
            description: note.description.clone(),
            completed: note.completed,
            client_id: note.client_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNoteInput {
    pub id: NoteId,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteNoteInput {
    pub id: NoteId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteConnection {
    #[serde(default)]
    pub items: Vec<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesData {
    pub list_notes: NoteConnection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteData {
    pub create_note: Option<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteData {
    pub update_note: Option<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNoteData {
    pub delete_note: Option<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnCreateNoteData {
    pub on_create_note: Option<Note>,
}

/// Subprotocol negotiated on the realtime websocket.
pub const SUBSCRIPTION_PROTOCOL: &str = "graphql-transport-ws";

/// Frames a client sends on the realtime websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionClientFrame {
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Subscribe {
        id: String,
        payload: GraphqlRequest<NoVariables>,
    },
    Complete {
        id: String,
    },
    Ping,
    Pong,
}

/// Frames the backend sends on the realtime websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionServerFrame {
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Next {
        id: String,
        payload: GraphqlResponse<OnCreateNoteData>,
    },
    Error {
        id: String,
        #[serde(default)]
        payload: Vec<GraphqlError>,
    },
    Complete {
        id: String,
    },
    Ping,
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_input_uses_camel_case_client_id() {
        let note = Note::draft(ClientId::from("self"), "Milk", "buy");
        let variables = InputVariables {
            input: CreateNoteInput::from(&note),
        };

        let value = serde_json::to_value(&variables).expect("encode");
        assert_eq!(value["input"]["clientId"], "self");
        assert_eq!(value["input"]["completed"], false);
        assert!(value["input"].get("createdAt").is_none());
    }

    #[test]
    fn list_response_decodes_items_in_order() {
        let raw = r#"{"data":{"listNotes":{"items":[
            {"id":"a","name":"Milk","description":"buy","completed":false},
            {"id":"b","name":"Eggs","description":"dozen","completed":true}
        ]}}}"#;

        let response: GraphqlResponse<ListNotesData> = serde_json::from_str(raw).expect("decode");
        let ids: Vec<_> = response
            .data
            .expect("data")
            .list_notes
            .items
            .into_iter()
            .map(|note| note.id.0)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(response.errors.is_empty());
    }

    #[test]
    fn list_response_tolerates_console_created_note_with_nulls() {
        let raw = r#"{"data":{"listNotes":{"items":[
            {"id":"a","name":"Milk","description":"buy","completed":false,"clientId":"c1"},
            {"id":"b","name":"console","description":null,"completed":null,"clientId":null}
        ]}}}"#;

        let response: GraphqlResponse<ListNotesData> = serde_json::from_str(raw).expect("decode");
        let items = response.data.expect("data").list_notes.items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].description, "");
        assert!(!items[1].completed);
        assert_eq!(items[1].client_id, None);
    }

    #[test]
    fn error_response_without_data_decodes() {
        let raw = r#"{"data":null,"errors":[{"message":"denied","errorType":"Unauthorized"}]}"#;
        let response: GraphqlResponse<ListNotesData> = serde_json::from_str(raw).expect("decode");
        assert!(response.data.is_none());
        assert_eq!(response.errors[0].error_type.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn subscription_frames_use_snake_case_type_tags() {
        let init = SubscriptionClientFrame::ConnectionInit { payload: None };
        assert_eq!(
            serde_json::to_string(&init).expect("encode"),
            r#"{"type":"connection_init"}"#
        );

        let raw = r#"{"type":"next","id":"1","payload":{"data":{"onCreateNote":
            {"id":"n","name":"x","description":"y","completed":false,"clientId":"other"}}}}"#;
        match serde_json::from_str::<SubscriptionServerFrame>(raw).expect("decode") {
            SubscriptionServerFrame::Next { id, payload } => {
                assert_eq!(id, "1");
                let note = payload.data.and_then(|d| d.on_create_note).expect("note");
                assert_eq!(note.client_id, Some(ClientId::from("other")));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn documents_request_every_note_field() {
        for document in [
            list_notes_document(),
            create_note_document(),
            update_note_document(),
            delete_note_document(),
            on_create_note_document(),
        ] {
            assert!(document.contains("clientId createdAt updatedAt"), "{document}");
        }
    }
}
