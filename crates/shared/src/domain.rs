use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(NoteId);
id_newtype!(ClientId);

/// A note as stored by the backend.
///
/// `client_id` records which client instance created the note. Notes created
/// outside any client (for example from the backend console) carry none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Nullable backend fields arrive as explicit `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Note {
    /// Builds a not-yet-acknowledged note owned by `client_id`.
    pub fn draft(
        client_id: ClientId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: NoteId::generate(),
            name: name.into(),
            description: description.into(),
            completed: false,
            client_id: Some(client_id),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn originated_by(&self, client_id: &ClientId) -> bool {
        self.client_id.as_ref() == Some(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_note_with_camel_case_fields() {
        let raw = r#"{
            "id": "a",
            "name": "Milk",
            "description": "buy",
            "completed": true,
            "clientId": "c-1",
            "createdAt": "2024-01-02T03:04:05.000Z",
            "updatedAt": "2024-01-02T03:04:06.000Z"
        }"#;

        let note: Note = serde_json::from_str(raw).expect("decode note");
        assert_eq!(note.id, NoteId::from("a"));
        assert!(note.completed);
        assert_eq!(note.client_id, Some(ClientId::from("c-1")));
        assert!(note.created_at.is_some());
        assert!(note.updated_at > note.created_at);
    }

    #[test]
    fn console_created_note_without_client_id_decodes() {
        let raw = r#"{"id":"b","name":"n","description":"d","completed":false,"clientId":null}"#;
        let note: Note = serde_json::from_str(raw).expect("decode note");
        assert_eq!(note.client_id, None);
        assert!(!note.originated_by(&ClientId::from("anyone")));
    }

    #[test]
    fn null_completed_and_description_decode_as_defaults() {
        let raw = r#"{"id":"b","name":"n","description":null,"completed":null}"#;
        let note: Note = serde_json::from_str(raw).expect("decode note");
        assert_eq!(note.description, "");
        assert!(!note.completed);

        let missing: Note =
            serde_json::from_str(r#"{"id":"c","name":"n"}"#).expect("decode note");
        assert!(!missing.completed);
    }

    #[test]
    fn draft_notes_get_distinct_ids_and_start_incomplete() {
        let client = ClientId::generate();
        let first = Note::draft(client.clone(), "a", "b");
        let second = Note::draft(client.clone(), "a", "b");

        assert_ne!(first.id, second.id);
        assert!(!first.completed);
        assert!(first.originated_by(&client));
    }
}
