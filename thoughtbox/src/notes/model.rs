use std::fmt::Display;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::users::UserId;

pub type NoteId = String;

/// Note kind. The set is open-ended: unknown kinds are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoteType {
    Text,
    Todo,
    Timetable,
    Other(String),
}

impl From<String> for NoteType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => Self::Text,
            "todo" => Self::Todo,
            "timetable" => Self::Timetable,
            _ => Self::Other(value),
        }
    }
}

impl From<NoteType> for String {
    fn from(value: NoteType) -> Self {
        value.as_str().to_owned()
    }
}

impl NoteType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Todo => "todo",
            Self::Timetable => "timetable",
            Self::Other(other) => other,
        }
    }
}

impl FromSql for NoteType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(|v| Self::from(v.to_owned()))
    }
}

impl ToSql for NoteType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl Display for NoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side reconciliation state. Never persisted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Pending,
    Conflict,
    Error,
}

/// A decrypted note, as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub kind: NoteType,
    pub title: String,
    pub content: Value,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
}

/// A note as stored: `title` and `content` hold encryption envelopes (or legacy plaintext).
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRow {
    pub id: NoteId,
    pub user_id: UserId,
    pub kind: NoteType,
    pub title: String,
    pub content: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNote {
    pub id: NoteId,
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub kind: NoteType,
    pub title: Option<String>,
    pub content: Value,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNote {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub kind: Option<NoteType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteNotes {
    pub note_ids: Vec<NoteId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteNoteResponse {
    pub message: String,
    pub id: NoteId,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted_ids: Vec<NoteId>,
    pub deleted_count: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn note_type_keeps_unknown_kinds() {
        let kind: NoteType = serde_json::from_value(json!("drawing")).unwrap();
        assert_eq!(kind, NoteType::Other("drawing".into()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("drawing"));

        let kind: NoteType = serde_json::from_value(json!("todo")).unwrap();
        assert_eq!(kind, NoteType::Todo);
    }

    #[test]
    fn create_note_uses_wire_names() {
        let create: CreateNote = serde_json::from_value(json!({
            "id": "n1",
            "type": "text",
            "content": { "text": "hello" }
        }))
        .unwrap();

        assert_eq!(create.kind, NoteType::Text);
        assert_eq!(create.title, None);
        assert_eq!(create.color, None);
    }

    #[test]
    fn create_note_requires_content() {
        let create = serde_json::from_value::<CreateNote>(json!({ "id": "n1", "type": "text" }));
        assert!(create.is_err());
    }
}
