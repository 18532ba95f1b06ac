mod retry;

pub use retry::{with_retry, RequestFailure, RetryPolicy, ServiceError};

use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    health::Health,
    notes::{BulkDeleteNotes, BulkDeleteResponse, CreateNote, DeleteNoteResponse, Note, UpdateNote},
    search::{search_notes, SearchResults},
};

/// Typed client for the notes REST API.
#[derive(Debug, Clone)]
pub struct NotesClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    retry: RetryPolicy,
}

impl NotesClient {
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn health(&self) -> Result<Health, ServiceError> {
        self.execute(|| self.request(Method::GET, &["api", "health"])).await
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>, ServiceError> {
        self.execute(|| self.request(Method::GET, &["api", "notes"])).await
    }

    pub async fn get_note(&self, id: &str) -> Result<Note, ServiceError> {
        self.execute(|| self.request(Method::GET, &["api", "notes", id])).await
    }

    pub async fn create_note(&self, note: &CreateNote) -> Result<Note, ServiceError> {
        self.execute(|| self.request(Method::POST, &["api", "notes"]).json(note)).await
    }

    pub async fn update_note(&self, id: &str, update: &UpdateNote) -> Result<Note, ServiceError> {
        self.execute(|| self.request(Method::PUT, &["api", "notes", id]).json(update))
            .await
    }

    pub async fn delete_note(&self, id: &str) -> Result<DeleteNoteResponse, ServiceError> {
        self.execute(|| self.request(Method::DELETE, &["api", "notes", id])).await
    }

    pub async fn bulk_delete(&self, note_ids: Vec<String>) -> Result<BulkDeleteResponse, ServiceError> {
        let body = BulkDeleteNotes { note_ids };
        self.execute(|| self.request(Method::POST, &["api", "notes", "bulk", "delete"]).json(&body))
            .await
    }

    /// Fetches every note and ranks them locally.
    pub async fn search(&self, query: &str) -> Result<SearchResults, ServiceError> {
        let notes = self.list_notes().await?;
        Ok(search_notes(notes, query))
    }

    /// Each segment is percent-encoded, so ids containing `/`, `?` or `#` stay one segment.
    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn execute<T, B>(&self, build: B) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
        B: Fn() -> RequestBuilder,
    {
        let build = &build;
        with_retry(&self.retry, || async move {
            let response = build().send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RequestFailure::Status {
                    status,
                    message: error_message(&body),
                });
            }
            Ok(response.json::<T>().await?)
        })
        .await
    }
}

/// Extracts `message` from an error response body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.to_owned())
}
