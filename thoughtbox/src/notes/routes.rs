use crate::{
    ctx::BaseParams,
    openapi::{
        aide::{
            axum::{
                routing::{get, post},
                ApiRouter, IntoApiResponse,
            },
            NoApi,
        },
        Json, Path, Query,
    },
    search::SearchResults,
    state::AppState,
};
use axum::http::StatusCode;

use schemars::JsonSchema;

use serde::Deserialize;

use super::{BulkDeleteNotes, CreateNote, Note, NoteId, SearchQuery, UpdateNote};

use super::handlers;

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: NoteId,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/notes",
            get(find_notes).post_with(create_note, |t| t.response::<201, Json<Note>>()),
        )
        .api_route("/api/notes/search", get(search_notes))
        .api_route("/api/notes/bulk/delete", post(bulk_delete_notes))
        .api_route(
            "/api/notes/{note_id}",
            get(get_note).put(update_note).delete(delete_note),
        )
        .with_state(state)
}

async fn find_notes(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::find_notes(base).await.map(Json)
}

async fn search_notes(
    Query(SearchQuery { q }): Query<SearchQuery>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::search_notes(q, base).await.map(Json::<SearchResults>)
}

async fn create_note(NoApi(base): NoApi<BaseParams>, Json(args): Json<CreateNote>) -> impl IntoApiResponse {
    handlers::create_note(args, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn get_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::get_note(note_id, base).await.map(Json)
}

async fn update_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<UpdateNote>,
) -> impl IntoApiResponse {
    handlers::update_note(note_id, args, base).await.map(Json)
}

async fn delete_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::delete_note(note_id, base).await.map(Json)
}

async fn bulk_delete_notes(NoApi(base): NoApi<BaseParams>, Json(args): Json<BulkDeleteNotes>) -> impl IntoApiResponse {
    handlers::bulk_delete_notes(args, base).await.map(Json)
}
