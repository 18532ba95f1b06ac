use chrono::Utc;
use rusqlite::{params, Row};
use sea_query::{Expr, Iden, Order, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;

use crate::{ctx::BaseParams, db, search, Error, Result};

use super::{
    BulkDeleteNotes, BulkDeleteResponse, CreateNote, DeleteNoteResponse, Note, NoteId, NoteRow, UpdateNote,
};

#[derive(Iden, Clone, Copy)]
pub enum Notes {
    Table,
    Id,
    UserId,
    Type,
    Title,
    Content,
    Color,
    CreatedAt,
    UpdatedAt,
}

impl Notes {
    pub const COLUMNS: [Notes; 8] = {
        use Notes::*;
        [Id, UserId, Type, Title, Content, Color, CreatedAt, UpdatedAt]
    };
}

const NOTE_COLUMNS: &str = "id, user_id, type, title, content, color, created_at, updated_at";

impl<'a> TryFrom<&Row<'a>> for NoteRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            color: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

pub async fn find_notes(BaseParams { db, ctx, cipher }: BaseParams) -> Result<Vec<Note>> {
    let user_id = ctx.user_id().to_owned();

    let rows = db
        .call(move |conn| {
            let (sql, values) = Query::select()
                .columns(Notes::COLUMNS)
                .from(Notes::Table)
                .and_where(Expr::col(Notes::UserId).eq(user_id))
                .order_by(Notes::CreatedAt, Order::Desc)
                .build_rusqlite(SqliteQueryBuilder);

            let rows = conn
                .prepare(&sql)?
                .query_map(&*values.as_params(), |row| NoteRow::try_from(row))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(db::Error::from)?;

    Ok(cipher.decrypt_notes(rows))
}

pub async fn search_notes(query: String, base: BaseParams) -> Result<search::SearchResults> {
    let notes = find_notes(base).await?;
    Ok(search::search_notes(notes, &query))
}

pub async fn get_note(note_id: NoteId, BaseParams { db, ctx, cipher }: BaseParams) -> Result<Note> {
    let user_id = ctx.user_id().to_owned();

    let row = db
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND user_id = ?"),
                params![note_id, user_id],
                |row| NoteRow::try_from(row),
            )
            .map_err(|e| e.into())
        })
        .await
        .map_err(db::Error::from)
        .map_err(|e| e.not_found_message("Note not found"))?;

    Ok(cipher.decrypt_note(row))
}

/// Ids that would be shadowed by static routes under `/api/notes`.
const RESERVED_IDS: [&str; 1] = ["search"];

fn validate_create(args: &CreateNote) -> Result<()> {
    if args.id.trim().is_empty() {
        return Err(Error::validation("id is required"));
    }
    if RESERVED_IDS.contains(&args.id.as_str()) {
        return Err(Error::validation(format!("id `{}` is reserved", args.id)));
    }
    if args.kind.as_str().trim().is_empty() {
        return Err(Error::validation("type is required"));
    }
    if args.content.is_null() {
        return Err(Error::validation("content is required"));
    }
    Ok(())
}

pub async fn create_note(args: CreateNote, BaseParams { db, ctx, cipher }: BaseParams) -> Result<Note> {
    validate_create(&args)?;

    let now = Utc::now();
    let note = Note {
        id: args.id,
        user_id: ctx.user_id().to_owned(),
        kind: args.kind,
        title: args.title.unwrap_or_default(),
        content: args.content,
        color: args.color,
        created_at: now,
        updated_at: now,
        sync_status: None,
    };
    let NoteRow {
        id,
        user_id,
        kind,
        title,
        content,
        color,
        created_at,
        updated_at,
    } = cipher.encrypt_note(&note)?;
    let note_id = id.clone();

    let row = db
        .call(move |conn| {
            conn.query_row(
                &format!(
                    r#"INSERT INTO notes ({NOTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING {NOTE_COLUMNS}"#
                ),
                params![id, user_id, kind, title, content, color, created_at, updated_at],
                |row| NoteRow::try_from(row),
            )
            .map_err(|e| e.into())
        })
        .await
        .map_err(db::Error::from)
        .map_err(|e| e.conflict_message(format!("Note '{note_id}' already exists")))?;

    tracing::debug!("note {} created", row.id);

    Ok(cipher.decrypt_note(row))
}

pub async fn update_note(
    note_id: NoteId,
    UpdateNote {
        kind,
        title,
        content,
        color,
    }: UpdateNote,
    BaseParams { db, ctx, cipher }: BaseParams,
) -> Result<Note> {
    let user_id = ctx.user_id().to_owned();
    let title = title.map(|title| cipher.encrypt(&title)).transpose()?;
    let content = content.map(|content| cipher.encrypt_content(&content)).transpose()?;

    let row = db
        .call(move |conn| {
            conn.query_row(
                &format!(
                    r#"UPDATE notes SET
                        type = coalesce(?, type),
                        title = coalesce(?, title),
                        content = coalesce(?, content),
                        color = coalesce(?, color),
                        updated_at = ?
                    WHERE id = ? AND user_id = ?
                    RETURNING {NOTE_COLUMNS}"#
                ),
                params![kind, title, content, color, Utc::now(), note_id, user_id],
                |row| NoteRow::try_from(row),
            )
            .map_err(|e| e.into())
        })
        .await
        .map_err(db::Error::from)
        .map_err(|e| e.not_found_message("Note not found"))?;

    Ok(cipher.decrypt_note(row))
}

pub async fn delete_note(note_id: NoteId, BaseParams { db, ctx, .. }: BaseParams) -> Result<DeleteNoteResponse> {
    let user_id = ctx.user_id().to_owned();

    let id = db
        .call(move |conn| {
            conn.query_row(
                "DELETE FROM notes WHERE id = ? AND user_id = ? RETURNING id",
                params![note_id, user_id],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| e.into())
        })
        .await
        .map_err(db::Error::from)
        .map_err(|e| e.not_found_message("Note not found"))?;

    Ok(DeleteNoteResponse {
        message: "Note deleted successfully".into(),
        id,
    })
}

/// Deletes the listed notes owned by the caller. Unknown or foreign ids are skipped.
pub async fn bulk_delete_notes(
    BulkDeleteNotes { note_ids }: BulkDeleteNotes,
    BaseParams { db, ctx, .. }: BaseParams,
) -> Result<BulkDeleteResponse> {
    if note_ids.is_empty() {
        return Err(Error::validation("noteIds must be a non-empty array"));
    }

    let user_id = ctx.user_id().to_owned();
    let requested = note_ids.len();

    let deleted_ids = db
        .call(move |conn| {
            let (sql, values) = Query::delete()
                .from_table(Notes::Table)
                .and_where(Expr::col(Notes::UserId).eq(user_id))
                .and_where(Expr::col(Notes::Id).is_in(note_ids))
                .returning_col(Notes::Id)
                .build_rusqlite(SqliteQueryBuilder);

            let ids = conn
                .prepare(&sql)?
                .query_map(&*values.as_params(), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(db::Error::from)?;

    if deleted_ids.len() < requested {
        tracing::debug!("bulk delete removed {} of {requested} notes", deleted_ids.len());
    }

    Ok(BulkDeleteResponse {
        message: format!("Deleted {} notes", deleted_ids.len()),
        deleted_count: deleted_ids.len(),
        deleted_ids,
    })
}
