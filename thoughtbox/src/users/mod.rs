use rand::RngCore;
use rusqlite::{named_params, Row};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::{self, DB};

pub mod auth;

pub type UserId = String;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl<'a> TryFrom<&Row<'a>> for User {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParameters {
    pub email: String,
}

/// API tokens are only ever stored as their SHA-256 digest.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Creates a user and returns it together with its API token. The token is not recoverable later.
pub async fn create_user(db: &DB, args: CreateUserParameters) -> db::Result<(User, String)> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let email = args.email.clone();

    let user = db
        .call(move |conn| {
            conn.query_row(
                r#"INSERT INTO users (id, email, token_hash, created_at)
                    VALUES (:id, :email, :token_hash, :created_at)
                    RETURNING id, email, created_at"#,
                named_params! {
                    ":id": Uuid::now_v7().to_string(),
                    ":email": args.email,
                    ":token_hash": token_hash,
                    ":created_at": chrono::Utc::now(),
                },
                |r| User::try_from(r),
            )
            .map_err(|e| e.into())
        })
        .await
        .map_err(db::Error::from)
        .map_err(|e| e.conflict_message(format!("User '{email}' already exists")))?;

    tracing::info!("created user {}", user.id);

    Ok((user, token))
}

pub async fn find_by_token(db: &DB, token: &str) -> db::Result<User> {
    let token_hash = hash_token(token);

    db.call(move |conn| {
        conn.query_row(
            "SELECT id, email, created_at FROM users WHERE token_hash = ?",
            [token_hash],
            |r| User::try_from(r),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message("Unknown API token"))
}
