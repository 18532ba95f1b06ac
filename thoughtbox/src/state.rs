use std::time::Instant;

use axum::extract::FromRef;

use crate::{crypto::FieldCipher, db::DB};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub conn: DB,
    pub cipher: FieldCipher,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(conn: DB, cipher: FieldCipher) -> Self {
        Self {
            conn,
            cipher,
            started_at: Instant::now(),
        }
    }
}
