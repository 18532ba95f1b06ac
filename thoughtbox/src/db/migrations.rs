use lazy_static::lazy_static;
use rusqlite_migration::{Migrations, M};

lazy_static! {
    pub static ref MIGRATIONS: Migrations<'static> = Migrations::new(vec![
        M::up(
            r#"
            CREATE TABLE users (
                id TEXT PRIMARY KEY NOT NULL,
                email TEXT NOT NULL UNIQUE,
                token_hash TEXT NOT NULL UNIQUE,
                created_at DATETIME NOT NULL
            );
        "#
        ),
        M::up(
            r#"
            CREATE TABLE notes (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,

                type TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL,
                color TEXT,

                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,

                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE INDEX idx_notes_user_id ON notes (user_id);
            CREATE INDEX idx_notes_created_at ON notes (created_at DESC);
        "#
        ),
    ]);
}
