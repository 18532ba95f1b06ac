use rusqlite::params;
use serde::Serialize;
use serde_json::Value;

use crate::{
    crypto::{is_sealed, looks_like_legacy_envelope, CryptoError, FieldCipher},
    db::{self, DB},
};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: usize,
    /// Rows whose title and content were already sealed.
    pub skipped: usize,
    pub failed: usize,
}

/// Encrypts every note row still holding plaintext. Only `title` and `content` are rewritten;
/// a failing row is logged and left as-is.
pub async fn encrypt_legacy_notes(db: &DB, cipher: FieldCipher) -> db::Result<MigrationReport> {
    let report = db
        .call(move |conn| {
            let rows = conn
                .prepare("SELECT id, title, content FROM notes")?
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut report = MigrationReport::default();
            for (id, title, content) in rows {
                if (title.is_empty() || is_sealed(&title)) && is_sealed(&content) {
                    report.skipped += 1;
                    continue;
                }

                match seal_row(conn, &cipher, &id, &title, &content) {
                    Ok(()) => report.migrated += 1,
                    Err(error) => {
                        tracing::error!("failed to encrypt note {id}: {error}");
                        report.failed += 1;
                    }
                }
            }

            Ok(report)
        })
        .await?;

    tracing::info!(
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        "note encryption finished"
    );

    Ok(report)
}

fn seal_row(
    conn: &rusqlite::Connection,
    cipher: &FieldCipher,
    id: &str,
    title: &str,
    content: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let title = if is_sealed(title) {
        title.to_owned()
    } else {
        cipher.encrypt(&unseal_legacy(cipher, title)?)?
    };

    let content = if is_sealed(content) {
        content.to_owned()
    } else {
        let plaintext = unseal_legacy(cipher, content)?;
        let value = serde_json::from_str::<Value>(&plaintext).unwrap_or(Value::String(plaintext));
        cipher.encrypt_content(&value)?
    };

    conn.execute(
        "UPDATE notes SET title = ?, content = ? WHERE id = ?",
        params![title, content, id],
    )?;
    Ok(())
}

/// Recovers the plaintext of an untagged legacy envelope; other values are already plaintext.
fn unseal_legacy(cipher: &FieldCipher, value: &str) -> Result<String, CryptoError> {
    if looks_like_legacy_envelope(value) {
        cipher.try_decrypt(value)
    } else {
        Ok(value.to_owned())
    }
}
