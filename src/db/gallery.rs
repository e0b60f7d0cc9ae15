use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::FaceError;
use crate::models::identity::IdentityRecord;

/// Keyed embedding gallery backed by the `usuarios` table.
///
/// All operations go through a single connection behind a mutex, so mutations
/// are globally serialized per store instance; concurrent upsert/delete on one
/// name always lands in one of the two well-defined final states. `upsert` and
/// `delete` touch exactly one row, never the whole gallery.
#[derive(Clone)]
pub struct GalleryStore {
    conn: Arc<Mutex<Connection>>,
}

impl GalleryStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Every enrolled record, in insertion order. Records whose stored blob
    /// cannot be decoded are skipped with a warning.
    pub fn list(&self) -> Result<Vec<IdentityRecord>, FaceError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT nombre, embedding_blob FROM usuarios ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (name, blob) = row?;
            match decode_embedding_blob(&blob) {
                Ok(embedding) => out.push(IdentityRecord { name, embedding }),
                Err(e) => {
                    tracing::warn!("failed to decode embedding for {}: {}", name, e);
                    continue;
                }
            }
        }
        Ok(out)
    }

    pub fn list_names(&self) -> Result<Vec<String>, FaceError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT nombre FROM usuarios ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Insert or replace the record for `name`. Last write wins; re-enrolling
    /// a name never duplicates it.
    pub fn upsert(&self, name: &str, embedding: &[f32]) -> Result<(), FaceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FaceError::Validation("nombre must not be empty".into()));
        }
        if embedding.is_empty() {
            return Err(FaceError::Validation("embedding must not be empty".into()));
        }

        let conn = self.conn.lock();
        // All embeddings in a gallery share the dimensionality fixed by the
        // extractor model; reject anything that disagrees with the rest.
        let established: Option<i64> = conn
            .query_row(
                "SELECT dim FROM usuarios WHERE nombre != ?1 LIMIT 1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(dim) = established {
            if dim != embedding.len() as i64 {
                return Err(FaceError::Validation(format!(
                    "embedding dim {} does not match gallery dim {}",
                    embedding.len(),
                    dim
                )));
            }
        }

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO usuarios (nombre, embedding_blob, dim, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(nombre) DO UPDATE SET
               embedding_blob = excluded.embedding_blob,
               dim = excluded.dim,
               updated_at = excluded.updated_at",
            params![name, encode_embedding(embedding), embedding.len() as i64, now],
        )?;
        Ok(())
    }

    /// Remove the record for `name`. Deleting a missing name is a silent
    /// success; the return value says whether a row actually went away.
    pub fn delete(&self, name: &str) -> Result<bool, FaceError> {
        let conn = self.conn.lock();
        let affected = conn.execute("DELETE FROM usuarios WHERE nombre = ?1", params![name])?;
        Ok(affected > 0)
    }

    pub fn count(&self) -> Result<i64, FaceError> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM usuarios", [], |r| r.get(0))?;
        Ok(n)
    }
}

pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding_blob(blob: &[u8]) -> anyhow::Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        anyhow::bail!("embedding blob length is not a multiple of 4");
    }
    let mut embedding = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        let bytes: [u8; 4] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        embedding.push(f32::from_le_bytes(bytes));
    }
    Ok(embedding)
}
