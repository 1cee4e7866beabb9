use crate::app_dirs::AppDirs;
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::{Path, PathBuf};

/// The single persisted number: best score across games
#[derive(Debug)]
pub struct HighScoreDb {
    conn: Connection,
}

impl HighScoreDb {
    /// Open the database at the default state location
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("voxsnake_scores.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {e}")),
                )
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS high_score (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                score INTEGER NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        Ok(HighScoreDb { conn })
    }

    pub fn get(&self) -> Result<u32> {
        let score: Option<u32> = self
            .conn
            .query_row("SELECT score FROM high_score WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(score.unwrap_or(0))
    }

    /// Store `score` if it beats the current record; returns whether it did
    pub fn submit(&self, score: u32) -> Result<bool> {
        if score <= self.get()? {
            return Ok(false);
        }
        self.conn.execute(
            r#"
            INSERT INTO high_score (id, score) VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET score = excluded.score, updated_at = CURRENT_TIMESTAMP
            "#,
            params![score],
        )?;
        tracing::info!(score, "new high score");
        Ok(true)
    }

    pub fn reset(&self) -> Result<()> {
        self.conn.execute("DELETE FROM high_score", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_database_reports_zero() {
        let dir = tempdir().unwrap();
        let db = HighScoreDb::open(dir.path().join("scores.db")).unwrap();
        assert_eq!(db.get().unwrap(), 0);
    }

    #[test]
    fn only_better_scores_are_kept() {
        let dir = tempdir().unwrap();
        let db = HighScoreDb::open(dir.path().join("scores.db")).unwrap();
        assert!(db.submit(40).unwrap());
        assert!(!db.submit(30).unwrap());
        assert!(!db.submit(40).unwrap());
        assert!(db.submit(70).unwrap());
        assert_eq!(db.get().unwrap(), 70);
    }

    #[test]
    fn record_survives_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("scores.db");
        {
            let db = HighScoreDb::open(&path).unwrap();
            db.submit(120).unwrap();
        }
        let db = HighScoreDb::open(&path).unwrap();
        assert_eq!(db.get().unwrap(), 120);
    }

    #[test]
    fn reset_clears_the_record() {
        let dir = tempdir().unwrap();
        let db = HighScoreDb::open(dir.path().join("scores.db")).unwrap();
        db.submit(10).unwrap();
        db.reset().unwrap();
        assert_eq!(db.get().unwrap(), 0);
        assert!(db.submit(5).unwrap());
    }
}
