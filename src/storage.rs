use crate::api::models::Partner;
use crate::error::Result;
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn default_db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "medihub", "MediHubChat")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

// Caching the doctor directory so the sidebar renders before the API answers
pub struct PartnerCache {
    path: PathBuf,
}

impl PartnerCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let cache = Self { path: path.to_path_buf() };
        cache.conn()?.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS partners (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL,
                specialty TEXT,
                updated_at INTEGER NOT NULL,
                raw_json TEXT
            );
            "#,
        )?;
        Ok(cache)
    }

    fn conn(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.path)
    }

    /// Replace the cached snapshot with `partners`, keeping their order.
    pub fn store_partners(&self, partners: &[Partner], raws: Option<&[serde_json::Value]>) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM partners", [])?;
        for (idx, p) in partners.iter().enumerate() {
            let raw = raws
                .and_then(|r| r.get(idx))
                .and_then(|v| serde_json::to_string(v).ok());
            tx.execute(
                r#"
                INSERT INTO partners (id, position, first_name, last_name, email, specialty, updated_at, raw_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    position=excluded.position,
                    first_name=excluded.first_name,
                    last_name=excluded.last_name,
                    email=excluded.email,
                    specialty=excluded.specialty,
                    updated_at=excluded.updated_at,
                    raw_json=excluded.raw_json
                "#,
                params![p.id, idx as i64, p.first_name, p.last_name, p.email, p.specialty, now, raw],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_partners(&self, limit: Option<usize>) -> Result<Vec<Partner>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, first_name, last_name, email, specialty FROM partners ORDER BY position ASC LIMIT ?1",
        )?;
        let lim = limit.unwrap_or(500) as i64;
        let rows = stmt.query_map(params![lim], |row| {
            Ok(Partner {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
                specialty: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn partner(id: &str, first: &str) -> Partner {
        Partner {
            id: id.into(),
            first_name: first.into(),
            last_name: "Doe".into(),
            email: format!("{}@clinic.test", id),
            specialty: Some("Cardio".into()),
        }
    }

    #[test]
    fn snapshot_round_trips_in_order() {
        let dir = TempDir::new().unwrap();
        let cache = PartnerCache::open(&dir.path().join("nested/cache.sqlite")).unwrap();
        assert!(cache.get_partners(None).unwrap().is_empty());

        let list = vec![partner("d9", "Zoe"), partner("d1", "Ana")];
        cache.store_partners(&list, None).unwrap();
        assert_eq!(cache.get_partners(None).unwrap(), list);
    }

    #[test]
    fn new_snapshot_drops_departed_partners() {
        let dir = TempDir::new().unwrap();
        let cache = PartnerCache::open(&dir.path().join("cache.sqlite")).unwrap();
        cache.store_partners(&[partner("d1", "Ana"), partner("d2", "Leo")], None).unwrap();
        cache.store_partners(&[partner("d2", "Leo")], None).unwrap();
        let ids: Vec<_> = cache.get_partners(Some(10)).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, ["d2"]);
    }
}
