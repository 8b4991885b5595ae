//! The `Hero` model and its store.

use crate::error::StoreError;
use crate::orm::{BoxFuture, Db, Migration, Model};
use log::debug;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;

/// A persisted hero row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Hero {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub version: i64,
}

/// A hero as received in a request body. The id and version are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl HeroDraft {
    pub fn named(name: impl Into<String>) -> Self {
        HeroDraft {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl From<&Hero> for HeroDraft {
    fn from(hero: &Hero) -> Self {
        HeroDraft {
            id: Some(hero.id),
            name: hero.name.clone(),
            version: Some(hero.version),
        }
    }
}

#[async_trait::async_trait]
impl Model for Hero {
    fn table_name() -> &'static str {
        "toh_heroes"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS toh_heroes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".into(), "INTEGER PRIMARY KEY AUTOINCREMENT".into()),
            ("name".into(), "TEXT NOT NULL DEFAULT ''".into()),
            ("version".into(), "INTEGER NOT NULL DEFAULT 0".into()),
        ]
    }
}

fn migrate_heroes(db: Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>> {
    Hero::migrate(db)
}

inventory::submit! {
    Migration(migrate_heroes)
}

/// Escape `LIKE` wildcards so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Single-row operations against the `toh_heroes` table.
///
/// Cheap to clone; every query takes its own connection from the pool.
#[derive(Clone)]
pub struct HeroStore {
    db: Arc<Db>,
}

impl HeroStore {
    pub fn new(db: Arc<Db>) -> Self {
        HeroStore { db }
    }

    pub async fn list(&self) -> Result<Vec<Hero>, StoreError> {
        let heroes = sqlx::query_as::<_, Hero>(
            "SELECT id, name, version FROM toh_heroes ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;
        debug!("Listed {} heroes", heroes.len());
        Ok(heroes)
    }

    pub async fn get(&self, id: i64) -> Result<Hero, StoreError> {
        sqlx::query_as::<_, Hero>("SELECT id, name, version FROM toh_heroes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    /// Heroes whose name contains `term`, following SQLite's `LIKE` collation.
    pub async fn search(&self, term: &str) -> Result<Vec<Hero>, StoreError> {
        let heroes = sqlx::query_as::<_, Hero>(
            "SELECT id, name, version FROM toh_heroes \
             WHERE name LIKE ? ESCAPE '\\' ORDER BY id",
        )
        .bind(like_pattern(term))
        .fetch_all(self.db.pool())
        .await?;
        debug!("Search {:?} matched {} heroes", term, heroes.len());
        Ok(heroes)
    }

    /// Insert a new row. The store assigns the id; any draft id is ignored.
    pub async fn create(&self, draft: &HeroDraft) -> Result<Hero, StoreError> {
        let hero = sqlx::query_as::<_, Hero>(
            "INSERT INTO toh_heroes (name) VALUES (?) RETURNING id, name, version",
        )
        .bind(&draft.name)
        .fetch_one(self.db.pool())
        .await?;
        debug!("Created hero id={}", hero.id);
        Ok(hero)
    }

    /// Replace the name of hero `id`.
    ///
    /// The write is one atomic statement. With `expected_version` set it only
    /// succeeds if the stored version still matches, otherwise it reports a
    /// conflict; without one the last writer wins.
    pub async fn update(
        &self,
        id: i64,
        name: &str,
        expected_version: Option<i64>,
    ) -> Result<Hero, StoreError> {
        let updated = sqlx::query_as::<_, Hero>(
            "UPDATE toh_heroes SET name = ?1, version = version + 1 \
             WHERE id = ?2 AND (?3 IS NULL OR version = ?3) \
             RETURNING id, name, version",
        )
        .bind(name)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(hero) = updated {
            debug!("Updated hero id={} to version {}", id, hero.version);
            return Ok(hero);
        }

        // No row written: either it is gone or its version moved on.
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM toh_heroes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        match exists {
            Some(_) => Err(StoreError::Conflict { id }),
            None => Err(StoreError::NotFound(id)),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM toh_heroes WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!("Deleted hero id={}", id);
        Ok(())
    }
}
