//! SQLite cache store with vector search via `sqlite-vec`.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use super::CacheStore;
use crate::types::{Article, PathError};

/// Disk-backed cache of articles and embeddings.
///
/// Two tables: `articles` keyed by the requested title, `embeddings` keyed
/// by the embedded text. Vectors are stored as JSON arrays and compared
/// with `vec_distance_cosine`.
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Connection,
}

impl SqliteCacheStore {
    /// Opens (or creates) a cache database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PathError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| PathError::Storage(err.to_string()))?;
        Self::initialize(conn).await
    }

    /// Opens an in-memory cache database, mainly for tests.
    pub async fn open_in_memory() -> Result<Self, PathError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| PathError::Storage(err.to_string()))?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: Connection) -> Result<Self, PathError> {
        conn.call(|conn| -> tokio_rusqlite::Result<()> {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Error)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS articles (
                     key     TEXT PRIMARY KEY,
                     title   TEXT NOT NULL,
                     summary TEXT NOT NULL,
                     links   TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS embeddings (
                     text   TEXT PRIMARY KEY,
                     vector TEXT NOT NULL
                 );",
            )
            .map_err(tokio_rusqlite::Error::Error)?;
            Ok(())
        })
        .await
        .map_err(|err| PathError::Storage(err.to_string()))?;
        Ok(Self { conn })
    }

    fn register_sqlite_vec() -> Result<(), PathError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(PathError::Storage)
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn load_article(&self, key: &str) -> Result<Option<Article>, PathError> {
        let key = key.to_string();
        self.conn
            .call(
                move |conn| -> tokio_rusqlite::Result<Option<(String, String, String)>> {
                    let row = conn
                        .query_row(
                            "SELECT title, summary, links FROM articles WHERE key = ?",
                            [&key],
                            |row| {
                                Ok((
                                    row.get::<_, String>(0)?,
                                    row.get::<_, String>(1)?,
                                    row.get::<_, String>(2)?,
                                ))
                            },
                        )
                        .optional()
                        .map_err(tokio_rusqlite::Error::Error)?;
                    Ok(row)
                },
            )
            .await
            .map_err(|err| PathError::Storage(err.to_string()))?
            .map(|(title, summary, links)| {
                let links: Vec<String> = serde_json::from_str(&links)
                    .map_err(|err| PathError::Storage(err.to_string()))?;
                Ok(Article {
                    title,
                    summary,
                    links,
                })
            })
            .transpose()
    }

    async fn store_article(&self, key: &str, article: &Article) -> Result<(), PathError> {
        let key = key.to_string();
        let title = article.title.clone();
        let summary = article.summary.clone();
        let links = serde_json::to_string(&article.links)
            .map_err(|err| PathError::Storage(err.to_string()))?;
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                conn.execute(
                    "INSERT OR REPLACE INTO articles (key, title, summary, links)
                     VALUES (?, ?, ?, ?)",
                    [&key, &title, &summary, &links],
                )
                .map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err| PathError::Storage(err.to_string()))
    }

    async fn load_embedding(&self, text: &str) -> Result<Option<Vec<f32>>, PathError> {
        let text = text.to_string();
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<Option<String>> {
                let row = conn
                    .query_row(
                        "SELECT vector FROM embeddings WHERE text = ?",
                        [&text],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(row)
            })
            .await
            .map_err(|err| PathError::Storage(err.to_string()))?
            .map(|raw| serde_json::from_str(&raw).map_err(|err| PathError::Storage(err.to_string())))
            .transpose()
    }

    async fn store_embedding(&self, text: &str, vector: &[f32]) -> Result<(), PathError> {
        let text = text.to_string();
        let vector =
            serde_json::to_string(vector).map_err(|err| PathError::Storage(err.to_string()))?;
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                conn.execute(
                    "INSERT OR REPLACE INTO embeddings (text, vector) VALUES (?, ?)",
                    [&text, &vector],
                )
                .map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err| PathError::Storage(err.to_string()))
    }

    async fn nearest(
        &self,
        query: &[f32],
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<String>, PathError> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query_json =
            serde_json::to_string(query).map_err(|err| PathError::Storage(err.to_string()))?;
        let candidates_json =
            serde_json::to_string(candidates).map_err(|err| PathError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<Vec<String>> {
                let mut stmt = conn
                    .prepare(
                        "SELECT e.text,
                                vec_distance_cosine(vec_f32(e.vector), vec_f32(?1)) AS distance
                         FROM embeddings e
                         JOIN json_each(?2) c ON e.text = c.value
                         ORDER BY distance ASC
                         LIMIT ?3",
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;

                let rows = stmt
                    .query_map((&query_json, &candidates_json, top_k as i64), |row| {
                        row.get::<_, String>(0)
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| PathError::Storage(err.to_string()))
    }
}
