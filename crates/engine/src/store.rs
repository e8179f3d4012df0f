//! Dataset fetching and the on-disk SQLite cache.
//!
//! Datasets are fetched fresh on every startup so the planner tracks the
//! upstream extracts; each successful fetch also lands in a local SQLite
//! cache, which serves as the fallback when the network is down and as the
//! only source in offline mode.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::catalog::{self, SourceConfig, REQUIRED_DATASETS};

#[derive(Debug, Clone)]
pub struct DatasetCache {
    db_path: PathBuf,
}

/// One cached dataset row, exactly as stored.
#[derive(Debug, Clone)]
pub struct CachedDataset {
    pub name: String,
    pub url: String,
    pub body: String,
    pub content_hash: String,
    pub fetched_at: String,
}

impl DatasetCache {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create cache dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open cache db: {}", path.display()))?;

        // Durable + fast defaults.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn)?;
        Ok(conn)
    }

    pub fn get(&self, name: &str) -> anyhow::Result<Option<CachedDataset>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT name, url, body, content_hash, fetched_at FROM datasets WHERE name = ?1",
                [name],
                |row| {
                    Ok(CachedDataset {
                        name: row.get(0)?,
                        url: row.get(1)?,
                        body: row.get(2)?,
                        content_hash: row.get(3)?,
                        fetched_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("read cached dataset {name}"))?;
        Ok(row)
    }

    /// Upserts one dataset body and returns its content hash.
    pub fn put(&self, name: &str, url: &str, body: &str) -> anyhow::Result<String> {
        let conn = self.open()?;
        let hash = content_hash(body);
        let fetched_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        conn.execute(
            "INSERT INTO datasets (name, url, body, content_hash, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
               url = excluded.url,
               body = excluded.body,
               content_hash = excluded.content_hash,
               fetched_at = excluded.fetched_at",
            (name, url, body, &hash, &fetched_at),
        )
        .with_context(|| format!("cache dataset {name}"))?;
        Ok(hash)
    }
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS datasets (
  name TEXT PRIMARY KEY,
  url TEXT NOT NULL,
  body TEXT NOT NULL,
  content_hash TEXT NOT NULL,
  fetched_at TEXT NOT NULL
);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    Ok(())
}

pub fn content_hash(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Fetches datasets over HTTP with the cache as fallback. In offline mode
/// the network is never touched and the cache is the only source.
pub struct DatasetFetcher {
    client: reqwest::Client,
    source: SourceConfig,
    cache: Option<DatasetCache>,
    offline: bool,
}

impl DatasetFetcher {
    pub fn new(source: SourceConfig, cache: Option<DatasetCache>, offline: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            source,
            cache,
            offline,
        }
    }

    pub async fn fetch(&self, name: &str) -> anyhow::Result<Value> {
        if !catalog::is_known(name) {
            bail!("unknown dataset: {name}");
        }
        if self.offline {
            return self.from_cache(name);
        }
        let url = self.source.url_for(name);
        match self.fetch_remote(name, &url).await {
            Ok(value) => Ok(value),
            Err(err) => match self.from_cache(name) {
                Ok(value) => {
                    warn!(dataset = name, error = %err, "fetch failed; using cached copy");
                    Ok(value)
                }
                Err(_) => Err(err),
            },
        }
    }

    async fn fetch_remote(&self, name: &str, url: &str) -> anyhow::Result<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("fetch dataset {name} from {url}"))?;
        let body = response
            .text()
            .await
            .with_context(|| format!("read dataset {name}"))?;
        let value = parse_dataset(name, &body)?;
        if let Some(cache) = &self.cache {
            let previous = cache.get(name)?.map(|c| c.content_hash);
            let hash = cache.put(name, url, &body)?;
            if previous.as_deref() == Some(hash.as_str()) {
                debug!(dataset = name, "dataset unchanged");
            } else {
                info!(dataset = name, hash = %&hash[..12], "dataset updated");
            }
        }
        Ok(value)
    }

    fn from_cache(&self, name: &str) -> anyhow::Result<Value> {
        let Some(cache) = &self.cache else {
            bail!("no dataset cache configured");
        };
        let Some(cached) = cache.get(name)? else {
            bail!(
                "dataset {name} not cached at {}",
                cache.db_path().display()
            );
        };
        parse_dataset(name, &cached.body)
    }
}

fn parse_dataset(name: &str, body: &str) -> anyhow::Result<Value> {
    let value: Value =
        serde_json::from_str(body).with_context(|| format!("parse dataset {name}"))?;
    if !value.is_object() {
        bail!("dataset {name} is not a JSON object");
    }
    Ok(value)
}

/// The loaded datasets, keyed by name. Downstream builders take this by
/// reference; missing names are a hard error rather than an empty table so
/// a partial load never masquerades as "no data upstream".
#[derive(Debug, Clone, Default)]
pub struct DatasetBundle {
    values: BTreeMap<String, Value>,
}

impl DatasetBundle {
    pub async fn load(fetcher: &DatasetFetcher) -> anyhow::Result<Self> {
        let mut bundle = Self::default();
        for name in REQUIRED_DATASETS {
            let value = fetcher.fetch(name).await?;
            let rows = value.as_object().map(|m| m.len()).unwrap_or(0);
            debug!(dataset = *name, rows, "dataset loaded");
            bundle.insert(*name, value);
        }
        Ok(bundle)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> anyhow::Result<&Value> {
        self.values
            .get(name)
            .with_context(|| format!("dataset {name} not loaded"))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Iterates the row objects of a dataset. Upstream tables are JSON objects
/// keyed by row id; anything else yields nothing.
pub(crate) fn rows(dataset: &Value) -> impl Iterator<Item = &serde_json::Map<String, Value>> {
    dataset
        .as_object()
        .into_iter()
        .flat_map(|map| map.values())
        .filter_map(Value::as_object)
}

pub(crate) fn field_i64(row: &serde_json::Map<String, Value>, key: &str) -> i64 {
    row.get(key).and_then(value_i64).unwrap_or(0)
}

pub(crate) fn field_u64(row: &serde_json::Map<String, Value>, key: &str) -> u64 {
    row.get(key).and_then(value_u64).unwrap_or(0)
}

pub(crate) fn field_f64(row: &serde_json::Map<String, Value>, key: &str) -> f64 {
    row.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

pub(crate) fn field_str<'a>(row: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

// The extracts are not strict about number types, so accept floats where an
// integer is expected.
fn value_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn value_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_f64().map(|f| f as u64))
}
