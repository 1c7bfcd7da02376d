//! Sqlite-backed persistence: settings and the resolved-document cache.

use std::path::Path;

use anyhow::Context as _;
use bunko_core::{CachedDocument, DocumentCache, Resolved, Settings, Strategy};
use rusqlite::{Connection, OptionalExtension as _};

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        let defaults = Settings::default();
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                catalog_url TEXT NOT NULL DEFAULT '',
                listing_url TEXT NOT NULL DEFAULT '',
                document_url TEXT NOT NULL DEFAULT '',
                user_agent TEXT NOT NULL DEFAULT '',
                request_timeout_secs INTEGER NOT NULL DEFAULT 30
            );
            INSERT OR IGNORE INTO settings (id) VALUES (1);

            CREATE TABLE IF NOT EXISTS documents (
                collection_id TEXT NOT NULL,
                nominal_file_id TEXT NOT NULL,
                resource_name TEXT NOT NULL,
                strategy TEXT NOT NULL,
                raw BLOB NOT NULL,
                fetched_at INTEGER NOT NULL DEFAULT (unixepoch()),
                PRIMARY KEY (collection_id, nominal_file_id)
            );
            "#,
        )?;

        self.add_settings_column(
            "listing_ttl_secs",
            &format!("INTEGER NOT NULL DEFAULT {}", defaults.listing_ttl_secs),
        )?;
        self.add_settings_column(
            "proximity_window",
            &format!("INTEGER NOT NULL DEFAULT {}", defaults.proximity_window),
        )?;
        self.add_settings_column(
            "metadata_scan_lines",
            &format!("INTEGER NOT NULL DEFAULT {}", defaults.metadata_scan_lines),
        )?;
        self.add_settings_column(
            "author_max_chars",
            &format!("INTEGER NOT NULL DEFAULT {}", defaults.author_max_chars),
        )?;
        self.add_settings_column("cache_documents", "INTEGER NOT NULL DEFAULT 1")?;

        Ok(())
    }

    fn add_settings_column(&self, column: &str, definition: &str) -> anyhow::Result<()> {
        let sql = format!("ALTER TABLE settings ADD COLUMN {column} {definition}");
        match self.conn.execute(&sql, []) {
            Ok(_) => Ok(()),
            Err(err) => {
                let msg = err.to_string();
                if msg.contains("duplicate column name") {
                    Ok(())
                } else {
                    Err(err).with_context(|| format!("add settings.{column} column"))
                }
            }
        }
    }

    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let row = self
            .conn
            .query_row(
                "SELECT catalog_url, listing_url, document_url, user_agent, request_timeout_secs, listing_ttl_secs, proximity_window, metadata_scan_lines, author_max_chars, cache_documents FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(Settings {
                        catalog_url: row.get(0)?,
                        listing_url: row.get(1)?,
                        document_url: row.get(2)?,
                        user_agent: row.get(3)?,
                        request_timeout_secs: unsigned(row.get(4)?),
                        listing_ttl_secs: unsigned(row.get(5)?),
                        proximity_window: u32::try_from(row.get::<_, i64>(6)?).unwrap_or(10),
                        metadata_scan_lines: usize::try_from(row.get::<_, i64>(7)?).unwrap_or(10),
                        author_max_chars: usize::try_from(row.get::<_, i64>(8)?).unwrap_or(50),
                        cache_documents: row.get::<_, i64>(9)? != 0,
                    })
                },
            )
            .optional()?;

        let mut settings = row.unwrap_or_default();
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();

        self.conn.execute(
            "UPDATE settings SET catalog_url = ?, listing_url = ?, document_url = ?, user_agent = ?, request_timeout_secs = ?, listing_ttl_secs = ?, proximity_window = ?, metadata_scan_lines = ?, author_max_chars = ?, cache_documents = ? WHERE id = 1",
            rusqlite::params![
                settings.catalog_url,
                settings.listing_url,
                settings.document_url,
                settings.user_agent,
                signed("request_timeout_secs", settings.request_timeout_secs)?,
                signed("listing_ttl_secs", settings.listing_ttl_secs)?,
                i64::from(settings.proximity_window),
                signed("metadata_scan_lines", settings.metadata_scan_lines)?,
                signed("author_max_chars", settings.author_max_chars)?,
                i64::from(settings.cache_documents),
            ],
        )?;
        Ok(())
    }

    pub fn load_document(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
    ) -> anyhow::Result<Option<CachedDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT resource_name, strategy, raw FROM documents WHERE collection_id = ? AND nominal_file_id = ?",
                (collection_id, nominal_file_id),
                |row| {
                    let resource_name: String = row.get(0)?;
                    let strategy: String = row.get(1)?;
                    let raw: Vec<u8> = row.get(2)?;
                    Ok((resource_name, strategy, raw))
                },
            )
            .optional()
            .with_context(|| format!("load cached document {collection_id}/{nominal_file_id}"))?;

        let Some((resource_name, strategy, raw_bytes)) = row else {
            return Ok(None);
        };
        let strategy = strategy
            .parse::<Strategy>()
            .map_err(|err| anyhow::anyhow!("{err}: {strategy}"))?;
        Ok(Some(CachedDocument {
            resource_name,
            strategy,
            raw_bytes,
        }))
    }

    pub fn save_document(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
        resolved: &Resolved,
    ) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
            INSERT INTO documents (collection_id, nominal_file_id, resource_name, strategy, raw, fetched_at)
            VALUES (?, ?, ?, ?, ?, unixepoch())
            ON CONFLICT(collection_id, nominal_file_id) DO UPDATE SET
                resource_name = excluded.resource_name,
                strategy = excluded.strategy,
                raw = excluded.raw,
                fetched_at = excluded.fetched_at
            "#,
                (
                    collection_id,
                    nominal_file_id,
                    &resolved.resource_name,
                    resolved.strategy.as_str(),
                    &resolved.raw_bytes,
                ),
            )
            .with_context(|| format!("cache document {collection_id}/{nominal_file_id}"))?;
        tracing::debug!(
            collection = collection_id,
            nominal = nominal_file_id,
            resource = %resolved.resource_name,
            bytes = resolved.raw_bytes.len(),
            "document cached"
        );
        Ok(())
    }

    pub fn count_documents(&self) -> anyhow::Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Drops every cached document; returns how many were removed.
    pub fn clear_documents(&self) -> anyhow::Result<usize> {
        let removed = self.conn.execute("DELETE FROM documents", [])?;
        Ok(removed)
    }
}

impl DocumentCache for Storage {
    fn lookup(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
    ) -> anyhow::Result<Option<CachedDocument>> {
        self.load_document(collection_id, nominal_file_id)
    }

    fn store(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
        resolved: &Resolved,
    ) -> anyhow::Result<()> {
        self.save_document(collection_id, nominal_file_id, resolved)
    }
}

fn unsigned(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn signed<T>(column: &str, value: T) -> anyhow::Result<i64>
where
    T: TryInto<i64> + Copy + std::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| anyhow::anyhow!("settings.{column} out of range: {value}"))
}
