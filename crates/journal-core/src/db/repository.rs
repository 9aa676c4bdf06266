//! Entry repository implementation

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::models::{Entry, EntryId, Mood};
use libsql::{Connection, Row, Value};

const ENTRY_COLUMNS: &str = "id, title, content, date, mood_level, image_uri, location";

/// What a keyed merge did to the local table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Rows inserted or overwritten from the snapshot
    pub upserted: usize,
    /// Local rows removed because the snapshot no longer has them
    pub deleted: usize,
    /// Rows already identical to the snapshot
    pub unchanged: usize,
    /// Ids left alone because a local write for them is still in flight
    pub skipped: usize,
}

/// libSQL data access for the `entries` table
pub struct LibSqlEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// All entries, newest date first
    pub async fn list(&self) -> Result<Vec<Entry>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries ORDER BY date DESC, id DESC"),
                (),
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(parse_entry(&row)?);
        }
        Ok(entries)
    }

    /// Get an entry by ID
    pub async fn get(&self, id: EntryId) -> Result<Option<Entry>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"),
                vec![Value::Integer(id.get())],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// Number of stored entries
    pub async fn count(&self) -> Result<usize> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM entries", ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid row count {count}")))
    }

    /// Insert an entry and return it with its identifier.
    ///
    /// An entry that already carries an id replaces any row with that id;
    /// otherwise the table assigns the next one.
    pub async fn insert(&self, entry: &Entry) -> Result<Entry> {
        let id = match entry.id {
            Some(id) => {
                let mut params = vec![Value::Integer(id.get())];
                params.extend(field_values(entry));
                self.conn
                    .execute(
                        "INSERT OR REPLACE INTO entries
                         (id, title, content, date, mood_level, image_uri, location)
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                        params,
                    )
                    .await?;
                id
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO entries
                         (title, content, date, mood_level, image_uri, location)
                         VALUES (?, ?, ?, ?, ?, ?)",
                        field_values(entry),
                    )
                    .await?;
                EntryId::new(self.conn.last_insert_rowid())
            }
        };

        let mut saved = entry.clone();
        saved.id = Some(id);
        Ok(saved)
    }

    /// Overwrite every field of an existing entry
    pub async fn update(&self, entry: &Entry) -> Result<Entry> {
        let id = entry
            .id
            .ok_or_else(|| Error::InvalidInput("cannot update an entry without an id".into()))?;

        let mut params = field_values(entry);
        params.push(Value::Integer(id.get()));

        let rows = self
            .conn
            .execute(
                "UPDATE entries
                 SET title = ?, content = ?, date = ?, mood_level = ?, image_uri = ?, location = ?
                 WHERE id = ?",
                params,
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(entry.clone())
    }

    /// Delete an entry
    pub async fn delete(&self, id: EntryId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM entries WHERE id = ?",
                vec![Value::Integer(id.get())],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    /// Delete every row, then insert `entries`, in one transaction
    pub async fn replace_all(&self, entries: &[Entry]) -> Result<usize> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = self.replace_all_inner(entries).await;
        self.finish_transaction(result).await
    }

    async fn replace_all_inner(&self, entries: &[Entry]) -> Result<usize> {
        self.conn.execute("DELETE FROM entries", ()).await?;
        for entry in entries {
            self.insert(entry).await?;
        }
        self.count().await
    }

    /// Reconcile the table with `entries` by id, in one transaction.
    ///
    /// Incoming entries are upserted and local rows missing from `entries`
    /// are deleted, except for ids in `protected`, which are not touched at
    /// all. Entries without an id are ignored.
    pub async fn merge_snapshot(
        &self,
        entries: &[Entry],
        protected: &HashSet<EntryId>,
    ) -> Result<MergeSummary> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = self.merge_snapshot_inner(entries, protected).await;
        self.finish_transaction(result).await
    }

    async fn merge_snapshot_inner(
        &self,
        entries: &[Entry],
        protected: &HashSet<EntryId>,
    ) -> Result<MergeSummary> {
        let current = self
            .list()
            .await?
            .into_iter()
            .filter_map(|entry| entry.id.map(|id| (id, entry)))
            .collect::<HashMap<_, _>>();

        let mut summary = MergeSummary::default();
        let mut incoming_ids = HashSet::new();

        for entry in entries {
            let Some(id) = entry.id else {
                continue;
            };
            incoming_ids.insert(id);

            if protected.contains(&id) {
                summary.skipped += 1;
            } else if current.get(&id) == Some(entry) {
                summary.unchanged += 1;
            } else {
                self.insert(entry).await?;
                summary.upserted += 1;
            }
        }

        for id in current.keys() {
            if incoming_ids.contains(id) {
                continue;
            }
            if protected.contains(id) {
                summary.skipped += 1;
                continue;
            }
            self.delete(*id).await?;
            summary.deleted += 1;
        }

        Ok(summary)
    }

    async fn finish_transaction<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }
}

/// Bind values for title..location, in column order
fn field_values(entry: &Entry) -> Vec<Value> {
    vec![
        Value::Text(entry.title.clone()),
        Value::Text(entry.content.clone()),
        Value::Text(entry.date.clone()),
        entry
            .mood
            .map_or(Value::Null, |mood| Value::Integer(mood.level())),
        optional_text_value(entry.image_uri.as_deref()),
        optional_text_value(entry.location.as_deref()),
    ]
}

fn optional_text_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

/// Parse an entry from a row selected with `ENTRY_COLUMNS`
fn parse_entry(row: &Row) -> Result<Entry> {
    let mood = match row.get_value(4)? {
        Value::Integer(level) => Mood::from_level(level),
        _ => None,
    };

    Ok(Entry {
        id: Some(EntryId::new(row.get::<i64>(0)?)),
        title: row.get::<String>(1)?,
        content: row.get::<String>(2)?,
        date: row.get::<String>(3)?,
        mood,
        image_uri: optional_text(row, 5)?,
        location: optional_text(row, 6)?,
    })
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Database(format!(
            "column {idx}: expected text or NULL, found {other:?}"
        ))),
    }
}
