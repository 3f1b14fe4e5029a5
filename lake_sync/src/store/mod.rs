//! Columnar table store backing all three lake layers.
//!
//! On-disk layout under the lake root:
//!
//! ```text
//! bronze/<entity>/ingest_date=YYYY-MM-DD/part-<uuid>.feather   append-only
//! silver/<entity>/v00001.feather, v00002.feather, _CURRENT     snapshots
//! gold/<entity>/...                                            snapshots
//! ```
//!
//! Bronze files are immutable once renamed into place. Silver and Gold are
//! versioned full snapshots: a write lands as a staged temp file, is renamed
//! to the next `vNNNNN.feather`, and only then does the `_CURRENT` pointer
//! move (also via temp-write + rename). Readers that follow `_CURRENT` never
//! observe a torn table, and a crash mid-write leaves the previous version
//! intact.

pub mod frame;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{COL_INGESTED_AT, EntityType, Record, composite_key};

pub use frame::{frame_to_records, records_to_frame};

const CURRENT_POINTER: &str = "_CURRENT";

/// Lake layer selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Append-only raw partitions.
    Bronze,
    /// Canonical merged tables.
    Silver,
    /// Analysis-ready curated tables.
    Gold,
}

impl Layer {
    /// Directory name under the lake root.
    pub fn dir(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

/// Table-store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure with the path involved.
    #[error("io error at {path}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Frame encode/decode failure.
    #[error(transparent)]
    Polars(#[from] PolarsError),

    /// A stored column has a dtype the row model cannot carry.
    #[error("unsupported dtype {dtype} in column {column}")]
    UnsupportedDtype {
        /// Offending column.
        column: String,
        /// Its dtype.
        dtype: String,
    },

    /// On-disk metadata does not parse.
    #[error("corrupt table metadata at {path}: {message}")]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_feather(path: &Path, rows: &[Record]) -> Result<(), StoreError> {
    let mut df = records_to_frame(rows)?;
    let file = File::create(path).map_err(io_err(path))?;
    IpcWriter::new(file).finish(&mut df)?;
    Ok(())
}

fn read_feather(path: &Path) -> Result<Vec<Record>, StoreError> {
    let file = File::open(path).map_err(io_err(path))?;
    let df = IpcReader::new(file).finish()?;
    frame_to_records(&df)
}

/// Outcome of a key-based snapshot upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// Keys added to the table.
    pub inserted: usize,
    /// Keys whose row was replaced.
    pub updated: usize,
}

/// Handle to the lake directory tree.
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    /// Opens (or designates) a lake rooted at `root`. Directories are created
    /// lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        TableStore { root: root.into() }
    }

    /// The lake root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, layer: Layer, entity: EntityType) -> PathBuf {
        self.root.join(layer.dir()).join(entity.code())
    }

    /// Appends one Bronze batch as an immutable part file under the ingest
    /// date's partition. All-or-nothing: the file is staged and renamed into
    /// place, so readers never see a partial batch. Empty batches write
    /// nothing and return `None`.
    pub fn append_bronze(
        &self,
        entity: EntityType,
        partition_date: NaiveDate,
        rows: &[Record],
    ) -> Result<Option<PathBuf>, StoreError> {
        if rows.is_empty() {
            return Ok(None);
        }
        let dir = self
            .table_dir(Layer::Bronze, entity)
            .join(format!("ingest_date={}", partition_date.format("%Y-%m-%d")));
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let part = format!("part-{}.feather", Uuid::new_v4());
        let staged = dir.join(format!(".tmp-{part}"));
        let final_path = dir.join(&part);
        write_feather(&staged, rows)?;
        fs::rename(&staged, &final_path).map_err(io_err(&final_path))?;
        Ok(Some(final_path))
    }

    /// Reads Bronze rows with `ingested_at` strictly after `since_ms`
    /// (everything when `None`). Partition directories dated before the
    /// cutoff day are skipped without opening their files.
    pub fn read_bronze_since(
        &self,
        entity: EntityType,
        since_ms: Option<i64>,
    ) -> Result<Vec<Record>, StoreError> {
        let table = self.table_dir(Layer::Bronze, entity);
        if !table.exists() {
            return Ok(Vec::new());
        }
        let since_date = since_ms
            .and_then(crate::tz::from_epoch_millis)
            .map(|dt| dt.date_naive());

        let mut partitions: Vec<PathBuf> = fs::read_dir(&table)
            .map_err(io_err(&table))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        partitions.sort();

        let mut out = Vec::new();
        for part_dir in partitions {
            if let (Some(cutoff), Some(date)) = (since_date, partition_date_of(&part_dir)) {
                if date < cutoff {
                    continue;
                }
            }
            let mut files: Vec<PathBuf> = fs::read_dir(&part_dir)
                .map_err(io_err(&part_dir))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension().is_some_and(|e| e == "feather")
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.starts_with("part-"))
                })
                .collect();
            files.sort();
            for file in files {
                for row in read_feather(&file)? {
                    let fresh = match (since_ms, row.get(COL_INGESTED_AT).and_then(|v| v.as_int()))
                    {
                        (Some(since), Some(ts)) => ts > since,
                        _ => true,
                    };
                    if fresh {
                        out.push(row);
                    }
                }
            }
        }
        Ok(out)
    }

    /// The committed snapshot version, if the table has ever been written.
    pub fn current_version(
        &self,
        layer: Layer,
        entity: EntityType,
    ) -> Result<Option<u64>, StoreError> {
        let pointer = self.table_dir(layer, entity).join(CURRENT_POINTER);
        if !pointer.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&pointer).map_err(io_err(&pointer))?;
        parse_version(text.trim())
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt {
                path: pointer,
                message: format!("unparseable version pointer: {text:?}"),
            })
    }

    /// Reads the committed snapshot. A table that has never been committed
    /// reads as empty.
    pub fn read_current(
        &self,
        layer: Layer,
        entity: EntityType,
    ) -> Result<Vec<Record>, StoreError> {
        let dir = self.table_dir(layer, entity);
        let pointer = dir.join(CURRENT_POINTER);
        if !pointer.exists() {
            return Ok(Vec::new());
        }
        let name = fs::read_to_string(&pointer).map_err(io_err(&pointer))?;
        read_feather(&dir.join(name.trim()))
    }

    /// Starts a snapshot write. Nothing is visible to readers until
    /// [`WriteTxn::commit`]; a dropped transaction leaves no trace.
    pub fn begin(&self, layer: Layer, entity: EntityType) -> Result<WriteTxn, StoreError> {
        let dir = self.table_dir(layer, entity);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let next_version = self.current_version(layer, entity)?.unwrap_or(0) + 1;
        Ok(WriteTxn {
            dir,
            next_version,
            rows: Vec::new(),
            staged: None,
            committed: false,
        })
    }

    /// Replaces-or-inserts `incoming` rows into the committed snapshot,
    /// keyed by `key_cols`, and commits the result as a new version.
    /// Incoming rows with an unresolvable key are ignored.
    pub fn upsert(
        &self,
        layer: Layer,
        entity: EntityType,
        incoming: Vec<Record>,
        key_cols: &[&str],
    ) -> Result<UpsertStats, StoreError> {
        let mut stats = UpsertStats::default();
        if incoming.is_empty() {
            return Ok(stats);
        }

        let mut rows = self.read_current(layer, entity)?;
        let mut index: indexmap::IndexMap<String, usize> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| composite_key(r, key_cols).map(|k| (k, i)))
            .collect();

        for row in incoming {
            let Some(key) = composite_key(&row, key_cols) else {
                continue;
            };
            match index.get(&key) {
                Some(&i) => {
                    rows[i] = row;
                    stats.updated += 1;
                }
                None => {
                    index.insert(key, rows.len());
                    rows.push(row);
                    stats.inserted += 1;
                }
            }
        }

        let mut txn = self.begin(layer, entity)?;
        txn.write_rows(rows);
        txn.commit()?;
        Ok(stats)
    }
}

fn partition_date_of(dir: &Path) -> Option<NaiveDate> {
    let name = dir.file_name()?.to_str()?;
    let date = name.strip_prefix("ingest_date=")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn parse_version(pointer: &str) -> Option<u64> {
    pointer
        .strip_prefix('v')?
        .strip_suffix(".feather")?
        .parse()
        .ok()
}

/// In-flight snapshot write. Buffered rows become the table's next version
/// on [`commit`](WriteTxn::commit); dropping the transaction discards them
/// and removes any staged file.
#[derive(Debug)]
pub struct WriteTxn {
    dir: PathBuf,
    next_version: u64,
    rows: Vec<Record>,
    staged: Option<PathBuf>,
    committed: bool,
}

impl WriteTxn {
    /// Buffers rows for the snapshot.
    pub fn write_rows(&mut self, rows: impl IntoIterator<Item = Record>) {
        self.rows.extend(rows);
    }

    /// Writes the staged file, renames it into place, then moves the
    /// `_CURRENT` pointer. Returns the committed version number.
    pub fn commit(mut self) -> Result<u64, StoreError> {
        let name = format!("v{:05}.feather", self.next_version);
        let staged = self.dir.join(format!(".tmp-{name}"));
        self.staged = Some(staged.clone());
        write_feather(&staged, &self.rows)?;

        let final_path = self.dir.join(&name);
        fs::rename(&staged, &final_path).map_err(io_err(&final_path))?;
        self.staged = None;

        let pointer = self.dir.join(CURRENT_POINTER);
        let pointer_tmp = self.dir.join(format!(".tmp-{CURRENT_POINTER}"));
        fs::write(&pointer_tmp, &name).map_err(io_err(&pointer_tmp))?;
        fs::rename(&pointer_tmp, &pointer).map_err(io_err(&pointer))?;

        self.committed = true;
        Ok(self.next_version)
    }
}

impl Drop for WriteTxn {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(staged) = &self.staged {
                let _ = fs::remove_file(staged);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::models::FieldValue;

    fn store() -> (TempDir, TableStore) {
        let tmp = TempDir::new().unwrap();
        let store = TableStore::new(tmp.path());
        (tmp, store)
    }

    fn row(id: i64, ingested_at: i64) -> Record {
        let mut r = Record::new();
        r.insert("fixture_id".into(), FieldValue::Int(id));
        r.insert(COL_INGESTED_AT.into(), FieldValue::Int(ingested_at));
        r
    }

    #[test]
    fn commit_moves_pointer_and_bumps_version() {
        let (_tmp, store) = store();
        let mut txn = store.begin(Layer::Silver, EntityType::Fixture).unwrap();
        txn.write_rows(vec![row(1, 10)]);
        assert_eq!(txn.commit().unwrap(), 1);

        let mut txn = store.begin(Layer::Silver, EntityType::Fixture).unwrap();
        txn.write_rows(vec![row(1, 10), row(2, 20)]);
        assert_eq!(txn.commit().unwrap(), 2);

        assert_eq!(
            store
                .current_version(Layer::Silver, EntityType::Fixture)
                .unwrap(),
            Some(2)
        );
        assert_eq!(
            store
                .read_current(Layer::Silver, EntityType::Fixture)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn dropped_txn_is_invisible() {
        let (_tmp, store) = store();
        let mut txn = store.begin(Layer::Silver, EntityType::Fixture).unwrap();
        txn.write_rows(vec![row(1, 10)]);
        txn.commit().unwrap();

        let mut txn = store.begin(Layer::Silver, EntityType::Fixture).unwrap();
        txn.write_rows(vec![row(99, 99)]);
        drop(txn);

        let rows = store
            .read_current(Layer::Silver, EntityType::Fixture)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("fixture_id"), Some(&FieldValue::Int(1)));
        assert_eq!(
            store
                .current_version(Layer::Silver, EntityType::Fixture)
                .unwrap(),
            Some(1)
        );
    }

    #[test]
    fn bronze_since_filter_skips_old_rows() {
        let (_tmp, store) = store();
        let day1 = NaiveDate::from_ymd_opt(2025, 8, 21).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 8, 22).unwrap();
        store
            .append_bronze(EntityType::Fixture, day1, &[row(1, 100), row(2, 200)])
            .unwrap();
        store
            .append_bronze(EntityType::Fixture, day2, &[row(3, 300)])
            .unwrap();

        let all = store.read_bronze_since(EntityType::Fixture, None).unwrap();
        assert_eq!(all.len(), 3);

        let fresh = store
            .read_bronze_since(EntityType::Fixture, Some(200))
            .unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].get("fixture_id"), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn empty_bronze_batch_writes_nothing() {
        let (_tmp, store) = store();
        let day = NaiveDate::from_ymd_opt(2025, 8, 22).unwrap();
        assert!(
            store
                .append_bronze(EntityType::Fixture, day, &[])
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn upsert_replaces_by_key() {
        let (_tmp, store) = store();
        let stats = store
            .upsert(
                Layer::Gold,
                EntityType::Fixture,
                vec![row(1, 10), row(2, 20)],
                &["fixture_id"],
            )
            .unwrap();
        assert_eq!((stats.inserted, stats.updated), (2, 0));

        let stats = store
            .upsert(
                Layer::Gold,
                EntityType::Fixture,
                vec![row(2, 99)],
                &["fixture_id"],
            )
            .unwrap();
        assert_eq!((stats.inserted, stats.updated), (0, 1));

        let rows = store.read_current(Layer::Gold, EntityType::Fixture).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
