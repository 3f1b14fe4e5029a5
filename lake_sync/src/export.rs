//! Gold table exports for downstream consumers.
//!
//! Writes the committed Gold snapshot out as both CSV (spreadsheets, quick
//! inspection) and Parquet (warehouse loads). Exports are derived artifacts;
//! they can be regenerated from Gold at any time.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::models::EntityType;
use crate::store::{Layer, StoreError, TableStore, records_to_frame};

/// Where one export landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// CSV artifact.
    pub csv: PathBuf,
    /// Parquet artifact.
    pub parquet: PathBuf,
    /// Rows exported.
    pub rows: usize,
}

/// Exports the entity's Gold table into `out_dir` as
/// `<entity>_gold.csv` and `<entity>_gold.parquet`.
pub fn export_gold(
    store: &TableStore,
    entity: EntityType,
    out_dir: &Path,
) -> Result<ExportPaths, StoreError> {
    let rows = store.read_current(Layer::Gold, entity)?;
    let mut df = records_to_frame(&rows)?;

    fs::create_dir_all(out_dir).map_err(|source| StoreError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let csv = out_dir.join(format!("{}_gold.csv", entity.code()));
    let file = File::create(&csv).map_err(|source| StoreError::Io {
        path: csv.clone(),
        source,
    })?;
    CsvWriter::new(file).finish(&mut df)?;

    let parquet = out_dir.join(format!("{}_gold.parquet", entity.code()));
    let file = File::create(&parquet).map_err(|source| StoreError::Io {
        path: parquet.clone(),
        source,
    })?;
    ParquetWriter::new(file).finish(&mut df)?;

    info!(
        entity = entity.code(),
        rows = rows.len(),
        out_dir = %out_dir.display(),
        "gold export written"
    );
    Ok(ExportPaths {
        csv,
        parquet,
        rows: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::{FieldValue, Record};

    #[test]
    fn exports_land_as_csv_and_parquet() {
        let tmp = TempDir::new().unwrap();
        let store = TableStore::new(tmp.path());

        let mut row = Record::new();
        row.insert("fixture_id".into(), FieldValue::Int(100));
        row.insert("total_goals".into(), FieldValue::Int(3));
        store
            .upsert(Layer::Gold, EntityType::Fixture, vec![row], &["fixture_id"])
            .unwrap();

        let out = tmp.path().join("exports");
        let paths = export_gold(&store, EntityType::Fixture, &out).unwrap();
        assert_eq!(paths.rows, 1);
        assert!(paths.csv.exists());
        assert!(paths.parquet.exists());

        let csv_text = std::fs::read_to_string(&paths.csv).unwrap();
        assert!(csv_text.starts_with("fixture_id"));
        assert!(csv_text.contains("100"));
    }

    #[test]
    fn empty_gold_table_still_exports() {
        let tmp = TempDir::new().unwrap();
        let store = TableStore::new(tmp.path());
        let out = tmp.path().join("exports");
        let paths = export_gold(&store, EntityType::Country, &out).unwrap();
        assert_eq!(paths.rows, 0);
        assert!(paths.csv.exists());
    }
}
