//! Row ↔ DataFrame conversion.
//!
//! Lake rows are heterogeneous maps; Feather files are typed columns. Each
//! column's dtype is the least upper bound of its observed cell kinds
//! (null < bool < int < float < str), so a column that drifts from integers
//! to text becomes a text column rather than a write error.

use indexmap::IndexSet;
use polars::prelude::*;

use crate::models::{FieldValue, Record};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

fn kind_of(value: &FieldValue) -> Kind {
    match value {
        FieldValue::Null => Kind::Null,
        FieldValue::Bool(_) => Kind::Bool,
        FieldValue::Int(_) => Kind::Int,
        FieldValue::Float(_) => Kind::Float,
        FieldValue::Str(_) => Kind::Str,
    }
}

/// Builds a typed frame from rows. Column order is first-seen order across
/// the batch; cells missing from a row are null.
pub fn records_to_frame(rows: &[Record]) -> Result<DataFrame, StoreError> {
    if rows.is_empty() {
        return Ok(DataFrame::empty());
    }

    let mut names: IndexSet<&str> = IndexSet::new();
    for row in rows {
        for key in row.keys() {
            names.insert(key.as_str());
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(names.len());
    for name in names {
        let kind = rows
            .iter()
            .filter_map(|r| r.get(name))
            .map(kind_of)
            .max()
            .unwrap_or(Kind::Null);

        let cell = |row: &Record| row.get(name).cloned().unwrap_or(FieldValue::Null);
        let series = match kind {
            // All-null columns are written as text so re-reads stay stable.
            Kind::Null => Series::full_null(name.into(), rows.len(), &DataType::String),
            Kind::Bool => {
                let data: Vec<Option<bool>> = rows
                    .iter()
                    .map(|r| match cell(r) {
                        FieldValue::Bool(b) => Some(b),
                        _ => None,
                    })
                    .collect();
                Series::new(name.into(), data)
            }
            Kind::Int => {
                let data: Vec<Option<i64>> = rows
                    .iter()
                    .map(|r| match cell(r) {
                        FieldValue::Int(v) => Some(v),
                        FieldValue::Bool(b) => Some(i64::from(b)),
                        _ => None,
                    })
                    .collect();
                Series::new(name.into(), data)
            }
            Kind::Float => {
                let data: Vec<Option<f64>> = rows
                    .iter()
                    .map(|r| match cell(r) {
                        FieldValue::Float(v) => Some(v),
                        FieldValue::Int(v) => Some(v as f64),
                        FieldValue::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
                        _ => None,
                    })
                    .collect();
                Series::new(name.into(), data)
            }
            Kind::Str => {
                let data: Vec<Option<String>> =
                    rows.iter().map(|r| cell(r).render()).collect();
                Series::new(name.into(), data)
            }
        };
        columns.push(series.into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Reads a typed frame back into rows, preserving column order.
pub fn frame_to_records(df: &DataFrame) -> Result<Vec<Record>, StoreError> {
    let mut rows: Vec<Record> = vec![Record::new(); df.height()];

    for col in df.get_columns() {
        let name = col.name().to_string();
        let series = col.as_materialized_series();
        match series.dtype() {
            DataType::Int64 => {
                for (i, v) in series.i64()?.into_iter().enumerate() {
                    rows[i].insert(name.clone(), v.map(FieldValue::Int).unwrap_or(FieldValue::Null));
                }
            }
            DataType::Float64 => {
                for (i, v) in series.f64()?.into_iter().enumerate() {
                    rows[i].insert(
                        name.clone(),
                        v.map(FieldValue::Float).unwrap_or(FieldValue::Null),
                    );
                }
            }
            DataType::Boolean => {
                for (i, v) in series.bool()?.into_iter().enumerate() {
                    rows[i].insert(name.clone(), v.map(FieldValue::Bool).unwrap_or(FieldValue::Null));
                }
            }
            DataType::String => {
                for (i, v) in series.str()?.into_iter().enumerate() {
                    rows[i].insert(
                        name.clone(),
                        v.map(|s| FieldValue::Str(s.to_string()))
                            .unwrap_or(FieldValue::Null),
                    );
                }
            }
            other => {
                return Err(StoreError::UnsupportedDtype {
                    column: name,
                    dtype: other.to_string(),
                });
            }
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, FieldValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn mixed_int_float_column_promotes_to_float() {
        let rows = vec![
            row(&[("score", FieldValue::Int(2))]),
            row(&[("score", FieldValue::Float(1.5))]),
        ];
        let df = records_to_frame(&rows).unwrap();
        assert_eq!(df.column("score").unwrap().dtype(), &DataType::Float64);

        let back = frame_to_records(&df).unwrap();
        assert_eq!(back[0].get("score"), Some(&FieldValue::Float(2.0)));
    }

    #[test]
    fn missing_cells_become_nulls() {
        let rows = vec![
            row(&[("a", FieldValue::Int(1)), ("b", FieldValue::Str("x".into()))]),
            row(&[("a", FieldValue::Int(2))]),
        ];
        let back = frame_to_records(&records_to_frame(&rows).unwrap()).unwrap();
        assert_eq!(back[1].get("b"), Some(&FieldValue::Null));
    }

    #[test]
    fn all_null_column_round_trips_as_text_nulls() {
        let rows = vec![row(&[("goals_home", FieldValue::Null)])];
        let df = records_to_frame(&rows).unwrap();
        assert_eq!(df.column("goals_home").unwrap().dtype(), &DataType::String);
        let back = frame_to_records(&df).unwrap();
        assert!(back[0].get("goals_home").unwrap().is_null());
    }
}
