//! Dataset loading and saving for CSV and Parquet files, and conversion
//! between polars frames and [`Matrix`]

use anyhow::{Context, Result};
use faer::Mat;
use polars::prelude::*;
use std::path::Path;

use crate::error::PrepError;
use crate::pipeline::class_distance::Labels;
use crate::pipeline::matrix::Matrix;

/// Load a dataset from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path) -> Result<DataFrame> {
    let extension = extension_of(path);

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    lf.collect()
        .with_context(|| format!("Failed to read dataset: {}", path.display()))
}

/// Write a dataset, choosing the format from the file extension
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = extension_of(path);

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Numeric columns converted from a frame, plus the names that were skipped
#[derive(Debug)]
pub struct LoadedMatrix {
    pub matrix: Matrix,
    pub skipped: Vec<String>,
}

impl Matrix {
    /// Convert the numeric columns of `df` into a matrix.
    ///
    /// Columns named in `exclude` and non-numeric columns are left out;
    /// the latter are reported in `skipped`. Nulls become `NaN`.
    pub fn from_dataframe(df: &DataFrame, exclude: &[String]) -> crate::error::Result<LoadedMatrix> {
        let mut names = Vec::new();
        let mut values: Vec<Vec<f64>> = Vec::new();
        let mut skipped = Vec::new();

        for col in df.get_columns() {
            let name = col.name().to_string();
            if exclude.contains(&name) {
                continue;
            }
            if !col.dtype().is_primitive_numeric() {
                tracing::warn!(column = %name, dtype = %col.dtype(), "skipping non-numeric column");
                skipped.push(name);
                continue;
            }
            let float_col = col.cast(&DataType::Float64)?;
            let column: Vec<f64> = float_col
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            names.push(name);
            values.push(column);
        }

        let data = Mat::from_fn(df.height(), names.len(), |i, j| values[j][i]);
        let matrix = Matrix::new(names, data)?;
        Ok(LoadedMatrix { matrix, skipped })
    }

    /// Convert to a polars frame; `NaN` entries become nulls.
    pub fn to_dataframe(&self) -> crate::error::Result<DataFrame> {
        let columns: Vec<Column> = self
            .names()
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let values: Vec<Option<f64>> = self
                    .column(j)
                    .into_iter()
                    .map(|v| if v.is_nan() { None } else { Some(v) })
                    .collect();
                Column::new(name.as_str().into(), values)
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

/// Read the label column of `df`.
///
/// Numeric columns give [`Labels::Numeric`] unless `as_classes` is set;
/// everything else is read as class names with nulls labelled `NA`.
pub fn extract_labels(df: &DataFrame, name: &str, as_classes: bool) -> crate::error::Result<Labels> {
    let col = df.column(name).map_err(|_| PrepError::SchemaMismatch {
        missing: vec![name.to_string()],
    })?;

    if col.dtype().is_primitive_numeric() && !as_classes {
        let float_col = col.cast(&DataType::Float64)?;
        let values = float_col
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        return Ok(Labels::Numeric(values));
    }

    let string_col = col.cast(&DataType::String)?;
    let values = string_col
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("NA").to_string())
        .collect();
    Ok(Labels::Classes(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dataframe_skips_strings_and_maps_nulls() {
        let df = DataFrame::new(vec![
            Column::new("x".into(), vec![Some(1.0), None, Some(3.0)]),
            Column::new("name".into(), vec!["a", "b", "c"]),
            Column::new("n".into(), vec![1i32, 2, 3]),
        ])
        .unwrap();

        let loaded = Matrix::from_dataframe(&df, &[]).unwrap();
        assert_eq!(loaded.skipped, vec!["name".to_string()]);
        assert_eq!(loaded.matrix.names(), &["x".to_string(), "n".to_string()]);
        assert!(loaded.matrix.get(1, 0).is_nan());
        assert_eq!(loaded.matrix.get(2, 1), 3.0);
    }

    #[test]
    fn test_to_dataframe_writes_nulls() {
        let m = Matrix::from_columns(vec![("x", vec![1.0, f64::NAN])]).unwrap();
        let df = m.to_dataframe().unwrap();
        assert_eq!(df.column("x").unwrap().null_count(), 1);
    }

    #[test]
    fn test_extract_labels() {
        let df = DataFrame::new(vec![
            Column::new("y".into(), vec![0i32, 1, 1]),
            Column::new("g".into(), vec!["u", "v", "u"]),
        ])
        .unwrap();

        assert_eq!(
            extract_labels(&df, "y", false).unwrap(),
            Labels::Numeric(vec![0.0, 1.0, 1.0])
        );
        assert_eq!(
            extract_labels(&df, "y", true).unwrap(),
            Labels::Classes(vec!["0".into(), "1".into(), "1".into()])
        );
        assert!(matches!(extract_labels(&df, "g", false).unwrap(), Labels::Classes(_)));
        assert!(extract_labels(&df, "missing", false).is_err());
    }
}
