//! Record model and CSV dataset loading using Polars

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use polars::prelude::*;

use crate::labels::normalize;

/// Columns treated as customer identifiers and kept out of the feature set
pub const ID_COLUMNS: [&str; 4] = ["customerID", "CustomerID", "id", "ID"];

/// Field carrying the scorer's output on a record
pub const PROBABILITY_FIELD: &str = "churn_probability";

/// A single untyped cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    /// Integer cells keep their exact value, so long identifiers render unchanged
    Integer(i64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view of the value; booleans count as 0/1 and text is parsed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Missing => None,
        }
    }

    /// Convert a JSON scalar into a value. Arrays and objects are rendered as text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Missing, Value::Number),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => f.write_str(s),
            Value::Missing => f.write_str("nan"),
        }
    }
}

/// One customer: feature name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.insert(field, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when the record has no fields or every field is missing
    pub fn all_missing(&self) -> bool {
        self.fields.values().all(Value::is_missing)
    }

    /// Build a record from a JSON object. Non-object input yields an error.
    pub fn from_json(value: &serde_json::Value) -> crate::Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("features must be a JSON object"))?;
        Ok(object
            .iter()
            .fold(Record::new(), |record, (k, v)| record.with(k.clone(), Value::from_json(v))))
    }
}

/// Training data: features with canonical labels
#[derive(Debug)]
pub struct ChurnDataset {
    /// Feature records, identifier and target columns removed
    pub features: Vec<Record>,
    /// Canonical 0/1 churn labels, one per feature record
    pub labels: Vec<u8>,
    /// Identifier column that was dropped from the features, if any
    pub id_column: Option<String>,
    /// Feature column names in file order
    pub columns: Vec<String>,
}

impl ChurnDataset {
    /// Count of (negative, positive) labels
    pub fn label_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&y| y == 1).count();
        (self.labels.len() - positives, positives)
    }
}

/// Load a churn CSV, split the target column out and normalize it to 0/1
///
/// # Arguments
/// * `path` - Path to the CSV file
/// * `target_col` - Name of the raw churn outcome column
pub fn load_churn_csv(path: impl AsRef<Path>, target_col: &str) -> crate::Result<ChurnDataset> {
    let df = read_csv(path.as_ref())?;

    if df.height() == 0 {
        anyhow::bail!("Dataset has 0 rows.");
    }

    let names: Vec<String> = df.get_columns().iter().map(|s| s.name().to_string()).collect();
    if !names.iter().any(|n| n == target_col) {
        let preview: Vec<&String> = names.iter().take(30).collect();
        anyhow::bail!("Target column '{}' not found. Columns: {:?}", target_col, preview);
    }

    // Drop completely empty columns
    let kept: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.null_count() < s.len())
        .collect();
    let target = kept
        .iter()
        .find(|s| s.name().to_string() == target_col)
        .ok_or_else(|| anyhow::anyhow!("Target column '{}' contains no values", target_col))?;

    let raw_labels = series_values(target)?;

    let id_column = ID_COLUMNS
        .iter()
        .find(|id| kept.iter().any(|s| s.name().to_string() == **id))
        .map(|id| id.to_string());

    let feature_series: Vec<&Series> = kept
        .iter()
        .copied()
        .filter(|s| {
            let name = s.name().to_string();
            name != target_col && !ID_COLUMNS.contains(&name.as_str())
        })
        .collect();
    let columns: Vec<String> = feature_series.iter().map(|s| s.name().to_string()).collect();
    let records = series_to_records(&feature_series, df.height())?;

    let labels = normalize(&raw_labels)?;

    // Remove rows where all features are missing
    let (features, labels): (Vec<Record>, Vec<u8>) = records
        .into_iter()
        .zip(labels)
        .filter(|(record, _)| !record.all_missing())
        .unzip();

    log::info!(
        "loaded {} rows with {} feature columns from {}",
        features.len(),
        columns.len(),
        path.as_ref().display()
    );

    Ok(ChurnDataset {
        features,
        labels,
        id_column,
        columns,
    })
}

/// Load every column of a CSV file into records
pub fn load_records(path: impl AsRef<Path>) -> crate::Result<Vec<Record>> {
    let df = read_csv(path.as_ref())?;
    let series: Vec<&Series> = df.get_columns().iter().collect();
    series_to_records(&series, df.height())
}

/// Append a `churn_probability` column to a CSV and write the result
pub fn write_scored_csv(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    probabilities: Vec<f64>,
) -> crate::Result<()> {
    let mut df = read_csv(input.as_ref())?;
    if probabilities.len() != df.height() {
        anyhow::bail!(
            "Got {} probabilities for {} rows",
            probabilities.len(),
            df.height()
        );
    }
    df.with_column(Series::new(PROBABILITY_FIELD, probabilities))?;

    if let Some(parent) = output.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(output.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

fn read_csv(path: &Path) -> crate::Result<DataFrame> {
    if !path.exists() {
        anyhow::bail!("Dataset not found at: {}", path.display());
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Convert a column to values by its dtype: boolean, integer, float, or stringified
///
/// `UInt64` goes through the string path since it may not fit an `i64`.
fn series_values(series: &Series) -> crate::Result<Vec<Value>> {
    let dtype = series.dtype();
    let values = if dtype == &DataType::Boolean {
        series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Bool))
            .collect()
    } else if dtype.is_integer() && dtype != &DataType::UInt64 {
        series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Integer))
            .collect()
    } else if dtype.is_numeric() {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Number))
            .collect()
    } else {
        series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, |s| Value::Text(s.to_string())))
            .collect()
    };
    Ok(values)
}

fn series_to_records(series: &[&Series], height: usize) -> crate::Result<Vec<Record>> {
    let mut records = vec![Record::new(); height];
    for s in series {
        let name = s.name().to_string();
        for (record, value) in records.iter_mut().zip(series_values(s)?) {
            record.insert(name.clone(), value);
        }
    }
    Ok(records)
}
