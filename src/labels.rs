//! Label normalization: coerce raw churn outcomes to canonical 0/1

use std::collections::{BTreeSet, HashMap};

use crate::data::Value;
use crate::error::{ChurnError, MAX_REPORTED_LABELS};

/// Tokens that mean "churned"
pub const POSITIVE_LABELS: [&str; 6] = ["yes", "y", "true", "1", "churn", "churned"];

/// Tokens that mean "did not churn"
pub const NEGATIVE_LABELS: [&str; 6] = ["no", "n", "false", "0", "not churn", "not churned"];

/// Mapping from a normalized (trimmed, lower-cased) token to its canonical bit
#[derive(Debug, Clone)]
pub struct SynonymTable {
    entries: HashMap<String, u8>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        let entries = POSITIVE_LABELS
            .iter()
            .map(|token| (token.to_string(), 1))
            .chain(NEGATIVE_LABELS.iter().map(|token| (token.to_string(), 0)))
            .collect();
        Self { entries }
    }
}

impl SynonymTable {
    /// Add or override a synonym. The token is normalized before insertion.
    pub fn with_synonym(mut self, token: &str, label: bool) -> Self {
        self.entries.insert(normalize_token(token), u8::from(label));
        self
    }

    pub fn lookup(&self, token: &str) -> Option<u8> {
        self.entries.get(token).copied()
    }
}

/// Encoding detected for a label sequence
#[derive(Debug, Clone, PartialEq)]
pub enum LabelEncoding {
    /// Every value is numeric or missing and the distinct numbers are within {0, 1}
    Numeric(Vec<Option<f64>>),
    /// Anything else, stringified and normalized for synonym lookup
    Synonym(Vec<String>),
}

impl LabelEncoding {
    pub fn detect(labels: &[Value]) -> Self {
        let numeric: Option<Vec<Option<f64>>> = labels
            .iter()
            .map(|value| match value {
                Value::Number(n) if n.is_nan() => Some(None),
                Value::Number(n) => Some(Some(*n)),
                Value::Integer(n) => Some(Some(*n as f64)),
                Value::Bool(b) => Some(Some(if *b { 1.0 } else { 0.0 })),
                Value::Missing => Some(None),
                Value::Text(_) => None,
            })
            .collect();

        match numeric {
            Some(values) if values.iter().flatten().all(|&v| v == 0.0 || v == 1.0) => {
                LabelEncoding::Numeric(values)
            }
            _ => LabelEncoding::Synonym(
                labels
                    .iter()
                    .map(|value| normalize_token(&value.to_string()))
                    .collect(),
            ),
        }
    }
}

/// Normalize raw labels with the default synonym table
pub fn normalize(labels: &[Value]) -> Result<Vec<u8>, ChurnError> {
    normalize_with(labels, &SynonymTable::default())
}

/// Normalize raw labels to 0/1, failing on any token the table does not know
///
/// Missing or NaN values in a numeric sequence map to 0.
pub fn normalize_with(labels: &[Value], table: &SynonymTable) -> Result<Vec<u8>, ChurnError> {
    match LabelEncoding::detect(labels) {
        LabelEncoding::Numeric(values) => Ok(values
            .into_iter()
            .map(|v| u8::from(v == Some(1.0)))
            .collect()),
        LabelEncoding::Synonym(tokens) => map_synonyms(&tokens, table),
    }
}

fn map_synonyms(tokens: &[String], table: &SynonymTable) -> Result<Vec<u8>, ChurnError> {
    let mut unknown = BTreeSet::new();
    let mapped: Vec<u8> = tokens
        .iter()
        .filter_map(|token| {
            let label = table.lookup(token);
            if label.is_none() {
                unknown.insert(token.as_str());
            }
            label
        })
        .collect();

    if unknown.is_empty() {
        return Ok(mapped);
    }

    log::debug!("{} distinct unrecognized label values", unknown.len());
    Err(ChurnError::UnrecognizedLabel {
        truncated: unknown.len() > MAX_REPORTED_LABELS,
        values: unknown
            .into_iter()
            .take(MAX_REPORTED_LABELS)
            .map(str::to_string)
            .collect(),
    })
}

fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase()
}
