//! Churn probability scorer backed by logistic regression

use linfa::prelude::*;
use linfa::traits::Transformer;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::data::{Record, Value, PROBABILITY_FIELD};

/// Anything that turns feature records into churn probabilities in `[0, 1]`
pub trait ChurnScorer {
    /// One probability per record, in input order
    fn predict_proba(&self, records: &[Record]) -> crate::Result<Array1<f64>>;
}

/// Single-customer prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: u8,
    pub churn_probability: f64,
}

/// Mean imputation followed by linfa's standard scaling over the numeric feature columns
pub struct FeatureScaler {
    pub columns: Vec<String>,
    /// Mean of the finite values of each column, used for absent or non-finite cells
    pub fill_values: Array1<f64>,
    scaler: LinearScaler<f64>,
}

impl FeatureScaler {
    /// Fit on the columns whose non-missing values are all numbers or booleans
    ///
    /// Columns with no finite value, or a single repeated one, carry no signal and are dropped.
    pub fn fit(records: &[Record]) -> crate::Result<Self> {
        let mut columns = Vec::new();
        let mut fill_values = Vec::new();
        for column in numeric_columns(records) {
            let values: Vec<f64> = records
                .iter()
                .filter_map(|r| r.get(&column).and_then(Value::as_f64))
                .filter(|v| v.is_finite())
                .collect();
            let Some(&first) = values.first() else {
                log::debug!("dropping column {}: no finite values", column);
                continue;
            };
            if values.iter().all(|&v| v == first) {
                log::debug!("dropping column {}: constant", column);
                continue;
            }
            fill_values.push(values.iter().sum::<f64>() / values.len() as f64);
            columns.push(column);
        }
        if columns.is_empty() {
            anyhow::bail!("No numeric feature columns available for training");
        }

        let fill_values = Array1::from(fill_values);
        let imputed = impute(records, &columns, &fill_values);
        let dataset = Dataset::new(imputed, Array1::<usize>::zeros(records.len()));
        let scaler = LinearScaler::standard()
            .fit(&dataset)
            .map_err(|e| anyhow::anyhow!("Feature scaling failed: {}", e))?;

        Ok(Self {
            columns,
            fill_values,
            scaler,
        })
    }

    /// Build the scaled design matrix
    pub fn transform(&self, records: &[Record]) -> Array2<f64> {
        self.scaler
            .transform(impute(records, &self.columns, &self.fill_values))
    }
}

fn impute(records: &[Record], columns: &[String], fill_values: &Array1<f64>) -> Array2<f64> {
    let mut x = Array2::zeros((records.len(), columns.len()));
    for (i, record) in records.iter().enumerate() {
        for (j, column) in columns.iter().enumerate() {
            x[[i, j]] = record
                .get(column)
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .unwrap_or(fill_values[j]);
        }
    }
    x
}

/// Fitted churn model
pub struct ChurnModel {
    pub model: FittedLogisticRegression<f64, usize>,
    pub scaler: FeatureScaler,
    /// Whether label 1 is the class linfa reports probabilities for
    churn_is_positive: bool,
}

impl ChurnModel {
    pub fn columns(&self) -> &[String] {
        &self.scaler.columns
    }
}

impl ChurnScorer for ChurnModel {
    fn predict_proba(&self, records: &[Record]) -> crate::Result<Array1<f64>> {
        let x = self.scaler.transform(records);
        let p = self.model.predict_probabilities(&x);
        if self.churn_is_positive {
            Ok(p)
        } else {
            Ok(p.mapv(|v| 1.0 - v))
        }
    }
}

/// Fit a logistic regression churn model
///
/// # Arguments
/// * `records` - Feature records
/// * `labels` - Canonical 0/1 labels, one per record
/// * `max_iterations` - Optimizer iteration cap
pub fn fit_churn_model(
    records: &[Record],
    labels: &[u8],
    max_iterations: u64,
) -> crate::Result<ChurnModel> {
    if records.len() != labels.len() {
        anyhow::bail!(
            "Got {} records but {} labels",
            records.len(),
            labels.len()
        );
    }
    if !(labels.contains(&0) && labels.contains(&1)) {
        anyhow::bail!("Training labels must contain both churned and retained customers");
    }

    let scaler = FeatureScaler::fit(records)?;
    let x = scaler.transform(records);
    let targets: Array1<usize> = labels.iter().map(|&y| usize::from(y)).collect();
    let dataset = Dataset::new(x, targets);

    let model = LogisticRegression::default()
        .max_iterations(max_iterations)
        .fit(&dataset)
        .map_err(|e| anyhow::anyhow!("Logistic regression fit failed: {}", e))?;

    // linfa treats the more frequent class as positive, the first one seen on a tie
    let churned = labels.iter().filter(|&&y| y == 1).count();
    let retained = labels.len() - churned;
    let churn_is_positive = churned > retained || (churned == retained && labels[0] == 1);

    log::info!(
        "fitted logistic regression on {} rows over {} columns",
        records.len(),
        scaler.columns.len()
    );

    Ok(ChurnModel {
        model,
        scaler,
        churn_is_positive,
    })
}

/// Attach `churn_probability` to a copy of every record
pub fn score_records(scorer: &dyn ChurnScorer, records: &[Record]) -> crate::Result<Vec<Record>> {
    let probabilities = scorer.predict_proba(records)?;
    Ok(records
        .iter()
        .zip(probabilities.iter())
        .map(|(record, &p)| record.clone().with(PROBABILITY_FIELD, Value::Number(p)))
        .collect())
}

/// Score one customer, predicting churn at probability 0.5 or above
pub fn predict_one(scorer: &dyn ChurnScorer, record: &Record) -> crate::Result<Prediction> {
    let probabilities = scorer.predict_proba(std::slice::from_ref(record))?;
    let churn_probability = probabilities
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Scorer returned no probability"))?;
    Ok(Prediction {
        prediction: u8::from(churn_probability >= 0.5),
        churn_probability,
    })
}

fn numeric_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();
    for record in records {
        for (name, value) in record.iter() {
            if name == PROBABILITY_FIELD || rejected.contains(name) {
                continue;
            }
            match value {
                Value::Number(_) | Value::Integer(_) | Value::Bool(_) => {
                    if !columns.contains(name) {
                        columns.push(name.clone());
                    }
                }
                Value::Text(_) => {
                    columns.retain(|c| c != name);
                    rejected.push(name.clone());
                }
                Value::Missing => {}
            }
        }
    }
    columns.sort();
    columns
}
