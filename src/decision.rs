//! Budget-constrained retention targeting by expected value

use ndarray::Array1;
use serde::Serialize;

use crate::config::BusinessConfig;
use crate::data::{Record, Value, PROBABILITY_FIELD};
use crate::error::ChurnError;

/// A customer selected for a retention offer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub churn_probability: f64,
    pub expected_value: f64,
}

/// Expected value of extending one offer
///
/// EV = P(churn) * P(offer works) * value saved - cost of the offer
pub fn expected_value(p_churn: f64, churn_value: f64, success_prob: f64, offer_cost: f64) -> f64 {
    p_churn * success_prob * churn_value - offer_cost
}

/// [`expected_value`] over a probability column, bit-identical to the scalar form
pub fn expected_values(probabilities: &Array1<f64>, economics: &BusinessConfig) -> Array1<f64> {
    probabilities.mapv(|p| {
        expected_value(
            p,
            economics.churn_value,
            economics.retention_success_prob,
            economics.retention_offer_cost,
        )
    })
}

/// Number of offers the budget pays for, `floor(budget / offer_cost)` clamped to `[0, limit]`
///
/// Fails when the ratio is undefined (zero or NaN cost, NaN budget).
pub fn max_affordable(budget: f64, offer_cost: f64, limit: usize) -> Result<usize, ChurnError> {
    if offer_cost == 0.0 {
        return Err(ChurnError::InvalidEconomics(
            "retention_offer_cost must be non-zero".to_string(),
        ));
    }
    let ratio = (budget / offer_cost).floor();
    if ratio.is_nan() {
        return Err(ChurnError::InvalidEconomics(format!(
            "budget {} / offer cost {} is not a number",
            budget, offer_cost
        )));
    }
    if ratio <= 0.0 {
        return Ok(0);
    }
    Ok(if ratio >= limit as f64 {
        limit
    } else {
        ratio as usize
    })
}

/// Read the churn probability of every record into a column
///
/// Absent, unparseable and non-finite probabilities all fail on the first offending record.
pub fn probability_column(records: &[Record]) -> Result<Array1<f64>, ChurnError> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            record
                .get(PROBABILITY_FIELD)
                .and_then(Value::as_f64)
                .filter(|p| p.is_finite())
                .ok_or_else(|| ChurnError::MissingField {
                    field: PROBABILITY_FIELD.to_string(),
                    record: i,
                })
        })
        .collect::<Result<Vec<f64>, ChurnError>>()
        .map(Array1::from)
}

/// Rank scored records by expected value and keep the best ones the budget allows
///
/// Only records with strictly positive expected value are kept. Ties on expected value
/// keep their input order. When `id_field` is given and present on a record, its value
/// is carried into the decision.
pub fn select_targets(
    records: &[Record],
    budget: f64,
    economics: &BusinessConfig,
    id_field: Option<&str>,
) -> Result<Vec<TargetDecision>, ChurnError> {
    let probabilities = probability_column(records)?;
    let limit = max_affordable(budget, economics.retention_offer_cost, records.len())?;
    let ev = expected_values(&probabilities, economics);

    let mut ranked: Vec<usize> = (0..records.len()).filter(|&i| ev[i] > 0.0).collect();
    // Sort by (expected value desc, input position) for deterministic tie-breaking
    ranked.sort_by(|&a, &b| ev[b].total_cmp(&ev[a]).then_with(|| a.cmp(&b)));
    ranked.truncate(limit);

    log::debug!(
        "budget {} affords {} offers, {} records selected out of {}",
        budget,
        limit,
        ranked.len(),
        records.len()
    );

    Ok(ranked
        .into_iter()
        .map(|i| TargetDecision {
            id: id_field
                .and_then(|field| records[i].get(field))
                .filter(|value| !value.is_missing())
                .map(Value::to_string),
            churn_probability: probabilities[i],
            expected_value: ev[i],
        })
        .collect())
}
