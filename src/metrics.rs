//! Hold-out split and binary classification metrics

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

/// Threshold at which a probability counts as a churn prediction
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Row indices of a train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so each class keeps its share in the test set
///
/// Deterministic for a given seed. Each class contributes `round(n_class * test_size)`
/// rows to the test set, at least one when the class has two or more rows.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> crate::Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        anyhow::bail!("test_size must be within (0, 1), got {}", test_size);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::new(),
        test: Vec::new(),
    };

    for class in [0u8, 1u8] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &y)| y == class)
            .map(|(i, _)| i)
            .collect();
        if indices.len() < 2 {
            anyhow::bail!(
                "Class {} has {} rows; at least 2 are needed for a stratified split",
                class,
                indices.len()
            );
        }
        indices.shuffle(&mut rng);

        let n_test =
            ((indices.len() as f64 * test_size).round() as usize).clamp(1, indices.len() - 1);
        split.test.extend_from_slice(&indices[..n_test]);
        split.train.extend_from_slice(&indices[n_test..]);
    }

    split.train.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// Evaluation summary for a fitted scorer on held-out data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub roc_auc: f64,
    pub pr_auc: f64,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[usize; 2]; 2],
}

impl ClassificationMetrics {
    pub fn compute(labels: &[u8], probabilities: &[f64]) -> crate::Result<Self> {
        if labels.len() != probabilities.len() {
            anyhow::bail!(
                "Got {} labels but {} probabilities",
                labels.len(),
                probabilities.len()
            );
        }
        if labels.is_empty() {
            anyhow::bail!("Cannot evaluate on an empty set");
        }

        let mut cm = [[0usize; 2]; 2];
        for (&y, &p) in labels.iter().zip(probabilities) {
            let predicted = usize::from(p >= DECISION_THRESHOLD);
            cm[usize::from(y)][predicted] += 1;
        }
        let [[tn, fp], [fn_, tp]] = cm;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy: ratio(tp + tn, labels.len()),
            f1,
            precision,
            recall,
            roc_auc: roc_auc(labels, probabilities)?,
            pr_auc: average_precision(labels, probabilities)?,
            confusion_matrix: cm,
        })
    }
}

/// Area under the ROC curve via the rank-sum statistic, averaging tied ranks
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> crate::Result<f64> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        anyhow::bail!("ROC AUC needs both classes in the evaluation set");
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based; tied block shares the mean rank
        let mean_rank = (start + end) as f64 / 2.0 + 1.0;
        positive_rank_sum += mean_rank
            * order[start..=end]
                .iter()
                .filter(|&&i| labels[i] == 1)
                .count() as f64;
        start = end + 1;
    }

    let p = positives as f64;
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Average precision: sum over thresholds of precision weighted by recall gain
pub fn average_precision(labels: &[u8], scores: &[f64]) -> crate::Result<f64> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    if positives == 0 {
        anyhow::bail!("Average precision needs at least one positive label");
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut ap = 0.0;
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut last_recall = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        for &i in &order[start..=end] {
            seen += 1;
            if labels[i] == 1 {
                tp += 1;
            }
        }
        let recall = tp as f64 / positives as f64;
        ap += (recall - last_recall) * (tp as f64 / seen as f64);
        last_recall = recall;
        start = end + 1;
    }
    Ok(ap)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
