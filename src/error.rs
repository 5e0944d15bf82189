//! Error taxonomy for label normalization and targeting decisions

use thiserror::Error;

/// Maximum number of distinct offending labels carried by [`ChurnError::UnrecognizedLabel`]
pub const MAX_REPORTED_LABELS: usize = 20;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChurnError {
    /// Raw target labels that match neither the numeric shortcut nor the synonym table.
    /// `values` is sorted, deduplicated and capped at [`MAX_REPORTED_LABELS`].
    #[error(
        "target column has unexpected values that cannot be mapped to 0/1: {values:?}{}",
        ellipsis(.truncated)
    )]
    UnrecognizedLabel { values: Vec<String>, truncated: bool },

    /// The field is absent or does not hold a finite number
    #[error("record {record} has no usable value for required field '{field}'")]
    MissingField { field: String, record: usize },

    #[error("invalid business economics: {0}")]
    InvalidEconomics(String),
}

fn ellipsis(truncated: &bool) -> &'static str {
    if *truncated {
        " ..."
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_label_message() {
        let err = ChurnError::UnrecognizedLabel {
            values: vec!["maybe".to_string()],
            truncated: false,
        };
        assert_eq!(
            err.to_string(),
            "target column has unexpected values that cannot be mapped to 0/1: [\"maybe\"]"
        );

        let err = ChurnError::UnrecognizedLabel {
            values: vec!["a".to_string()],
            truncated: true,
        };
        assert!(err.to_string().ends_with(" ..."));
    }
}
