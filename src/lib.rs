//! ChurnForge: churn risk scoring and budget-constrained retention targeting
//!
//! This library normalizes raw churn labels, scores customers with a churn model,
//! and ranks them by the expected value of a retention offer under a fixed budget.

pub mod cli;
pub mod config;
pub mod data;
pub mod decision;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod model;

// Re-export public items for easier access
pub use cli::{Args, Command};
pub use config::{AppConfig, BusinessConfig};
pub use data::{load_churn_csv, load_records, ChurnDataset, Record, Value};
pub use decision::{expected_value, select_targets, TargetDecision};
pub use error::ChurnError;
pub use labels::{normalize, SynonymTable};
pub use model::{fit_churn_model, predict_one, score_records, ChurnModel, ChurnScorer};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
