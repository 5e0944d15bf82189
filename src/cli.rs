//! Command-line interface definitions and argument parsing

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::data::Record;

/// Churn risk scoring and budget-constrained retention targeting
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Load the training dataset and report its label distribution
    Check,

    /// Fit on a stratified split of the dataset and write evaluation metrics
    Train,

    /// Attach churn probabilities to every row of a CSV
    Score {
        /// Path to the input CSV file
        #[arg(short, long)]
        input: String,

        /// Path to the scored output CSV file
        #[arg(short, long)]
        output: String,
    },

    /// Predict churn for one customer given as a JSON object
    /// Example: --features '{"tenure": 3, "MonthlyCharges": 89.5}'
    Predict {
        #[arg(short, long)]
        features: String,
    },

    /// Select the customers worth a retention offer under a budget
    Target {
        /// Path to the input CSV file
        #[arg(short, long)]
        input: String,

        /// Total budget available for retention offers
        #[arg(short, long, allow_negative_numbers = true)]
        budget: f64,

        /// Column carried into the output as the customer identifier
        #[arg(long)]
        id_column: Option<String>,

        /// Input already carries a churn_probability column; skip scoring
        #[arg(long)]
        scored: bool,

        /// Write the ranked targets as JSON to this path instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Command {
    /// Parse the `--features` JSON of the predict command
    pub fn parse_features(&self) -> crate::Result<Option<Record>> {
        match self {
            Command::Predict { features } => {
                let json: serde_json::Value = serde_json::from_str(features)
                    .map_err(|e| anyhow::anyhow!("Invalid features JSON: {}", e))?;
                Record::from_json(&json).map(Some)
            }
            _ => Ok(None),
        }
    }
}
