//! ChurnForge: churn scoring and retention targeting CLI
//!
//! This is the main entrypoint that orchestrates data loading, model fitting,
//! evaluation, scoring, and budget-constrained targeting.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use churnforge::data::{write_scored_csv, ID_COLUMNS};
use churnforge::decision::max_affordable;
use churnforge::metrics::{stratified_split, ClassificationMetrics};
use churnforge::{
    fit_churn_model, load_churn_csv, load_records, predict_one, score_records, select_targets,
    AppConfig, Args, ChurnModel, ChurnScorer, Command, Record, TargetDecision,
};

#[derive(Serialize)]
struct TrainReport {
    generated_at: String,
    project_name: String,
    n_train: usize,
    n_test: usize,
    feature_columns: Vec<String>,
    #[serde(flatten)]
    metrics: ClassificationMetrics,
}

#[derive(Serialize)]
struct TargetingReport {
    generated_at: String,
    budget: f64,
    max_affordable: usize,
    records_scored: usize,
    targets: Vec<TargetDecision>,
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = AppConfig::load(&args.config)?;

    match &args.command {
        Command::Check => run_check(&config),
        Command::Train => run_train(&config, args.verbose),
        Command::Score { input, output } => run_score(&config, input, output),
        Command::Predict { .. } => {
            let record = args
                .command
                .parse_features()?
                .ok_or_else(|| anyhow::anyhow!("Predict requires --features"))?;
            run_predict(&config, &record)
        }
        Command::Target {
            input,
            budget,
            id_column,
            scored,
            output,
        } => run_target(
            &config,
            input,
            *budget,
            id_column.as_deref(),
            *scored,
            output.as_deref(),
        ),
    }
}

/// Report dataset shape and label balance
fn run_check(config: &AppConfig) -> Result<()> {
    let dataset = load_churn_csv(&config.data.path, &config.data.target)?;
    let (retained, churned) = dataset.label_counts();

    println!("✓ Dataset loaded");
    println!(
        "  Features shape: ({}, {})",
        dataset.features.len(),
        dataset.columns.len()
    );
    if let Some(id) = &dataset.id_column {
        println!("  Identifier column: {}", id);
    }
    println!("Target distribution:");
    println!("  0: {}", retained);
    println!("  1: {}", churned);
    Ok(())
}

/// Fit on a stratified split, evaluate on the hold-out rows, and save metrics
fn run_train(config: &AppConfig, verbose: bool) -> Result<()> {
    println!("=== Training ===\n");
    let start_time = Instant::now();

    let dataset = load_churn_csv(&config.data.path, &config.data.target)?;
    let split = stratified_split(&dataset.labels, config.data.test_size, config.random_state)?;

    let pick = |indices: &[usize]| -> (Vec<Record>, Vec<u8>) {
        indices
            .iter()
            .map(|&i| (dataset.features[i].clone(), dataset.labels[i]))
            .unzip()
    };
    let (x_train, y_train) = pick(&split.train);
    let (x_test, y_test) = pick(&split.test);

    if verbose {
        println!("  Train rows: {}", x_train.len());
        println!("  Test rows: {}", x_test.len());
        println!("  Max iterations: {}", config.train.max_iterations);
    }

    println!("Training model...");
    let model = fit_churn_model(&x_train, &y_train, config.train.max_iterations)?;

    println!("Evaluating...");
    let probabilities = model.predict_proba(&x_test)?;
    let metrics = ClassificationMetrics::compute(&y_test, &probabilities.to_vec())?;

    let report = TrainReport {
        generated_at: Utc::now().to_rfc3339(),
        project_name: config.project_name.clone(),
        n_train: x_train.len(),
        n_test: x_test.len(),
        feature_columns: model.columns().to_vec(),
        metrics,
    };
    let json = serde_json::to_string_pretty(&report)?;

    std::fs::create_dir_all(&config.artifacts.dir)?;
    std::fs::write(&config.artifacts.metrics_path, &json)?;

    println!("Saved metrics: {}", config.artifacts.metrics_path);
    println!("{}", json);
    if verbose {
        println!("Total time: {:.2}s", start_time.elapsed().as_secs_f64());
    }
    Ok(())
}

/// Score a CSV and write it back with a churn_probability column
fn run_score(config: &AppConfig, input: &str, output: &str) -> Result<()> {
    let records = load_records(input)?;
    println!("Scoring {} rows...", records.len());

    let model = fit_from_config(config)?;
    let probabilities = model.predict_proba(&records)?;
    write_scored_csv(input, output, probabilities.to_vec())?;

    println!("Saved scored file to {}", output);
    Ok(())
}

fn run_predict(config: &AppConfig, record: &Record) -> Result<()> {
    let model = fit_from_config(config)?;

    let missing: Vec<&String> = model
        .columns()
        .iter()
        .filter(|c| record.get(c).is_none())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("Missing features: {:?}", missing);
    }

    let prediction = predict_one(&model, record)?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

/// Rank customers by expected value of a retention offer under the budget
fn run_target(
    config: &AppConfig,
    input: &str,
    budget: f64,
    id_column: Option<&str>,
    scored: bool,
    output: Option<&str>,
) -> Result<()> {
    let mut records = load_records(input)?;
    log::info!("loaded {} rows for targeting", records.len());

    if !scored {
        let model = fit_from_config(config)?;
        records = score_records(&model, &records)?;
    }

    let id_column = id_column.map(str::to_string).or_else(|| {
        ID_COLUMNS
            .iter()
            .find(|id| records.first().is_some_and(|r| r.get(id).is_some()))
            .map(|id| id.to_string())
    });

    let targets = select_targets(&records, budget, &config.business, id_column.as_deref())?;
    let report = TargetingReport {
        generated_at: Utc::now().to_rfc3339(),
        budget,
        max_affordable: max_affordable(budget, config.business.retention_offer_cost, records.len())?,
        records_scored: records.len(),
        targets,
    };
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            println!(
                "✓ Selected {} targets, saved to {}",
                report.targets.len(),
                path
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Fit a model on the full configured dataset
fn fit_from_config(config: &AppConfig) -> Result<ChurnModel> {
    let dataset = load_churn_csv(&config.data.path, &config.data.target)?;
    fit_churn_model(
        &dataset.features,
        &dataset.labels,
        config.train.max_iterations,
    )
}
