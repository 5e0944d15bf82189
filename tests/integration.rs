//! Integration tests for ChurnForge

use churnforge::data::PROBABILITY_FIELD;
use churnforge::decision::max_affordable;
use churnforge::metrics::{stratified_split, ClassificationMetrics};
use churnforge::{
    fit_churn_model, load_churn_csv, load_records, score_records, select_targets, AppConfig,
    BusinessConfig, ChurnError, ChurnScorer, Record, Value,
};
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a test CSV file with sample churn data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customerID,tenure,MonthlyCharges,Contract,Churn").unwrap();

    // Short tenure, high charges: churners
    writeln!(file, "C-01,1,95.5,Month-to-month,Yes").unwrap();
    writeln!(file, "C-02,2,89.1,Month-to-month,yes").unwrap();
    writeln!(file, "C-03,3,99.0,Month-to-month,YES").unwrap();
    writeln!(file, "C-04,5,85.3,Month-to-month,Yes").unwrap();
    writeln!(file, "C-05,4,92.7,Month-to-month,Yes").unwrap();

    // Long tenure, low charges: retained
    writeln!(file, "C-06,48,35.2,Two year,No").unwrap();
    writeln!(file, "C-07,60,30.0,Two year,no").unwrap();
    writeln!(file, "C-08,52,42.8,One year,No").unwrap();
    writeln!(file, "C-09,70,25.4,Two year, No").unwrap();
    writeln!(file, "C-10,39,45.0,One year,No").unwrap();

    file.flush().unwrap();
    file
}

/// Three churners against six retained customers
fn create_imbalanced_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customerID,tenure,MonthlyCharges,Churn").unwrap();
    writeln!(file, "C-01,1,95.5,Yes").unwrap();
    writeln!(file, "C-02,2,89.1,Yes").unwrap();
    writeln!(file, "C-03,4,92.7,Yes").unwrap();
    writeln!(file, "C-04,48,35.2,No").unwrap();
    writeln!(file, "C-05,60,30.0,No").unwrap();
    writeln!(file, "C-06,52,42.8,No").unwrap();
    writeln!(file, "C-07,70,25.4,No").unwrap();
    writeln!(file, "C-08,39,45.0,No").unwrap();
    writeln!(file, "C-09,65,28.9,No").unwrap();
    file.flush().unwrap();
    file
}

fn economics() -> BusinessConfig {
    BusinessConfig {
        retention_offer_cost: 100.0,
        retention_success_prob: 0.5,
        churn_value: 1000.0,
    }
}

#[test]
fn test_end_to_end_targeting() {
    let test_file = create_test_csv();
    let dataset = load_churn_csv(test_file.path(), "Churn").unwrap();
    assert_eq!(dataset.labels, vec![1, 1, 1, 1, 1, 0, 0, 0, 0, 0]);

    let model = fit_churn_model(&dataset.features, &dataset.labels, 500).unwrap();

    // Score the full file, identifier included
    let records = load_records(test_file.path()).unwrap();
    let scored = score_records(&model, &records).unwrap();

    let targets = select_targets(&scored, 300.0, &economics(), Some("customerID")).unwrap();
    assert!(targets.len() <= 3);
    assert!(!targets.is_empty());
    assert!(targets.iter().all(|t| t.expected_value > 0.0));
    assert!(targets
        .windows(2)
        .all(|w| w[0].expected_value >= w[1].expected_value));

    // Highest-risk customers come from the churner block
    let churners = ["C-01", "C-02", "C-03", "C-04", "C-05"];
    for target in &targets {
        assert!(churners.contains(&target.id.as_deref().unwrap()));
    }
}

#[test]
fn test_minority_churners_score_highest() {
    let test_file = create_imbalanced_csv();
    let dataset = load_churn_csv(test_file.path(), "Churn").unwrap();
    assert_eq!(dataset.label_counts(), (6, 3));

    let model = fit_churn_model(&dataset.features, &dataset.labels, 500).unwrap();
    let records = load_records(test_file.path()).unwrap();
    let scored = score_records(&model, &records).unwrap();

    let targets = select_targets(&scored, 300.0, &economics(), Some("customerID")).unwrap();
    let ids: Vec<&str> = targets.iter().map(|t| t.id.as_deref().unwrap()).collect();
    assert_eq!(targets.len(), 3);
    for id in ["C-01", "C-02", "C-03"] {
        assert!(ids.contains(&id), "{} not targeted: {:?}", id, ids);
    }
}

#[test]
fn test_concrete_budget_scenario() {
    let records: Vec<Record> = [0.9, 0.5, 0.1]
        .iter()
        .map(|&p| Record::new().with(PROBABILITY_FIELD, Value::Number(p)))
        .collect();

    let targets = select_targets(&records, 150.0, &economics(), None).unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].expected_value, 350.0);
    assert_eq!(targets[0].churn_probability, 0.9);

    let targets = select_targets(&records, 50.0, &economics(), None).unwrap();
    assert!(targets.is_empty());
}

#[test]
fn test_scored_csv_without_probability_fails() {
    let test_file = create_test_csv();
    let records = load_records(test_file.path()).unwrap();
    let err = select_targets(&records, 1000.0, &economics(), None).unwrap_err();
    assert!(matches!(err, ChurnError::MissingField { record: 0, .. }));
}

#[test]
fn test_scored_csv_with_probability_column() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "id,churn_probability").unwrap();
    writeln!(file, "7,0.25").unwrap();
    writeln!(file, "8,0.95").unwrap();
    writeln!(file, "9,0.6").unwrap();
    file.flush().unwrap();

    let records = load_records(file.path()).unwrap();
    let targets = select_targets(&records, 1000.0, &economics(), Some("id")).unwrap();
    let ids: Vec<Option<String>> = targets.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec![Some("8".to_string()), Some("9".to_string()), Some("7".to_string())]);
}

#[test]
fn test_unrecognized_labels_fail_loading() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "tenure,Churn").unwrap();
    writeln!(file, "1,Yes").unwrap();
    writeln!(file, "2,maybe").unwrap();
    writeln!(file, "3,No").unwrap();
    file.flush().unwrap();

    let err = load_churn_csv(file.path(), "Churn").unwrap_err();
    let churn_err = err.downcast_ref::<ChurnError>().unwrap();
    assert_eq!(
        churn_err,
        &ChurnError::UnrecognizedLabel {
            values: vec!["maybe".to_string()],
            truncated: false
        }
    );
}

#[test]
fn test_boolean_and_numeric_label_columns() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "tenure,Exited,Churned").unwrap();
    writeln!(file, "1,1,true").unwrap();
    writeln!(file, "2,0,false").unwrap();
    writeln!(file, "3,,true").unwrap();
    file.flush().unwrap();

    let dataset = load_churn_csv(file.path(), "Exited").unwrap();
    assert_eq!(dataset.labels, vec![1, 0, 0]);

    let dataset = load_churn_csv(file.path(), "Churned").unwrap();
    assert_eq!(dataset.labels, vec![1, 0, 1]);
}

#[test]
fn test_float_label_column_with_gaps() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "tenure,Exited").unwrap();
    writeln!(file, "1,1.0").unwrap();
    writeln!(file, "2,0.0").unwrap();
    writeln!(file, "3,").unwrap();
    writeln!(file, "4,1.0").unwrap();
    file.flush().unwrap();

    let dataset = load_churn_csv(file.path(), "Exited").unwrap();
    assert_eq!(dataset.labels, vec![1, 0, 0, 1]);
}

#[test]
fn test_holdout_evaluation() {
    let test_file = create_test_csv();
    let dataset = load_churn_csv(test_file.path(), "Churn").unwrap();
    let split = stratified_split(&dataset.labels, 0.4, 42).unwrap();
    assert_eq!(split.test.len(), 4);

    let pick = |indices: &[usize]| -> (Vec<Record>, Vec<u8>) {
        indices
            .iter()
            .map(|&i| (dataset.features[i].clone(), dataset.labels[i]))
            .unzip()
    };
    let (x_train, y_train) = pick(&split.train);
    let (x_test, y_test) = pick(&split.test);

    let model = fit_churn_model(&x_train, &y_train, 500).unwrap();
    let probabilities = model.predict_proba(&x_test).unwrap();
    let metrics = ClassificationMetrics::compute(&y_test, &probabilities.to_vec()).unwrap();

    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert!((0.0..=1.0).contains(&metrics.roc_auc));
    let total: usize = metrics.confusion_matrix.iter().flatten().sum();
    assert_eq!(total, 4);
}

#[test]
fn test_config_drives_targeting() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "project_name: churn\ndata:\n  path: data.csv\n  target: Churn\nbusiness:\n  retention_offer_cost: 40\n  retention_success_prob: 0.4\n  churn_value: 500"
    )
    .unwrap();
    file.flush().unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(max_affordable(130.0, config.business.retention_offer_cost, 10).unwrap(), 3);

    // EV = p * 0.4 * 500 - 40, positive above p = 0.2
    let records: Vec<Record> = [0.1, 0.2, 0.5, 0.9]
        .iter()
        .map(|&p| Record::new().with(PROBABILITY_FIELD, Value::Number(p)))
        .collect();
    let targets = select_targets(&records, 130.0, &config.business, None).unwrap();
    let probabilities: Vec<f64> = targets.iter().map(|t| t.churn_probability).collect();
    assert_eq!(probabilities, vec![0.9, 0.5]);
}
