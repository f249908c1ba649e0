//! Integration test: training runs end-to-end with progress narration

use autotab::progress::{MemorySink, ProgressEvent};
use autotab::training::{
    Metrics, ProblemType, TrainingConfig, TrainingOrchestrator,
};
use polars::prelude::*;

/// Route run narration through the test writer; repeated calls are no-ops
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn purchase_df() -> DataFrame {
    let n = 40;
    let ages: Vec<f64> = (0..n).map(|i| 20.0 + (i % 20) as f64).collect();
    let cities: Vec<&str> = (0..n)
        .map(|i| if i % 2 == 0 { "paris" } else { "tokyo" })
        .collect();
    let labels: Vec<&str> = ages
        .iter()
        .map(|&a| if a > 30.0 { "yes" } else { "no" })
        .collect();
    df!(
        "age" => &ages,
        "city" => &cities,
        "purchased" => &labels,
    )
    .unwrap()
}

fn classification_config() -> TrainingConfig {
    TrainingConfig {
        target_column: "purchased".to_string(),
        feature_columns: vec!["age".to_string(), "city".to_string()],
        problem_type: ProblemType::Classification,
        train_ratio: 0.8,
    }
}

fn regression_df() -> DataFrame {
    let xs: Vec<f64> = (0..50).map(|i| i as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x + 1.0).collect();
    df!("x" => &xs, "y" => &ys).unwrap()
}

#[test]
fn test_classification_run_event_order() {
    init_tracing();
    let sink = MemorySink::new();
    let (outcome, artifact) =
        TrainingOrchestrator::run(&purchase_df(), &classification_config(), &sink);

    assert!(outcome.success, "run failed: {:?}", outcome.error);
    assert!(artifact.is_some());

    match outcome.metrics {
        Some(Metrics::Classification { accuracy }) => {
            assert!((0.0..=1.0).contains(&accuracy));
        }
        other => panic!("expected classification metrics, got {:?}", other),
    }

    let events = sink.events();
    let stages: Vec<&str> = events
        .iter()
        .map(|e| match e {
            ProgressEvent::ParamsReceived => "params",
            ProgressEvent::TargetColumn { .. } => "target",
            ProgressEvent::FeatureCount { .. } => "feature_count",
            ProgressEvent::ProblemTypeSelected { .. } => "problem_type",
            ProgressEvent::DataSize { .. } => "data_size",
            ProgressEvent::SplitRatio { .. } => "split_ratio",
            ProgressEvent::PreprocessingStarted => "prep_start",
            ProgressEvent::PreprocessingComplete { .. } => "prep_done",
            ProgressEvent::SplitComplete { .. } => "split_done",
            ProgressEvent::ModelSelected { .. } => "model",
            ProgressEvent::TrainingStarted => "train_start",
            ProgressEvent::TrainingComplete => "train_done",
            ProgressEvent::EvaluationStarted => "eval_start",
            ProgressEvent::MetricsReport { .. } => "metrics",
            ProgressEvent::SamplePrediction { .. } => "sample",
            ProgressEvent::TopFeatures { .. } => "top_features",
            ProgressEvent::Finished { .. } => "finished",
        })
        .collect();

    // 8 rows held out, so exactly 5 sample pairs are narrated
    assert_eq!(
        stages,
        vec![
            "params",
            "target",
            "feature_count",
            "problem_type",
            "data_size",
            "split_ratio",
            "prep_start",
            "prep_done",
            "split_done",
            "model",
            "train_start",
            "train_done",
            "eval_start",
            "metrics",
            "sample",
            "sample",
            "sample",
            "sample",
            "sample",
            "top_features",
            "finished",
        ]
    );

    match events.last() {
        Some(ProgressEvent::Finished { success: true, error: None }) => {}
        other => panic!("expected successful terminal event, got {:?}", other),
    }
}

#[test]
fn test_split_counts_match_ratio() {
    let sink = MemorySink::new();
    TrainingOrchestrator::run(&purchase_df(), &classification_config(), &sink);

    let split = sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            ProgressEvent::SplitComplete {
                train_count,
                test_count,
            } => Some((train_count, test_count)),
            _ => None,
        })
        .expect("split event missing");

    assert_eq!(split, (32, 8));
}

#[test]
fn test_regression_metrics_block() {
    let config = TrainingConfig {
        target_column: "y".to_string(),
        feature_columns: vec!["x".to_string()],
        problem_type: ProblemType::Regression,
        train_ratio: 0.8,
    };
    let sink = MemorySink::new();
    let (outcome, _) = TrainingOrchestrator::run(&regression_df(), &config, &sink);

    assert!(outcome.success);
    match outcome.metrics {
        Some(Metrics::Regression { rmse, r2, mse }) => {
            assert!(rmse >= 0.0);
            assert!((rmse * rmse - mse).abs() < 1e-9);
            assert!(r2 <= 1.0);
        }
        other => panic!("expected regression metrics, got {:?}", other),
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let df = purchase_df();
    let config = classification_config();

    let first = TrainingOrchestrator::run(&df, &config, &MemorySink::new());
    let second = TrainingOrchestrator::run(&df, &config, &MemorySink::new());

    assert_eq!(first.0.metrics, second.0.metrics);

    let a = first.1.unwrap();
    let b = second.1.unwrap();
    let mut imp_a: Vec<_> = a.feature_importance.iter().collect();
    let mut imp_b: Vec<_> = b.feature_importance.iter().collect();
    imp_a.sort_by(|x, y| x.0.cmp(y.0));
    imp_b.sort_by(|x, y| x.0.cmp(y.0));
    assert_eq!(imp_a, imp_b);
}

#[test]
fn test_failed_run_emits_single_terminal_event() {
    let config = TrainingConfig {
        target_column: "missing_column".to_string(),
        feature_columns: vec!["age".to_string()],
        problem_type: ProblemType::Classification,
        train_ratio: 0.8,
    };
    let sink = MemorySink::new();
    init_tracing();
    let (outcome, artifact) = TrainingOrchestrator::run(&purchase_df(), &config, &sink);

    assert!(!outcome.success);
    assert!(outcome.error.is_some());
    assert!(artifact.is_none());

    let terminals = sink
        .events()
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Finished { .. }))
        .count();
    assert_eq!(terminals, 1);
    match sink.events().last() {
        Some(ProgressEvent::Finished {
            success: false,
            error: Some(_),
        }) => {}
        other => panic!("expected failure terminal, got {:?}", other),
    }
}

#[test]
fn test_invalid_ratio_fails_before_preprocessing() {
    let mut config = classification_config();
    config.train_ratio = 1.5;

    let sink = MemorySink::new();
    let (outcome, _) = TrainingOrchestrator::run(&purchase_df(), &config, &sink);

    assert!(!outcome.success);
    // Validation rejects the run before any stage narration
    assert_eq!(sink.events().len(), 1);
}

#[test]
fn test_top_features_cover_all_columns_when_few() {
    let sink = MemorySink::new();
    let (_, artifact) =
        TrainingOrchestrator::run(&purchase_df(), &classification_config(), &sink);
    let artifact = artifact.unwrap();

    assert_eq!(artifact.feature_importance.len(), 2);
    let total: f64 = artifact.feature_importance.values().sum();
    assert!((total - 1.0).abs() < 0.01);

    let top = sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            ProgressEvent::TopFeatures { importances } => Some(importances),
            _ => None,
        })
        .expect("top features event missing");
    assert_eq!(top.len(), 2);
    assert!(top[0].importance >= top[1].importance);
}
