//! Study workflows on the reference models: flood exceedance, propagation,
//! sample export.

use u_reliability::config::EstimatorConfig;
use u_reliability::estimator::{ExceedanceEstimator, StopReason};
use u_reliability::event::ExceedanceEvent;
use u_reliability::function::{EvaluationError, EvaluationFunction, Instrumented, Memoized};
use u_reliability::io::read_samples;
use u_reliability::mean::MeanEstimator;
use u_reliability::models::{
    FloodHeight, FloodOverflow, Ishigami, LogisticGrowth, NonlinearOscillator, ReferenceModel,
    StochasticFloodOverflow, TubeDeflection,
};
use u_reliability::propagation::propagate;
use u_reliability::random::create_rng;

#[test]
fn flood_height_exceedance() {
    // Reference P(H > 3) ≈ 0.273 from a 400k-draw run
    let model = FloodHeight::default();
    let est = ExceedanceEstimator::new(
        EstimatorConfig::default()
            .with_max_samples(20_000)
            .with_target_cov(0.02)
            .with_batch_size(500)
            .with_parallel(true),
    )
    .unwrap()
    .estimate(
        &model.input_spec().unwrap(),
        &model,
        &ExceedanceEvent::greater(3.0),
        &mut create_rng(0),
    )
    .unwrap();
    assert!((est.probability - 0.273).abs() < 0.025, "p = {}", est.probability);
    assert!(est.output.min >= 0.0);
    assert!((est.output.mean - 2.55).abs() < 0.1, "mean H = {}", est.output.mean);
}

#[test]
fn flood_overflow_is_rare() {
    // Reference P(S ≥ 0) ≈ 6e-4
    let model = FloodOverflow::default();
    let est = ExceedanceEstimator::new(
        EstimatorConfig::default()
            .with_max_samples(20_000)
            .with_target_cov(0.1)
            .with_batch_size(1000),
    )
    .unwrap()
    .estimate(
        &model.input_spec().unwrap(),
        &model,
        &FloodOverflow::event(),
        &mut create_rng(1),
    )
    .unwrap();
    assert!(est.probability < 0.003, "p = {}", est.probability);
    assert!(est.confidence_interval.upper > est.probability);
    assert!(est.output.max > est.output.mean);
}

#[test]
fn stochastic_flood_is_reproducible_in_parallel() {
    let model = StochasticFloodOverflow::default();
    let input = model.input_spec().unwrap();
    let config = EstimatorConfig::default()
        .with_max_samples(2000)
        .with_target_cov(1e-9)
        .with_batch_size(100);
    let run = |parallel: bool| {
        ExceedanceEstimator::new(config.clone().with_parallel(parallel))
            .unwrap()
            .estimate(&input, &model, &ExceedanceEvent::greater(-10.0), &mut create_rng(6))
            .unwrap()
    };
    let sequential = run(false);
    assert_eq!(sequential, run(true));
    assert_eq!(sequential, run(false));
    assert!(sequential.probability > 0.0 && sequential.probability < 1.0);

    assert_eq!(
        Memoized::new(model).unwrap_err(),
        EvaluationError::StochasticMemoization
    );
}

#[test]
fn propagation_summary_and_csv_export() {
    let model = Ishigami::default();
    let input = model.input_spec().unwrap();
    let sample = propagate(&input, &model, 20_000, &mut create_rng(12)).unwrap();

    let summary = sample.summary().unwrap();
    assert!((summary.mean - model.mean()).abs() < 0.15, "mean = {}", summary.mean);
    assert!(summary.min < summary.mean && summary.mean < summary.max);

    let hist = sample.histogram(30);
    assert_eq!(hist.len(), 30);
    let width = hist[1].0 - hist[0].0;
    let area: f64 = hist.iter().map(|(_, d)| d * width).sum();
    assert!((area - 1.0).abs() < 1e-9);

    let mut buffer = Vec::new();
    sample.write_csv(&mut buffer, model.output_name()).unwrap();
    let table = read_samples(buffer.as_slice()).unwrap();
    assert_eq!(table.input_names, vec!["X1", "X2", "X3"]);
    assert_eq!(table.output_name, "Y");
    assert_eq!(table.outputs, sample.outputs);
    assert_eq!(table.inputs, sample.inputs);
}

#[test]
fn instrumented_model_records_history() {
    let model = Instrumented::with_history(TubeDeflection);
    let input = TubeDeflection.input_spec().unwrap();
    let sample = propagate(&input, &model, 50, &mut create_rng(2)).unwrap();
    assert_eq!(model.calls(), 50);
    assert_eq!(model.output_history(), sample.outputs);
    assert!(sample.outputs.iter().all(|&y| y < 0.0));
    assert_eq!(model.input_dimension(), Some(6));
}

#[test]
fn estimate_report_is_json() {
    let model = FloodHeight::default();
    let est = ExceedanceEstimator::new(EstimatorConfig::default().with_max_samples(200).with_batch_size(50))
        .unwrap()
        .estimate(
            &model.input_spec().unwrap(),
            &model,
            &ExceedanceEvent::greater(3.0),
            &mut create_rng(3),
        )
        .unwrap();
    let report: serde_json::Value = serde_json::from_str(&est.to_json().unwrap()).unwrap();
    assert_eq!(report["draws"], 200);
    assert_eq!(report["confidence_interval"]["level"], 0.95);
}

#[test]
fn oscillator_mean_force_to_target_precision() {
    let model = NonlinearOscillator;
    let est = MeanEstimator::new(
        EstimatorConfig::default()
            .with_max_samples(50_000)
            .with_target_cov(0.01)
            .with_batch_size(200)
            .with_parallel(true),
    )
    .unwrap()
    .estimate(&model.input_spec().unwrap(), &model, &mut create_rng(13))
    .unwrap();
    assert_eq!(est.stop_reason, StopReason::TargetCoefficientOfVariation);
    assert!(est.coefficient_of_variation.unwrap() <= 0.01);
    assert!(est.samples_used < 50_000);
    // The nominal force is a rough guide to the mean
    let nominal = model
        .evaluate(&NonlinearOscillator::nominal(), &mut create_rng(0))
        .unwrap();
    assert!((est.mean / nominal - 1.0).abs() < 0.5, "mean = {}", est.mean);
}

#[test]
fn logistic_population_mean_runs_to_budget() {
    let model = LogisticGrowth { time: 1900.0 };
    let est = MeanEstimator::new(
        EstimatorConfig::default()
            .with_max_samples(4000)
            .with_target_cov(1e-6)
            .with_batch_size(500),
    )
    .unwrap()
    .estimate(&model.input_spec().unwrap(), &model, &mut create_rng(14))
    .unwrap();
    assert_eq!(est.stop_reason, StopReason::MaxSamples);
    assert_eq!(est.samples_used, 4000);
    // Right-skewed: the mean sits above the nominal 76.5
    assert!(est.mean > 80.0 && est.mean < 105.0, "mean = {}", est.mean);
    assert!(est.confidence_interval.contains(est.mean));
}
