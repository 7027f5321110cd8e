use fmrec_data::prelude::*;
use fmrec_data::record::decode;
use fmrec_serving::prelude::*;
use fmrec_serving::{Transport, WirePredictor};

/// Five one-hot rows over 4 users and 6 items.
fn small_dataset() -> SparseDataset {
    let ratings = vec![
        Rating::new(1, 3, 4.0),
        Rating::new(0, 1, 5.0),
        Rating::new(3, 5, 3.0),
        Rating::new(2, 0, 2.0),
        Rating::new(1, 2, 4.0),
    ];
    OneHotEncoder::new(4, 6).unwrap().transform(&ratings).unwrap()
}

fn movielens_like(rows: u32) -> SparseDataset {
    let ratings: Vec<Rating> = (0..rows)
        .map(|i| Rating::new(i % 943, (i * 7) % 1_682, (i % 5 + 1) as f32))
        .collect();
    OneHotEncoder::new(943, 1_682).unwrap().transform(&ratings).unwrap()
}

/// Decodes each request and predicts every rating as 4 unless it fails on
/// the configured batch.
struct FakeEndpoint {
    calls: usize,
    fail_on: Option<usize>,
    rows_seen: usize,
}

impl Transport for FakeEndpoint {
    fn send(&mut self, request: &RecordStream) -> Result<Vec<PredictionResult>, BoxError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on == Some(call) {
            return Err("ModelError: endpoint returned 500".into());
        }
        let rows = decode(request)?;
        self.rows_seen += rows.len();
        Ok(rows.iter().map(|_| PredictionResult::new(4.0, 4.1)).collect())
    }
}

#[test]
fn scenario_rows_are_scored_in_order() {
    let dataset = small_dataset();
    assert_eq!(dataset.feature_count(), 10);
    assert_eq!(dataset.row(0).unwrap().indices, vec![1, 7]);

    let results = run_batched(&dataset, 2, |batch: &PredictionBatch<'_>| {
        Ok::<_, BoxError>(
            batch
                .rows()
                .iter()
                .map(|r| PredictionResult::new(r.label, r.label))
                .collect(),
        )
    })
    .unwrap();

    let predicted: Vec<f32> = results.iter().map(|r| r.predicted_label).collect();
    assert_eq!(predicted, vec![4.0, 5.0, 3.0, 2.0, 4.0]);
    assert_eq!(compute_accuracy(&predicted, &dataset.labels()).unwrap(), 1.0);
}

#[test]
fn wire_predictor_covers_every_row() {
    let dataset = movielens_like(1_050);
    let runner = BatchRunner::new(100).unwrap();
    let mut predictor = WirePredictor::new(FakeEndpoint {
        calls: 0,
        fail_on: None,
        rows_seen: 0,
    });

    let results = runner.run(&dataset, &mut predictor).unwrap();
    assert_eq!(results.len(), 1_050);
    assert_eq!(predictor.transport().calls, 11);
    assert_eq!(predictor.transport().rows_seen, 1_050);

    let report = EvaluationReport::from_results(&results, &dataset.labels()).unwrap();
    assert_eq!(report.count, 1_050);
    assert_eq!(report.correct, 210);
}

#[test]
fn failure_on_third_of_five_batches_returns_no_results() {
    let dataset = movielens_like(50);
    let runner = BatchRunner::new(10).unwrap();
    let mut predictor = WirePredictor::new(FakeEndpoint {
        calls: 0,
        fail_on: Some(2),
        rows_seen: 0,
    });

    let err = runner.run(&dataset, &mut predictor).unwrap_err();
    assert!(matches!(err, PredictionError::BatchFailed { batch_index: 2, .. }));
    assert_eq!(err.rows(), Some(20..30));
    assert_eq!(predictor.transport().calls, 3);
    assert!(err.to_string().contains("endpoint returned 500"));
}

#[test]
fn binarized_labels_evaluate_as_classes() {
    let dataset = binarize_labels(&movielens_like(200), 4.0);
    let config = PipelineConfig::builder()
        .batch_size(64)
        .remainder(RemainderPolicy::Drop)
        .build();
    let runner = BatchRunner::from_config(&config.inference).unwrap();

    let results = runner
        .run(&dataset, &mut |batch: &PredictionBatch<'_>| {
            Ok::<_, BoxError>(vec![PredictionResult::new(1.0, 0.8); batch.len()])
        })
        .unwrap();
    assert_eq!(results.len(), 192);

    let labels = &dataset.labels()[..results.len()];
    let report = EvaluationReport::from_results(&results, labels).unwrap();
    let positives = labels.iter().filter(|&&l| l == 1.0).count();
    assert_eq!(report.correct, positives);
}
