use clap::Parser;
use fmrec_cli::{Cli, Commands, CompressionArg, EncodeCommand, EvaluateCommand, InspectCommand};
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Writes a small MovieLens-style ratings file (tab separated, no header).
fn write_ratings(dir: &Path) -> PathBuf {
    let path = dir.join("u.data");
    std::fs::write(
        &path,
        "1\t3\t4\t881250949\n\
         0\t1\t5\t891717742\n\
         3\t5\t3\t878887116\n\
         2\t0\t2\t880606923\n\
         1\t2\t4\t886397596\n",
    )
    .unwrap();
    path
}

fn encode_command(tmp: &TempDir, input: PathBuf) -> EncodeCommand {
    EncodeCommand {
        input,
        output_dir: tmp.path().join("store"),
        key: "test/test.rec".to_string(),
        config: None,
        bucket: Some("ratings".to_string()),
        prefix: Some("fm".to_string()),
        compression: None,
        binarize_threshold: None,
        delimiter: "\\t".to_string(),
        no_header: true,
        num_users: Some(4),
        num_items: Some(6),
    }
}

#[test]
fn encode_then_inspect() {
    let tmp = tempdir().unwrap();
    let input = write_ratings(tmp.path());

    let uri = encode_command(&tmp, input).execute().unwrap();
    let path = tmp.path().join("store/ratings/fm/test/test.rec");
    assert!(uri.starts_with("file://"));
    assert!(path.exists());

    let summary = InspectCommand {
        input: path,
        compression: None,
        rows: 2,
    }
    .execute()
    .unwrap();

    assert_eq!(summary.records, 5);
    assert_eq!(summary.feature_count, 10);
    assert_eq!(summary.nnz, 10);
    assert_eq!(summary.bytes, 5 * 44);
    assert_eq!(summary.head.len(), 2);
    assert_eq!(summary.head[0].indices, vec![1, 7]);
    assert_eq!(summary.head[0].values, vec![1.0, 1.0]);
    assert_eq!(summary.head[0].label, 4.0);
    assert_eq!(summary.label_counts.get("4"), Some(&2));
}

#[test]
fn encode_binarized_and_compressed() {
    let tmp = tempdir().unwrap();
    let input = write_ratings(tmp.path());

    let mut cmd = encode_command(&tmp, input);
    cmd.key = "test/test.rec.gz".to_string();
    cmd.compression = Some(CompressionArg::Gzip);
    cmd.binarize_threshold = Some(4.0);
    cmd.execute().unwrap();

    let summary = InspectCommand {
        input: tmp.path().join("store/ratings/fm/test/test.rec.gz"),
        compression: None,
        rows: 0,
    }
    .execute()
    .unwrap();

    assert_eq!(summary.compression, "gzip");
    assert_eq!(summary.label_counts.get("1"), Some(&3));
    assert_eq!(summary.label_counts.get("0"), Some(&2));
    assert!(summary.head.is_empty());
}

#[test]
fn evaluate_replays_predictions() {
    let tmp = tempdir().unwrap();
    let input = write_ratings(tmp.path());
    encode_command(&tmp, input).execute().unwrap();

    let predictions = tmp.path().join("predictions.jsonl");
    std::fs::write(
        &predictions,
        r#"{"predicted_label":4.0,"score":3.5}
{"predicted_label":5.0,"score":5.0}

{"predicted_label":3.0,"score":3.0}
{"predicted_label":3.0,"score":2.5}
{"predicted_label":4.0,"score":4.0}
"#,
    )
    .unwrap();

    let cmd = EvaluateCommand {
        records: tmp.path().join("store/ratings/fm/test/test.rec"),
        predictions: predictions.clone(),
        config: None,
        batch_size: Some(2),
        drop_remainder: false,
        compression: None,
        binarize_threshold: None,
    };
    let report = cmd.execute().unwrap();
    assert_eq!(report.count, 5);
    assert_eq!(report.correct, 4);
    assert_eq!(report.accuracy, 0.8);
    assert!((report.mean_absolute_error - 0.2).abs() < 1e-9);

    let dropped = EvaluateCommand {
        drop_remainder: true,
        ..cmd
    }
    .execute()
    .unwrap();
    assert_eq!(dropped.count, 4);
}

#[test]
fn evaluate_takes_threshold_from_config() {
    let tmp = tempdir().unwrap();
    let input = write_ratings(tmp.path());
    encode_command(&tmp, input).execute().unwrap();

    let predictions = tmp.path().join("binary.jsonl");
    std::fs::write(
        &predictions,
        "{\"predicted_label\":1.0,\"score\":0.9}\n\
         {\"predicted_label\":1.0,\"score\":0.8}\n\
         {\"predicted_label\":0.0,\"score\":0.1}\n\
         {\"predicted_label\":0.0,\"score\":0.3}\n\
         {\"predicted_label\":0.0,\"score\":0.4}\n",
    )
    .unwrap();
    let config = tmp.path().join("pipeline.json");
    std::fs::write(&config, r#"{"labels":{"binarize_threshold":4.0}}"#).unwrap();

    let cmd = EvaluateCommand {
        records: tmp.path().join("store/ratings/fm/test/test.rec"),
        predictions,
        config: Some(config),
        batch_size: Some(2),
        drop_remainder: false,
        compression: None,
        binarize_threshold: None,
    };
    let report = cmd.execute().unwrap();
    assert_eq!(report.count, 5);
    assert_eq!(report.correct, 4);

    let err = EvaluateCommand {
        binarize_threshold: Some(f32::NAN),
        ..cmd
    }
    .execute()
    .unwrap_err();
    assert!(err.to_string().contains("Invalid pipeline configuration"));
}

#[test]
fn evaluate_fails_when_predictions_run_out() {
    let tmp = tempdir().unwrap();
    let input = write_ratings(tmp.path());
    encode_command(&tmp, input).execute().unwrap();

    let predictions = tmp.path().join("short.jsonl");
    std::fs::write(&predictions, "{\"predicted_label\":4.0,\"score\":4.0}\n").unwrap();

    let err = EvaluateCommand {
        records: tmp.path().join("store/ratings/fm/test/test.rec"),
        predictions,
        config: None,
        batch_size: Some(2),
        drop_remainder: false,
        compression: None,
        binarize_threshold: None,
    }
    .execute()
    .unwrap_err();
    assert!(err.to_string().contains("batch 0"));
}

#[test]
fn cli_parses_subcommands() {
    let cli = Cli::try_parse_from([
        "fmrec",
        "evaluate",
        "--records",
        "test.rec",
        "--predictions",
        "p.jsonl",
        "--batch-size",
        "50",
        "--drop-remainder",
    ])
    .unwrap();

    match cli.command {
        Commands::Evaluate(cmd) => {
            assert_eq!(cmd.batch_size, Some(50));
            assert!(cmd.drop_remainder);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let err = Cli::try_parse_from([
        "fmrec", "encode", "--input", "u.data", "--output-dir", "out", "--num-users", "3",
    ]);
    assert!(err.is_err());
}
