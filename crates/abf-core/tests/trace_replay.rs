//! Trace replay through file-backed key sources and sinks

use std::fs;
use std::path::PathBuf;

use abf_core::domain::AdaptiveFilterConfigBuilder;
use abf_core::{ExperimentApi, ExperimentConfig, ExperimentRunner, FileSink, LineKeySource};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("abf-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_trace_replay_from_files() {
    let dir = scratch_dir("trace");
    let positives_path = dir.join("positives.txt");
    let probes_path = dir.join("probes.txt");
    let report_path = dir.join("report.txt");

    let positives: Vec<String> = (0..256).map(|i| format!("10.0.{}.{}", i / 16, i % 16)).collect();
    let mut probes: Vec<String> = positives.iter().step_by(4).cloned().collect();
    probes.extend((0..2000).map(|i| format!("172.16.{}.{}", i / 250, i % 250)));
    fs::write(&positives_path, positives.join("\n")).unwrap();
    fs::write(&probes_path, probes.join("\r\n")).unwrap();

    let filter = AdaptiveFilterConfigBuilder::new()
        .words(32)
        .bits_per_word(64)
        .hashes_per_group(3)
        .groups(2)
        .build()
        .unwrap();
    let runner = ExperimentRunner::new(ExperimentConfig::new(filter)).unwrap();

    let result = {
        let mut positive_source = LineKeySource::open(&positives_path).unwrap();
        let mut probe_source = LineKeySource::open(&probes_path).unwrap();
        let mut sink = FileSink::create(&report_path).unwrap();
        runner
            .run_trace(3, &mut positive_source, &mut probe_source, &mut sink)
            .unwrap()
    };

    assert_eq!(result.stored, 256);
    assert_eq!(result.tp, 64, "Every replayed positive is found");
    assert_eq!(result.fp + result.tn, 2000);

    let report = fs::read_to_string(&report_path).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "length stored: 256");
    assert!(lines[1].starts_with(&format!("Iteration 3. FP={}, TP=64", result.fp)));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_trace_file_is_an_io_error() {
    let missing = scratch_dir("missing").join("does-not-exist.txt");
    assert!(matches!(
        LineKeySource::open(&missing),
        Err(abf_core::DataError::Io(_))
    ));
}
