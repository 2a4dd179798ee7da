use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};

#[derive(Deserialize)]
struct HeartRateOutput {
    fs: f64,
    sample_count: usize,
    peak_count: usize,
    heart_rate_bpm: u32,
    peaks: Peaks,
}

#[derive(Deserialize)]
struct Peaks {
    indices: Vec<usize>,
}

#[derive(Deserialize)]
struct ExpectedFile {
    fs: f64,
    sample_count: usize,
    peak_count: usize,
    heart_rate_bpm: u32,
}

fn expected() -> Result<ExpectedFile, Box<dyn Error>> {
    let path = test_data("synthetic_ecg_250hz_expected.json");
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[test]
fn table_recording_matches_expected_rate() -> Result<(), Box<dyn Error>> {
    let expected = expected()?;
    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args([
        "heart-rate",
        "--table",
        &path_str("synthetic_ecg_250hz.tsv"),
        "--column",
        "ECG I",
        "--fs",
        "250",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: HeartRateOutput = serde_json::from_slice(&output)?;

    assert_eq!(actual.fs, expected.fs);
    assert_eq!(actual.sample_count, expected.sample_count);
    assert_eq!(actual.peak_count, expected.peak_count);
    assert_eq!(actual.peaks.indices.len(), expected.peak_count);
    assert_eq!(actual.heart_rate_bpm, expected.heart_rate_bpm);
    Ok(())
}

#[test]
fn sampling_rate_can_come_from_time_column() -> Result<(), Box<dyn Error>> {
    let expected = expected()?;
    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args([
        "heart-rate",
        "--table",
        &path_str("synthetic_ecg_250hz.tsv"),
        "--column",
        "ecg i",
        "--time-column",
        "Elapsed time",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: HeartRateOutput = serde_json::from_slice(&output)?;

    assert_close(actual.fs, expected.fs, 1e-6);
    assert_eq!(actual.heart_rate_bpm, expected.heart_rate_bpm);
    Ok(())
}

#[test]
fn newline_samples_from_file_and_stdin_agree() -> Result<(), Box<dyn Error>> {
    let expected = expected()?;
    let samples = path_str("synthetic_ecg_250hz.txt");

    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args(["heart-rate", "--fs", "250", "--input", &samples]);
    let from_file: HeartRateOutput =
        serde_json::from_slice(&cmd.assert().success().get_output().stdout)?;

    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args(["heart-rate", "--fs", "250"])
        .write_stdin(fs::read_to_string(&samples)?);
    let from_stdin: HeartRateOutput =
        serde_json::from_slice(&cmd.assert().success().get_output().stdout)?;

    assert_eq!(from_file.heart_rate_bpm, expected.heart_rate_bpm);
    assert_eq!(from_stdin.heart_rate_bpm, expected.heart_rate_bpm);
    assert_eq!(from_file.peaks.indices, from_stdin.peaks.indices);
    Ok(())
}

#[test]
fn config_file_supplies_rate_and_column() -> Result<(), Box<dyn Error>> {
    let expected = expected()?;
    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args([
        "--config",
        &path_str("hrx.toml"),
        "heart-rate",
        "--table",
        &path_str("synthetic_ecg_250hz.tsv"),
    ]);
    let actual: HeartRateOutput =
        serde_json::from_slice(&cmd.assert().success().get_output().stdout)?;
    assert_eq!(actual.fs, 250.0);
    assert_eq!(actual.heart_rate_bpm, expected.heart_rate_bpm);
    Ok(())
}

#[test]
fn prominence_override_changes_the_count() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args([
        "heart-rate",
        "--table",
        &path_str("synthetic_ecg_250hz.tsv"),
        "--column",
        "ECG I",
        "--fs",
        "250",
        "--prominence",
        "10",
    ]);
    let actual: HeartRateOutput =
        serde_json::from_slice(&cmd.assert().success().get_output().stdout)?;
    assert_eq!(actual.peak_count, 0);
    assert_eq!(actual.heart_rate_bpm, 0);
    Ok(())
}

#[test]
fn sub_nyquist_rate_is_rejected() {
    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args(["heart-rate", "--fs", "20"]).write_stdin("0.1\n0.2\n0.3\n");
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("Nyquist"), "stderr: {}", stderr);
}

#[test]
fn out_of_range_pipeline_flags_are_rejected() {
    let cases: [(&str, &str, &str); 2] = [
        ("--filter-order", "1000000000", "filter order"),
        ("--integration-window-s", "1e300", "integration window"),
    ];
    for (flag, value, message) in cases {
        let mut cmd = cargo_bin_cmd!("hrx");
        cmd.args(["heart-rate", "--fs", "250", flag, value])
            .write_stdin("0.1\n0.2\n0.3\n");
        let output = cmd.assert().failure().get_output().stderr.clone();
        let stderr = String::from_utf8_lossy(&output);
        assert!(stderr.contains(message), "{}: {}", flag, stderr);
        assert!(!stderr.contains("panicked"), "{}: {}", flag, stderr);
    }
}

#[test]
fn missing_column_is_reported() {
    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args([
        "heart-rate",
        "--table",
        &path_str("synthetic_ecg_250hz.tsv"),
        "--column",
        "ECG II",
        "--fs",
        "250",
    ]);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("no column 'ECG II'"), "stderr: {}", stderr);
}

#[test]
fn samples_without_rate_are_rejected() {
    let mut cmd = cargo_bin_cmd!("hrx");
    cmd.args(["heart-rate"]).write_stdin("0.1\n0.2\n");
    cmd.assert().failure();
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(
        diff <= tol,
        "diff {} exceeded tol {} ({} vs {})",
        diff,
        tol,
        a,
        b
    );
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn test_data(name: &str) -> PathBuf {
    workspace_root().join("test_data").join(name)
}

fn path_str(name: &str) -> String {
    test_data(name).to_string_lossy().to_string()
}
