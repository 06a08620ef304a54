use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, path::Path};
use tempfile::{tempdir, TempDir};

/// Scratch directory with a config that skips short-recording expansion
/// below ten seconds.
fn workspace() -> Result<TempDir, Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("config.json"),
        r#"{"MIN_SIMULATION_DURATION_SEC": 10}"#,
    )?;
    Ok(dir)
}

fn write_ecg(path: &Path, seconds: usize) -> Result<(), Box<dyn Error>> {
    let fs = 250;
    let mut text = String::from("Time,ECG\n");
    for i in 0..seconds * fs {
        let value = if i % fs == fs / 2 { 1.0 } else { 0.0 };
        text.push_str(&format!("{:.4},{}\n", i as f64 / fs as f64, value));
    }
    fs::write(path, text)?;
    Ok(())
}

fn write_fhr(path: &Path, len: usize) -> Result<(), Box<dyn Error>> {
    let mut text = String::from("FHR\n");
    for i in 0..len {
        let value = if (100..180).contains(&i) { 160 } else { 140 };
        text.push_str(&format!("{value}\n"));
    }
    fs::write(path, text)?;
    Ok(())
}

fn json_lines(stdout: &[u8]) -> Result<Vec<Value>, Box<dyn Error>> {
    let text = std::str::from_utf8(stdout)?;
    Ok(text
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?)
}

#[test]
fn config_command_creates_defaults() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("config.json");
    let output = cargo_bin_cmd!("hrsim")
        .args(["config", "--config", config.to_str().expect("utf8 path")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let printed: Value = serde_json::from_slice(&output)?;
    assert_eq!(printed["FILTER"]["ORDER"], 5);
    let written: Value = serde_json::from_str(&fs::read_to_string(&config)?)?;
    assert_eq!(written["SIMULATION_WINDOW_SEC"], 30.0);
    Ok(())
}

#[test]
fn analyze_ecg_recording() -> Result<(), Box<dyn Error>> {
    let dir = workspace()?;
    let input = dir.path().join("ecg.csv");
    write_ecg(&input, 12)?;
    let output = cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args(["analyze", "--input", input.to_str().expect("utf8 path")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output)?;
    assert_eq!(summary["kind"], "ecg");
    assert_eq!(summary["repeats"], 1);
    let fs = summary["fs"].as_f64().unwrap_or_default();
    assert!((fs - 250.0).abs() < 0.01, "fs {fs}");
    let beats = summary["ecg"]["beats"].as_u64().unwrap_or_default();
    assert!((11..=13).contains(&beats), "{beats} beats");
    let bpm = summary["ecg"]["hrv"]["bpm"].as_f64().unwrap_or_default();
    assert!((bpm - 60.0).abs() < 3.0, "bpm {bpm}");
    Ok(())
}

#[test]
fn analyze_text_summary() -> Result<(), Box<dyn Error>> {
    let dir = workspace()?;
    let input = dir.path().join("ecg.csv");
    write_ecg(&input, 12)?;
    let output = cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args(["analyze", "--text", "--input", input.to_str().expect("utf8 path")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output)?;
    assert!(text.contains("Heart Rate (bpm)"));
    assert!(text.contains("RMSSD (ms)"));
    Ok(())
}

#[test]
fn short_recording_is_expanded() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("ecg.csv");
    write_ecg(&input, 12)?;
    let output = cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args(["analyze", "--input", input.to_str().expect("utf8 path")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output)?;
    assert!(summary["repeats"].as_u64().unwrap_or_default() >= 25);
    assert!(summary["duration_sec"].as_f64().unwrap_or_default() >= 300.0);
    Ok(())
}

#[test]
fn events_on_fhr_plateau() -> Result<(), Box<dyn Error>> {
    let dir = workspace()?;
    let input = dir.path().join("fhr.csv");
    write_fhr(&input, 400)?;
    let output = cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args(["events", "--fs", "4", "--input", input.to_str().expect("utf8 path")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let events: Value = serde_json::from_slice(&output)?;
    assert_eq!(events["baseline"], 140.0);
    let accels = events["accelerations"].as_array().cloned().unwrap_or_default();
    assert_eq!(accels.len(), 1);
    assert_eq!(accels[0]["start"], 100);
    assert_eq!(accels[0]["end"], 180);
    assert_eq!(accels[0]["kind"], "acceleration");
    assert!(events["decelerations"].as_array().map_or(false, Vec::is_empty));
    Ok(())
}

#[test]
fn events_need_an_fhr_column() -> Result<(), Box<dyn Error>> {
    let dir = workspace()?;
    let input = dir.path().join("ecg.csv");
    write_ecg(&input, 12)?;
    let stderr = cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args(["events", "--input", input.to_str().expect("utf8 path")])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&stderr).contains("FHR"));
    Ok(())
}

#[test]
fn simulate_runs_to_the_end() -> Result<(), Box<dyn Error>> {
    let dir = workspace()?;
    let input = dir.path().join("fhr.csv");
    write_fhr(&input, 400)?;
    let output = cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args([
            "simulate",
            "--fs",
            "4",
            "--speed",
            "100",
            "--period-ms",
            "25",
            "--ticks",
            "0",
            "--every",
            "10",
            "--input",
            input.to_str().expect("utf8 path"),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let frames = json_lines(&output)?;
    assert_eq!(frames.len(), 4);
    let last = &frames[3];
    assert_eq!(last["state"], "stopped");
    assert_eq!(last["index"], 399);
    assert_eq!(last["accelerations"], 1);
    Ok(())
}

#[test]
fn simulate_index_tracks_ticks() -> Result<(), Box<dyn Error>> {
    let dir = workspace()?;
    let input = dir.path().join("fhr.csv");
    write_fhr(&input, 400)?;
    let output = cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args([
            "simulate",
            "--fs",
            "4",
            "--speed",
            "10",
            "--period-ms",
            "25",
            "--ticks",
            "30",
            "--every",
            "30",
            "--input",
            input.to_str().expect("utf8 path"),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let frames = json_lines(&output)?;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["index"], 30);
    assert_eq!(frames[0]["state"], "running");
    assert_eq!(frames[0]["range"][0], 0.0);
    Ok(())
}

#[test]
fn unparsable_config_falls_back_to_defaults() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("config.json");
    fs::write(&config, "{ broken")?;
    let output = cargo_bin_cmd!("hrsim")
        .args(["config", "--config", config.to_str().expect("utf8 path")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let printed: Value = serde_json::from_slice(&output)?;
    assert_eq!(printed["FS"], 500.0);
    assert_eq!(fs::read_to_string(&config)?, "{ broken");
    Ok(())
}

#[test]
fn missing_input_fails() {
    let dir = tempdir().expect("tempdir");
    cargo_bin_cmd!("hrsim")
        .current_dir(dir.path())
        .args(["analyze", "--input", "does-not-exist.csv"])
        .assert()
        .failure();
}
