use hrsim_lib::{io::Table, Config, IngestError, IngestMode, PipelineError, PipelineKind};
use hrsim_run::{PlaybackState, Session, SessionError, SessionEvent};
use std::io::Write;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(30);

fn quick_config() -> Config {
    Config {
        min_simulation_duration_sec: 10.0,
        ..Config::default()
    }
}

fn fhr_table(len: usize) -> Table {
    let time: Vec<f64> = (0..len).map(|i| i as f64 * 0.25).collect();
    let fhr: Vec<f64> = (0..len)
        .map(|i| if (100..180).contains(&i) { 160.0 } else { 140.0 })
        .collect();
    Table::from_columns(&["time", "FHR"], &[time, fhr])
}

fn ecg_table(seconds: f64) -> Table {
    let fs = 250.0;
    let n = (seconds * fs) as usize;
    let time: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
    let ecg: Vec<f64> = (0..n)
        .map(|i| if i % 250 == 125 { 1.0 } else { 0.0 })
        .collect();
    Table::from_columns(&["time", "ecg"], &[time, ecg])
}

#[test]
fn load_creates_stopped_playback() {
    let mut session = Session::new(quick_config());
    session
        .submit_table(fhr_table(400), IngestMode::Auto, None)
        .unwrap();
    assert!(session.is_loading());
    match session.wait(WAIT) {
        Some(SessionEvent::Loaded(dataset)) => assert_eq!(dataset.kind(), PipelineKind::Ctg),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!session.is_loading());
    let playback = session.playback().unwrap();
    assert_eq!(playback.state(), PlaybackState::Stopped);
    assert_eq!(playback.index(), 0);
    assert_eq!(playback.speed(), 10.0);
}

#[test]
fn second_submit_while_loading_is_rejected() {
    let mut session = Session::new(quick_config());
    session
        .submit_table(ecg_table(12.0), IngestMode::Auto, None)
        .unwrap();
    let err = session
        .submit_table(fhr_table(400), IngestMode::Auto, None)
        .unwrap_err();
    assert_eq!(err, SessionError::LoadInFlight);
    assert!(matches!(session.wait(WAIT), Some(SessionEvent::Loaded(_))));
}

#[test]
fn failed_load_keeps_previous_dataset() {
    let mut session = Session::new(quick_config());
    session
        .submit_table(fhr_table(400), IngestMode::Auto, None)
        .unwrap();
    assert!(matches!(session.wait(WAIT), Some(SessionEvent::Loaded(_))));
    let before = session.dataset().cloned().unwrap();

    let playback = session.playback_mut().unwrap();
    playback.play();
    playback.tick(100.0);
    let index = playback.index();
    assert!(index > 0);

    session
        .submit_table(fhr_table(400), IngestMode::Ecg, None)
        .unwrap();
    match session.wait(WAIT) {
        Some(SessionEvent::Failed(PipelineError::Ingest(IngestError::NoUsableColumns(_)))) => {}
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(std::sync::Arc::ptr_eq(session.dataset().unwrap(), &before));
    let playback = session.playback().unwrap();
    assert_eq!(playback.index(), index);
    assert_eq!(playback.state(), PlaybackState::Paused);
}

#[test]
fn newer_load_replaces_older() {
    let mut session = Session::new(quick_config());
    session
        .submit_table(fhr_table(400), IngestMode::Auto, None)
        .unwrap();
    assert!(matches!(session.wait(WAIT), Some(SessionEvent::Loaded(_))));
    session
        .submit_table(ecg_table(12.0), IngestMode::Auto, None)
        .unwrap();
    assert!(matches!(session.wait(WAIT), Some(SessionEvent::Loaded(_))));
    assert_eq!(session.dataset().unwrap().kind(), PipelineKind::Ecg);
    assert_eq!(session.playback().unwrap().speed(), 1.0);
}

#[test]
fn cancelled_load_is_never_applied() {
    let mut session = Session::new(quick_config());
    let first = session
        .submit_table(ecg_table(12.0), IngestMode::Auto, None)
        .unwrap();
    assert!(session.cancel_load());
    assert!(!session.cancel_load());
    let second = session
        .submit_table(fhr_table(400), IngestMode::Auto, None)
        .unwrap();
    assert!(second > first);
    match session.wait(WAIT) {
        Some(SessionEvent::Loaded(dataset)) => assert_eq!(dataset.kind(), PipelineKind::Ctg),
        other => panic!("unexpected outcome {other:?}"),
    }
    std::thread::sleep(Duration::from_millis(50));
    assert!(session.poll().is_empty());
    assert_eq!(session.dataset().unwrap().kind(), PipelineKind::Ctg);
}

#[test]
fn loads_from_a_file_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Time,FHR,UC").unwrap();
    for i in 0..200 {
        writeln!(file, "{},{},{}", i as f64 * 0.25, 138 + i % 5, i % 20).unwrap();
    }
    let mut session = Session::new(quick_config());
    session
        .submit_path(file.path(), IngestMode::Ctg, None)
        .unwrap();
    match session.wait(WAIT) {
        Some(SessionEvent::Loaded(dataset)) => {
            assert_eq!(dataset.len(), 200);
            assert!((dataset.fs - 4.0).abs() < 1e-6);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn poll_without_work_is_empty() {
    let mut session = Session::new(Config::default());
    assert!(session.poll().is_empty());
    assert!(session.wait(Duration::from_millis(10)).is_none());
    assert!(session.playback().is_none());
}

#[test]
fn repeated_cancel_never_blocks_submit() {
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let mut session = Session::new(quick_config());
        for cycle in 0..40 {
            let table = if cycle % 2 == 0 {
                ecg_table(12.0)
            } else {
                fhr_table(400)
            };
            session
                .submit_table(table, IngestMode::Auto, None)
                .unwrap();
            std::thread::sleep(Duration::from_millis(5));
            assert!(session.cancel_load());
        }
        session
            .submit_table(fhr_table(400), IngestMode::Auto, None)
            .unwrap();
        let loaded = matches!(session.wait(WAIT), Some(SessionEvent::Loaded(_)));
        drop(session);
        let _ = done_tx.send(loaded);
    });
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(60)), Ok(true));
}
