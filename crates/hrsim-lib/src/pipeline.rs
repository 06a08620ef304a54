//! Ingest -> filter -> detect -> metrics, for both recording kinds.

use crate::{
    config::Config,
    detectors::{beat_times, detect_beats, detect_events, EventDetection},
    error::{FilterError, IngestError, PipelineError},
    filter::bandpass_filtfilt,
    ingest::{ingest, IngestMode, PipelineKind, SeriesBundle},
    io::{read_table, Table},
    metrics::{hrv_summary, savgol_smooth, short_term_variability, BaselineClass, HrvSummary},
    signal::{Events, RRSeries, Series},
};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancel flag, checked between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// ECG analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub raw: Series,
    pub filtered: Series,
    pub peaks: Events,
    /// Strictly increasing, on `filtered.time`
    pub peak_times: Vec<f64>,
    pub rr: RRSeries,
    pub hrv: Option<HrvSummary>,
}

impl AnalysisResult {
    /// Detection and metrics on an already filtered signal.
    pub fn from_filtered(raw: &Series, filtered: Series, cfg: &Config) -> Self {
        let peaks = detect_beats(&filtered, &cfg.peak_detection);
        let peak_times = beat_times(&filtered, &peaks);
        let rr = RRSeries::from_times(&peak_times);
        let hrv = hrv_summary(&rr);
        Self {
            raw: raw.clone(),
            filtered,
            peaks,
            peak_times,
            rr,
            hrv,
        }
    }
}

pub fn analyze_ecg(series: &Series, cfg: &Config) -> Result<AnalysisResult, FilterError> {
    let filtered = bandpass_filtfilt(series, &cfg.filter)?;
    Ok(AnalysisResult::from_filtered(series, filtered, cfg))
}

/// CTG analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtgAnalysis {
    pub fhr: Series,
    pub uc: Option<Series>,
    pub smoothed: Vec<f64>,
    /// One shorter than `fhr`
    pub stv: Vec<f64>,
    pub events: EventDetection,
    pub baseline_class: Option<BaselineClass>,
}

pub fn analyze_ctg(fhr: &Series, uc: Option<&Series>, cfg: &Config) -> CtgAnalysis {
    let events = detect_events(fhr, fhr.fs, &cfg.clinical_thresholds);
    let baseline_class = events
        .baseline
        .map(|b| BaselineClass::classify(b, &cfg.clinical_thresholds));
    CtgAnalysis {
        fhr: fhr.clone(),
        uc: uc.cloned(),
        smoothed: savgol_smooth(&fhr.values),
        stv: short_term_variability(&fhr.values),
        events,
        baseline_class,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Analysis {
    Ecg(AnalysisResult),
    Ctg(CtgAnalysis),
}

/// A fully analysed recording, ready for playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub fs: f64,
    pub repeats: usize,
    pub skipped_rows: usize,
    pub analysis: Analysis,
}

impl Dataset {
    pub fn kind(&self) -> PipelineKind {
        match self.analysis {
            Analysis::Ecg(_) => PipelineKind::Ecg,
            Analysis::Ctg(_) => PipelineKind::Ctg,
        }
    }

    pub fn time(&self) -> &[f64] {
        match &self.analysis {
            Analysis::Ecg(ecg) => &ecg.filtered.time,
            Analysis::Ctg(ctg) => &ctg.fhr.time,
        }
    }

    pub fn len(&self) -> usize {
        self.time().len()
    }

    pub fn is_empty(&self) -> bool {
        self.time().is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.fs
    }
}

/// Run the analysis matching the bundle's kind.
pub fn analyze(
    bundle: SeriesBundle,
    cfg: &Config,
    cancel: &CancelToken,
) -> Result<Dataset, PipelineError> {
    cancel.check()?;
    let analysis = match bundle.kind {
        PipelineKind::Ecg => {
            let raw = bundle.signal.as_ref().ok_or_else(|| {
                IngestError::NoUsableColumns("ECG analysis needs a signal column".into())
            })?;
            let filtered = bandpass_filtfilt(raw, &cfg.filter)?;
            cancel.check()?;
            Analysis::Ecg(AnalysisResult::from_filtered(raw, filtered, cfg))
        }
        PipelineKind::Ctg => {
            let fhr = bundle.fhr.as_ref().ok_or_else(|| {
                IngestError::NoUsableColumns("CTG analysis needs an FHR column".into())
            })?;
            Analysis::Ctg(analyze_ctg(fhr, bundle.uc.as_ref(), cfg))
        }
    };
    cancel.check()?;

    let dataset = Dataset {
        fs: bundle.fs,
        repeats: bundle.repeats,
        skipped_rows: bundle.skipped_rows,
        analysis,
    };
    match &dataset.analysis {
        Analysis::Ecg(ecg) => info!(
            "ECG analysis done: {} samples at {:.1} Hz, {} beats",
            dataset.len(),
            dataset.fs,
            ecg.peaks.len()
        ),
        Analysis::Ctg(ctg) => info!(
            "CTG analysis done: {} samples at {:.1} Hz, {} accelerations, {} decelerations",
            dataset.len(),
            dataset.fs,
            ctg.events.accelerations.len(),
            ctg.events.decelerations.len()
        ),
    }
    Ok(dataset)
}

pub fn load_table(
    table: &Table,
    mode: IngestMode,
    fs_hint: Option<f64>,
    cfg: &Config,
    cancel: &CancelToken,
) -> Result<Dataset, PipelineError> {
    cancel.check()?;
    let bundle = ingest(table, mode, fs_hint, cfg)?;
    analyze(bundle, cfg, cancel)
}

/// Read, ingest and analyse a CSV file.
pub fn load_path(
    path: &Path,
    mode: IngestMode,
    fs_hint: Option<f64>,
    cfg: &Config,
    cancel: &CancelToken,
) -> Result<Dataset, PipelineError> {
    info!("loading {}", path.display());
    let table = read_table(path)?;
    load_table(&table, mode, fs_hint, cfg, cancel)
}
