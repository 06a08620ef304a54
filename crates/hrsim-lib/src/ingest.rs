//! Column detection, sample-rate inference and short-recording expansion.

use crate::{
    config::Config,
    error::IngestError,
    io::Table,
    signal::{median, Series},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Signal column aliases, in priority order.
pub const SIGNAL_ALIASES: [&str; 6] = ["signal", "ecg", "val", "value", "v", "lead"];

/// Which analysis the caller wants out of the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// ECG when a signal column exists, CTG otherwise.
    #[default]
    Auto,
    Ecg,
    Ctg,
}

/// Analysis path selected for an ingested bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Ecg,
    Ctg,
}

/// Columns picked out of a table header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub time: Option<usize>,
    pub signal: Option<usize>,
    pub fhr: Option<usize>,
    pub uc: Option<usize>,
    /// Column 0 is only a time candidate; it must still prove monotonic.
    pub time_is_guess: bool,
}

impl ColumnMap {
    pub fn detect(table: &Table) -> Self {
        let time = table.find_column("time");
        let fhr = table.find_column("fhr");
        let uc = table.find_column("uc");
        let mut signal = SIGNAL_ALIASES
            .iter()
            .find_map(|alias| table.find_column(alias));
        if signal.is_none() && fhr.is_none() {
            let fallback = if table.column_count() >= 2 { 1 } else { 0 };
            if table.column_count() > 0 && Some(fallback) != time && Some(fallback) != uc {
                signal = Some(fallback);
            }
        }
        let mut map = Self {
            time,
            signal,
            fhr,
            uc,
            time_is_guess: false,
        };
        if map.time.is_none() && table.column_count() > 1 && !map.claims(0) {
            map.time = Some(0);
            map.time_is_guess = true;
        }
        map
    }

    fn claims(&self, col: usize) -> bool {
        [self.signal, self.fhr, self.uc].contains(&Some(col))
    }

    fn selected(&self) -> Vec<usize> {
        [self.time, self.signal, self.fhr, self.uc]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Everything ingestion produces for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBundle {
    pub kind: PipelineKind,
    /// Effective sampling frequency after inference.
    pub fs: f64,
    pub time: Vec<f64>,
    pub signal: Option<Series>,
    pub fhr: Option<Series>,
    pub uc: Option<Series>,
    /// How many copies of the recording were concatenated (1 = untouched).
    pub repeats: usize,
    /// Rows dropped because a selected cell was not a finite number.
    pub skipped_rows: usize,
}

impl SeriesBundle {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.fs
    }
}

/// Turn a raw table into time-aligned series.
pub fn ingest(
    table: &Table,
    mode: IngestMode,
    fs_hint: Option<f64>,
    cfg: &Config,
) -> Result<SeriesBundle, IngestError> {
    let columns = ColumnMap::detect(table);
    let kind = resolve_kind(&columns, mode)?;

    let selected = columns.selected();
    let mut parsed: Vec<Vec<f64>> = vec![Vec::with_capacity(table.row_count()); selected.len()];
    let mut skipped = 0usize;
    for (row_idx, row) in table.rows.iter().enumerate() {
        let values: Option<Vec<f64>> = selected
            .iter()
            .map(|&col| {
                row.get(col)
                    .and_then(|cell| cell.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
            })
            .collect();
        match values {
            Some(values) => {
                for (dst, v) in parsed.iter_mut().zip(values) {
                    dst.push(v);
                }
            }
            None => {
                skipped += 1;
                log::debug!("skipping row {}: non-numeric cell", row_idx + 2);
            }
        }
    }
    if skipped > 0 {
        warn!("skipped {skipped} row(s) with missing or non-numeric values");
    }

    let valid = parsed.first().map(Vec::len).unwrap_or(0);
    if valid < 2 {
        return Err(IngestError::EmptyOrShort { valid });
    }

    let take = |col: Option<usize>| -> Option<Vec<f64>> {
        col.and_then(|c| selected.iter().position(|&s| s == c))
            .map(|pos| parsed[pos].clone())
    };
    let mut time = take(columns.time);
    if columns.time_is_guess {
        let monotonic = time
            .as_ref()
            .map(|t| t.windows(2).all(|w| w[1] > w[0]))
            .unwrap_or(false);
        if !monotonic {
            time = None;
        }
    }
    let mut signal = take(columns.signal);
    let mut fhr = take(columns.fhr);
    let mut uc = take(columns.uc);

    let fs = resolve_fs(time.as_deref(), fs_hint, cfg.fs);

    let duration = valid as f64 / fs;
    let min_duration = cfg.min_simulation_duration_sec;
    let mut repeats = 1usize;
    if duration > 0.0 && duration < min_duration {
        repeats = (min_duration / duration).ceil() as usize;
        info!(
            "expanding recording: {duration:.1}s < {min_duration}s, repeating {repeats} times"
        );
        for series in [&mut signal, &mut fhr, &mut uc].into_iter().flatten() {
            *series = tile(series, repeats);
        }
        time = None;
    }

    let len = valid * repeats;
    let time = time.unwrap_or_else(|| {
        let dt = 1.0 / fs;
        (0..len).map(|i| i as f64 * dt).collect()
    });

    let wrap = |values: Option<Vec<f64>>| values.map(|v| Series::new(fs, time.clone(), v));
    Ok(SeriesBundle {
        kind,
        fs,
        signal: wrap(signal),
        fhr: wrap(fhr),
        uc: wrap(uc),
        time,
        repeats,
        skipped_rows: skipped,
    })
}

fn resolve_kind(columns: &ColumnMap, mode: IngestMode) -> Result<PipelineKind, IngestError> {
    match (mode, columns.signal.is_some(), columns.fhr.is_some()) {
        (IngestMode::Ecg, true, _) | (IngestMode::Auto, true, _) => Ok(PipelineKind::Ecg),
        (IngestMode::Ctg, _, true) | (IngestMode::Auto, false, true) => Ok(PipelineKind::Ctg),
        (IngestMode::Ecg, false, _) => Err(IngestError::NoUsableColumns(
            "could not detect an ECG signal column".into(),
        )),
        (IngestMode::Ctg, _, false) => Err(IngestError::NoUsableColumns(
            "could not detect an FHR column".into(),
        )),
        (IngestMode::Auto, false, false) => Err(IngestError::NoUsableColumns(
            "neither a signal nor an FHR column was found".into(),
        )),
    }
}

/// Median positive time step wins, then the caller's hint, then the configured default.
pub fn resolve_fs(time: Option<&[f64]>, hint: Option<f64>, default_fs: f64) -> f64 {
    if let Some(fs) = time.and_then(infer_fs) {
        info!("inferred sampling rate {fs:.3} Hz from time column (hint was {hint:?})");
        return fs;
    }
    match hint {
        Some(fs) if fs.is_finite() && fs > 0.0 => fs,
        _ => default_fs,
    }
}

/// `1 / median(positive diffs)` of a time axis, if it has any positive step.
pub fn infer_fs(time: &[f64]) -> Option<f64> {
    if time.len() < 2 {
        return None;
    }
    let diffs: Vec<f64> = time
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .collect();
    let step = median(&diffs)?;
    let fs = 1.0 / step;
    (fs.is_finite() && fs > 0.0).then_some(fs)
}

fn tile(data: &[f64], repeats: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len() * repeats);
    for _ in 0..repeats {
        out.extend_from_slice(data);
    }
    out
}
