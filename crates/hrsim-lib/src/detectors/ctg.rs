//! Sustained FHR deviations from the recording baseline.

use crate::{
    config::ClinicalThresholds,
    signal::{median, Series},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Acceleration,
    Deceleration,
}

/// Half-open sample range `[start, end)` with the times of its first and last sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRegion {
    pub kind: EventKind,
    pub start: usize,
    pub end: usize,
    pub start_time: f64,
    pub end_time: f64,
}

impl EventRegion {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }

    /// The part of the region before `index`, if any. `time` is the axis the
    /// region was detected on.
    pub fn clipped_to(&self, index: usize, time: &[f64]) -> Option<EventRegion> {
        if self.start >= index {
            return None;
        }
        let end = self.end.min(index);
        let end_time = time.get(end - 1).copied().unwrap_or(self.end_time);
        Some(EventRegion {
            end,
            end_time,
            ..self.clone()
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetection {
    /// Median FHR of the whole recording; `None` when it has no finite samples.
    pub baseline: Option<f64>,
    pub accelerations: Vec<EventRegion>,
    pub decelerations: Vec<EventRegion>,
}

impl EventDetection {
    /// Both kinds merged in ascending start order.
    pub fn regions(&self) -> Vec<&EventRegion> {
        let mut all: Vec<&EventRegion> = self
            .accelerations
            .iter()
            .chain(self.decelerations.iter())
            .collect();
        all.sort_by_key(|r| r.start);
        all
    }
}

/// Minimum region length in samples for a duration, ties included.
pub fn min_samples(duration_s: f64, fs: f64) -> usize {
    let raw = (duration_s * fs - 1e-9).ceil();
    if raw.is_finite() && raw > 1.0 {
        raw as usize
    } else {
        1
    }
}

pub fn detect_events(fhr: &Series, fs: f64, thresholds: &ClinicalThresholds) -> EventDetection {
    let Some(baseline) = median(&fhr.values) else {
        return EventDetection::default();
    };
    let fs = if fs.is_finite() && fs > 0.0 { fs } else { fhr.fs };

    let accel_mask: Vec<bool> = fhr
        .values
        .iter()
        .map(|&v| v > baseline + thresholds.accel_bpm)
        .collect();
    let decel_mask: Vec<bool> = fhr
        .values
        .iter()
        .map(|&v| v < baseline - thresholds.decel_bpm)
        .collect();

    let accelerations = runs(&accel_mask, min_samples(thresholds.accel_sec, fs))
        .into_iter()
        .map(|(start, end)| region(fhr, EventKind::Acceleration, start, end))
        .collect();
    let decelerations = runs(&decel_mask, min_samples(thresholds.decel_sec, fs))
        .into_iter()
        .map(|(start, end)| region(fhr, EventKind::Deceleration, start, end))
        .collect();

    EventDetection {
        baseline: Some(baseline),
        accelerations,
        decelerations,
    }
}

fn region(fhr: &Series, kind: EventKind, start: usize, end: usize) -> EventRegion {
    EventRegion {
        kind,
        start,
        end,
        start_time: fhr.time.get(start).copied().unwrap_or(f64::NAN),
        end_time: fhr.time.get(end - 1).copied().unwrap_or(f64::NAN),
    }
}

/// Runs of `true` at least `min_len` long.
fn runs(mask: &[bool], min_len: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut open: Option<usize> = None;
    for (i, &flag) in mask.iter().enumerate() {
        match (flag, open) {
            (true, None) => open = Some(i),
            (false, Some(start)) => {
                if i - start >= min_len {
                    out.push((start, i));
                }
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        if mask.len() - start >= min_len {
            out.push((start, mask.len()));
        }
    }
    out
}
