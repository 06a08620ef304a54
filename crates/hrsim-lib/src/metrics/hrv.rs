use crate::signal::RRSeries;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-domain HRV over a run of RR intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvSummary {
    /// Number of RR intervals used
    pub n: usize,
    pub mean_rr_ms: f64,
    pub bpm: f64,
    /// Population standard deviation of RR
    pub sdnn_ms: f64,
    pub rmssd_ms: f64,
    /// Share of successive differences above 50 ms, in percent
    pub pnn50: f64,
}

/// `None` below two RR intervals or when any figure would not be finite.
pub fn hrv_summary(rr: &RRSeries) -> Option<HrvSummary> {
    let n = rr.rr.len();
    if n < 2 {
        return None;
    }
    let mean = rr.rr.iter().sum::<f64>() / n as f64;
    if mean <= 0.0 {
        return None;
    }
    let sdnn = (rr.rr.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();

    let diffs: Vec<f64> = rr.rr.windows(2).map(|w| w[1] - w[0]).collect();
    let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt();
    let count = diffs.iter().filter(|d| d.abs() > 0.050).count();
    let pnn50 = 100.0 * count as f64 / diffs.len() as f64;

    let mean_rr_ms = mean * 1000.0;
    let summary = HrvSummary {
        n,
        mean_rr_ms,
        bpm: 60_000.0 / mean_rr_ms,
        sdnn_ms: sdnn * 1000.0,
        rmssd_ms: rmssd * 1000.0,
        pnn50,
    };
    summary.is_finite().then_some(summary)
}

impl HrvSummary {
    fn is_finite(&self) -> bool {
        [
            self.mean_rr_ms,
            self.bpm,
            self.sdnn_ms,
            self.rmssd_ms,
            self.pnn50,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Labelled figures in display order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("Heart Rate (bpm)", self.bpm),
            ("Mean RR Interval (ms)", self.mean_rr_ms),
            ("SDNN (ms)", self.sdnn_ms),
            ("RMSSD (ms)", self.rmssd_ms),
            ("pNN50 (%)", self.pnn50),
        ]
    }
}

impl fmt::Display for HrvSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HRV summary ({} RR intervals)", self.n)?;
        for (label, value) in self.entries() {
            writeln!(f, "{label}: {value:.1}")?;
        }
        Ok(())
    }
}
