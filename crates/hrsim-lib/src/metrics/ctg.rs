//! Trace-level figures for fetal heart-rate recordings.

use crate::config::ClinicalThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window length of the Savitzky–Golay smoother (samples, odd).
pub const SAVGOL_WINDOW: usize = 15;

/// Short-term variability: `|fhr[i+1] - fhr[i]|`, one shorter than the input.
pub fn short_term_variability(fhr: &[f64]) -> Vec<f64> {
    fhr.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}

/// Quadratic Savitzky–Golay smoothing over `SAVGOL_WINDOW` samples.
///
/// The first and last half-window are taken from the quadratic fitted to the
/// first and last full window. Inputs shorter than the window use the largest
/// odd window that fits; fewer than three samples are returned unchanged.
pub fn savgol_smooth(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    if n < 3 {
        return data.to_vec();
    }
    let window = if n >= SAVGOL_WINDOW {
        SAVGOL_WINDOW
    } else if n % 2 == 1 {
        n
    } else {
        n - 1
    };
    let half = window / 2;

    let mut out = vec![0.0; n];
    for i in half..n - half {
        out[i] = QuadFit::new(&data[i - half..=i + half]).at(0.0);
    }
    let head = QuadFit::new(&data[..window]);
    for (i, slot) in out.iter_mut().enumerate().take(half) {
        *slot = head.at(i as f64 - half as f64);
    }
    let tail = QuadFit::new(&data[n - window..]);
    for i in n - half..n {
        out[i] = tail.at((i + half + 1 - n) as f64);
    }
    out
}

/// Least-squares `a0 + a1 x + a2 x^2` over a window centred on x = 0.
struct QuadFit {
    a0: f64,
    a1: f64,
    a2: f64,
}

impl QuadFit {
    fn new(window: &[f64]) -> Self {
        let half = (window.len() / 2) as f64;
        let (mut s2, mut s4, mut sy, mut sxy, mut sx2y) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (j, &y) in window.iter().enumerate() {
            let x = j as f64 - half;
            let x2 = x * x;
            s2 += x2;
            s4 += x2 * x2;
            sy += y;
            sxy += x * y;
            sx2y += x2 * y;
        }
        let s0 = window.len() as f64;
        let det = s0 * s4 - s2 * s2;
        Self {
            a0: (s4 * sy - s2 * sx2y) / det,
            a1: sxy / s2,
            a2: (s0 * sx2y - s2 * sy) / det,
        }
    }

    fn at(&self, x: f64) -> f64 {
        self.a0 + self.a1 * x + self.a2 * x * x
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineClass {
    Bradycardia,
    Normal,
    Tachycardia,
}

impl BaselineClass {
    pub fn classify(baseline: f64, thresholds: &ClinicalThresholds) -> Self {
        if baseline < thresholds.baseline_low {
            BaselineClass::Bradycardia
        } else if baseline > thresholds.baseline_high {
            BaselineClass::Tachycardia
        } else {
            BaselineClass::Normal
        }
    }
}

impl fmt::Display for BaselineClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BaselineClass::Bradycardia => "bradycardia",
            BaselineClass::Normal => "normal",
            BaselineClass::Tachycardia => "tachycardia",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn stv_is_absolute_first_difference() {
        assert_eq!(
            short_term_variability(&[140.0, 142.0, 139.0, 139.0]),
            vec![2.0, 3.0, 0.0]
        );
        assert!(short_term_variability(&[140.0]).is_empty());
    }

    #[test]
    fn quadratics_pass_through_unchanged() {
        let data: Vec<f64> = (0..40)
            .map(|i| {
                let x = i as f64;
                130.0 + 0.5 * x - 0.02 * x * x
            })
            .collect();
        let smooth = savgol_smooth(&data);
        assert_eq!(smooth.len(), data.len());
        for (a, b) in smooth.iter().zip(&data) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn centre_weights_match_closed_form() {
        let mut impulse = vec![0.0; 31];
        impulse[15] = 1.0;
        let smooth = savgol_smooth(&impulse);
        assert!((smooth[15] - 501.0 / 3315.0).abs() < 1e-12);
        // weight for offset 7
        assert!((smooth[8] - (501.0 - 15.0 * 49.0) / 3315.0).abs() < 1e-12);
    }

    #[test]
    fn smoothing_reduces_noise() {
        let mut rng = StdRng::seed_from_u64(11);
        let data: Vec<f64> = (0..600).map(|_| 140.0 + rng.gen_range(-5.0..5.0)).collect();
        let smooth = savgol_smooth(&data);
        let spread = |v: &[f64]| v.iter().map(|x| (x - 140.0).powi(2)).sum::<f64>();
        assert!(spread(&smooth[20..580]) < 0.5 * spread(&data[20..580]));
    }

    #[test]
    fn short_inputs_shrink_the_window() {
        assert_eq!(savgol_smooth(&[1.0, 2.0]), vec![1.0, 2.0]);
        let line = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let smooth = savgol_smooth(&line);
        for (a, b) in smooth.iter().zip(&line) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn classifies_against_thresholds() {
        let th = ClinicalThresholds::default();
        assert_eq!(BaselineClass::classify(100.0, &th), BaselineClass::Bradycardia);
        assert_eq!(BaselineClass::classify(110.0, &th), BaselineClass::Normal);
        assert_eq!(BaselineClass::classify(160.0, &th), BaselineClass::Normal);
        assert_eq!(BaselineClass::classify(170.0, &th), BaselineClass::Tachycardia);
        assert_eq!(BaselineClass::Tachycardia.to_string(), "tachycardia");
    }
}
