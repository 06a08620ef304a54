//! Zero-phase Butterworth band-pass built from cascaded second-order sections.

use crate::{config::FilterConfig, error::FilterError, signal::Series};
use std::f64::consts::PI;

/// One second-order section in transposed direct form II, `a0` normalised to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// `k` is the pre-warped `tan(pi * fc / fs)`.
    fn lowpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;
        Self {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / q + k2) * norm,
        }
    }

    fn highpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        Self {
            b0: norm,
            b1: -2.0 * norm,
            b2: norm,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / q + k2) * norm,
        }
    }

    fn lowpass_first_order(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self {
            b0: k * norm,
            b1: k * norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    fn highpass_first_order(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self {
            b0: norm,
            b1: -norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }

    /// Filter in place, starting from the steady state for a constant input `level`.
    /// Returns the steady-state output level for the next section.
    fn run(&self, data: &mut [f64], level: f64) -> f64 {
        let gain = self.dc_gain();
        let out_level = gain * level;
        let mut z1 = out_level - self.b0 * level;
        let mut z2 = self.b2 * level - self.a2 * out_level;
        for x in data.iter_mut() {
            let input = *x;
            let y = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * y + z2;
            z2 = self.b2 * input - self.a2 * y;
            *x = y;
        }
        out_level
    }
}

/// Band-pass made of an order-N Butterworth high-pass followed by an order-N low-pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BandpassFilter {
    sections: Vec<Biquad>,
}

impl BandpassFilter {
    pub fn butterworth(
        lowcut: f64,
        highcut: f64,
        order: usize,
        fs: f64,
    ) -> Result<Self, FilterError> {
        let band_ok = lowcut.is_finite()
            && highcut.is_finite()
            && lowcut > 0.0
            && highcut > 0.0
            && lowcut < highcut;
        if !band_ok {
            return Err(FilterError::InvalidBand { lowcut, highcut });
        }
        let nyquist = fs / 2.0;
        if !(highcut < nyquist) {
            return Err(FilterError::BandAboveNyquist { highcut, nyquist });
        }
        if order == 0 {
            return Err(FilterError::InvalidOrder);
        }

        let k_low = (PI * lowcut / fs).tan();
        let k_high = (PI * highcut / fs).tan();
        let mut sections = Vec::with_capacity(order + 1);
        for pole in butterworth_poles(order) {
            match pole {
                Pole::Pair(q) => sections.push(Biquad::highpass(k_low, q)),
                Pole::Real => sections.push(Biquad::highpass_first_order(k_low)),
            }
        }
        for pole in butterworth_poles(order) {
            match pole {
                Pole::Pair(q) => sections.push(Biquad::lowpass(k_high, q)),
                Pole::Real => sections.push(Biquad::lowpass_first_order(k_high)),
            }
        }
        Ok(Self { sections })
    }

    pub fn from_config(cfg: &FilterConfig, fs: f64) -> Result<Self, FilterError> {
        Self::butterworth(cfg.lowcut, cfg.highcut, cfg.order, fs)
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Single causal pass.
    pub fn filter(&self, data: &[f64]) -> Vec<f64> {
        let mut out = data.to_vec();
        self.run_cascade(&mut out);
        out
    }

    /// Forward-backward pass with odd-reflection padding; no phase shift and
    /// the output has the input's length.
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n < 2 {
            return data.to_vec();
        }
        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let first = data[0];
        let last = data[n - 1];

        let mut ext = Vec::with_capacity(n + 2 * padlen);
        ext.extend((1..=padlen).rev().map(|i| 2.0 * first - data[i]));
        ext.extend_from_slice(data);
        ext.extend((n - 1 - padlen..n - 1).rev().map(|i| 2.0 * last - data[i]));

        self.run_cascade(&mut ext);
        ext.reverse();
        self.run_cascade(&mut ext);
        ext.reverse();

        ext[padlen..padlen + n].to_vec()
    }

    fn run_cascade(&self, data: &mut [f64]) {
        let Some(&start) = data.first() else {
            return;
        };
        let mut level = start;
        for section in &self.sections {
            level = section.run(data, level);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pole {
    /// Complex-conjugate pair with the given quality factor.
    Pair(f64),
    Real,
}

/// Analog prototype poles in the upper half plane (plus the real one for odd orders).
fn butterworth_poles(order: usize) -> Vec<Pole> {
    let n = order as f64;
    (0..order)
        .filter_map(|k| {
            let theta = PI * (2.0 * k as f64 + n + 1.0) / (2.0 * n);
            let (im, re) = theta.sin_cos();
            if im.abs() < 1e-9 {
                Some(Pole::Real)
            } else if im > 0.0 {
                Some(Pole::Pair(-1.0 / (2.0 * re)))
            } else {
                None
            }
        })
        .collect()
}

/// Zero-phase band-pass of a series with the configured cutoffs and order.
pub fn bandpass_filtfilt(series: &Series, cfg: &FilterConfig) -> Result<Series, FilterError> {
    let filter = BandpassFilter::from_config(cfg, series.fs)?;
    Ok(series.with_values(filter.filtfilt(&series.values)))
}
