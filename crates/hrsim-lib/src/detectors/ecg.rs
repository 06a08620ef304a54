use crate::{
    config::PeakDetectionConfig,
    signal::{Events, Series},
};
use log::debug;

/// Weight of the signal level in the adaptive threshold.
const THRESHOLD_SCALE: f64 = 0.25;
/// Seconds of envelope used to seed the signal/noise levels.
const LEARNING_PERIOD_S: f64 = 2.0;

/// Detect R-peaks on an already band-passed ECG.
///
/// Returns strictly increasing sample indices on `filtered`'s time axis.
/// Fewer than two beats is a valid (if useless) outcome.
pub fn detect_beats(filtered: &Series, cfg: &PeakDetectionConfig) -> Events {
    if filtered.len() < 3 {
        return Events::default();
    }

    let fs = filtered.fs.max(1.0);
    let win = ((cfg.integration_window_s() * fs).round() as usize).max(1);
    let refractory = ((cfg.min_dist_s() * fs).round() as usize).max(1);

    let envelope = energy_envelope(&filtered.values, win);
    let peaks = pick_peaks(&filtered.values, &envelope, fs, win, refractory);
    if peaks.len() >= 2 {
        debug!("adaptive detector found {} beats", peaks.len());
        return Events::from_indices(peaks);
    }

    let fallback = fallback_peak_picker(&filtered.values, win, refractory);
    debug!(
        "adaptive detector found {} beat(s), fallback picker found {}",
        peaks.len(),
        fallback.len()
    );
    Events::from_indices(fallback)
}

/// Beat times on the series' own time axis.
pub fn beat_times(filtered: &Series, events: &Events) -> Vec<f64> {
    events.times(&filtered.time)
}

/// derivative -> square -> moving-window integration
fn energy_envelope(data: &[f64], win: usize) -> Vec<f64> {
    let derivative = derivative(data);
    let squared = square(&derivative);
    moving_average(&squared, win)
}

fn derivative(data: &[f64]) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; data.len()];
    for i in 1..data.len() {
        out[i] = data[i] - data[i - 1];
    }
    out
}

fn square(data: &[f64]) -> Vec<f64> {
    data.iter().map(|x| x * x).collect()
}

fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    if win <= 1 {
        return data.to_vec();
    }
    let mut out = vec![0.0; data.len()];
    let mut acc = 0.0;
    for (i, &sample) in data.iter().enumerate() {
        acc += sample;
        if i >= win {
            acc -= data[i - win];
        }
        out[i] = acc / win as f64;
    }
    out
}

fn pick_peaks(
    filtered: &[f64],
    envelope: &[f64],
    fs: f64,
    win: usize,
    refractory: usize,
) -> Vec<usize> {
    let n = envelope.len().min(filtered.len());
    if n < 3 {
        return Vec::new();
    }

    let init = n.min(((LEARNING_PERIOD_S * fs).round() as usize).max(1));
    let head = &envelope[..init];
    let max = head.iter().copied().fold(0.0, f64::max);
    let mean = head.iter().sum::<f64>() / init as f64;
    let mut signal_level = max / 3.0;
    let mut noise_level = mean / 2.0;
    let mut peaks: Vec<usize> = Vec::new();

    for i in 1..n - 1 {
        let sample = envelope[i];
        if !(sample > envelope[i - 1] && sample >= envelope[i + 1]) {
            continue;
        }
        let threshold = noise_level + THRESHOLD_SCALE * (signal_level - noise_level);
        if sample <= threshold {
            noise_level = 0.125 * sample + 0.875 * noise_level;
            continue;
        }
        signal_level = 0.125 * sample + 0.875 * signal_level;

        let r = argmax(filtered, i.saturating_sub(win), i);
        match peaks.last_mut() {
            Some(last) if r <= *last => {}
            Some(last) if r - *last < refractory => {
                if filtered[r] > filtered[*last] {
                    *last = r;
                }
            }
            _ => peaks.push(r),
        }
    }
    peaks
}

/// Index of the largest value in `data[start..=end]`, first one on ties.
fn argmax(data: &[f64], start: usize, end: usize) -> usize {
    let mut idx = start;
    let mut max_val = f64::MIN;
    for (j, &v) in data.iter().enumerate().take(end + 1).skip(start) {
        if v > max_val {
            max_val = v;
            idx = j;
        }
    }
    idx
}

/// Local maxima above the local mean, at least `min_gap` apart (higher one wins).
fn fallback_peak_picker(data: &[f64], win: usize, min_gap: usize) -> Vec<usize> {
    if data.len() < 3 {
        return Vec::new();
    }
    let ma = moving_average(data, win);
    let detrended: Vec<f64> = data.iter().zip(&ma).map(|(x, m)| x - m).collect();

    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..data.len() - 1 {
        let y = detrended[i];
        if !(y > 0.0 && y > detrended[i - 1] && y >= detrended[i + 1]) {
            continue;
        }
        match peaks.last_mut() {
            Some(last) if i - *last < min_gap => {
                if data[i] > data[*last] {
                    *last = i;
                }
            }
            _ => peaks.push(i),
        }
    }
    peaks
}
