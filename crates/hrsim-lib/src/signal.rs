use serde::{Deserialize, Serialize};

/// Sampled series on an explicit time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Effective sampling frequency in Hz
    pub fs: f64,
    /// Sample times in seconds, monotonically increasing
    pub time: Vec<f64>,
    /// Samples, same length as `time`
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(fs: f64, time: Vec<f64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(time.len(), values.len());
        Self { fs, time, values }
    }

    /// Build a series with a synthesized `i / fs` time axis.
    pub fn uniform(fs: f64, values: Vec<f64>) -> Self {
        let time = (0..values.len()).map(|i| i as f64 / fs).collect();
        Self { fs, time, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.values.len() as f64 / self.fs
    }

    /// Same time axis, new samples.
    pub fn with_values(&self, values: Vec<f64>) -> Self {
        Self {
            fs: self.fs,
            time: self.time.clone(),
            values,
        }
    }
}

/// Point events on a timeline (e.g., R-peak sample indices).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Map indices onto a time axis, dropping any that fall outside it.
    pub fn times(&self, time: &[f64]) -> Vec<f64> {
        self.indices
            .iter()
            .filter_map(|&idx| time.get(idx).copied())
            .collect()
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    /// Forward difference of consecutive beat times.
    pub fn from_times(times: &[f64]) -> Self {
        let rr = times.windows(2).map(|w| w[1] - w[0]).collect();
        Self { rr }
    }

    pub fn len(&self) -> usize {
        self.rr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rr.is_empty()
    }
}

/// Median of the finite values in `data`, `None` when there are none.
pub fn median(data: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Min/max of `data` padded by 10% of the span, or by 1.0 when the data is flat.
pub fn padded_range(data: &[f64]) -> Option<(f64, f64)> {
    let mut iter = data.iter().copied().filter(|v| v.is_finite());
    let first = iter.next()?;
    let (lo, hi) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let mut margin = (hi - lo) * 0.1;
    if margin == 0.0 {
        margin = 1.0;
    }
    Some((lo - margin, hi + margin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn rr_from_times_is_forward_difference() {
        let rr = RRSeries::from_times(&[0.5, 1.3, 2.0]);
        assert_eq!(rr.len(), 2);
        assert!((rr.rr[0] - 0.8).abs() < 1e-12);
        assert!((rr.rr[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn padded_range_widens_flat_data() {
        assert_eq!(padded_range(&[2.0, 2.0]), Some((1.0, 3.0)));
        let (lo, hi) = padded_range(&[0.0, 10.0]).unwrap();
        assert!((lo + 1.0).abs() < 1e-12);
        assert!((hi - 11.0).abs() < 1e-12);
        assert_eq!(padded_range(&[]), None);
    }

    #[test]
    fn uniform_series_synthesizes_time() {
        let ts = Series::uniform(4.0, vec![1.0; 8]);
        assert_eq!(ts.time[4], 1.0);
        assert_eq!(ts.duration(), 2.0);
    }
}
