//! Tick-driven playback cursor over an analysed recording.

use hrsim_lib::{padded_range, Analysis, Config, Dataset, EventRegion, PipelineKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ECG_SPEEDS: [f64; 4] = [1.0, 2.0, 5.0, 10.0];
pub const CTG_SPEEDS: [f64; 4] = [10.0, 20.0, 50.0, 100.0];

/// Share of the window shown ahead of the cursor.
const LOOKAHEAD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Running,
    Paused,
}

pub fn speed_presets(kind: PipelineKind) -> &'static [f64] {
    match kind {
        PipelineKind::Ecg => &ECG_SPEEDS,
        PipelineKind::Ctg => &CTG_SPEEDS,
    }
}

pub fn window_sec(kind: PipelineKind, cfg: &Config) -> f64 {
    match kind {
        PipelineKind::Ecg => cfg.ecg_window_sec,
        PipelineKind::Ctg => cfg.simulation_window_sec,
    }
}

/// Visible time range for a cursor at `current` with window `window`.
pub fn visible_range(current: f64, window: f64) -> (f64, f64) {
    let lookahead = LOOKAHEAD * window;
    if window > current {
        (0.0, window + lookahead)
    } else {
        (current - window, current + lookahead)
    }
}

/// Fixed value-axis hints, computed once per dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RangeHints {
    pub primary: Option<(f64, f64)>,
    pub secondary: Option<(f64, f64)>,
    pub variability: Option<(f64, f64)>,
}

impl RangeHints {
    fn for_dataset(dataset: &Dataset) -> Self {
        match &dataset.analysis {
            Analysis::Ecg(ecg) => Self {
                primary: padded_range(&ecg.filtered.values),
                secondary: padded_range(&ecg.raw.values),
                variability: padded_range(&ecg.rr.rr),
            },
            Analysis::Ctg(ctg) => Self {
                primary: padded_range(&ctg.fhr.values),
                secondary: ctg.uc.as_ref().and_then(|uc| padded_range(&uc.values)),
                variability: padded_range(&ctg.stv),
            },
        }
    }
}

/// What a display needs for one tick. Slices borrow from the shared dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<'a> {
    pub index: usize,
    pub time: f64,
    pub state: PlaybackState,
    pub speed: f64,
    pub range: (f64, f64),
    pub hints: RangeHints,
    pub frame: Frame<'a>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame<'a> {
    Ecg(EcgFrame<'a>),
    Ctg(CtgFrame<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcgFrame<'a> {
    pub time: &'a [f64],
    pub raw: &'a [f64],
    pub filtered: &'a [f64],
    /// Beats strictly before the cursor
    pub peak_times: &'a [f64],
    /// RR intervals (seconds) between those beats, stamped at the earlier beat
    pub rr_times: &'a [f64],
    pub rr: &'a [f64],
}

#[derive(Debug, Clone, PartialEq)]
pub struct CtgFrame<'a> {
    pub time: &'a [f64],
    pub fhr: &'a [f64],
    pub uc: Option<&'a [f64]>,
    pub smoothed: &'a [f64],
    pub stv_time: &'a [f64],
    pub stv: &'a [f64],
    /// Regions started before the cursor, clipped to it
    pub accelerations: Vec<EventRegion>,
    pub decelerations: Vec<EventRegion>,
}

/// Accumulator kept as `base + ticks * step` for each stretch of constant
/// period and speed, so the trajectory does not depend on tick history.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    base: f64,
    ticks: u64,
    period_ms: f64,
    speed: f64,
}

impl Segment {
    const ZERO: Segment = Segment {
        base: 0.0,
        ticks: 0,
        period_ms: 0.0,
        speed: 0.0,
    };

    fn value(&self, fs: f64) -> f64 {
        self.base + self.ticks as f64 * fs * self.period_ms / 1000.0 * self.speed
    }
}

#[derive(Debug, Clone)]
pub struct Playback {
    dataset: Arc<Dataset>,
    state: PlaybackState,
    index: usize,
    speed: f64,
    window_sec: f64,
    segment: Segment,
    hints: RangeHints,
}

impl Playback {
    pub fn new(dataset: Arc<Dataset>, cfg: &Config) -> Self {
        let kind = dataset.kind();
        let hints = RangeHints::for_dataset(&dataset);
        Self {
            speed: speed_presets(kind)[0],
            window_sec: window_sec(kind, cfg),
            dataset,
            state: PlaybackState::Stopped,
            index: 0,
            segment: Segment::ZERO,
            hints,
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn accumulator(&self) -> f64 {
        self.segment.value(self.dataset.fs)
    }

    pub fn window_sec(&self) -> f64 {
        self.window_sec
    }

    pub fn presets(&self) -> &'static [f64] {
        speed_presets(self.dataset.kind())
    }

    /// Start from the beginning, or resume from pause.
    pub fn play(&mut self) {
        if self.dataset.is_empty() {
            return;
        }
        self.state = PlaybackState::Running;
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Running {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Running => self.pause(),
            _ => self.play(),
        }
    }

    pub fn stop(&mut self) {
        self.rewind();
        self.state = PlaybackState::Stopped;
    }

    /// Applies from the next tick; position is kept.
    pub fn set_speed(&mut self, speed: f64) {
        if !(speed.is_finite() && speed > 0.0) {
            warn!("ignoring playback speed {speed}");
            return;
        }
        self.speed = speed;
    }

    /// Advance by one timer period (milliseconds) and describe the result.
    ///
    /// The tick that runs off the end reports the last sample and leaves the
    /// cursor stopped at the start.
    pub fn tick(&mut self, period_ms: f64) -> ViewState<'_> {
        if self.state == PlaybackState::Running {
            if let Some(last) = self.advance(period_ms) {
                self.stop();
                return self.view_at(last);
            }
        }
        self.view()
    }

    /// Returns the clamped last index when the data ran out.
    fn advance(&mut self, period_ms: f64) -> Option<usize> {
        if !(period_ms.is_finite() && period_ms > 0.0) {
            warn!("ignoring tick period {period_ms} ms");
            return None;
        }
        if self.segment.period_ms != period_ms || self.segment.speed != self.speed {
            let base = self.accumulator();
            self.segment = Segment {
                base,
                ticks: 0,
                period_ms,
                speed: self.speed,
            };
        }
        self.segment.ticks += 1;

        let len = self.dataset.len();
        let target = self.accumulator().floor();
        if target >= len as f64 {
            let last = len.saturating_sub(1);
            debug!("playback reached the end at index {last}");
            Some(last)
        } else {
            self.index = target as usize;
            None
        }
    }

    fn rewind(&mut self) {
        self.index = 0;
        self.segment = Segment::ZERO;
    }

    pub fn view(&self) -> ViewState<'_> {
        self.view_at(self.index)
    }

    fn view_at(&self, index: usize) -> ViewState<'_> {
        let time = self.dataset.time();
        let current = time.get(index).copied().unwrap_or(0.0);
        let visible = |end: usize| end.min(time.len());

        let frame = match &self.dataset.analysis {
            Analysis::Ecg(ecg) => {
                let end = visible(index);
                let beats = ecg.peak_times.partition_point(|&t| t < current);
                let rr_end = beats.saturating_sub(1).min(ecg.rr.rr.len());
                Frame::Ecg(EcgFrame {
                    time: &time[..end],
                    raw: &ecg.raw.values[..end.min(ecg.raw.len())],
                    filtered: &ecg.filtered.values[..end.min(ecg.filtered.len())],
                    peak_times: &ecg.peak_times[..beats],
                    rr_times: &ecg.peak_times[..rr_end],
                    rr: &ecg.rr.rr[..rr_end],
                })
            }
            Analysis::Ctg(ctg) => {
                let end = visible(index);
                let stv_end = end.saturating_sub(1).min(ctg.stv.len());
                let clip = |regions: &[EventRegion]| -> Vec<EventRegion> {
                    regions
                        .iter()
                        .filter_map(|r| r.clipped_to(index, time))
                        .collect()
                };
                Frame::Ctg(CtgFrame {
                    time: &time[..end],
                    fhr: &ctg.fhr.values[..end.min(ctg.fhr.len())],
                    uc: ctg
                        .uc
                        .as_ref()
                        .map(|uc| &uc.values[..end.min(uc.len())]),
                    smoothed: &ctg.smoothed[..end.min(ctg.smoothed.len())],
                    stv_time: time.get(1..stv_end + 1).unwrap_or(&[]),
                    stv: &ctg.stv[..stv_end],
                    accelerations: clip(&ctg.events.accelerations),
                    decelerations: clip(&ctg.events.decelerations),
                })
            }
        };

        ViewState {
            index,
            time: current,
            state: self.state,
            speed: self.speed,
            range: visible_range(current, self.window_sec),
            hints: self.hints,
            frame,
        }
    }
}
