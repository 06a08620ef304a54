pub mod ctg;
pub mod ecg;

pub use ctg::{detect_events, EventDetection, EventKind, EventRegion};
pub use ecg::{beat_times, detect_beats};
