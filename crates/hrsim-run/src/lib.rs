pub mod playback;
pub mod session;

pub use playback::{
    speed_presets, visible_range, window_sec, CtgFrame, EcgFrame, Frame, Playback, PlaybackState,
    RangeHints, ViewState, CTG_SPEEDS, ECG_SPEEDS,
};
pub use session::{LoadRequest, LoadSource, Session, SessionError, SessionEvent};
