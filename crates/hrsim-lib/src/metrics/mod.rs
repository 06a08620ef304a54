pub mod ctg;
pub mod hrv;

pub use ctg::{savgol_smooth, short_term_variability, BaselineClass};
pub use hrv::{hrv_summary, HrvSummary};
