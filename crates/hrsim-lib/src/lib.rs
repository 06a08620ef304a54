pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod signal;

pub use config::Config;
pub use detectors::*;
pub use error::{FilterError, IngestError, PipelineError};
pub use ingest::{ingest, IngestMode, PipelineKind, SeriesBundle};
pub use metrics::*;
pub use pipeline::*;
pub use signal::*;
