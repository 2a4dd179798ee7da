//! Heart-rate extraction from single-lead ECG recordings with the Pan-Tompkins
//! pipeline: bandpass, derivative, squaring, moving-window integration, then
//! prominence-qualified peak counting.

pub mod config;
pub mod detectors;
pub mod error;
pub mod filters;
pub mod io;
pub mod signal;

pub use config::{EdgeMode, HrxConfig, Normalization, PanTompkinsConfig};
pub use detectors::ecg::{
    compute_heart_rate, compute_heart_rate_with_config, run_pipeline, HeartRateResult,
    PipelineTrace,
};
pub use error::{PipelineError, PipelineResult};
pub use signal::{Events, TimeSeries};
