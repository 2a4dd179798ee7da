use crate::error::{PipelineError, PipelineResult};
use crate::filters::MAX_FILTER_ORDER;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the moving-window integrator fills samples beyond either end of the signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeMode {
    /// Repeat the first/last sample.
    #[default]
    Nearest,
    /// Half-sample symmetric reflection: `d c b a | a b c d | d c b a`.
    Reflect,
    /// Pad with zeros.
    Zero,
}

/// Optional amplitude conditioning applied before the bandpass filter.
///
/// The prominence threshold is an absolute amplitude. With `None` the input is
/// expected in millivolts with R waves of roughly 1-2 mV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    #[default]
    None,
    /// Zero mean, unit (population) standard deviation.
    ZScore,
    /// Divide by the largest absolute sample.
    UnitPeak,
}

/// Tunable parameters for the Pan-Tompkins heart-rate pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanTompkinsConfig {
    /// Lower bandpass cutoff (Hz).
    pub lowcut_hz: f64,
    /// Upper bandpass cutoff (Hz). Must stay below Nyquist.
    pub highcut_hz: f64,
    /// Order of the Butterworth prototype; the bandpass has twice as many poles.
    pub filter_order: usize,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Edge policy for the integrator window.
    pub edge_mode: EdgeMode,
    /// Minimum prominence for a local maximum of the integrated signal to count as a beat.
    pub peak_prominence_threshold: f64,
    pub normalization: Normalization,
}

impl Default for PanTompkinsConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: 5.0,
            highcut_hz: 15.0,
            filter_order: 2,
            integration_window_s: 0.150,
            edge_mode: EdgeMode::Nearest,
            peak_prominence_threshold: 0.0005,
            normalization: Normalization::None,
        }
    }
}

impl PanTompkinsConfig {
    /// Check the configuration against a sampling frequency before any filtering happens.
    pub fn validate(&self, fs: f64) -> PipelineResult<()> {
        if !fs.is_finite() || fs <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "sampling frequency must be positive, got {}",
                fs
            )));
        }
        if !(1..=MAX_FILTER_ORDER).contains(&self.filter_order) {
            return Err(PipelineError::InvalidParameter(format!(
                "filter order must be between 1 and {}, got {}",
                MAX_FILTER_ORDER, self.filter_order
            )));
        }
        if !self.lowcut_hz.is_finite() || self.lowcut_hz <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "low cutoff must be positive, got {} Hz",
                self.lowcut_hz
            )));
        }
        if !self.highcut_hz.is_finite() || self.highcut_hz <= self.lowcut_hz {
            return Err(PipelineError::InvalidParameter(format!(
                "high cutoff {} Hz must exceed low cutoff {} Hz",
                self.highcut_hz, self.lowcut_hz
            )));
        }
        if 2.0 * self.highcut_hz >= fs {
            return Err(PipelineError::InvalidParameter(format!(
                "high cutoff {} Hz is not below the Nyquist frequency {} Hz",
                self.highcut_hz,
                fs / 2.0
            )));
        }
        if !self.integration_window_s.is_finite() || self.integration_window_s <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "integration window must be positive, got {} s",
                self.integration_window_s
            )));
        }
        if self.integration_window_s * fs > isize::MAX as f64 {
            return Err(PipelineError::InvalidParameter(format!(
                "integration window of {} s is too long at {} Hz",
                self.integration_window_s, fs
            )));
        }
        if !self.peak_prominence_threshold.is_finite() || self.peak_prominence_threshold < 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "peak prominence threshold must be non-negative, got {}",
                self.peak_prominence_threshold
            )));
        }
        Ok(())
    }

    /// Integrator window in samples: `floor(integration_window_s * fs)`, never below 1.
    pub fn window_samples(&self, fs: f64) -> usize {
        ((self.integration_window_s * fs).floor() as usize).max(1)
    }
}

/// File-level settings for the CLI: where the samples come from plus pipeline overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HrxConfig {
    /// Sampling frequency used when the command line does not supply one.
    pub fs: Option<f64>,
    /// Voltage column to extract from tabular recordings.
    pub column: Option<String>,
    /// Time column (seconds) used to estimate `fs` when none is given.
    pub time_column: Option<String>,
    /// Field delimiter for tabular recordings; tab when unset.
    pub delimiter: Option<char>,
    pub pipeline: PanTompkinsConfig,
}

impl HrxConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing hrx config")
    }
}

/// Load an `HrxConfig` from a TOML file.
pub fn load_config(path: &Path) -> Result<HrxConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    HrxConfig::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
}
