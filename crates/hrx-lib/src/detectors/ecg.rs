use crate::{
    config::{EdgeMode, Normalization, PanTompkinsConfig},
    detectors::peaks::{find_peaks, Peak},
    error::{PipelineError, PipelineResult},
    filters::bandpass,
    signal::{Events, TimeSeries},
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Heart rate for one recording plus the beats it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateResult {
    pub fs: f64,
    pub sample_count: usize,
    pub duration_s: f64,
    pub peak_count: usize,
    pub heart_rate_bpm: u32,
    /// Peak indices into the integrated signal.
    pub peaks: Events,
}

impl HeartRateResult {
    pub fn from_trace(trace: &PipelineTrace) -> Self {
        Self {
            fs: trace.fs,
            sample_count: trace.sample_count,
            duration_s: trace.duration_s,
            peak_count: trace.peaks.len(),
            heart_rate_bpm: trace.heart_rate_bpm,
            peaks: Events::from_indices(trace.peaks.iter().map(|p| p.index).collect()),
        }
    }
}

/// Every intermediate signal of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTrace {
    pub fs: f64,
    pub sample_count: usize,
    /// Length of the input recording in seconds.
    pub duration_s: f64,
    pub window_samples: usize,
    pub normalized: Vec<f64>,
    pub filtered: Vec<f64>,
    pub derivative: Vec<f64>,
    pub squared: Vec<f64>,
    pub integrated: Vec<f64>,
    pub peaks: Vec<Peak>,
    pub heart_rate_bpm: u32,
}

/// Heart rate (bpm) of `signal` sampled at `fs` using the default configuration.
pub fn compute_heart_rate(signal: &[f64], fs: f64) -> PipelineResult<u32> {
    let ts = TimeSeries::new(fs, signal.to_vec());
    Ok(run_pipeline(&ts, &PanTompkinsConfig::default())?.heart_rate_bpm)
}

/// Run the pipeline and summarize it as a [`HeartRateResult`].
pub fn compute_heart_rate_with_config(
    ts: &TimeSeries,
    cfg: &PanTompkinsConfig,
) -> PipelineResult<HeartRateResult> {
    run_pipeline(ts, cfg).map(|trace| HeartRateResult::from_trace(&trace))
}

/// Bandpass → derivative → square → moving-window integration → prominent peaks → bpm.
pub fn run_pipeline(ts: &TimeSeries, cfg: &PanTompkinsConfig) -> PipelineResult<PipelineTrace> {
    cfg.validate(ts.fs)?;
    if ts.is_empty() {
        return Err(PipelineError::InvalidInput("signal is empty".into()));
    }

    let normalized = normalize(&ts.data, cfg.normalization);
    let filtered = bandpass(&normalized, ts.fs, cfg)?;
    ensure_finite("bandpass", &filtered)?;
    let derivative = derivative(&filtered);
    let squared = square(&derivative);
    let window_samples = cfg.window_samples(ts.fs);
    let integrated = moving_window_integration(&squared, window_samples, cfg.edge_mode);
    let peaks = find_peaks(&integrated, cfg.peak_prominence_threshold);
    let duration_s = ts.duration();
    let heart_rate_bpm = heart_rate_bpm(peaks.len(), duration_s);

    debug!(
        "pan-tompkins fs={} samples={} window={} edge={:?} peaks={} bpm={}",
        ts.fs,
        ts.len(),
        window_samples,
        cfg.edge_mode,
        peaks.len(),
        heart_rate_bpm
    );

    Ok(PipelineTrace {
        fs: ts.fs,
        sample_count: ts.len(),
        duration_s,
        window_samples,
        normalized,
        filtered,
        derivative,
        squared,
        integrated,
        peaks,
        heart_rate_bpm,
    })
}

/// Beats per minute from a peak count over the original recording length,
/// truncated toward zero.
pub fn heart_rate_bpm(peak_count: usize, duration_s: f64) -> u32 {
    if duration_s.is_nan() || duration_s <= 0.0 {
        return 0;
    }
    (peak_count as f64 / duration_s * 60.0).trunc() as u32
}

pub fn normalize(data: &[f64], mode: Normalization) -> Vec<f64> {
    match mode {
        Normalization::None => data.to_vec(),
        Normalization::ZScore => {
            if data.is_empty() {
                return Vec::new();
            }
            let n = data.len() as f64;
            let mean = data.iter().sum::<f64>() / n;
            let sd = (data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
            if sd > 0.0 && sd.is_finite() {
                data.iter().map(|x| (x - mean) / sd).collect()
            } else {
                data.iter().map(|x| x - mean).collect()
            }
        }
        Normalization::UnitPeak => {
            let peak = data.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
            if peak > 0.0 && peak.is_finite() {
                data.iter().map(|x| x / peak).collect()
            } else {
                data.to_vec()
            }
        }
    }
}

/// First difference: `out[i] = data[i + 1] - data[i]`, one sample shorter than the input.
pub fn derivative(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

pub fn square(data: &[f64]) -> Vec<f64> {
    data.iter().map(|x| x * x).collect()
}

/// Centered box average over `win` samples.
///
/// Sample `i` averages `data[i - win/2 ..= i - win/2 + win - 1]`, so even windows
/// lean one sample to the left. Positions outside the signal are filled by `edge`.
pub fn moving_window_integration(data: &[f64], win: usize, edge: EdgeMode) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    if win <= 1 {
        return data.to_vec();
    }
    // Keeps every window offset representable as an isize.
    let win = win.min(isize::MAX as usize);
    let left = (win / 2) as isize;
    let right = (win - 1 - win / 2) as isize;
    let sample = |i: isize| edge_sample(data, i, edge);

    let mut out = Vec::with_capacity(data.len());
    let mut acc = padded_sum(data, -left, right, edge);
    out.push(acc / win as f64);
    for i in 1..data.len() as isize {
        acc += sample(i + right) - sample(i - left - 1);
        out.push(acc / win as f64);
    }
    out
}

fn edge_sample(data: &[f64], i: isize, edge: EdgeMode) -> f64 {
    let n = data.len() as isize;
    if (0..n).contains(&i) {
        return data[i as usize];
    }
    match edge {
        EdgeMode::Nearest => data[i.clamp(0, n - 1) as usize],
        EdgeMode::Reflect => {
            let period = 2 * n;
            let r = i.rem_euclid(period);
            let idx = if r < n { r } else { period - r - 1 };
            data[idx as usize]
        }
        EdgeMode::Zero => 0.0,
    }
}

/// Sum of `edge_sample` over `lo..=hi` without visiting every padded position,
/// so the cost is bounded by the signal length rather than the window.
fn padded_sum(data: &[f64], lo: isize, hi: isize, edge: EdgeMode) -> f64 {
    let n = data.len() as isize;
    let inner = if lo.max(0) <= hi.min(n - 1) {
        data[lo.max(0) as usize..=hi.min(n - 1) as usize].iter().sum()
    } else {
        0.0
    };
    let below = (lo, hi.min(-1));
    let above = (lo.max(n), hi);
    let run = |(a, b): (isize, isize)| if a <= b { b - a + 1 } else { 0 };
    match edge {
        EdgeMode::Zero => inner,
        EdgeMode::Nearest => {
            inner + run(below) as f64 * data[0] + run(above) as f64 * data[(n - 1) as usize]
        }
        EdgeMode::Reflect => inner + reflected_sum(data, below) + reflected_sum(data, above),
    }
}

/// Sum of reflected samples over `a..=b`; whole reflection periods collapse
/// to twice the signal total.
fn reflected_sum(data: &[f64], (a, b): (isize, isize)) -> f64 {
    if a > b {
        return 0.0;
    }
    let period = 2 * data.len() as isize;
    let count = b - a + 1;
    let total: f64 = data.iter().sum();
    let whole = (count / period) as f64 * 2.0 * total;
    let rest: f64 = (0..count % period)
        .map(|k| edge_sample(data, a + k, EdgeMode::Reflect))
        .sum();
    whole + rest
}

fn ensure_finite(stage: &'static str, data: &[f64]) -> PipelineResult<()> {
    match data.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(PipelineError::NumericDegenerate { stage, index }),
        None => Ok(()),
    }
}
