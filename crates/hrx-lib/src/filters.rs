//! Butterworth band-pass design and causal second-order-section filtering.
//!
//! The design follows the classic analog-prototype route: Butterworth poles on
//! the unit circle, bilinear pre-warping of the band edges (expressed as
//! fractions of Nyquist), a lowpass-to-bandpass transform, then the bilinear
//! transform into the z-plane. Poles are paired into biquads; every section
//! carries one zero at `z = 1` and one at `z = -1`, and the overall gain rides
//! on the first section.

use crate::config::PanTompkinsConfig;
use crate::error::{PipelineError, PipelineResult};
use log::trace;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Sampling rate of the normalized design plane (Nyquist = 1).
const DESIGN_FS: f64 = 2.0;

/// Highest prototype order accepted by the designer.
pub const MAX_FILTER_ORDER: usize = 10;

/// Poles closer than this to the real axis are treated as real.
const REAL_POLE_TOL: f64 = 1e-10;

/// Second-order section: `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biquad {
    /// Numerator coefficients [b0, b1, b2]
    pub b: [f64; 3],
    /// Denominator coefficients [a1, a2] (a0 is normalized to 1)
    pub a: [f64; 2],
}

impl Biquad {
    /// Run the section over a whole block with zero initial state (Direct Form II transposed).
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let mut state = [0.0f64; 2];
        input
            .iter()
            .map(|&x| {
                let y = self.b[0] * x + state[0];
                state[0] = self.b[1] * x - self.a[0] * y + state[1];
                state[1] = self.b[2] * x - self.a[1] * y;
                y
            })
            .collect()
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = z_inv * self.b[1] + z_inv2 * self.b[2] + self.b[0];
        let den = z_inv * self.a[0] + z_inv2 * self.a[1] + 1.0;
        num / den
    }

    /// Poles inside the unit circle (triangle condition on a1, a2).
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }
}

/// Digital Butterworth band-pass expressed as cascaded biquads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandpassDesign {
    pub sections: Vec<Biquad>,
}

impl BandpassDesign {
    /// Design an `order`-th order Butterworth band-pass between `low_hz` and `high_hz`.
    pub fn butterworth(order: usize, low_hz: f64, high_hz: f64, fs: f64) -> PipelineResult<Self> {
        if !fs.is_finite() || fs <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "sampling frequency must be positive, got {}",
                fs
            )));
        }
        if !(1..=MAX_FILTER_ORDER).contains(&order) {
            return Err(PipelineError::InvalidParameter(format!(
                "filter order must be between 1 and {}, got {}",
                MAX_FILTER_ORDER, order
            )));
        }
        let nyquist = 0.5 * fs;
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(PipelineError::InvalidParameter(format!(
                "band {}-{} Hz is not realizable below Nyquist {} Hz",
                low_hz, high_hz, nyquist
            )));
        }

        let warp = |hz: f64| 2.0 * DESIGN_FS * (PI * (hz / nyquist) / DESIGN_FS).tan();
        let (wl, wh) = (warp(low_hz), warp(high_hz));
        let bw = wh - wl;
        let wo = (wl * wh).sqrt();

        let n = order as i64;
        let mut analog = Vec::with_capacity(2 * order);
        for m in (1 - n..n).step_by(2) {
            let proto = -Complex64::from_polar(1.0, PI * m as f64 / (2.0 * order as f64));
            let lp = proto * (bw / 2.0);
            let root = (lp * lp - wo * wo).sqrt();
            analog.push(lp + root);
            analog.push(lp - root);
        }

        let fs2 = Complex64::new(2.0 * DESIGN_FS, 0.0);
        let digital: Vec<Complex64> = analog.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
        // Analog zeros sit at the origin (order of them); the rest map to z = -1.
        let den: Complex64 = analog.iter().map(|&p| fs2 - p).product();
        let gain = (Complex64::new((2.0 * DESIGN_FS * bw).powi(order as i32), 0.0) / den).re;

        let mut upper: Vec<Complex64> = digital
            .iter()
            .copied()
            .filter(|p| p.im > REAL_POLE_TOL)
            .collect();
        upper.sort_by(|x, y| (1.0 - y.norm()).total_cmp(&(1.0 - x.norm())));
        let mut real: Vec<f64> = digital
            .iter()
            .filter(|p| p.im.abs() <= REAL_POLE_TOL)
            .map(|p| p.re)
            .collect();
        real.sort_by(f64::total_cmp);

        let mut sections: Vec<Biquad> = upper
            .iter()
            .map(|p| Biquad {
                b: [1.0, 0.0, -1.0],
                a: [-2.0 * p.re, p.norm_sqr()],
            })
            .collect();
        for pair in real.chunks(2) {
            let a = match *pair {
                [r1, r2] => [-(r1 + r2), r1 * r2],
                _ => [-pair[0], 0.0],
            };
            sections.push(Biquad {
                b: [1.0, 0.0, -1.0],
                a,
            });
        }
        if let Some(first) = sections.first_mut() {
            for coeff in first.b.iter_mut() {
                *coeff *= gain;
            }
        }

        trace!(
            "butterworth bandpass order={} band={}-{} Hz fs={} sections={:?}",
            order,
            low_hz,
            high_hz,
            fs,
            sections
        );
        Ok(Self { sections })
    }

    /// Filter a block causally through every section in turn.
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        self.sections
            .iter()
            .fold(data.to_vec(), |signal, section| section.filter(&signal))
    }

    /// Magnitude response |H| at `freq_hz` for a filter running at `fs`.
    pub fn magnitude_at(&self, freq_hz: f64, fs: f64) -> f64 {
        let z_inv = Complex64::from_polar(1.0, -2.0 * PI * freq_hz / fs);
        self.sections
            .iter()
            .map(|s| s.response(z_inv))
            .product::<Complex64>()
            .norm()
    }

    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(Biquad::is_stable)
    }
}

/// Apply the configured Butterworth band-pass; output has the same length as `data`.
pub fn bandpass(data: &[f64], fs: f64, cfg: &PanTompkinsConfig) -> PipelineResult<Vec<f64>> {
    let design = BandpassDesign::butterworth(cfg.filter_order, cfg.lowcut_hz, cfg.highcut_hz, fs)?;
    Ok(design.apply(data))
}
