use serde::{Deserialize, Serialize};

/// A local maximum together with its topographic prominence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub prominence: f64,
}

/// Indices of local maxima.
///
/// A sample qualifies when it is strictly above its left neighbour and the run of
/// equal samples it starts is followed by a strictly smaller one. Flat tops report
/// their midpoint (rounded down). The first and last samples never qualify.
pub fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if data.len() < 3 {
        return peaks;
    }
    let last = data.len() - 1;
    let mut i = 1;
    while i < last {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < last && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Prominence of each peak: its height above the higher of the two lowest points
/// reachable on either side before climbing above the peak itself.
pub fn peak_prominences(data: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let height = data[peak];
            let left_min = data[..=peak]
                .iter()
                .rev()
                .take_while(|&&v| v <= height)
                .fold(height, |acc, &v| acc.min(v));
            let right_min = data[peak..]
                .iter()
                .take_while(|&&v| v <= height)
                .fold(height, |acc, &v| acc.min(v));
            height - left_min.max(right_min)
        })
        .collect()
}

/// Local maxima whose prominence is at least `min_prominence`.
pub fn find_peaks(data: &[f64], min_prominence: f64) -> Vec<Peak> {
    let candidates = local_maxima(data);
    let prominences = peak_prominences(data, &candidates);
    candidates
        .into_iter()
        .zip(prominences)
        .filter(|(_, prominence)| *prominence >= min_prominence)
        .map(|(index, prominence)| Peak { index, prominence })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_isolated_maxima() {
        assert_eq!(local_maxima(&[0.0, 1.0, 0.0, 2.0, 0.0]), vec![1, 3]);
        assert!(local_maxima(&[]).is_empty());
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn boundaries_are_never_peaks() {
        assert!(local_maxima(&[5.0, 1.0, 5.0]).is_empty());
        assert!(local_maxima(&[0.0, 1.0, 2.0, 3.0]).is_empty());
    }

    #[test]
    fn plateaus_report_midpoint() {
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 1.0, 0.0]), vec![2]);
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 0.0]), vec![1]);
        // A plateau running into the end of the signal is not a peak.
        assert!(local_maxima(&[0.0, 1.0, 1.0]).is_empty());
        // Neither is a shoulder that keeps rising.
        assert!(local_maxima(&[0.0, 1.0, 1.0, 2.0]).is_empty());
    }

    #[test]
    fn prominence_uses_higher_of_the_two_bases() {
        let data = [0.0, 3.0, 1.0, 2.0, 0.5, 4.0, 0.0];
        let peaks = local_maxima(&data);
        assert_eq!(peaks, vec![1, 3, 5]);
        let prominences = peak_prominences(&data, &peaks);
        let expected = [2.5, 1.0, 4.0];
        for (got, want) in prominences.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{} vs {}", got, want);
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let data = [0.0, 3.0, 1.0, 2.0, 0.5, 4.0, 0.0];
        let kept: Vec<usize> = find_peaks(&data, 1.0).iter().map(|p| p.index).collect();
        assert_eq!(kept, vec![1, 3, 5]);
        let kept: Vec<usize> = find_peaks(&data, 1.5).iter().map(|p| p.index).collect();
        assert_eq!(kept, vec![1, 5]);
    }

    #[test]
    fn flat_signal_has_no_peaks() {
        assert!(find_peaks(&[0.0; 32], 0.0).is_empty());
    }
}
