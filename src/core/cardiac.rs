//! Heart-rate-variability features from R-peak detection on the cardiac channel.

use super::stats;

/// Number of values in the HRV block.
pub const HRV_FEATURE_COUNT: usize = 4;

/// Indices of strict local maxima. A flat-topped peak resolves to the middle
/// of its plateau; the first and last samples are never peaks.
pub fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if signal.len() < 3 {
        return peaks;
    }
    let i_max = signal.len() - 1;
    let mut i = 1;
    while i < i_max {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < i_max && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Detect peaks at least `min_height` tall and `min_distance` samples apart.
///
/// Separation is enforced greedily from the tallest peak down: any smaller
/// peak closer than `min_distance` to a kept peak is dropped.
pub fn find_peaks(signal: &[f64], min_height: f64, min_distance: usize) -> Vec<usize> {
    let peaks: Vec<usize> = local_maxima(signal)
        .into_iter()
        .filter(|&p| signal[p] >= min_height)
        .collect();

    let distance = min_distance.max(1);
    if distance == 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| signal[peaks[a]].total_cmp(&signal[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            k -= 1;
            keep[k] = false;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(p))
        .collect()
}

/// HRV block, or `None` when fewer than two beats are found.
///
/// Layout: mean RR interval (ms), RR standard deviation (ms), RMSSD (ms),
/// heart rate (beats per minute over the window).
pub fn try_hrv_features(signal: &[f64], sample_rate: f64) -> Option<[f64; HRV_FEATURE_COUNT]> {
    if signal.is_empty() || sample_rate <= 0.0 {
        return None;
    }
    let min_height = stats::std_dev(signal);
    // Refractory period of ~200 ms at any sample rate.
    let min_distance = (sample_rate / 3.0).floor() as usize;
    let peaks = find_peaks(signal, min_height, min_distance);
    if peaks.len() < 2 {
        return None;
    }

    let rr: Vec<f64> = peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 / sample_rate * 1000.0)
        .collect();
    let successive: Vec<f64> = rr.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let rmssd = if successive.is_empty() {
        0.0
    } else {
        (successive.iter().map(|d| d * d).sum::<f64>() / successive.len() as f64).sqrt()
    };
    let window_secs = signal.len() as f64 / sample_rate;
    let heart_rate = peaks.len() as f64 / window_secs * 60.0;

    Some([stats::mean(&rr), stats::std_dev(&rr), rmssd, heart_rate])
}

/// HRV block with degenerate windows mapped to zeros.
pub fn hrv_features(signal: &[f64], sample_rate: f64) -> [f64; HRV_FEATURE_COUNT] {
    try_hrv_features(signal, sample_rate).unwrap_or([0.0; HRV_FEATURE_COUNT])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Narrow unit spikes on a flat baseline at the given sample offsets.
    fn spike_train(len: usize, at: &[usize]) -> Vec<f64> {
        let mut signal = vec![0.0; len];
        for &i in at {
            signal[i] = 1.0;
        }
        signal
    }

    #[test]
    fn test_local_maxima_plateaus_and_edges() {
        assert_eq!(local_maxima(&[0.0, 1.0, 0.0]), vec![1]);
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 1.0, 0.0]), vec![2]);
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 0.0]), vec![1]);
        // Edges and rising-only plateaus are not peaks.
        assert!(local_maxima(&[2.0, 1.0, 0.0]).is_empty());
        assert!(local_maxima(&[0.0, 1.0, 1.0]).is_empty());
        assert!(local_maxima(&[1.0, 1.0]).is_empty());
    }

    #[test]
    fn test_find_peaks_height_filter() {
        let signal = [0.0, 0.5, 0.0, 2.0, 0.0, 1.5, 0.0];
        assert_eq!(find_peaks(&signal, 1.0, 1), vec![3, 5]);
    }

    #[test]
    fn test_find_peaks_distance_keeps_tallest() {
        let signal = [0.0, 1.0, 0.0, 3.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&signal, 0.5, 3), vec![3, 9]);
    }

    #[test]
    fn test_regular_rhythm() {
        // 100 Hz, one beat per second over 10 seconds.
        let beats: Vec<usize> = (0..10).map(|b| 50 + b * 100).collect();
        let signal = spike_train(1000, &beats);

        let hrv = hrv_features(&signal, 100.0);
        assert!((hrv[0] - 1000.0).abs() < 1e-9); // mean RR
        assert!(hrv[1].abs() < 1e-9); // RR std
        assert!(hrv[2].abs() < 1e-9); // RMSSD
        assert!((hrv[3] - 60.0).abs() < 1e-9); // 10 beats in 10 s
    }

    #[test]
    fn test_irregular_rhythm() {
        let signal = spike_train(400, &[20, 100, 220]);
        let hrv = hrv_features(&signal, 100.0);

        // RR = 800 ms and 1200 ms
        assert!((hrv[0] - 1000.0).abs() < 1e-9);
        assert!((hrv[1] - 200.0).abs() < 1e-9);
        assert!((hrv[2] - 400.0).abs() < 1e-9);
        assert!((hrv[3] - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_refractory_period_merges_close_beats() {
        // Two spikes 100 ms apart at 100 Hz fall inside the 33-sample window.
        let signal = spike_train(300, &[50, 60, 200]);
        let peaks = find_peaks(&signal, stats::std_dev(&signal), 33);
        assert_eq!(peaks.len(), 2);
        assert!(peaks[0] == 50 || peaks[0] == 60);
        assert_eq!(peaks[1], 200);
    }

    #[test]
    fn test_two_peaks_rmssd_zero() {
        let signal = spike_train(300, &[50, 150]);
        let hrv = hrv_features(&signal, 100.0);
        assert!((hrv[0] - 1000.0).abs() < 1e-9);
        assert_eq!(hrv[2], 0.0);
    }

    #[test]
    fn test_too_few_peaks_is_zero() {
        assert_eq!(hrv_features(&spike_train(300, &[50]), 100.0), [0.0; 4]);
        assert_eq!(hrv_features(&[5.0; 20], 100.0), [0.0; 4]);
        assert_eq!(hrv_features(&[], 100.0), [0.0; 4]);
    }
}
