/// Interior local maxima at or above `threshold`, in ascending bin order.
///
/// A flat top counts once, at its first bin.
pub fn local_maxima(profile: &[f32], threshold: f32) -> Vec<usize> {
    if profile.len() < 3 {
        return Vec::new();
    }
    let mut peaks = Vec::new();
    let mut idx = 1;
    while idx < profile.len() - 1 {
        let value = profile[idx];
        if value >= threshold && value > profile[idx - 1] {
            let mut end = idx;
            while end + 1 < profile.len() && profile[end + 1] == value {
                end += 1;
            }
            if end + 1 < profile.len() && profile[end + 1] < value {
                peaks.push(idx);
            }
            idx = end + 1;
        } else {
            idx += 1;
        }
    }
    peaks
}

/// Local maxima kept strongest-first, dropping any closer than `min_separation`
/// bins to a peak already kept. Returned in ascending bin order.
pub fn separated_peaks(profile: &[f32], threshold: f32, min_separation: usize) -> Vec<usize> {
    let mut candidates = local_maxima(profile, threshold);
    candidates.sort_by(|&a, &b| profile[b].total_cmp(&profile[a]).then(a.cmp(&b)));

    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|&peak| peak.abs_diff(candidate) >= min_separation)
        {
            kept.push(candidate);
        }
    }
    kept.sort_unstable();
    kept
}
