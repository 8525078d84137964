//! Scene durations accepted by the video-synthesis service.

/// Durations (seconds) the video service accepts, ascending.
pub const ALLOWED_SCENE_DURATIONS: [u32; 2] = [5, 8];

/// Snap a requested duration onto [`ALLOWED_SCENE_DURATIONS`].
///
/// Values at or below the smallest allowed duration clamp up, values at or
/// above the largest clamp down. Anything in between goes to the nearest
/// allowed value, ties resolving to the lower one.
pub fn normalize_duration(requested: u32) -> u32 {
    let min = ALLOWED_SCENE_DURATIONS[0];
    let max = ALLOWED_SCENE_DURATIONS[ALLOWED_SCENE_DURATIONS.len() - 1];

    if requested <= min {
        return min;
    }
    if requested >= max {
        return max;
    }

    let mut best = min;
    for &allowed in ALLOWED_SCENE_DURATIONS.iter() {
        // Strict comparison keeps the earlier (lower) value on ties.
        if requested.abs_diff(allowed) < requested.abs_diff(best) {
            best = allowed;
        }
    }
    best
}
