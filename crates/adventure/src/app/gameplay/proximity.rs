use engine::Vec2;

/// Euclidean distance check, inclusive of the threshold.
pub(super) fn within_range(a: Vec2, b: Vec2, threshold_px: f32) -> bool {
    if !(threshold_px >= 0.0) {
        return false;
    }
    a.distance_squared(b) <= threshold_px * threshold_px
}

/// Nearest candidate whose own radius contains `origin`.
///
/// Ties keep the earliest candidate in iteration order.
pub(super) fn nearest_within<T>(
    origin: Vec2,
    candidates: impl IntoIterator<Item = (T, Vec2, f32)>,
) -> Option<T> {
    let mut best: Option<(T, f32)> = None;
    for (candidate, position, radius) in candidates {
        if !within_range(origin, position, radius) {
            continue;
        }
        let distance_squared = origin.distance_squared(position);
        match &best {
            Some((_, best_distance)) if *best_distance <= distance_squared => {}
            _ => best = Some((candidate, distance_squared)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

pub(super) fn nearest_in_range<T>(
    origin: Vec2,
    candidates: impl IntoIterator<Item = (T, Vec2)>,
    threshold_px: f32,
) -> Option<T> {
    nearest_within(
        origin,
        candidates
            .into_iter()
            .map(|(candidate, position)| (candidate, position, threshold_px)),
    )
}
