//! Level math for the reward engine
//!
//! Level thresholds double geometrically: level 1 needs 0 XP, and level L
//! (for L > 1) needs cumulative XP of `100 * 2^(L-2)`. All functions here
//! are pure and deterministic; persistence lives in the actor and storage.

/// XP required to reach level 2; every later threshold doubles it
pub const BASE_XP: u64 = 100;

/// Highest modeled level; `xp_for_next_level` returns 0 at or beyond it
pub const MAX_LEVEL: u32 = 30;

/// Cumulative XP required to reach `level`.
///
/// Level 1 (and below) requires 0 XP. Levels above [`MAX_LEVEL`] share the
/// max level's threshold.
pub fn threshold(level: u32) -> u64 {
    if level <= 1 {
        return 0;
    }
    let level = level.min(MAX_LEVEL);
    BASE_XP << (level - 2)
}

/// Level for a cumulative experience total. Monotonic in `experience`.
pub fn calculate_level(experience: u64) -> u32 {
    let mut level = 1;
    while level < MAX_LEVEL && experience >= threshold(level + 1) {
        level += 1;
    }
    level
}

/// Additional XP needed to cross into the next level from `experience`.
/// Returns 0 at [`MAX_LEVEL`].
pub fn xp_for_next_level(experience: u64) -> u64 {
    let level = calculate_level(experience);
    if level >= MAX_LEVEL {
        return 0;
    }
    threshold(level + 1) - experience
}

/// XP earned within the current level and the span of that level,
/// for progress-bar style displays.
pub fn level_progress(experience: u64) -> (u64, u64) {
    let level = calculate_level(experience);
    let floor = threshold(level);
    if level >= MAX_LEVEL {
        return (experience - floor, 0);
    }
    (experience - floor, threshold(level + 1) - floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_double() {
        assert_eq!(threshold(1), 0);
        assert_eq!(threshold(2), 100);
        assert_eq!(threshold(3), 200);
        assert_eq!(threshold(4), 400);
        assert_eq!(threshold(5), 800);
    }

    #[test]
    fn test_calculate_level_known_points() {
        assert_eq!(calculate_level(0), 1);
        assert_eq!(calculate_level(99), 1);
        assert_eq!(calculate_level(100), 2);
        assert_eq!(calculate_level(199), 2);
        assert_eq!(calculate_level(300), 3);
        assert_eq!(calculate_level(399), 3);
        assert_eq!(calculate_level(400), 4);
    }

    #[test]
    fn test_level_caps_at_max() {
        assert_eq!(calculate_level(u64::MAX), MAX_LEVEL);
        assert_eq!(xp_for_next_level(u64::MAX), 0);
    }

    #[test]
    fn test_xp_for_next_level_reaches_threshold_exactly() {
        for xp in [0u64, 1, 99, 100, 150, 199, 200, 1234, 99_999] {
            let level = calculate_level(xp);
            let needed = xp_for_next_level(xp);
            if level < MAX_LEVEL {
                assert_eq!(calculate_level(xp + needed), level + 1);
                assert_eq!(xp + needed, threshold(level + 1));
            }
        }
    }

    #[test]
    fn test_level_progress() {
        assert_eq!(level_progress(0), (0, 100));
        assert_eq!(level_progress(50), (50, 100));
        assert_eq!(level_progress(100), (0, 100));
        assert_eq!(level_progress(250), (50, 200));
    }
}
