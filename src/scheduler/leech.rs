//! Leech detection: cards that fail chronically get flagged so the caller
//! can act (suspend, tag, or otherwise intervene).

/// `lapses` is the post-increment lapse count (the lapse that just
/// happened has already been counted). Fires at `leech_threshold` and
/// every `leech_threshold / 2` lapses after that, never more often than
/// once per lapse.
pub fn is_leech(lapses: u32, leech_threshold: u32) -> bool {
    if leech_threshold == 0 || lapses < leech_threshold {
        return false;
    }
    let period = std::cmp::max(1, leech_threshold / 2);
    (lapses - leech_threshold) % period == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_at_threshold_matching_scenario_5() {
        assert!(is_leech(16, 16));
        assert!(!is_leech(15, 16));
    }

    #[test]
    fn fires_again_every_half_threshold() {
        assert!(is_leech(24, 16));
        assert!(!is_leech(20, 16));
    }
}
