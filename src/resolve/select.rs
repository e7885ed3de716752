//! Latest-build selection.

use crate::source::BuildCandidate;

/// Picks the build with the greatest numeric build number.
///
/// Ties keep the first candidate encountered. When no candidate carries a
/// number, the first candidate is returned; an empty slice yields `None`.
#[must_use]
pub fn select_latest(candidates: &[BuildCandidate]) -> Option<&BuildCandidate> {
    let numbered = candidates
        .iter()
        .filter_map(|c| c.build_number.map(|n| (n, c)))
        .fold(None, |best: Option<(u64, &BuildCandidate)>, (n, c)| match best {
            Some((best_n, _)) if n <= best_n => best,
            _ => Some((n, c)),
        });

    numbered.map(|(_, c)| c).or_else(|| candidates.first())
}
