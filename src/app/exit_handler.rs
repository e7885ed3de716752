//! Exit code logic for the jarcrawler process.
//!
//! Single responsibility: map per-source outcomes to the process exit outcome.

use crate::ProcessExit;

/// Determines the process exit outcome from source counts.
///
/// Any failed source wins over cancellation; a cancelled run without
/// failures exits as interrupted.
pub(crate) fn determine_exit_outcome(failed: usize, cancelled: usize) -> ProcessExit {
    if failed > 0 {
        ProcessExit::Partial
    } else if cancelled > 0 {
        ProcessExit::Interrupted
    } else {
        ProcessExit::Success
    }
}
