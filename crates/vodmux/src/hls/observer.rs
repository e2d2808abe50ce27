/// Observational callbacks for a download job.
///
/// Progress fires only at batch boundaries with the cumulative number of
/// segments *attempted* (clamped to the total), so progress can reach 100%
/// even when some segments were dropped. Status carries the single
/// human-readable line surfaced for both milestones and terminal failure.
/// Implementations must not panic back into the engine.
pub trait DownloadObserver: Send + Sync {
    fn on_progress(&self, attempted: usize, total: usize) {
        let _ = (attempted, total);
    }

    fn on_status(&self, message: &str) {
        let _ = message;
    }
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {}
