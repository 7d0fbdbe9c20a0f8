//! Progress reporting from a running scan back to whoever started it.

use serde::Serialize;

/// Snapshot of how far a scan has got.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub games_total: usize,
    pub games_examined: usize,
    pub items_found: usize,
}

impl ScanProgress {
    /// Percentage of games examined, capped at 99 while the scan is running.
    pub fn percent(&self) -> u8 {
        if self.games_total == 0 {
            return 0;
        }
        let pct = self.games_examined.saturating_mul(100) / self.games_total;
        pct.min(99) as u8
    }
}

/// Receives progress after each game. Also lets the owner ask the scan to stop.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: ScanProgress);

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that drops every report.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: ScanProgress) {}
}

impl<F> ProgressSink for F
where
    F: Fn(ScanProgress) + Send + Sync,
{
    fn report(&self, progress: ScanProgress) {
        self(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_capped_below_100() {
        let p = ScanProgress {
            games_total: 4,
            games_examined: 4,
            items_found: 0,
        };
        assert_eq!(p.percent(), 99);

        let p = ScanProgress {
            games_total: 3,
            games_examined: 1,
            items_found: 0,
        };
        assert_eq!(p.percent(), 33);
        assert_eq!(ScanProgress::default().percent(), 0);
    }
}
