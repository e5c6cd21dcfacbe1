//! Counters and progress logging for long archive scans

use tracing::info;

use crate::identifier::Vocabulary;

/// Rows between progress log lines
pub const PROGRESS_LOG_INTERVAL: u64 = 1_000_000;

/// Counters for one pass over a raw archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Raw rows/records read
    pub read: u64,
    /// Items yielded downstream
    pub emitted: u64,
    /// Well-formed rows dropped (unmapped endpoint, no external id)
    pub dropped: u64,
    /// Rows skipped because they could not be parsed
    pub malformed: u64,
}

impl ScanStats {
    /// Count one raw row, logging periodically
    pub fn tick(&mut self, stage: &'static str, vocabulary: Vocabulary) {
        self.read += 1;
        if self.read % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                stage,
                vocabulary = %vocabulary,
                read = self.read,
                emitted = self.emitted,
                "Scan progress"
            );
        }
    }

    pub fn log_summary(&self, stage: &'static str, vocabulary: Vocabulary) {
        info!(
            stage,
            vocabulary = %vocabulary,
            read = self.read,
            emitted = self.emitted,
            dropped = self.dropped,
            malformed = self.malformed,
            "Scan complete"
        );
    }
}
