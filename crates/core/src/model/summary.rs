/// Derived progress counters for the currently visible items. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub learned: usize,
    pub percent: u8,
}

impl ProgressSummary {
    /// Combine the visible item count with both learned counts.
    ///
    /// `flagged` is what the items currently display, `in_model` is the size of
    /// the page's learned set. The larger one wins so a repaint that lags the
    /// model by one step never shows a drop in progress.
    #[must_use]
    pub fn compute(total: usize, flagged: usize, in_model: usize) -> Self {
        let learned = flagged.max(in_model);
        let percent = if total == 0 {
            0
        } else {
            let ratio = (learned as f64 / total as f64 * 100.0).round();
            // Learned ids that are not on screen can push the ratio past 100.
            ratio.min(100.0) as u8
        };
        Self {
            total,
            learned,
            percent,
        }
    }
}

impl std::fmt::Display for ProgressSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} learned ({}%)", self.learned, self.total, self.percent)
    }
}
