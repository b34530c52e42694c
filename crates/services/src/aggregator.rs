use std::sync::Arc;

use learned_core::model::{PageId, ProgressDocument, ProgressSummary};

use crate::reconciler::ContentReconciler;
use crate::status::StatusSurface;

/// Derives the summary counters and publishes them. Never touches the model.
#[derive(Clone)]
pub struct ProgressAggregator {
    status: Arc<dyn StatusSurface>,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new(status: Arc<dyn StatusSurface>) -> Self {
        Self { status }
    }

    pub fn recompute(
        &self,
        reconciler: &ContentReconciler,
        doc: &ProgressDocument,
        page: &PageId,
    ) -> ProgressSummary {
        let (total, flagged) = reconciler
            .visible_items()
            .fold((0, 0), |(total, flagged), item| {
                (total + 1, flagged + usize::from(item.is_learned()))
            });
        let summary = ProgressSummary::compute(total, flagged, doc.learned_count(page));
        self.status.publish_progress(&summary);
        summary
    }
}
