use std::collections::BTreeMap;
use std::sync::Arc;

use learned_core::model::{ItemId, PageId, ProgressDocument};
use tracing::{debug, trace};

use crate::content::{ContentChange, ContentElement, ContentNode, LearnableItem, NodeKey, Role};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Elements that received a binding in this pass.
    pub bound: usize,
    /// Elements skipped because their binding flag was already set.
    pub already_bound: usize,
    /// Text nodes and items without a usable label.
    pub ignored: usize,
    /// Bindings dropped because their element left the page.
    pub detached: usize,
}

struct Binding {
    role: Role,
    target: Arc<dyn LearnableItem>,
    element: Arc<ContentElement>,
}

/// Keeps exactly one binding per item or control element on the page.
///
/// Bindings are keyed by `NodeKey`, which grows monotonically, so iteration
/// follows insertion order.
#[derive(Default)]
pub struct ContentReconciler {
    bindings: BTreeMap<NodeKey, Binding>,
}

impl ContentReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a change notification: drop removed nodes, then bind added ones.
    pub fn apply(
        &mut self,
        change: &ContentChange,
        doc: &ProgressDocument,
        page: &PageId,
    ) -> ScanReport {
        let detached = self.detach(&change.removed);
        let mut report = self.scan(&change.added, doc, page);
        report.detached = detached;
        report
    }

    /// Bind every unbound item or control in `nodes` (descendants included)
    /// and paint it from the document. Already bound elements are left alone.
    pub fn scan(
        &mut self,
        nodes: &[ContentNode],
        doc: &ProgressDocument,
        page: &PageId,
    ) -> ScanReport {
        let mut report = ScanReport::default();
        for node in nodes {
            self.scan_node(node, doc, page, &mut report);
        }
        debug!(
            bound = report.bound,
            already_bound = report.already_bound,
            ignored = report.ignored,
            "content scan"
        );
        report
    }

    fn scan_node(
        &mut self,
        node: &ContentNode,
        doc: &ProgressDocument,
        page: &PageId,
        report: &mut ScanReport,
    ) {
        let ContentNode::Element(element) = node else {
            report.ignored += 1;
            return;
        };

        if let Some(target) = element.target() {
            self.bind(element, target, doc, page, report);
        }

        for child in element.children() {
            self.scan_node(child, doc, page, report);
        }
    }

    fn bind(
        &mut self,
        element: &Arc<ContentElement>,
        target: &Arc<dyn LearnableItem>,
        doc: &ProgressDocument,
        page: &PageId,
        report: &mut ScanReport,
    ) {
        let Some(id) = target.id() else {
            trace!(key = element.key().value(), "skipping item without label");
            report.ignored += 1;
            return;
        };
        if !element.mark_bound() {
            report.already_bound += 1;
            return;
        }

        target.set_learned(doc.contains(page, &id));
        self.bindings.insert(
            element.key(),
            Binding {
                role: element.role(),
                target: Arc::clone(target),
                element: Arc::clone(element),
            },
        );
        report.bound += 1;
    }

    /// Remove bindings for `nodes` and their descendants and clear their flags,
    /// so a later re-insertion binds again exactly once.
    pub fn detach(&mut self, nodes: &[ContentNode]) -> usize {
        let mut detached = 0;
        for node in nodes {
            self.detach_node(node, &mut detached);
        }
        detached
    }

    fn detach_node(&mut self, node: &ContentNode, detached: &mut usize) {
        let ContentNode::Element(element) = node else {
            return;
        };
        if self.bindings.remove(&element.key()).is_some() {
            element.clear_bound();
            *detached += 1;
        }
        for child in element.children() {
            self.detach_node(child, detached);
        }
    }

    /// Item behind a bound element, for routing activations.
    #[must_use]
    pub fn target_of(&self, key: NodeKey) -> Option<Arc<dyn LearnableItem>> {
        self.bindings
            .get(&key)
            .map(|binding| Arc::clone(&binding.target))
    }

    /// Paint every bound item that shares `id`.
    pub fn paint_id(&self, id: &ItemId, learned: bool) {
        for binding in self.bindings.values() {
            if binding.target.id().as_ref() == Some(id) {
                binding.target.set_learned(learned);
            }
        }
    }

    /// Repaint every bound item from the document.
    pub fn repaint_all(&self, doc: &ProgressDocument, page: &PageId) {
        for binding in self.bindings.values() {
            if let Some(id) = binding.target.id() {
                binding.target.set_learned(doc.contains(page, &id));
            }
        }
    }

    /// Hide learned items when `hide_learned` is set; show everything otherwise.
    pub fn apply_filter(&self, hide_learned: bool) {
        for binding in self.items() {
            binding
                .target
                .set_hidden(hide_learned && binding.target.is_learned());
        }
    }

    fn items(&self) -> impl Iterator<Item = &Binding> {
        self.bindings
            .values()
            .filter(|binding| binding.role == Role::Item)
    }

    /// Items currently on the page, whether or not the filter hides them.
    pub fn visible_items(&self) -> impl Iterator<Item = &Arc<dyn LearnableItem>> {
        self.items().map(|binding| &binding.target)
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Drop every binding and clear the flags.
    pub fn clear(&mut self) {
        for binding in self.bindings.values() {
            binding.element.clear_bound();
        }
        self.bindings.clear();
    }
}
