//! Typed view of the page content the reconciler binds to.
//!
//! The content source owns the items; this module only describes them as a
//! tree of nodes and carries change notifications over a channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use learned_core::model::ItemId;
use tokio::sync::mpsc;

/// A learning item as rendered by the content source.
pub trait LearnableItem: Send + Sync {
    /// Visible text of the item.
    fn label(&self) -> String;

    /// Identifier derived from the trimmed label; `None` for blank labels.
    fn id(&self) -> Option<ItemId> {
        ItemId::from_label(self.label()).ok()
    }

    /// Whether the item currently displays as learned.
    fn is_learned(&self) -> bool;

    fn set_learned(&self, learned: bool);

    fn set_hidden(&self, hidden: bool);
}

/// Stable key of an element node, used to route activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl NodeKey {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The item cell itself; counted as a visible item.
    Item,
    /// An explicit toggle control for an item.
    Control,
    /// Structural wrapper whose children are scanned.
    Container,
}

pub struct ContentElement {
    key: NodeKey,
    role: Role,
    target: Option<Arc<dyn LearnableItem>>,
    children: Vec<ContentNode>,
    bound: AtomicBool,
}

impl ContentElement {
    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn target(&self) -> Option<&Arc<dyn LearnableItem>> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn children(&self) -> &[ContentNode] {
        &self.children
    }

    /// Binding flag: set once a toggle behavior is attached.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Set the binding flag. Returns `false` if it was already set.
    pub(crate) fn mark_bound(&self) -> bool {
        self.bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn clear_bound(&self) {
        self.bound.store(false, Ordering::Release);
    }
}

impl fmt::Debug for ContentElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentElement")
            .field("key", &self.key)
            .field("role", &self.role)
            .field("label", &self.target.as_ref().map(|t| t.label()))
            .field("children", &self.children.len())
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Node of the content tree. Clones share the underlying element.
#[derive(Debug, Clone)]
pub enum ContentNode {
    /// Non-element content; never bound.
    Text(String),
    Element(Arc<ContentElement>),
}

impl ContentNode {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn item(target: Arc<dyn LearnableItem>) -> Self {
        Self::element(Role::Item, Some(target), Vec::new())
    }

    /// An item cell with an explicit toggle control nested inside it.
    #[must_use]
    pub fn item_with_control(target: Arc<dyn LearnableItem>) -> Self {
        let control = Self::control(Arc::clone(&target));
        Self::element(Role::Item, Some(target), vec![control])
    }

    #[must_use]
    pub fn control(target: Arc<dyn LearnableItem>) -> Self {
        Self::element(Role::Control, Some(target), Vec::new())
    }

    #[must_use]
    pub fn container(children: Vec<ContentNode>) -> Self {
        Self::element(Role::Container, None, children)
    }

    fn element(
        role: Role,
        target: Option<Arc<dyn LearnableItem>>,
        children: Vec<ContentNode>,
    ) -> Self {
        Self::Element(Arc::new(ContentElement {
            key: NodeKey::next(),
            role,
            target,
            children,
            bound: AtomicBool::new(false),
        }))
    }

    #[must_use]
    pub fn key(&self) -> Option<NodeKey> {
        match self {
            ContentNode::Text(_) => None,
            ContentNode::Element(el) => Some(el.key()),
        }
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Arc<ContentElement>> {
        match self {
            ContentNode::Text(_) => None,
            ContentNode::Element(el) => Some(el),
        }
    }
}

/// Structural change reported by the content source.
#[derive(Debug, Clone, Default)]
pub struct ContentChange {
    pub added: Vec<ContentNode>,
    pub removed: Vec<ContentNode>,
}

impl ContentChange {
    #[must_use]
    pub fn added(nodes: Vec<ContentNode>) -> Self {
        Self {
            added: nodes,
            removed: Vec::new(),
        }
    }

    #[must_use]
    pub fn removed(nodes: Vec<ContentNode>) -> Self {
        Self {
            added: Vec::new(),
            removed: nodes,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ContentEvent {
    Changed(ContentChange),
    /// The user activated an item or its control.
    Activated(NodeKey),
}

/// Sending half of the content notification stream.
#[derive(Debug, Clone)]
pub struct ContentFeed {
    tx: mpsc::Sender<ContentEvent>,
}

impl ContentFeed {
    #[must_use]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ContentEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Returns `false` once the session has stopped listening.
    pub async fn insert(&self, nodes: Vec<ContentNode>) -> bool {
        self.send(ContentEvent::Changed(ContentChange::added(nodes)))
            .await
    }

    pub async fn remove(&self, nodes: Vec<ContentNode>) -> bool {
        self.send(ContentEvent::Changed(ContentChange::removed(nodes)))
            .await
    }

    pub async fn activate(&self, key: NodeKey) -> bool {
        self.send(ContentEvent::Activated(key)).await
    }

    async fn send(&self, event: ContentEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// Plain in-process item; what a terminal or test content source renders.
#[derive(Debug, Default)]
pub struct SimpleItem {
    label: String,
    learned: AtomicBool,
    hidden: AtomicBool,
    repaints: Mutex<usize>,
}

impl SimpleItem {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    /// Number of times the learned indicator has been painted.
    #[must_use]
    pub fn repaints(&self) -> usize {
        self.repaints.lock().map_or(0, |count| *count)
    }
}

impl LearnableItem for SimpleItem {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn is_learned(&self) -> bool {
        self.learned.load(Ordering::Acquire)
    }

    fn set_learned(&self, learned: bool) {
        self.learned.store(learned, Ordering::Release);
        if let Ok(mut count) = self.repaints.lock() {
            *count += 1;
        }
    }

    fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::Release);
    }
}
