//! Terminal content source: rows read from a text file, one label per line.

use std::sync::Arc;

use services::{ContentNode, LearnableItem, NodeKey, SimpleItem};

pub struct Row {
    pub item: Arc<SimpleItem>,
    pub node: ContentNode,
}

impl Row {
    fn new(label: &str) -> Self {
        let item = SimpleItem::new(label);
        let node = ContentNode::item_with_control(item.clone());
        Self { item, node }
    }

    /// Key of the row's toggle control.
    pub fn control_key(&self) -> Option<NodeKey> {
        self.node
            .as_element()
            .and_then(|el| el.children().first())
            .and_then(ContentNode::key)
    }
}

/// Rows currently on the page, in display order.
#[derive(Default)]
pub struct Page {
    rows: Vec<Row>,
}

impl Page {
    /// Build the initial page. Blank lines become plain text nodes.
    pub fn from_text(text: &str) -> (Self, Vec<ContentNode>) {
        let mut page = Self::default();
        let mut nodes = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                nodes.push(ContentNode::text(line));
                continue;
            }
            let row = Row::new(line);
            nodes.push(row.node.clone());
            page.rows.push(row);
        }
        (page, vec![ContentNode::container(nodes)])
    }

    /// Append rows and return the nodes to announce as one insertion.
    pub fn append(&mut self, labels: &[&str]) -> Vec<ContentNode> {
        let mut nodes = Vec::with_capacity(labels.len());
        for label in labels {
            let row = Row::new(label);
            nodes.push(row.node.clone());
            self.rows.push(row);
        }
        vec![ContentNode::container(nodes)]
    }

    /// Take a row off the page (1-based index).
    pub fn remove(&mut self, index: usize) -> Option<Row> {
        let slot = index.checked_sub(1)?;
        (slot < self.rows.len()).then(|| self.rows.remove(slot))
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index.checked_sub(1)?)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            if row.item.is_hidden() {
                continue;
            }
            let mark = if row.item.is_learned() { 'x' } else { ' ' };
            out.push_str(&format!("{:>3}. [{mark}] {}\n", i + 1, row.item.label()));
        }
        out
    }
}
