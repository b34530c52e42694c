use serde::{Deserialize, Serialize};

/// Viewer preferences kept in the fast settings tier, separate from progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(default)]
    pub hide_learned: bool,
}

impl ViewSettings {
    #[must_use]
    pub fn with_hide_learned(mut self, hide_learned: bool) -> Self {
        self.hide_learned = hide_learned;
        self
    }
}
