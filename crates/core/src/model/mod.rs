mod ids;
mod progress;
mod summary;
mod view_settings;

pub use ids::{IdError, ItemId, PageId};
pub use progress::{DocumentError, ProgressDocument};
pub use summary::ProgressSummary;
pub use view_settings::ViewSettings;
