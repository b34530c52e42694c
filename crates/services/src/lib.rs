#![forbid(unsafe_code)]

pub mod aggregator;
pub mod config;
pub mod content;
pub mod error;
pub mod external_file;
pub mod reconciler;
pub mod session;
pub mod status;

pub use learned_core::Clock;

pub use aggregator::ProgressAggregator;
pub use config::SessionConfig;
pub use content::{
    ContentChange, ContentElement, ContentEvent, ContentFeed, ContentNode, LearnableItem,
    NodeKey, Role, SimpleItem,
};
pub use error::ExternalFileError;
pub use external_file::ExternalFileService;
pub use reconciler::{ContentReconciler, ScanReport};
pub use session::{PersistenceMode, ProgressSession};
pub use status::{RecordingStatus, StatusEvent, StatusMessage, StatusSurface};
