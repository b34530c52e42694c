#![forbid(unsafe_code)]

pub mod file;
pub mod repository;
pub mod sqlite;

pub use repository::{
    FileHandleRepository, InMemoryRepository, ProgressRepository, SettingsRepository, Storage,
    StorageError,
};
