pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{DicomRootFolder, XnatClient, XnatPreArchive, ZippedDicomRootFolder};
pub use config::{PlaceConfig, Settings};
pub use core::{Domain, SendOptions, SendReport, SyncEngine};
pub use domain::{ImagingStudy, Place, StudyKey, StudyQuery};
pub use utils::error::{Result, SyncError};
