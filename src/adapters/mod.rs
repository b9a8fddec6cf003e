// Adapters layer: concrete Place implementations for each storage backend.

pub mod archive;
pub mod folder;
pub mod xnat;
pub mod zipped;

pub use folder::DicomRootFolder;
pub use xnat::{XnatClient, XnatPreArchive};
pub use zipped::ZippedDicomRootFolder;
