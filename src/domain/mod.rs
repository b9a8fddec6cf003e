// Domain layer: core models, the query language and ports (interfaces).
// No knowledge of concrete backends.

pub mod model;
pub mod ports;
pub mod query;

pub use model::{ImagingStudy, PlaceKind, StudyFile, StudyKey, StudyPayload, StudyUri};
pub use ports::{ArchiveClient, ArchiveSession, Place};
pub use query::StudyQuery;
