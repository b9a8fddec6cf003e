pub mod compare;
pub mod registry;
pub mod sync;

pub use crate::domain::model::{ImagingStudy, StudyKey, StudyPayload};
pub use crate::domain::ports::{ArchiveClient, Place};
pub use crate::utils::error::Result;
pub use registry::Domain;
pub use sync::{
    EventSink, RecordingEventSink, SendOptions, SendReport, SyncEngine, SyncEvent, SyncPhase,
    TracingEventSink,
};
