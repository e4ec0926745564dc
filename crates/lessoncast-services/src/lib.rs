//! Lessoncast services
//!
//! Everything the server owns about a lesson's video: who may upload, which
//! upload ticket is current, the asset record and its processing state, and
//! the streaming references handed to players.

pub mod caller;
pub mod directory;
pub mod in_process;
pub mod processing;
pub mod repository;
pub mod service;
pub mod tickets;

pub use caller::{Caller, CallerRole};
pub use directory::{InMemoryLessonDirectory, LessonDirectory};
pub use in_process::InProcessVideoApi;
pub use processing::{
    CommandTranscoder, JobOutcome, PassthroughTranscoder, ProcessingJob, ProcessingQueue,
    ProcessingWorker, TranscodeError, TranscodeOutput, Transcoder, WorkerConfig,
};
pub use repository::{InMemoryVideoAssetRepository, VideoAssetRepository};
pub use service::{LessonVideoService, VideoServiceSettings};
pub use tickets::{TicketCheckError, TicketRegistry};
