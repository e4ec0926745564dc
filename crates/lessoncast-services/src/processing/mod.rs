//! Background processing: drives uploaded assets through the external transcoder.

pub mod queue;
pub mod transcoder;
pub mod worker;

pub use queue::ProcessingQueue;
pub use transcoder::{
    CommandTranscoder, PassthroughTranscoder, TranscodeError, TranscodeOutput, Transcoder,
};
pub use worker::{JobOutcome, ProcessingJob, ProcessingWorker, WorkerConfig};
