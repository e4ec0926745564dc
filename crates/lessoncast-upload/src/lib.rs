//! Lessoncast upload client
//!
//! Moves a local video to storage through a presigned ticket, probes its
//! duration, finalizes it with the API and waits for processing to finish.
//! Progress is published as an [`UploadSession`](lessoncast_core::UploadSession)
//! on a `tokio::sync::watch` channel.

pub mod coordinator;
pub mod options;
pub mod poller;
pub mod probe;
pub mod progress;

pub use coordinator::UploadCoordinator;
pub use options::{PollOptions, UploadOptions};
pub use poller::StatusPoller;
pub use probe::{
    ContainerDurationProbe, DurationProbe, FfprobeDurationProbe, Mp4DurationProbe, ProbeError,
};
pub use progress::displayed_percent;
