pub mod lesson;
pub mod streaming;
pub mod upload;
pub mod video;

pub use lesson::{LessonId, LessonInfo, LessonKind};
pub use streaming::{
    ReferenceDecodeError, ReferenceShape, StreamUrlResponse, StreamingReference, DATA_URI_PREFIX,
};
pub use upload::{
    content_type_for_path, FinalizeUploadRequest, UploadFile, UploadSession, UploadState,
    UploadTicket,
};
pub use video::{TransitionError, VideoAsset, VideoStatus};
