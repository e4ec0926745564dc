use crate::models::UploadFile;

/// 2 GiB
pub const MAX_VIDEO_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

const VIDEO_MIME_PREFIX: &str = "video/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid content type: {0} (expected video/*)")]
    InvalidContentType(String),

    #[error("Empty file")]
    EmptyFile,
}

/// Checks a file before any network work starts.
///
/// Advisory on the client; the server enforces the size limit again when
/// finalizing.
#[derive(Debug, Clone)]
pub struct UploadConstraints {
    max_size_bytes: u64,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            max_size_bytes: MAX_VIDEO_SIZE_BYTES,
        }
    }
}

impl UploadConstraints {
    pub fn new(max_size_bytes: u64) -> Self {
        Self { max_size_bytes }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if size > self.max_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_size_bytes,
            });
        }
        Ok(())
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_lowercase();
        if !normalized.starts_with(VIDEO_MIME_PREFIX) || normalized.len() == VIDEO_MIME_PREFIX.len() {
            return Err(ValidationError::InvalidContentType(content_type.to_string()));
        }
        Ok(())
    }

    pub fn validate(&self, file: &UploadFile) -> Result<(), ValidationError> {
        self.validate_content_type(&file.content_type)?;
        self.validate_size(file.size)
    }
}
