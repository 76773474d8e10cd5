use thiserror::Error;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("grouping incomplete: {processed}/{total} frames processed before the deadline")]
    Incomplete { processed: usize, total: usize },
    #[error("config error: {0}")]
    Config(String),
    #[error("descriptor file parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl SamplingError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SamplingError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
