use crate::backend::MutatorError;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("file is not a PDF document")]
    NotAPdf,
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    SourceTooLarge { size: u64, limit: u64 },
    #[error("document has no pages")]
    NoPages,
    #[error("no document is loaded")]
    NoDocument,
    #[error("failed to encode drawing surface: {0}")]
    SurfaceEncode(#[from] image::ImageError),
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("no document is loaded")]
    NoDocument,
    #[error(transparent)]
    Mutator(#[from] MutatorError),
}
