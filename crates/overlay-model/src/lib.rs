//! Annotation overlay engine.
//!
//! Tracks text, image, shape and freehand elements placed over the rendered
//! pages of one source document and flattens them into a new document through
//! a [`DocumentMutator`].

pub mod backend;
pub mod color;
pub mod compose;
pub mod element;
pub mod error;
pub mod geometry;
pub mod intake;
pub mod session;
pub mod surface;

#[cfg(test)]
mod testing;

pub use backend::{
    embed_with_fallback, CircleInstruction, DocumentMutator, DocumentRenderer, ImageRef,
    MutatorError, RasterFormat, TextInstruction, EMBED_FALLBACK,
};
pub use color::{parse_hex_color, resolve_color, RgbColor};
pub use compose::{compose_elements, ComposeOutput, ComposeReport};
pub use element::{Element, ElementId, ElementKind, ElementPatch, ShapeVariant};
pub use error::{ComposeError, OverlayError};
pub use geometry::{
    page_scale, to_document_rect, DocumentRect, PageDisplayMetrics, PageSize, RenderedRect,
};
pub use session::{DrawingOutcome, EditMode, OverlaySession, SessionSettings, SourceDocument};
pub use surface::{DrawingSurface, Point};
