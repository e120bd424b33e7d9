//! Seams to the document backend.
//!
//! The overlay engine never parses or writes PDF itself. A renderer reports
//! page sizes and rasterises pages; a mutator receives drawing instructions in
//! document space and serializes the result.

use crate::color::RgbColor;
use crate::geometry::{DocumentRect, PageSize};
use image::RgbaImage;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterFormat::Png => f.write_str("PNG"),
            RasterFormat::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// Order in which embedded image bytes are tried.
pub const EMBED_FALLBACK: [RasterFormat; 2] = [RasterFormat::Png, RasterFormat::Jpeg];

/// Opaque handle to an image embedded in the mutated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum MutatorError {
    #[error("page index {index} out of range (page_count={page_count})")]
    PageOutOfRange { index: u32, page_count: u32 },
    #[error("image bytes are not valid {0}")]
    UnsupportedFormat(RasterFormat),
    #[error("unknown image handle {0:?}")]
    UnknownImage(ImageRef),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextInstruction {
    pub content: String,
    /// Baseline origin in document space.
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleInstruction {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    pub fill: RgbColor,
}

pub trait DocumentRenderer {
    fn page_count(&self) -> u32;
    /// Native size of a 1-based page.
    fn native_page_size(&self, page_number: u32) -> Option<PageSize>;
    /// Rasterises a 1-based page at the given display width.
    fn render_page(&self, page_number: u32, display_width: f32) -> Option<RgbaImage>;
}

/// Drawing surface over one loaded source document. Page indices are 0-based.
pub trait DocumentMutator {
    fn page_count(&self) -> u32;
    fn page_size(&self, page_index: u32) -> Result<PageSize, MutatorError>;
    /// Embeds raw bytes decoded as exactly `format`.
    fn embed_image(&mut self, bytes: &[u8], format: RasterFormat)
        -> Result<ImageRef, MutatorError>;
    fn draw_text(&mut self, page_index: u32, text: &TextInstruction) -> Result<(), MutatorError>;
    fn draw_image(
        &mut self,
        page_index: u32,
        image: ImageRef,
        rect: DocumentRect,
    ) -> Result<(), MutatorError>;
    fn draw_rectangle(
        &mut self,
        page_index: u32,
        rect: DocumentRect,
        fill: RgbColor,
    ) -> Result<(), MutatorError>;
    fn draw_circle(
        &mut self,
        page_index: u32,
        circle: &CircleInstruction,
    ) -> Result<(), MutatorError>;
    fn save(self) -> Result<Vec<u8>, MutatorError>
    where
        Self: Sized;
}

/// Tries each format in [`EMBED_FALLBACK`] order and returns the first success.
pub fn embed_with_fallback<M: DocumentMutator + ?Sized>(
    mutator: &mut M,
    bytes: &[u8],
) -> Result<ImageRef, MutatorError> {
    let mut last = MutatorError::UnsupportedFormat(RasterFormat::Png);

    for format in EMBED_FALLBACK {
        match mutator.embed_image(bytes, format) {
            Ok(image) => return Ok(image),
            Err(err @ MutatorError::UnsupportedFormat(_)) => last = err,
            Err(other) => return Err(other),
        }
    }

    Err(last)
}
