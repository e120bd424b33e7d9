//! Flattening of overlay elements into the source document.

use crate::backend::{
    embed_with_fallback, CircleInstruction, DocumentMutator, MutatorError, TextInstruction,
};
use crate::color::resolve_color;
use crate::element::{Element, ElementId, ElementKind, ShapeVariant};
use crate::error::ComposeError;
use crate::geometry::{page_scale, to_document_rect, PageSize, RenderedRect};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What happened during one composition besides the output bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeReport {
    pub drawn: usize,
    /// Anchor pages that do not exist in the source document.
    pub skipped_pages: Vec<u32>,
    /// Image or drawing elements whose bytes matched no embeddable format.
    pub skipped_images: Vec<ElementId>,
}

#[derive(Debug, Clone)]
pub struct ComposeOutput {
    pub bytes: Vec<u8>,
    pub report: ComposeReport,
}

/// Draws every element onto its anchor page and serializes the result.
///
/// Elements are grouped by page and drawn in collection order within a page.
/// Each page uses its own native width for the scale, so mixed page sizes map
/// independently.
pub fn compose_elements<'a, M, I>(
    elements: I,
    rendered_width: f32,
    mut mutator: M,
) -> Result<ComposeOutput, ComposeError>
where
    M: DocumentMutator,
    I: IntoIterator<Item = &'a Element>,
{
    let mut by_page: BTreeMap<u32, Vec<&Element>> = BTreeMap::new();
    for element in elements {
        by_page.entry(element.page_number).or_default().push(element);
    }

    let page_count = mutator.page_count();
    let mut report = ComposeReport::default();

    for (page_number, group) in by_page {
        let Some(page_index) = page_number.checked_sub(1).filter(|index| *index < page_count)
        else {
            warn!(page_number, page_count, elements = group.len(), "skipping out-of-range page");
            report.skipped_pages.push(page_number);
            continue;
        };

        let page = mutator.page_size(page_index)?;
        for element in group {
            draw_element(&mut mutator, page_index, page, rendered_width, element, &mut report)?;
        }
    }

    let bytes = mutator.save()?;
    info!(
        drawn = report.drawn,
        skipped_pages = report.skipped_pages.len(),
        skipped_images = report.skipped_images.len(),
        bytes = bytes.len(),
        "composed overlay document"
    );

    Ok(ComposeOutput { bytes, report })
}

fn draw_element<M: DocumentMutator>(
    mutator: &mut M,
    page_index: u32,
    page: PageSize,
    rendered_width: f32,
    element: &Element,
    report: &mut ComposeReport,
) -> Result<(), ComposeError> {
    let rendered = RenderedRect {
        x: element.x,
        y: element.y,
        width: element.width,
        height: element.vertical_extent(),
    };
    let rect = to_document_rect(rendered, page, rendered_width);
    debug!(id = %element.id, kind = element.kind.label(), page_index, ?rect, "drawing element");

    match &element.kind {
        ElementKind::Text { content, font_size, color } => {
            if content.trim().is_empty() {
                return Ok(());
            }

            let scale = page_scale(rendered_width, page.width_pt);
            let text = TextInstruction {
                content: content.clone(),
                x: rect.x,
                y: rect.y,
                font_size: font_size / scale,
                color: resolve_color(color),
            };
            mutator.draw_text(page_index, &text)?;
        }
        ElementKind::Image { bytes } | ElementKind::Drawing { png: bytes } => {
            match embed_with_fallback(mutator, bytes) {
                Ok(image) => mutator.draw_image(page_index, image, rect)?,
                Err(MutatorError::UnsupportedFormat(_)) => {
                    warn!(id = %element.id, "image matched no embeddable format; skipping");
                    report.skipped_images.push(element.id);
                    return Ok(());
                }
                Err(other) => return Err(other.into()),
            }
        }
        ElementKind::Shape { variant: ShapeVariant::Rectangle, fill } => {
            mutator.draw_rectangle(page_index, rect, resolve_color(fill))?;
        }
        ElementKind::Shape { variant: ShapeVariant::Circle, fill } => {
            let (center_x, center_y) = rect.center();
            let circle = CircleInstruction {
                center_x,
                center_y,
                radius: rect.width / 2.0,
                fill: resolve_color(fill),
            };
            mutator.draw_circle(page_index, &circle)?;
        }
    }

    report.drawn += 1;
    Ok(())
}
