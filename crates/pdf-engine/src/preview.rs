//! Raster preview of overlay elements on a rendered page.

use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};
use overlay_model::{resolve_color, Element, ElementKind, ShapeVariant};
use tracing::warn;

/// Paints `elements` onto a page already rendered at the session's display width.
///
/// Text is shown as a tinted band the height of its font size since this
/// backend has no glyph rasteriser.
pub fn paint_overlay<'a, I>(canvas: &mut RgbaImage, elements: I)
where
    I: IntoIterator<Item = &'a Element>,
{
    for element in elements {
        match &element.kind {
            ElementKind::Text { content, font_size, color } => {
                if content.trim().is_empty() {
                    continue;
                }
                let [r, g, b] = resolve_color(color).to_bytes();
                let band = Rgba([r, g, b, 96]);
                fill_box(canvas, element.x, element.y, element.width, *font_size, band);
            }
            ElementKind::Shape { variant: ShapeVariant::Rectangle, fill } => {
                let [r, g, b] = resolve_color(fill).to_bytes();
                let solid = Rgba([r, g, b, 255]);
                fill_box(canvas, element.x, element.y, element.width, element.height, solid);
            }
            ElementKind::Shape { variant: ShapeVariant::Circle, fill } => {
                let [r, g, b] = resolve_color(fill).to_bytes();
                fill_ellipse(canvas, element, Rgba([r, g, b, 255]));
            }
            ElementKind::Image { bytes } | ElementKind::Drawing { png: bytes } => {
                paste_raster(canvas, element, bytes);
            }
        }
    }
}

fn pixel_span(start: f32, length: f32, limit: u32) -> std::ops::Range<u32> {
    let from = start.max(0.0).floor() as u32;
    let to = (start + length).max(0.0).ceil() as u32;
    from.min(limit)..to.min(limit)
}

fn fill_box(canvas: &mut RgbaImage, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>) {
    for py in pixel_span(y, height, canvas.height()) {
        for px in pixel_span(x, width, canvas.width()) {
            canvas.get_pixel_mut(px, py).blend(&color);
        }
    }
}

fn fill_ellipse(canvas: &mut RgbaImage, element: &Element, color: Rgba<u8>) {
    let rx = element.width / 2.0;
    let ry = element.height / 2.0;
    if rx <= 0.0 || ry <= 0.0 {
        return;
    }
    let cx = element.x + rx;
    let cy = element.y + ry;

    for py in pixel_span(element.y, element.height, canvas.height()) {
        for px in pixel_span(element.x, element.width, canvas.width()) {
            let nx = (px as f32 + 0.5 - cx) / rx;
            let ny = (py as f32 + 0.5 - cy) / ry;
            if nx * nx + ny * ny <= 1.0 {
                canvas.get_pixel_mut(px, py).blend(&color);
            }
        }
    }
}

/// Pixel extent for a rendered length, never larger than the canvas side.
fn clamped_extent(length: f32, limit: u32) -> u32 {
    (length.round() as u32).clamp(1, limit.max(1))
}

fn paste_raster(canvas: &mut RgbaImage, element: &Element, bytes: &[u8]) {
    let decoded = match image::load_from_memory(bytes) {
        Ok(decoded) => decoded.to_rgba8(),
        Err(err) => {
            warn!(element = %element.id, error = %err, "skipping undecodable image in preview");
            return;
        }
    };

    let width = clamped_extent(element.width, canvas.width());
    let height = clamped_extent(element.height, canvas.height());
    let scaled = if decoded.dimensions() == (width, height) {
        decoded
    } else {
        imageops::resize(&decoded, width, height, FilterType::Triangle)
    };

    imageops::overlay(canvas, &scaled, element.x.round() as i64, element.y.round() as i64);
}
