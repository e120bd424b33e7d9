//! Mapping between rendered (top-left origin) and document (bottom-left
//! origin) coordinate spaces.

use serde::{Deserialize, Serialize};

/// Native page size in document units (points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// Ratio of rendered width to native width. Degenerate pages map 1:1.
pub fn page_scale(rendered_width: f32, native_width: f32) -> f32 {
    if rendered_width <= 0.0 || native_width <= 0.0 {
        return 1.0;
    }

    rendered_width / native_width
}

/// Display metrics of the page currently shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDisplayMetrics {
    pub rendered_width: f32,
    pub rendered_height: f32,
    pub scale: f32,
    pub native_width: f32,
    pub native_height: f32,
}

impl PageDisplayMetrics {
    pub fn new(native: PageSize, rendered_width: f32) -> Self {
        let scale = page_scale(rendered_width, native.width_pt);

        Self {
            rendered_width: native.width_pt * scale,
            rendered_height: native.height_pt * scale,
            scale,
            native_width: native.width_pt,
            native_height: native.height_pt,
        }
    }

    pub fn to_document_length(&self, rendered: f32) -> f32 {
        rendered / self.scale
    }

    pub fn to_rendered_length(&self, document: f32) -> f32 {
        document * self.scale
    }

    /// Whole-pixel size of a raster covering the rendered page.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.rendered_width.round().max(1.0) as u32,
            self.rendered_height.round().max(1.0) as u32,
        )
    }
}

/// Axis-aligned box in rendered space, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Axis-aligned box in document space, `(x, y)` is the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DocumentRect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Converts a rendered box on a page into document space.
///
/// The vertical axis is flipped, and the anchor moves from the visual top-left
/// to the bottom-left corner the document expects.
pub fn to_document_rect(rect: RenderedRect, page: PageSize, rendered_width: f32) -> DocumentRect {
    let scale = page_scale(rendered_width, page.width_pt);
    let width = rect.width / scale;
    let height = rect.height / scale;
    let top = page.height_pt - rect.y / scale;

    DocumentRect { x: rect.x / scale, y: top - height, width, height }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_rendered_over_native_width() {
        assert_eq!(page_scale(800.0, 1000.0), 0.8);
        assert_eq!(page_scale(800.0, 0.0), 1.0);
    }

    #[test]
    fn flips_and_anchors_to_bottom_left() {
        let page = PageSize { width_pt: 1000.0, height_pt: 1500.0 };
        let rect = RenderedRect { x: 80.0, y: 150.0, width: 160.0, height: 40.0 };

        let doc = to_document_rect(rect, page, 800.0);

        assert_eq!(doc.x, 100.0);
        assert_eq!(doc.y, 1262.5);
        assert_eq!(doc.width, 200.0);
        assert_eq!(doc.height, 50.0);
    }

    #[test]
    fn metrics_follow_native_aspect_ratio() {
        let letter = PageSize { width_pt: 612.0, height_pt: 792.0 };
        let metrics = PageDisplayMetrics::new(letter, 800.0);

        assert!((metrics.rendered_height - 792.0 * 800.0 / 612.0).abs() < 1e-3);
        assert_eq!(metrics.pixel_size(), (800, 1035));
        assert!((metrics.to_document_length(metrics.to_rendered_length(10.0)) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn circle_center_is_box_center() {
        let rect = DocumentRect { x: 10.0, y: 20.0, width: 40.0, height: 40.0 };
        assert_eq!(rect.center(), (30.0, 40.0));
    }
}
