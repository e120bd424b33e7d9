//! Transient freehand drawing surface.
//!
//! Strokes follow a begin/continue/end protocol. The surface owns the current
//! stroke anchor; ending a stroke only drops the anchor so another stroke can
//! start elsewhere without a connecting line.

use crate::color::RgbColor;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub struct DrawingSurface {
    canvas: RgbaImage,
    anchor: Option<Point>,
    brush_radius: f32,
    ink: Rgba<u8>,
}

impl DrawingSurface {
    pub fn new(width_px: u32, height_px: u32, stroke_width: f32, color: RgbColor) -> Self {
        let [r, g, b] = color.to_bytes();

        Self {
            canvas: RgbaImage::new(width_px.max(1), height_px.max(1)),
            anchor: None,
            brush_radius: (stroke_width / 2.0).max(0.5),
            ink: Rgba([r, g, b, 255]),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn is_stroking(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn begin_stroke(&mut self, at: Point) {
        self.stamp(at);
        self.anchor = Some(at);
    }

    /// Extends the current stroke to `to`. Ignored when no stroke is active.
    pub fn continue_stroke(&mut self, to: Point) {
        let Some(from) = self.anchor else {
            return;
        };

        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let length = (dx * dx + dy * dy).sqrt();
        let step = (self.brush_radius / 2.0).max(0.5);
        let steps = (length / step).ceil().max(1.0) as u32;

        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(Point::new(from.x + dx * t, from.y + dy * t));
        }

        self.anchor = Some(to);
    }

    pub fn end_stroke(&mut self) {
        self.anchor = None;
    }

    /// True once any pixel carries non-zero opacity.
    pub fn has_ink(&self) -> bool {
        self.canvas.pixels().any(|pixel| pixel[3] != 0)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.canvas.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn stamp(&mut self, center: Point) {
        let r = self.brush_radius;
        let min_x = (center.x - r).floor().max(0.0) as u32;
        let min_y = (center.y - r).floor().max(0.0) as u32;
        let max_x = ((center.x + r).ceil().max(0.0) as u32).min(self.canvas.width() - 1);
        let max_y = ((center.y + r).ceil().max(0.0) as u32).min(self.canvas.height() - 1);

        if center.x + r < 0.0 || center.y + r < 0.0 || min_x > max_x || min_y > max_y {
            return;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5 - center.x;
                let py = y as f32 + 0.5 - center.y;
                if px * px + py * py <= r * r {
                    self.canvas.put_pixel(x, y, self.ink);
                }
            }
        }
    }
}
