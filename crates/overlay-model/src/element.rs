//! Overlay elements placed by the user on top of a rendered page.
//!
//! Positions and sizes are in rendered (display) space: origin at the top-left
//! of the displayed page, units are display pixels at the configured width.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-unique element identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeVariant {
    Rectangle,
    Circle,
}

/// Kind-specific payload of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Text { content: String, font_size: f32, color: String },
    /// Raw image file bytes as selected by the user.
    Image { bytes: Vec<u8> },
    Shape { variant: ShapeVariant, fill: String },
    /// PNG snapshot of a finished freehand drawing surface.
    Drawing { png: Vec<u8> },
}

impl ElementKind {
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::Text { .. } => "text",
            ElementKind::Image { .. } => "image",
            ElementKind::Shape { variant: ShapeVariant::Rectangle, .. } => "rectangle",
            ElementKind::Shape { variant: ShapeVariant::Circle, .. } => "circle",
            ElementKind::Drawing { .. } => "drawing",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// 1-based anchor page.
    pub page_number: u32,
}

impl Element {
    /// Vertical extent used when flipping into document space.
    ///
    /// Text has no box of its own; its font size stands in for the height so
    /// the baseline lands one line below the rendered top edge.
    pub fn vertical_extent(&self) -> f32 {
        match &self.kind {
            ElementKind::Text { font_size, .. } => *font_size,
            _ => self.height,
        }
    }

    pub fn is_on_page(&self, page_number: u32) -> bool {
        self.page_number == page_number
    }
}

/// Partial update merged into an existing element.
///
/// Fields that do not apply to the element's kind are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub content: Option<String>,
    pub color: Option<String>,
    pub font_size: Option<f32>,
}

impl ElementPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    pub fn size(width: f32, height: f32) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::default() }
    }

    pub fn touches_geometry(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some()
    }

    /// Copy of this patch with the position and size fields cleared.
    pub fn without_geometry(&self) -> Self {
        Self {
            x: None,
            y: None,
            width: None,
            height: None,
            content: self.content.clone(),
            color: self.color.clone(),
            font_size: self.font_size,
        }
    }

    pub(crate) fn apply_to(&self, element: &mut Element) {
        if let Some(x) = self.x {
            element.x = x;
        }
        if let Some(y) = self.y {
            element.y = y;
        }
        if let Some(width) = self.width {
            element.width = width.max(1.0);
        }
        if let Some(height) = self.height {
            element.height = height.max(1.0);
        }

        match &mut element.kind {
            ElementKind::Text { content, font_size, color } => {
                if let Some(new_content) = &self.content {
                    content.clone_from(new_content);
                }
                if let Some(new_size) = self.font_size {
                    *font_size = new_size.max(1.0);
                }
                if let Some(new_color) = &self.color {
                    color.clone_from(new_color);
                }
            }
            ElementKind::Shape { fill, .. } => {
                if let Some(new_color) = &self.color {
                    fill.clone_from(new_color);
                }
            }
            ElementKind::Image { .. } | ElementKind::Drawing { .. } => {}
        }
    }
}
