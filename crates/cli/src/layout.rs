//! JSON layout files describing elements to place on a document.
//!
//! A layout is replayed through the same session operations an interactive
//! editor would use: pick the page, add the element with its defaults, then
//! patch whatever the layout overrides.

use anyhow::{bail, Context, Result};
use overlay_model::{DrawingOutcome, ElementId, ElementPatch, OverlaySession, Point, ShapeVariant};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    #[serde(default)]
    pub elements: Vec<LayoutElement>,
}

/// Position and size overrides shared by every element kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Placement {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayoutElement {
    Text {
        page: u32,
        content: String,
        font_size: Option<f32>,
        color: Option<String>,
        #[serde(flatten)]
        placement: Placement,
    },
    Image {
        page: u32,
        /// Relative paths resolve against the layout file's directory.
        path: PathBuf,
        #[serde(flatten)]
        placement: Placement,
    },
    Rectangle {
        page: u32,
        fill: Option<String>,
        #[serde(flatten)]
        placement: Placement,
    },
    Circle {
        page: u32,
        fill: Option<String>,
        #[serde(flatten)]
        placement: Placement,
    },
    /// Freehand strokes in rendered coordinates, one polyline per stroke.
    Drawing { page: u32, strokes: Vec<Vec<[f32; 2]>> },
}

impl LayoutElement {
    fn page(&self) -> u32 {
        match self {
            LayoutElement::Text { page, .. }
            | LayoutElement::Image { page, .. }
            | LayoutElement::Rectangle { page, .. }
            | LayoutElement::Circle { page, .. }
            | LayoutElement::Drawing { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedLayout {
    pub layout: Layout,
    base_dir: PathBuf,
}

pub fn load_layout(path: &Path) -> Result<LoadedLayout> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read layout {}", path.display()))?;
    let layout: Layout = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse layout {}", path.display()))?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    Ok(LoadedLayout { layout, base_dir })
}

impl LoadedLayout {
    /// Replays every element into `session`, in file order.
    pub fn apply(&self, session: &mut OverlaySession) -> Result<Vec<ElementId>> {
        let page_count = session.page_count();
        let mut added = Vec::new();

        for (index, element) in self.layout.elements.iter().enumerate() {
            let page = element.page();
            if page == 0 || page > page_count {
                bail!(
                    "layout element {} targets page {page} but the document has {page_count} pages",
                    index + 1
                );
            }
            session.set_current_page(page);

            if let Some(id) = self.apply_element(session, element, index)? {
                added.push(id);
            }
        }

        debug!(added = added.len(), "applied layout");
        Ok(added)
    }

    fn apply_element(
        &self,
        session: &mut OverlaySession,
        element: &LayoutElement,
        index: usize,
    ) -> Result<Option<ElementId>> {
        let (id, patch) = match element {
            LayoutElement::Text { content, font_size, color, placement, .. } => {
                let Some(id) = session.add_text(content) else {
                    debug!(index, "blank text in layout, skipping");
                    return Ok(None);
                };
                let patch = ElementPatch {
                    font_size: *font_size,
                    color: color.clone(),
                    ..placement.patch()
                };
                (id, patch)
            }
            LayoutElement::Image { path, placement, .. } => {
                let path = self.base_dir.join(path);
                let bytes = fs::read(&path)
                    .with_context(|| format!("failed to read image {}", path.display()))?;
                let Some(id) = session.add_image(bytes) else {
                    bail!(
                        "layout element {} is not a decodable image: {}",
                        index + 1,
                        path.display()
                    );
                };
                (id, placement.patch())
            }
            LayoutElement::Rectangle { fill, placement, .. } => {
                let id = add_shape(session, ShapeVariant::Rectangle)?;
                (id, ElementPatch { color: fill.clone(), ..placement.patch() })
            }
            LayoutElement::Circle { fill, placement, .. } => {
                let id = add_shape(session, ShapeVariant::Circle)?;
                (id, ElementPatch { color: fill.clone(), ..placement.patch() })
            }
            LayoutElement::Drawing { strokes, .. } => return replay_drawing(session, strokes),
        };

        session.update_element(id, &patch);
        Ok(Some(id))
    }
}

impl Placement {
    fn patch(&self) -> ElementPatch {
        ElementPatch {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            ..ElementPatch::default()
        }
    }
}

fn add_shape(session: &mut OverlaySession, variant: ShapeVariant) -> Result<ElementId> {
    session.add_shape(variant).context("no document is loaded")
}

fn replay_drawing(
    session: &mut OverlaySession,
    strokes: &[Vec<[f32; 2]>],
) -> Result<Option<ElementId>> {
    if !session.start_drawing() {
        bail!("drawing mode is unavailable");
    }

    for stroke in strokes {
        let mut points = stroke.iter().map(|[x, y]| Point::new(*x, *y));
        let Some(first) = points.next() else {
            continue;
        };
        session.begin_stroke(first);
        for point in points {
            session.continue_stroke(point);
        }
        session.end_stroke();
    }

    match session.finish_drawing()? {
        DrawingOutcome::Added(id) => Ok(Some(id)),
        DrawingOutcome::NothingToAdd => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Layout {
        serde_json::from_str(json).expect("layout should parse")
    }

    #[test]
    fn parses_every_element_kind() {
        let layout = parse(
            r##"{
                "elements": [
                    { "type": "text", "page": 1, "content": "Hi", "x": 10, "font_size": 24 },
                    { "type": "image", "page": 2, "path": "logo.png", "width": 50 },
                    { "type": "rectangle", "page": 1, "fill": "#ff0000" },
                    { "type": "circle", "page": 1 },
                    { "type": "drawing", "page": 1, "strokes": [[[0, 0], [10, 10]]] }
                ]
            }"##,
        );

        assert_eq!(layout.elements.len(), 5);
        let LayoutElement::Text { placement, font_size, .. } = &layout.elements[0] else {
            panic!("first element should be text");
        };
        assert_eq!((placement.x, placement.y), (Some(10.0), None));
        assert_eq!(*font_size, Some(24.0));
        assert_eq!(layout.elements[1].page(), 2);
    }

    #[test]
    fn rejects_unknown_element_types() {
        let json = r#"{ "elements": [{ "type": "arrow", "page": 1 }] }"#;
        let err = serde_json::from_str::<Layout>(json).expect_err("unknown type should fail");
        assert!(err.to_string().contains("arrow"));
    }
}
