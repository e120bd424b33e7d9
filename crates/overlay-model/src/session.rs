//! Editing session over one loaded source document.
//!
//! The session is the only mutation surface for overlay elements. It owns the
//! element collection, the selection, the current page and its display
//! metrics, and the drawing surface while freehand mode is active.

use crate::backend::DocumentMutator;
use crate::color::resolve_color;
use crate::compose::{compose_elements, ComposeOutput};
use crate::element::{Element, ElementId, ElementKind, ElementPatch, ShapeVariant};
use crate::error::{ComposeError, OverlayError};
use crate::geometry::{PageDisplayMetrics, PageSize};
use crate::intake::{self, DEFAULT_MAX_SOURCE_BYTES};
use crate::surface::{DrawingSurface, Point};
use tracing::{debug, info, warn};

/// Display constants and element defaults the session works with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub rendered_width: f32,
    pub max_image_width: f32,
    pub max_source_bytes: u64,
    pub text_x: f32,
    pub text_y: f32,
    pub text_font_size: f32,
    pub text_color: String,
    pub image_x: f32,
    pub image_y: f32,
    pub shape_x: f32,
    pub shape_y: f32,
    pub shape_width: f32,
    pub shape_height: f32,
    pub shape_fill: String,
    pub stroke_width: f32,
    pub stroke_color: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rendered_width: 800.0,
            max_image_width: 200.0,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            text_x: 50.0,
            text_y: 50.0,
            text_font_size: 18.0,
            text_color: "#1a1ae6".to_owned(),
            image_x: 50.0,
            image_y: 100.0,
            shape_x: 100.0,
            shape_y: 100.0,
            shape_width: 120.0,
            shape_height: 120.0,
            shape_fill: "#2563eb".to_owned(),
            stroke_width: 3.0,
            stroke_color: "#000000".to_owned(),
        }
    }
}

/// A source document as handed over by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Native sizes, one per page, in page order.
    pub page_sizes: Vec<PageSize>,
}

#[derive(Debug, Clone)]
pub enum EditMode {
    Idle,
    Drawing(DrawingSurface),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingOutcome {
    Added(ElementId),
    NothingToAdd,
}

#[derive(Debug, Clone)]
pub struct OverlaySession {
    settings: SessionSettings,
    document: Option<SourceDocument>,
    elements: Vec<Element>,
    selected: Option<ElementId>,
    current_page: u32,
    metrics: Option<PageDisplayMetrics>,
    mode: EditMode,
    next_id: u64,
}

impl Default for OverlaySession {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl OverlaySession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            document: None,
            elements: Vec::new(),
            selected: None,
            current_page: 1,
            metrics: None,
            mode: EditMode::Idle,
            next_id: 0,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Loads a new source document, discarding every element of the previous one.
    pub fn open(&mut self, source: SourceDocument) -> Result<(), OverlayError> {
        self.validate(&source)?;

        info!(file = %source.file_name, pages = source.page_sizes.len(), "opened source document");
        self.document = Some(source);
        self.elements.clear();
        self.selected = None;
        self.mode = EditMode::Idle;
        self.current_page = 1;
        self.refresh_metrics();
        Ok(())
    }

    /// Swaps in a fresh copy of the current document while keeping elements.
    ///
    /// Elements anchored past the new page count stay in the collection but
    /// are never shown or composed.
    pub fn reload(&mut self, source: SourceDocument) -> Result<(), OverlayError> {
        self.validate(&source)?;

        let page_count = source.page_sizes.len() as u32;
        let unreachable =
            self.elements.iter().filter(|element| element.page_number > page_count).count();
        if unreachable > 0 {
            warn!(unreachable, page_count, "reloaded document is shorter than element anchors");
        }

        self.document = Some(source);
        self.mode = EditMode::Idle;
        self.current_page = self.current_page.clamp(1, page_count);
        self.refresh_metrics();
        Ok(())
    }

    fn validate(&self, source: &SourceDocument) -> Result<(), OverlayError> {
        intake::check_source(&source.bytes, self.settings.max_source_bytes)?;
        if source.page_sizes.is_empty() {
            return Err(OverlayError::NoPages);
        }
        Ok(())
    }

    pub fn document(&self) -> Option<&SourceDocument> {
        self.document.as_ref()
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |doc| doc.page_sizes.len() as u32)
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn metrics(&self) -> Option<PageDisplayMetrics> {
        self.metrics
    }

    /// Moves to a page, clamped to the document. Ignored while drawing.
    pub fn set_current_page(&mut self, page_number: u32) -> u32 {
        if self.is_drawing() {
            debug!(page_number, "page change ignored while drawing");
            return self.current_page;
        }

        let page_count = self.page_count();
        if page_count == 0 {
            return self.current_page;
        }

        self.current_page = page_number.clamp(1, page_count);
        self.refresh_metrics();
        self.current_page
    }

    pub fn next_page(&mut self) -> u32 {
        self.set_current_page(self.current_page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> u32 {
        self.set_current_page(self.current_page.saturating_sub(1).max(1))
    }

    fn refresh_metrics(&mut self) {
        self.metrics = self
            .document
            .as_ref()
            .and_then(|doc| doc.page_sizes.get(self.current_page as usize - 1))
            .map(|size| PageDisplayMetrics::new(*size, self.settings.rendered_width));
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Elements shown on a page, in draw order.
    pub fn elements_on_page(&self, page_number: u32) -> impl Iterator<Item = &Element> {
        let visible = page_number >= 1 && page_number <= self.page_count();
        self.elements.iter().filter(move |element| visible && element.is_on_page(page_number))
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|element| element.id == id)
    }

    /// Appends a text element. Blank content is not an element.
    pub fn add_text(&mut self, content: &str) -> Option<ElementId> {
        if content.trim().is_empty() || self.document.is_none() {
            return None;
        }

        let font_size = self.settings.text_font_size;
        let kind = ElementKind::Text {
            content: content.to_owned(),
            font_size,
            color: self.settings.text_color.clone(),
        };
        let width = estimate_text_width(content, font_size);
        let (x, y) = (self.settings.text_x, self.settings.text_y);

        Some(self.push(kind, x, y, width, font_size))
    }

    /// Appends an image element sized to at most the configured display width.
    pub fn add_image(&mut self, bytes: Vec<u8>) -> Option<ElementId> {
        self.document.as_ref()?;

        let decoded = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, "selected image could not be decoded");
                return None;
            }
        };

        let (natural_width, natural_height) = (decoded.width() as f32, decoded.height() as f32);
        if natural_width <= 0.0 || natural_height <= 0.0 {
            return None;
        }

        let width = natural_width.min(self.settings.max_image_width);
        let height = width * natural_height / natural_width;
        let (x, y) = (self.settings.image_x, self.settings.image_y);

        Some(self.push(ElementKind::Image { bytes }, x, y, width, height))
    }

    pub fn add_shape(&mut self, variant: ShapeVariant) -> Option<ElementId> {
        self.document.as_ref()?;

        let kind = ElementKind::Shape { variant, fill: self.settings.shape_fill.clone() };
        let (x, y) = (self.settings.shape_x, self.settings.shape_y);
        let (width, height) = (self.settings.shape_width, self.settings.shape_height);

        Some(self.push(kind, x, y, width, height))
    }

    fn push(&mut self, kind: ElementKind, x: f32, y: f32, width: f32, height: f32) -> ElementId {
        self.next_id += 1;
        let id = ElementId(self.next_id);
        debug!(%id, kind = kind.label(), page = self.current_page, "adding element");

        self.elements.push(Element {
            id,
            kind,
            x,
            y,
            width,
            height,
            page_number: self.current_page,
        });
        id
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.mode, EditMode::Drawing(_))
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    /// Enters drawing mode with a blank surface the size of the rendered page.
    pub fn start_drawing(&mut self) -> bool {
        if self.is_drawing() {
            return false;
        }
        let Some(metrics) = self.metrics else {
            return false;
        };

        let (width, height) = metrics.pixel_size();
        let surface = DrawingSurface::new(
            width,
            height,
            self.settings.stroke_width,
            resolve_color(&self.settings.stroke_color),
        );
        self.mode = EditMode::Drawing(surface);
        true
    }

    pub fn begin_stroke(&mut self, at: Point) {
        if let EditMode::Drawing(surface) = &mut self.mode {
            surface.begin_stroke(at);
        }
    }

    pub fn continue_stroke(&mut self, to: Point) {
        if let EditMode::Drawing(surface) = &mut self.mode {
            surface.continue_stroke(to);
        }
    }

    pub fn end_stroke(&mut self) {
        if let EditMode::Drawing(surface) = &mut self.mode {
            surface.end_stroke();
        }
    }

    /// Leaves drawing mode, committing the surface if anything was drawn.
    pub fn finish_drawing(&mut self) -> Result<DrawingOutcome, OverlayError> {
        let EditMode::Drawing(surface) = std::mem::replace(&mut self.mode, EditMode::Idle) else {
            return Ok(DrawingOutcome::NothingToAdd);
        };

        self.finalize_freehand_drawing(&surface)
    }

    fn finalize_freehand_drawing(
        &mut self,
        surface: &DrawingSurface,
    ) -> Result<DrawingOutcome, OverlayError> {
        if !surface.has_ink() {
            debug!("drawing surface is empty, nothing to add");
            return Ok(DrawingOutcome::NothingToAdd);
        }

        let png = surface.encode_png()?;
        let (width, height) = self
            .metrics
            .map(|metrics| (metrics.rendered_width, metrics.rendered_height))
            .unwrap_or((surface.width() as f32, surface.height() as f32));

        Ok(DrawingOutcome::Added(self.push(ElementKind::Drawing { png }, 0.0, 0.0, width, height)))
    }

    /// Merges `patch` into the element. Returns false for unknown ids.
    ///
    /// While drawing, pointer input never reaches the element layer, so
    /// position and size changes are dropped.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> bool {
        let drawing = self.is_drawing();
        let Some(element) = self.elements.iter_mut().find(|element| element.id == id) else {
            return false;
        };

        if drawing && patch.touches_geometry() {
            debug!(%id, "geometry change suppressed while drawing");
            patch.without_geometry().apply_to(element);
        } else {
            patch.apply_to(element);
        }
        true
    }

    pub fn delete_element(&mut self, id: ElementId) -> bool {
        let before = self.elements.len();
        self.elements.retain(|element| element.id != id);

        if self.selected == Some(id) {
            self.selected = None;
        }
        self.elements.len() != before
    }

    pub fn select_element(&mut self, id: ElementId) -> bool {
        if self.element(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    /// Flattens every element into the loaded document through `mutator`.
    ///
    /// The session is only borrowed, so no element can change mid-compose and
    /// a failed compose leaves everything as it was.
    pub fn compose_with<M: DocumentMutator>(
        &self,
        mutator: M,
    ) -> Result<ComposeOutput, ComposeError> {
        if self.document.is_none() {
            return Err(ComposeError::NoDocument);
        }

        compose_elements(&self.elements, self.settings.rendered_width, mutator)
    }

    pub fn output_file_name(&self) -> String {
        intake::edited_file_name(self.document.as_ref().map_or("", |doc| doc.file_name.as_str()))
    }
}

/// Rough advance width for the default sans font, used for the selection box.
fn estimate_text_width(content: &str, font_size: f32) -> f32 {
    (content.chars().count() as f32 * font_size * 0.6).max(font_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_bytes, Recorded, RecordingMutator};

    fn source(pages: usize) -> SourceDocument {
        SourceDocument {
            file_name: "contract.pdf".to_owned(),
            bytes: b"%PDF-1.7\n%%EOF".to_vec(),
            page_sizes: vec![PageSize { width_pt: 1000.0, height_pt: 1500.0 }; pages],
        }
    }

    fn session(pages: usize) -> OverlaySession {
        let mut session = OverlaySession::default();
        session.open(source(pages)).expect("open should succeed");
        session
    }

    #[test]
    fn added_elements_get_unique_ids_and_current_page() {
        let mut session = session(3);
        let first = session.add_text("hello").expect("text should be added");
        session.set_current_page(2);
        let second = session.add_shape(ShapeVariant::Circle).expect("shape should be added");
        session.set_current_page(3);
        let third = session.add_image(png_bytes(10, 10)).expect("image should be added");

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_ne!(first, third);
        let pages: Vec<u32> =
            session.elements().iter().map(|element| element.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn blank_text_is_not_added() {
        let mut session = session(1);

        assert_eq!(session.add_text(""), None);
        assert_eq!(session.add_text("   "), None);
        assert!(session.elements().is_empty());
    }

    #[test]
    fn nothing_is_added_without_a_document() {
        let mut session = OverlaySession::default();

        assert_eq!(session.add_text("hi"), None);
        assert_eq!(session.add_shape(ShapeVariant::Rectangle), None);
        assert!(!session.start_drawing());
    }

    #[test]
    fn wide_images_are_capped_preserving_aspect_ratio() {
        let mut session = session(1);
        let id = session.add_image(png_bytes(400, 100)).expect("image should be added");

        let element = session.element(id).expect("element should exist");
        assert_eq!((element.width, element.height), (200.0, 50.0));

        let small = session.add_image(png_bytes(40, 30)).expect("image should be added");
        let element = session.element(small).expect("element should exist");
        assert_eq!((element.width, element.height), (40.0, 30.0));
    }

    #[test]
    fn undecodable_image_is_silently_rejected() {
        let mut session = session(1);

        assert_eq!(session.add_image(b"garbage".to_vec()), None);
        assert!(session.elements().is_empty());
    }

    #[test]
    fn open_rejects_non_pdf_without_touching_state() {
        let mut session = session(2);
        session.add_text("keep me");

        let bogus = SourceDocument { bytes: b"hello".to_vec(), ..source(1) };
        assert!(matches!(session.open(bogus), Err(OverlayError::NotAPdf)));
        assert_eq!(session.elements().len(), 1);
        assert_eq!(session.page_count(), 2);
    }

    #[test]
    fn open_rejects_oversized_source() {
        let settings = SessionSettings { max_source_bytes: 8, ..SessionSettings::default() };
        let mut session = OverlaySession::new(settings);

        let err = session.open(source(1)).expect_err("source should be too large");
        assert!(matches!(err, OverlayError::SourceTooLarge { limit: 8, .. }));
        assert!(session.document().is_none());
    }

    #[test]
    fn opening_a_new_document_resets_elements() {
        let mut session = session(2);
        let id = session.add_text("first").expect("text should be added");
        session.select_element(id);
        session.set_current_page(2);

        session.open(source(1)).expect("open should succeed");

        assert!(session.elements().is_empty());
        assert_eq!(session.selected(), None);
        assert_eq!(session.current_page(), 1);
    }

    #[test]
    fn metrics_track_current_page() {
        let mut session = OverlaySession::default();
        let mut doc = source(2);
        doc.page_sizes[1] = PageSize { width_pt: 400.0, height_pt: 400.0 };
        session.open(doc).expect("open should succeed");

        assert_eq!(session.metrics().map(|m| m.scale), Some(0.8));
        session.next_page();
        assert_eq!(session.metrics().map(|m| m.scale), Some(2.0));
        assert_eq!(session.next_page(), 2);
        assert_eq!(session.previous_page(), 1);
        assert_eq!(session.previous_page(), 1);
    }

    #[test]
    fn untouched_drawing_adds_nothing() {
        let mut session = session(1);
        assert!(session.start_drawing());

        let outcome = session.finish_drawing().expect("finish should succeed");

        assert_eq!(outcome, DrawingOutcome::NothingToAdd);
        assert!(session.elements().is_empty());
        assert!(!session.is_drawing());
    }

    #[test]
    fn drawing_with_strokes_adds_one_full_page_element() {
        let mut session = session(1);
        session.start_drawing();
        session.begin_stroke(Point::new(10.0, 10.0));
        session.continue_stroke(Point::new(100.0, 60.0));
        session.end_stroke();
        session.begin_stroke(Point::new(300.0, 300.0));
        session.continue_stroke(Point::new(320.0, 340.0));
        session.end_stroke();

        let outcome = session.finish_drawing().expect("finish should succeed");

        let DrawingOutcome::Added(id) = outcome else {
            panic!("drawing should be added");
        };
        assert_eq!(session.elements().len(), 1);
        let element = session.element(id).expect("element should exist");
        assert!(matches!(element.kind, ElementKind::Drawing { .. }));
        assert_eq!((element.x, element.y), (0.0, 0.0));
        assert_eq!((element.width, element.height), (800.0, 1200.0));
        assert!(!session.is_drawing());
    }

    #[test]
    fn strokes_outside_drawing_mode_are_ignored() {
        let mut session = session(1);
        session.begin_stroke(Point::new(10.0, 10.0));
        session.continue_stroke(Point::new(20.0, 20.0));

        let outcome = session.finish_drawing().expect("finish should succeed");
        assert_eq!(outcome, DrawingOutcome::NothingToAdd);
    }

    #[test]
    fn geometry_updates_are_suppressed_while_drawing() {
        let mut session = session(2);
        let id = session.add_text("note").expect("text should be added");
        session.start_drawing();

        let patch =
            ElementPatch { x: Some(500.0), font_size: Some(30.0), ..ElementPatch::default() };
        assert!(session.update_element(id, &patch));
        assert_eq!(session.set_current_page(2), 1);

        let element = session.element(id).expect("element should exist");
        assert_eq!(element.x, 50.0);
        assert!(matches!(element.kind, ElementKind::Text { font_size, .. } if font_size == 30.0));
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let mut session = session(1);
        session.add_text("one");
        let before = session.elements().to_vec();

        assert!(!session.update_element(ElementId(999), &ElementPatch::position(1.0, 1.0)));
        assert_eq!(session.elements(), before.as_slice());
    }

    #[test]
    fn deleting_selected_element_clears_selection() {
        let mut session = session(1);
        let a = session.add_text("a").expect("text should be added");
        let b = session.add_text("b").expect("text should be added");

        session.select_element(a);
        session.delete_element(b);
        assert_eq!(session.selected(), Some(a));

        session.delete_element(a);
        assert_eq!(session.selected(), None);
        assert!(session.elements().is_empty());
    }

    #[test]
    fn selecting_unknown_id_keeps_selection() {
        let mut session = session(1);
        let a = session.add_text("a").expect("text should be added");
        session.select_element(a);

        assert!(!session.select_element(ElementId(42)));
        assert_eq!(session.selected(), Some(a));
        session.clear_selection();
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn elements_past_page_count_survive_reload_but_are_not_composed() {
        let mut session = session(3);
        session.set_current_page(3);
        let far = session.add_shape(ShapeVariant::Rectangle).expect("shape should be added");
        session.set_current_page(1);
        session.add_shape(ShapeVariant::Rectangle).expect("shape should be added");

        session.reload(source(2)).expect("reload should succeed");

        assert!(session.element(far).is_some());
        assert_eq!(session.elements_on_page(3).count(), 0);

        let mutator = RecordingMutator::with_pages(source(2).page_sizes);
        let log = mutator.log();
        let output = session.compose_with(mutator).expect("compose should succeed");

        assert_eq!(output.report.skipped_pages, vec![3]);
        let rectangles =
            log.borrow().iter().filter(|call| matches!(call, Recorded::Rectangle { .. })).count();
        assert_eq!(rectangles, 1);
        assert_eq!(session.elements().len(), 2);
    }

    #[test]
    fn compose_without_document_fails() {
        let session = OverlaySession::default();
        let mutator = RecordingMutator::with_pages(Vec::new());

        assert!(matches!(session.compose_with(mutator), Err(ComposeError::NoDocument)));
    }

    #[test]
    fn output_name_follows_source_extension() {
        let session = session(1);
        assert_eq!(session.output_file_name(), "edited_document.pdf");
    }
}
