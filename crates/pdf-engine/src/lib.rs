use image::{Rgba, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use overlay_model::{
    ComposeError, ComposeOutput, DocumentRenderer, MutatorError, OverlaySession, PageSize,
    SourceDocument,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

mod manipulation;
mod mutator;
mod preview;
mod raster;

#[cfg(test)]
pub(crate) mod fixtures;

pub use manipulation::{
    merge_documents, parse_page_ranges, split_document, PageRange, SplitMode, SplitPart,
};
pub use mutator::LopdfMutator;
pub use preview::paint_overlay;

const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("invalid page range '{0}'")]
    InvalidPageRange(String),
    #[error("at least two documents are required to merge, got {0}")]
    NotEnoughToMerge(usize),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<PdfEngineError> for MutatorError {
    fn from(err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::PageOutOfRange { page, page_count } => {
                MutatorError::PageOutOfRange { index: page, page_count }
            }
            other => MutatorError::Backend(other.to_string()),
        }
    }
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;

    /// Package an open document for an overlay editing session.
    fn source_document(
        &self,
        handle: DocumentHandle,
        file_name: &str,
    ) -> Result<SourceDocument, PdfEngineError> {
        let page_sizes = (0..self.page_count(handle)?)
            .map(|index| self.page_size(handle, index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SourceDocument {
            file_name: file_name.to_owned(),
            bytes: self.bytes(handle)?.to_vec(),
            page_sizes,
        })
    }
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let sizes: Vec<PageSize> =
            doc.get_pages().into_values().map(|page_id| media_box_size(&doc, page_id)).collect();

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    /// Borrow an open document through the renderer seam.
    pub fn view(&self, handle: DocumentHandle) -> Result<DocumentView<'_>, PdfEngineError> {
        self.record(handle)?;
        Ok(DocumentView { engine: self, handle })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { bytes, page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    /// Page-sized blank canvas with a hairline border; page content is not
    /// rasterised by this backend.
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
        Ok(&self.record(handle)?.bytes)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// One open document seen through [`DocumentRenderer`]. Page numbers are 1-based.
#[derive(Debug, Clone, Copy)]
pub struct DocumentView<'a> {
    engine: &'a LopdfEngine,
    handle: DocumentHandle,
}

impl DocumentRenderer for DocumentView<'_> {
    fn page_count(&self) -> u32 {
        self.engine.page_count(self.handle).unwrap_or(0)
    }

    fn native_page_size(&self, page_number: u32) -> Option<PageSize> {
        self.engine.page_size(self.handle, page_number.checked_sub(1)?).ok()
    }

    fn render_page(&self, page_number: u32, display_width: f32) -> Option<RgbaImage> {
        let page_index = page_number.checked_sub(1)?;
        let size = self.engine.page_size(self.handle, page_index).ok()?;
        let scale = overlay_model::page_scale(display_width, size.width_pt);

        self.engine.render_page(self.handle, RenderRequest { page_index, scale }).ok()
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Flattens a session's elements into a copy of its source document.
pub fn compose_session(session: &OverlaySession) -> Result<ComposeOutput, ComposeError> {
    let document = session.document().ok_or(ComposeError::NoDocument)?;
    let mutator = LopdfMutator::from_bytes(&document.bytes).map_err(MutatorError::from)?;

    session.compose_with(mutator)
}

/// Renders a 1-based page at the session's display width with its elements painted on top.
pub fn render_with_overlay<R: DocumentRenderer>(
    renderer: &R,
    session: &OverlaySession,
    page_number: u32,
) -> Option<RgbaImage> {
    let mut page = renderer.render_page(page_number, session.settings().rendered_width)?;
    paint_overlay(&mut page, session.elements_on_page(page_number));
    Some(page)
}

/// Looks up an inheritable page attribute, walking up the page tree.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        if depth > 32 {
            break;
        }
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(target) => doc.get_object(*target).ok(),
                other => Some(other),
            };
        }

        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    None
}

/// Copies inherited attributes onto the page itself so it survives being
/// moved to another page tree.
pub(crate) fn materialize_inherited(doc: &mut Document, page_id: ObjectId) {
    let resolved: Vec<(&[u8], Object)> = INHERITABLE
        .iter()
        .filter_map(|key| {
            let own = doc.get_dictionary(page_id).ok()?.has(key);
            if own {
                return None;
            }
            inherited_attribute(doc, page_id, key).map(|value| (*key, value.clone()))
        })
        .collect();

    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for (key, value) in resolved {
            page.set(key, value);
        }
    }
}

pub(crate) fn media_box_size(doc: &Document, page_id: ObjectId) -> PageSize {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let x0 = number(&array[0])?;
            let y0 = number(&array[1])?;
            let x1 = number(&array[2])?;
            let y1 = number(&array[3])?;
            Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
        })
        .unwrap_or(LETTER)
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

/// Resolves a dictionary entry that may be inline or an indirect reference.
pub(crate) fn resolve_dict(doc: &Document, parent: &Dictionary, key: &[u8]) -> Dictionary {
    match parent.get(key) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => {
            doc.get_dictionary(*id).cloned().unwrap_or_else(|_| Dictionary::new())
        }
        _ => Dictionary::new(),
    }
}
