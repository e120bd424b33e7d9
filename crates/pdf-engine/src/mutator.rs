use crate::raster::embed_raster;
use crate::{inherited_attribute, media_box_size, resolve_dict, PdfEngineError};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use overlay_model::{
    CircleInstruction, DocumentMutator, DocumentRect, ImageRef, MutatorError, PageSize,
    RasterFormat, RgbColor, TextInstruction,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Write};
use tracing::debug;

const FONT_NAME: &str = "OvlF1";
const KAPPA: f32 = 0.552_284_8;

fn image_name(image: ImageRef) -> String {
    format!("OvlIm{}", image.0)
}

fn generation_error(err: fmt::Error) -> MutatorError {
    MutatorError::Backend(format!("content generation failed: {err}"))
}

/// Overlay operators queued for one page.
#[derive(Debug, Default)]
struct PageOverlay {
    ops: String,
    uses_font: bool,
    images: BTreeSet<u64>,
}

/// [`DocumentMutator`] over a parsed lopdf document.
///
/// Drawing calls only queue content; page dictionaries are rewritten once in
/// [`DocumentMutator::save`]. Each touched page gets its original content
/// wrapped in `q`/`Q` so the overlay starts from a clean graphics state.
pub struct LopdfMutator {
    doc: Document,
    pages: Vec<ObjectId>,
    page_sizes: Vec<PageSize>,
    images: HashMap<ImageRef, ObjectId>,
    next_image: u64,
    font_id: Option<ObjectId>,
    overlays: BTreeMap<u32, PageOverlay>,
}

impl LopdfMutator {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        let doc = Document::load_mem(bytes)?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let page_sizes = pages.iter().map(|page_id| media_box_size(&doc, *page_id)).collect();

        Ok(Self {
            doc,
            pages,
            page_sizes,
            images: HashMap::new(),
            next_image: 0,
            font_id: None,
            overlays: BTreeMap::new(),
        })
    }

    fn check_page(&self, page_index: u32) -> Result<(), MutatorError> {
        if (page_index as usize) < self.pages.len() {
            Ok(())
        } else {
            Err(MutatorError::PageOutOfRange {
                index: page_index,
                page_count: self.pages.len() as u32,
            })
        }
    }

    fn overlay(&mut self, page_index: u32) -> Result<&mut PageOverlay, MutatorError> {
        self.check_page(page_index)?;
        Ok(self.overlays.entry(page_index).or_default())
    }

    fn font(&mut self) -> ObjectId {
        match self.font_id {
            Some(id) => id,
            None => {
                let id = self.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica-Bold",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.font_id = Some(id);
                id
            }
        }
    }

    fn attach_overlay(
        &mut self,
        page_id: ObjectId,
        overlay: PageOverlay,
    ) -> Result<(), MutatorError> {
        let mut resources = inherited_attribute(&self.doc, page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);

        if overlay.uses_font {
            let font_id = self.font();
            let mut fonts = resolve_dict(&self.doc, &resources, b"Font");
            fonts.set(FONT_NAME, font_id);
            resources.set("Font", fonts);
        }

        if !overlay.images.is_empty() {
            let mut xobjects = resolve_dict(&self.doc, &resources, b"XObject");
            for raw in &overlay.images {
                let image = ImageRef(*raw);
                let image_id =
                    self.images.get(&image).copied().ok_or(MutatorError::UnknownImage(image))?;
                xobjects.set(image_name(image), image_id);
            }
            resources.set("XObject", xobjects);
        }

        let prefix_id = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let mut body = String::from("\nQ\n");
        body.push_str(&overlay.ops);
        let overlay_id = self.doc.add_object(Stream::new(Dictionary::new(), body.into_bytes()));

        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| MutatorError::Backend(format!("page dictionary missing: {err}")))?;

        let mut contents = vec![Object::Reference(prefix_id)];
        match page.get(b"Contents").ok().cloned() {
            Some(Object::Array(existing)) => contents.extend(existing),
            Some(existing @ Object::Reference(_)) => contents.push(existing),
            _ => {}
        }
        contents.push(Object::Reference(overlay_id));

        page.set("Contents", contents);
        page.set("Resources", resources);
        Ok(())
    }
}

/// WinAnsiEncoding bytes as a hex string operand; unmappable characters become `?`.
fn hex_text(content: &str) -> String {
    let mut hex = String::with_capacity(content.len() * 2 + 2);
    hex.push('<');
    for ch in content.chars() {
        let byte = win_ansi_byte(ch).unwrap_or(b'?');
        let _ = write!(hex, "{byte:02X}");
    }
    hex.push('>');
    hex
}

/// Code in the WinAnsi (cp1252) table, which matches Latin-1 outside 0x80..=0x9F.
fn win_ansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn write_fill(ops: &mut String, color: RgbColor) -> fmt::Result {
    writeln!(ops, "{} {} {} rg", color.r, color.g, color.b)
}

impl DocumentMutator for LopdfMutator {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, MutatorError> {
        self.check_page(page_index)?;
        Ok(self.page_sizes[page_index as usize])
    }

    fn embed_image(
        &mut self,
        bytes: &[u8],
        format: RasterFormat,
    ) -> Result<ImageRef, MutatorError> {
        let object_id = embed_raster(&mut self.doc, bytes, format)?;

        self.next_image += 1;
        let image = ImageRef(self.next_image);
        self.images.insert(image, object_id);
        debug!(?image, %format, "embedded image");
        Ok(image)
    }

    fn draw_text(&mut self, page_index: u32, text: &TextInstruction) -> Result<(), MutatorError> {
        let overlay = self.overlay(page_index)?;
        overlay.uses_font = true;

        let ops = &mut overlay.ops;
        writeln!(ops, "BT").map_err(generation_error)?;
        writeln!(ops, "/{} {} Tf", FONT_NAME, text.font_size).map_err(generation_error)?;
        write_fill(ops, text.color).map_err(generation_error)?;
        writeln!(ops, "{} {} Td", text.x, text.y).map_err(generation_error)?;
        writeln!(ops, "{} Tj", hex_text(&text.content)).map_err(generation_error)?;
        writeln!(ops, "ET").map_err(generation_error)?;
        Ok(())
    }

    fn draw_image(
        &mut self,
        page_index: u32,
        image: ImageRef,
        rect: DocumentRect,
    ) -> Result<(), MutatorError> {
        if !self.images.contains_key(&image) {
            return Err(MutatorError::UnknownImage(image));
        }
        let overlay = self.overlay(page_index)?;
        overlay.images.insert(image.0);

        writeln!(
            overlay.ops,
            "q {} 0 0 {} {} {} cm /{} Do Q",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            image_name(image)
        )
        .map_err(generation_error)
    }

    fn draw_rectangle(
        &mut self,
        page_index: u32,
        rect: DocumentRect,
        fill: RgbColor,
    ) -> Result<(), MutatorError> {
        let ops = &mut self.overlay(page_index)?.ops;

        writeln!(ops, "q").map_err(generation_error)?;
        write_fill(ops, fill).map_err(generation_error)?;
        writeln!(ops, "{} {} {} {} re f", rect.x, rect.y, rect.width, rect.height)
            .map_err(generation_error)?;
        writeln!(ops, "Q").map_err(generation_error)
    }

    fn draw_circle(
        &mut self,
        page_index: u32,
        circle: &CircleInstruction,
    ) -> Result<(), MutatorError> {
        let ops = &mut self.overlay(page_index)?.ops;
        let (cx, cy, r) = (circle.center_x, circle.center_y, circle.radius);
        let k = r * KAPPA;

        writeln!(ops, "q").map_err(generation_error)?;
        write_fill(ops, circle.fill).map_err(generation_error)?;
        writeln!(ops, "{} {} m", cx + r, cy).map_err(generation_error)?;
        writeln!(ops, "{} {} {} {} {} {} c", cx + r, cy + k, cx + k, cy + r, cx, cy + r)
            .map_err(generation_error)?;
        writeln!(ops, "{} {} {} {} {} {} c", cx - k, cy + r, cx - r, cy + k, cx - r, cy)
            .map_err(generation_error)?;
        writeln!(ops, "{} {} {} {} {} {} c", cx - r, cy - k, cx - k, cy - r, cx, cy - r)
            .map_err(generation_error)?;
        writeln!(ops, "{} {} {} {} {} {} c", cx + k, cy - r, cx + r, cy - k, cx + r, cy)
            .map_err(generation_error)?;
        writeln!(ops, "f").map_err(generation_error)?;
        writeln!(ops, "Q").map_err(generation_error)
    }

    fn save(mut self) -> Result<Vec<u8>, MutatorError> {
        let overlays = std::mem::take(&mut self.overlays);
        let touched = overlays.len();

        for (page_index, overlay) in overlays {
            let page_id = self.pages[page_index as usize];
            self.attach_overlay(page_id, overlay)?;
        }

        self.doc.compress();
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|err| MutatorError::Backend(format!("failed to serialize document: {err}")))?;

        debug!(touched, bytes = buffer.len(), "saved mutated document");
        Ok(buffer)
    }
}
