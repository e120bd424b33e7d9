//! In-memory mutator that records the instructions it receives.

use crate::backend::{
    CircleInstruction, DocumentMutator, ImageRef, MutatorError, RasterFormat, TextInstruction,
};
use crate::color::RgbColor;
use crate::geometry::{DocumentRect, PageSize};
use image::{ImageFormat, Rgba, RgbaImage};
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    EmbedAttempt(RasterFormat),
    Text { page_index: u32, text: TextInstruction },
    Image { page_index: u32, image: ImageRef, rect: DocumentRect },
    Rectangle { page_index: u32, rect: DocumentRect, fill: RgbColor },
    Circle { page_index: u32, circle: CircleInstruction },
}

impl Recorded {
    pub fn is_drawing(&self) -> bool {
        !matches!(self, Recorded::EmbedAttempt(_))
    }
}

pub struct RecordingMutator {
    pages: Vec<PageSize>,
    next_image: u64,
    log: Rc<RefCell<Vec<Recorded>>>,
}

impl RecordingMutator {
    pub fn with_pages(pages: Vec<PageSize>) -> Self {
        Self { pages, next_image: 0, log: Rc::default() }
    }

    pub fn log(&self) -> Rc<RefCell<Vec<Recorded>>> {
        Rc::clone(&self.log)
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
}

impl DocumentMutator for RecordingMutator {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, MutatorError> {
        self.check_page(page_index)?;
        Ok(self.pages[page_index as usize])
    }

    fn embed_image(
        &mut self,
        bytes: &[u8],
        format: RasterFormat,
    ) -> Result<ImageRef, MutatorError> {
        self.log.borrow_mut().push(Recorded::EmbedAttempt(format));
        let image_format = match format {
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Jpeg => ImageFormat::Jpeg,
        };

        image::load_from_memory_with_format(bytes, image_format)
            .map_err(|_| MutatorError::UnsupportedFormat(format))?;

        self.next_image += 1;
        Ok(ImageRef(self.next_image))
    }

    fn draw_text(&mut self, page_index: u32, text: &TextInstruction) -> Result<(), MutatorError> {
        self.check_page(page_index)?;
        self.log.borrow_mut().push(Recorded::Text { page_index, text: text.clone() });
        Ok(())
    }

    fn draw_image(
        &mut self,
        page_index: u32,
        image: ImageRef,
        rect: DocumentRect,
    ) -> Result<(), MutatorError> {
        self.check_page(page_index)?;
        self.log.borrow_mut().push(Recorded::Image { page_index, image, rect });
        Ok(())
    }

    fn draw_rectangle(
        &mut self,
        page_index: u32,
        rect: DocumentRect,
        fill: RgbColor,
    ) -> Result<(), MutatorError> {
        self.check_page(page_index)?;
        self.log.borrow_mut().push(Recorded::Rectangle { page_index, rect, fill });
        Ok(())
    }

    fn draw_circle(
        &mut self,
        page_index: u32,
        circle: &CircleInstruction,
    ) -> Result<(), MutatorError> {
        self.check_page(page_index)?;
        self.log.borrow_mut().push(Recorded::Circle { page_index, circle: *circle });
        Ok(())
    }

    fn save(self) -> Result<Vec<u8>, MutatorError> {
        Ok(b"saved".to_vec())
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png encode should succeed");
    bytes
}
