//! Whole-document page operations: merging several PDFs and splitting one.

use crate::{materialize_inherited, PdfEngineError};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info};

/// Inclusive, 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn single(page: u32) -> Self {
        Self { start: page, end: page }
    }

    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    fn file_suffix(&self) -> String {
        if self.start == self.end {
            format!("page_{}", self.start)
        } else {
            format!("pages_{}-{}", self.start, self.end)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// One output document per page.
    EachPage,
    /// One output document per range, in the given order.
    Ranges(Vec<PageRange>),
}

#[derive(Debug, Clone)]
pub struct SplitPart {
    pub name: String,
    pub range: PageRange,
    pub bytes: Vec<u8>,
}

/// Parses `"1-3, 5"` style selections against a document of `page_count` pages.
///
/// Every comma-separated segment must be a page or range with
/// `1 <= start <= end <= page_count`; an empty segment is invalid.
pub fn parse_page_ranges(
    input: &str,
    page_count: u32,
) -> Result<Vec<PageRange>, PdfEngineError> {
    let invalid = || PdfEngineError::InvalidPageRange(input.trim().to_owned());
    let page = |raw: &str| raw.trim().parse::<u32>().map_err(|_| invalid());

    let mut ranges = Vec::new();
    for part in input.split(',').map(str::trim) {
        let range = match part.split_once('-') {
            Some((start, end)) => PageRange { start: page(start)?, end: page(end)? },
            None => PageRange::single(page(part)?),
        };

        if range.start == 0 || range.start > range.end || range.end > page_count {
            return Err(invalid());
        }
        ranges.push(range);
    }

    Ok(ranges)
}

/// Concatenates the pages of every input, in order, into one document.
///
/// At least two inputs are required.
pub fn merge_documents(inputs: &[Vec<u8>]) -> Result<Vec<u8>, PdfEngineError> {
    let (first, rest) = match inputs {
        [first, rest @ ..] if !rest.is_empty() => (first, rest),
        _ => return Err(PdfEngineError::NotEnoughToMerge(inputs.len())),
    };
    let mut merged = Document::load_mem(first)?;

    for bytes in rest {
        let secondary = Document::load_mem(bytes)?;
        append_document(&mut merged, secondary)?;
    }

    merged.prune_objects();
    merged.compress();

    let page_count = merged.get_pages().len();
    let mut buffer = Vec::new();
    merged.save_to(&mut buffer)?;

    info!(inputs = inputs.len(), page_count, "merged documents");
    Ok(buffer)
}

fn append_document(
    primary: &mut Document,
    mut secondary: Document,
) -> Result<(), PdfEngineError> {
    let secondary_pages: Vec<ObjectId> = secondary.get_pages().into_values().collect();
    for page_id in &secondary_pages {
        materialize_inherited(&mut secondary, *page_id);
    }

    secondary.renumber_objects_with(primary.max_id + 1);
    let secondary_pages: Vec<ObjectId> = secondary.get_pages().into_values().collect();

    primary.max_id = primary.max_id.max(secondary.max_id);
    primary.objects.extend(secondary.objects);

    let pages_root_id = primary
        .catalog()?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| PdfEngineError::Backend("catalog has no page tree".to_owned()))?;

    let pages_root = primary
        .get_object_mut(pages_root_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| PdfEngineError::Backend("page tree root is not a dictionary".to_owned()))?;
    let kids = pages_root
        .get_mut(b"Kids")
        .and_then(Object::as_array_mut)
        .map_err(|_| PdfEngineError::Backend("page tree root has no kids".to_owned()))?;
    kids.extend(secondary_pages.iter().copied().map(Object::Reference));

    let count = pages_root.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages_root.set("Count", count + secondary_pages.len() as i64);

    for page_id in &secondary_pages {
        if let Ok(page) = primary.get_object_mut(*page_id).and_then(Object::as_dict_mut) {
            page.set("Parent", pages_root_id);
        }
    }

    debug!(appended = secondary_pages.len(), "appended pages");
    Ok(())
}

/// Splits a document into parts named after `stem`.
pub fn split_document(
    bytes: &[u8],
    stem: &str,
    mode: &SplitMode,
) -> Result<Vec<SplitPart>, PdfEngineError> {
    let source = Document::load_mem(bytes)?;
    let page_count = source.get_pages().len() as u32;

    let ranges = match mode {
        SplitMode::EachPage => (1..=page_count).map(PageRange::single).collect(),
        SplitMode::Ranges(ranges) => {
            if let Some(bad) = ranges.iter().find(|range| {
                range.start == 0 || range.start > range.end || range.end > page_count
            }) {
                return Err(PdfEngineError::InvalidPageRange(format!(
                    "{}-{}",
                    bad.start, bad.end
                )));
            }
            ranges.clone()
        }
    };

    let parts = ranges
        .into_iter()
        .map(|range| {
            let bytes = keep_pages(&source, page_count, range)?;
            Ok(SplitPart { name: format!("{stem}_{}.pdf", range.file_suffix()), range, bytes })
        })
        .collect::<Result<Vec<_>, PdfEngineError>>()?;

    info!(parts = parts.len(), page_count, "split document");
    Ok(parts)
}

fn keep_pages(
    source: &Document,
    page_count: u32,
    range: PageRange,
) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = source.clone();
    let to_drop: Vec<u32> = (1..=page_count).filter(|page| !range.contains(*page)).collect();
    doc.delete_pages(&to_drop);
    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}
