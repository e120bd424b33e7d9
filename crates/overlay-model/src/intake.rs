//! Checks applied to a selected source file before any session state changes.

use crate::error::OverlayError;

pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 100 * 1024 * 1024;

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Rejects oversized files and files without a PDF header.
pub fn check_source(bytes: &[u8], max_bytes: u64) -> Result<(), OverlayError> {
    check_source_size(bytes.len() as u64, max_bytes)?;

    if !bytes.starts_with(PDF_SIGNATURE) {
        return Err(OverlayError::NotAPdf);
    }

    Ok(())
}

/// Size check alone, usable before the file is read into memory.
pub fn check_source_size(size: u64, max_bytes: u64) -> Result<(), OverlayError> {
    if size > max_bytes {
        return Err(OverlayError::SourceTooLarge { size, limit: max_bytes });
    }

    Ok(())
}

/// `edited_document.<ext>`, keeping the source extension when there is one.
pub fn edited_file_name(source_name: &str) -> String {
    let extension = std::path::Path::new(source_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("pdf");

    format!("edited_document.{extension}")
}
