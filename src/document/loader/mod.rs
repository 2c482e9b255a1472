
use std::panic;
use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{Document, META_FILE_PATH, META_PAGE_NUMBER, Metadata};
use crate::{QaError, Result};

/// Read a PDF file into memory
///
/// A missing file is reported as [`QaError::SourceNotFound`] so callers can
/// tell it apart from other I/O failures.
#[inline]
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(QaError::SourceNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

/// Load a PDF file into one [`Document`] per page
#[inline]
pub fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let bytes = read_source(path)?;
    load_pdf_bytes(&bytes, &path.display().to_string())
}

/// Parse PDF bytes into one [`Document`] per page
///
/// Pages without any extractable text still produce a (blank) document so
/// that page numbers stay aligned with the source.
#[inline]
pub fn load_pdf_bytes(bytes: &[u8], source: &str) -> Result<Vec<Document>> {
    debug!("Extracting text from {} ({} bytes)", source, bytes.len());

    // pdf-extract panics on some malformed files instead of returning an error
    let pages = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| QaError::Document(format!("PDF parser crashed while reading {}", source)))?
        .map_err(|e| QaError::Document(format!("Failed to extract text from {}: {}", source, e)))?;

    if pages.is_empty() {
        return Err(QaError::Document(format!("{} contains no pages", source)));
    }

    let documents: Vec<Document> = pages
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let mut meta = Metadata::new();
            meta.insert(META_FILE_PATH.to_string(), Value::from(source));
            meta.insert(META_PAGE_NUMBER.to_string(), Value::from(index + 1));
            Document::new(text, meta)
        })
        .collect();

    info!(
        "Loaded {} pages from {} ({} with text)",
        documents.len(),
        source,
        documents.iter().filter(|d| !d.is_blank()).count()
    );

    Ok(documents)
}

/// SHA-256 of the raw file, used to recognise a PDF that was indexed before
#[inline]
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
