
use itertools::Itertools;
use tracing::debug;

use super::Document;

/// Remove empty lines from a document's text
///
/// Lines containing only whitespace count as empty. Nothing else about the
/// text is normalised.
#[inline]
pub fn clean_document(document: &Document) -> Document {
    let cleaned = document
        .content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .join("\n");

    document.with_content(cleaned)
}

#[inline]
pub fn clean_documents(documents: &[Document]) -> Vec<Document> {
    let cleaned: Vec<Document> = documents.iter().map(clean_document).collect();
    debug!("Cleaned {} documents", cleaned.len());
    cleaned
}
