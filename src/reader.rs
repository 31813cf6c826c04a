//! Text extraction from PDF documents and splitting of the extracted text
//! into chunks small enough to send to a generation model.
//!
//! Only text-based PDFs are supported; scanned documents come back empty.

use std::fs;
use std::path::Path;

use super::errors::*;

/// The default number of words in each chunk.
pub const DEFAULT_CHUNK_WORDS: usize = 700;

/// Chunks this short (in characters) carry too little text to be worth
/// generating cards from and are dropped.
const MIN_CHUNK_CHARS: usize = 50;

/// Extracts the text of every page of a PDF, with a `--- Page N ---`
/// marker before each page.
pub fn extract_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .chain_err(|| ErrorKind::Extraction(format!("could not read '{}'", path.display())))?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| Error::from(ErrorKind::Extraction(format!("'{}': {}", path.display(), e))))?;

    debug!("extracted {} pages from {}", pages.len(), path.display());
    Ok(join_pages(&pages))
}

/// Joins page texts, putting a 1-based `--- Page N ---` marker before each.
fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for (n, page) in pages.iter().enumerate() {
        text.push_str(&format!("\n\n--- Page {} ---\n", n + 1));
        text.push_str(page);
    }
    text
}

/// Splits text into chunks of at most `max_words` whitespace-separated
/// words, each rejoined with single spaces.
///
/// A `max_words` of zero is treated as one.
pub fn split_chunks(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let chunks: Vec<String> = words
        .chunks(max_words.max(1))
        .map(|w| w.join(" "))
        .filter(|c| c.chars().count() > MIN_CHUNK_CHARS)
        .collect();

    debug!("split {} words into {} chunks", words.len(), chunks.len());
    chunks
}
