use crate::error::IngestError;
use crate::models::{SkippedPdf, SourceSummary, UploadedPdf};
use lopdf::Document;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Concatenated page text of an upload batch plus what was kept and skipped.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub sources: Vec<SourceSummary>,
    pub skipped_files: Vec<SkippedPdf>,
}

pub trait PdfExtractor {
    /// Returns the non-blank pages of one PDF. Unreadable pages are skipped;
    /// an error means the whole file could not be opened.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    debug!(page = page_no, %error, "skipping unreadable page");
                    continue;
                }
            };

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        Ok(pages)
    }
}

pub fn page_marker(file_name: &str, page: u32) -> String {
    format!("--- FILE: {file_name} | PAGE {page} ---")
}

/// Runs every upload through `extractor` and joins the surviving pages into a
/// single blob, each page prefixed with its [`page_marker`].
///
/// Files that fail to open or yield no text are recorded in
/// `skipped_files`. The batch only fails with
/// [`IngestError::NoExtractableText`] when nothing at all was extracted.
pub fn extract_text_from_pdfs<X>(
    files: &[UploadedPdf],
    extractor: &X,
) -> Result<ExtractedText, IngestError>
where
    X: PdfExtractor + ?Sized,
{
    let mut text = String::new();
    let mut sources = Vec::new();
    let mut skipped_files = Vec::new();

    for file in files {
        let pages = match extractor.extract_pages(&file.bytes) {
            Ok(pages) => pages,
            Err(error) => {
                warn!(file = %file.name, %error, "skipping unreadable pdf");
                skipped_files.push(SkippedPdf {
                    name: file.name.clone(),
                    reason: error.to_string(),
                });
                continue;
            }
        };

        if pages.is_empty() {
            warn!(file = %file.name, "pdf had no readable page text");
            skipped_files.push(SkippedPdf {
                name: file.name.clone(),
                reason: "pdf had no readable page text".to_string(),
            });
            continue;
        }

        for page in &pages {
            text.push_str("\n\n");
            text.push_str(&page_marker(&file.name, page.number));
            text.push('\n');
            text.push_str(&page.text);
        }

        sources.push(SourceSummary {
            filename: file.name.clone(),
            pages: pages.len() as u32,
            checksum: digest_bytes(&file.bytes),
        });
    }

    if text.trim().is_empty() {
        return Err(IngestError::NoExtractableText);
    }

    Ok(ExtractedText {
        text,
        sources,
        skipped_files,
    })
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
