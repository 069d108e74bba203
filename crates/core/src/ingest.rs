use crate::chunking::{build_chunks, normalize_text, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::{extract_text_from_pdfs, PdfExtractor};
use crate::index::EmbeddingIndex;
use crate::models::{BuildReport, IngestionOptions, SkippedPdf, UploadedPdf};
use crate::store::IndexStore;
use crate::traits::Embedder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if is_pdf(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Uploads read from disk plus the files that could not be read.
#[derive(Debug, Default)]
pub struct LoadedUploads {
    pub files: Vec<UploadedPdf>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Reads the given files, and every PDF below the given folders, into
/// memory. Explicitly named files are taken regardless of extension.
/// Unreadable files are skipped and reported.
pub fn load_uploads(paths: &[PathBuf]) -> LoadedUploads {
    let mut candidates = Vec::new();
    for path in paths {
        if path.is_dir() {
            candidates.extend(discover_pdf_files(path));
        } else {
            candidates.push(path.clone());
        }
    }

    let mut loaded = LoadedUploads::default();
    for path in candidates {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        match fs::read(&path) {
            Ok(bytes) => loaded.files.push(UploadedPdf::new(name, bytes)),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                loaded.skipped_files.push(SkippedPdf {
                    name,
                    reason: error.to_string(),
                });
            }
        }
    }

    loaded
}

/// Extracts, normalizes, chunks and embeds an upload batch, then replaces
/// the persisted index with the result.
///
/// Nothing is embedded unless extraction and chunking both produced text.
pub async fn process_uploads<X, E>(
    files: &[UploadedPdf],
    extractor: &X,
    options: &IngestionOptions,
    embedder: &E,
    store: &IndexStore,
) -> Result<BuildReport, IngestError>
where
    X: PdfExtractor + ?Sized,
    E: Embedder + ?Sized,
{
    info!(file_count = files.len(), "processing uploads");
    let extracted = extract_text_from_pdfs(files, extractor)?;
    for skipped in &extracted.skipped_files {
        warn!(file = %skipped.name, reason = %skipped.reason, "skipped pdf");
    }

    let normalized = normalize_text(&extracted.text);
    let chunks = build_chunks(&normalized, ChunkingConfig::from(options.clone()))?;
    info!(chunk_count = chunks.len(), "text chunked");

    let index = EmbeddingIndex::build(chunks, extracted.sources.clone(), embedder).await?;
    store.save(&index)?;

    Ok(BuildReport {
        chunk_count: index.len(),
        sources: extracted.sources,
        skipped_files: extracted.skipped_files,
        built_at: index.built_at,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ServiceError;
    use crate::extractor::tests::pdf_with_pages;
    use crate::extractor::LopdfExtractor;
    use async_trait::async_trait;
    use std::fs::File;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Offline embedder that counts how often it is called.
    #[derive(Default)]
    pub(crate) struct CountingEmbedder {
        pub inner: CharacterNgramEmbedder,
        pub document_calls: AtomicUsize,
        pub query_calls: AtomicUsize,
    }

    impl CountingEmbedder {
        pub(crate) fn total_calls(&self) -> usize {
            self.document_calls.load(Ordering::SeqCst) + self.query_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            self.document_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_documents(texts).await
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_query(text).await
        }
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"skip"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn uploads_are_named_after_their_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let folder = dir.path().join("docs");
        fs::create_dir(&folder)?;
        fs::write(folder.join("b.pdf"), b"b")?;
        fs::write(folder.join("a.pdf"), b"a")?;
        let single = dir.path().join("extra.pdf");
        fs::write(&single, b"extra")?;

        let loaded = load_uploads(&[folder, single]);
        let names = loaded
            .files
            .iter()
            .map(|upload| upload.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "extra.pdf"]);
        assert_eq!(loaded.files[2].bytes, b"extra");
        assert!(loaded.skipped_files.is_empty());
        Ok(())
    }

    #[test]
    fn missing_file_is_skipped_without_dropping_the_rest() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let good = dir.path().join("good.pdf");
        fs::write(&good, b"%PDF-1.4")?;
        let missing = dir.path().join("missing.pdf");

        let loaded = load_uploads(&[good, missing]);

        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.files[0].name, "good.pdf");
        assert_eq!(loaded.skipped_files.len(), 1);
        assert_eq!(loaded.skipped_files[0].name, "missing.pdf");
        assert!(!loaded.skipped_files[0].reason.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_batch_never_reaches_the_embedder() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("index.json"));
        let embedder = CountingEmbedder::default();
        let files = vec![UploadedPdf::new("broken.pdf", b"%PDF-1.4\n%broken".to_vec())];

        let result = process_uploads(
            &files,
            &LopdfExtractor,
            &IngestionOptions::default(),
            &embedder,
            &store,
        )
        .await;

        assert!(matches!(result, Err(IngestError::NoExtractableText)));
        assert_eq!(embedder.total_calls(), 0);
        assert!(!store.exists());
        Ok(())
    }

    #[tokio::test]
    async fn tiny_documents_yield_no_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("index.json"));
        let embedder = CountingEmbedder::default();
        let files = vec![UploadedPdf::new("tiny.pdf", pdf_with_pages(&["Hi"]))];

        let result = process_uploads(
            &files,
            &LopdfExtractor,
            &IngestionOptions::default(),
            &embedder,
            &store,
        )
        .await;

        assert!(matches!(result, Err(IngestError::NoUsableChunks)));
        assert_eq!(embedder.total_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_sentences_build_a_multi_chunk_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("faiss_index").join("index.json"));
        let embedder = CountingEmbedder::default();
        let page = "Hello world. ".repeat(150);
        let files = vec![
            UploadedPdf::new("hello.pdf", pdf_with_pages(&[page.as_str()])),
            UploadedPdf::new("broken.pdf", b"not a pdf".to_vec()),
        ];

        let report = process_uploads(
            &files,
            &LopdfExtractor,
            &IngestionOptions::default(),
            &embedder,
            &store,
        )
        .await?;

        assert!(report.chunk_count >= 2);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.page_count(), 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(report.skipped_files[0].name, "broken.pdf");

        let index = store.load()?;
        assert_eq!(index.len(), report.chunk_count);
        for chunk in index.chunks() {
            let length = chunk.chars().count();
            assert!(length > 50 && length <= 1_800, "chunk length {length}");
            assert!(chunk.contains("Hello world."));
        }
        assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
