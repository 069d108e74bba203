use crate::error::{IngestError, SearchError};
use crate::index::EmbeddingIndex;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::info;

/// The single on-disk location of the current document set's index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Modification time of the stored index, used to notice rebuilds.
    pub fn generation(&self) -> Option<SystemTime> {
        fs::metadata(&self.path)
            .and_then(|metadata| metadata.modified())
            .ok()
    }

    /// Writes the index next to its final location and renames it into place,
    /// so readers only ever observe a complete file.
    pub fn save(&self, index: &EmbeddingIndex) -> Result<(), IngestError> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&directory)?;

        let staged = NamedTempFile::new_in(&directory)?;
        {
            let mut writer = BufWriter::new(staged.as_file());
            serde_json::to_writer(&mut writer, index)?;
            writer.flush()?;
        }
        staged.as_file().sync_all()?;

        staged
            .persist(&self.path)
            .map_err(|error| IngestError::Persist {
                path: self.path.display().to_string(),
                details: error.error.to_string(),
            })?;

        info!(path = %self.path.display(), chunks = index.len(), "index saved");
        Ok(())
    }

    pub fn load(&self) -> Result<EmbeddingIndex, SearchError> {
        if !self.exists() {
            return Err(SearchError::NotReady(format!(
                "no index at {}",
                self.path.display()
            )));
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|error| SearchError::IndexLoad(error.to_string()))?;
        let index: EmbeddingIndex = serde_json::from_str(&raw)
            .map_err(|error| SearchError::IndexLoad(error.to_string()))?;
        index.validate().map_err(SearchError::IndexLoad)?;

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::SourceSummary;
    use tempfile::tempdir;

    async fn sample_index(chunks: &[&str]) -> EmbeddingIndex {
        EmbeddingIndex::build(
            chunks.iter().map(|chunk| chunk.to_string()).collect(),
            vec![SourceSummary {
                filename: "manual.pdf".to_string(),
                pages: 3,
                checksum: "abc".to_string(),
            }],
            &CharacterNgramEmbedder::default(),
        )
        .await
        .expect("index builds")
    }

    #[tokio::test]
    async fn saved_index_loads_back() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("faiss_index").join("index.json"));
        let index = sample_index(&["first chunk of text", "second chunk of text"]).await;

        store.save(&index)?;
        let loaded = store.load()?;

        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.chunks().collect::<Vec<_>>(),
            vec!["first chunk of text", "second chunk of text"]
        );
        assert_eq!(loaded.sources[0].filename, "manual.pdf");
        assert_eq!(loaded.dimensions, index.dimensions);
        Ok(())
    }

    #[tokio::test]
    async fn save_replaces_previous_index_wholesale() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("index.json"));

        store.save(&sample_index(&["old one", "old two", "old three"]).await)?;
        store.save(&sample_index(&["new only"]).await)?;

        let loaded = store.load()?;
        assert_eq!(loaded.chunks().collect::<Vec<_>>(), vec!["new only"]);

        let leftovers = fs::read_dir(dir.path())?.count();
        assert_eq!(leftovers, 1, "staging files must not be left behind");
        Ok(())
    }

    #[test]
    fn missing_index_is_not_ready() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("index.json"));
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(SearchError::NotReady(_))));
        Ok(())
    }

    #[test]
    fn corrupt_index_is_a_load_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("index.json");
        fs::write(&path, b"{\"embedding_model\": ")?;

        let store = IndexStore::new(&path);
        assert!(matches!(store.load(), Err(SearchError::IndexLoad(_))));
        Ok(())
    }
}
