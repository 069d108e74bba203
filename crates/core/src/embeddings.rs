use crate::error::ServiceError;
use crate::traits::Embedder;
use async_trait::async_trait;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

/// Offline embedder hashing character trigrams into a fixed number of
/// buckets. Needs no credentials, so it backs `--embedder ngram` and tests.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl CharacterNgramEmbedder {
    /// Counts lowercase character trigrams into hashed buckets and scales the
    /// result to unit length. Text shorter than three characters maps to the
    /// zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let buckets = self.dimensions.max(1);
        let lowered = text.to_lowercase().chars().collect::<Vec<_>>();

        let mut vector = vec![0f32; buckets];
        for trigram in lowered.windows(3) {
            let bucket = trigram_hash(trigram) % buckets as u64;
            vector[bucket as usize] += 1.0;
        }

        scale_to_unit(&mut vector);
        vector
    }
}

/// FNV-1a over the UTF-8 encoding of `chars`.
fn trigram_hash(chars: &[char]) -> u64 {
    let mut buffer = [0u8; 4];
    chars
        .iter()
        .flat_map(|ch| ch.encode_utf8(&mut buffer).as_bytes().to_vec())
        .fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
}

fn scale_to_unit(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|value| *value /= norm);
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "character-trigram"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        Ok(self.embed(text))
    }
}
