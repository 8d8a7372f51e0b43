use tracing::debug;

use crate::embed::Embedder;
use crate::index::{RetrievalResult, VectorIndex};
use crate::Result;

/// Embeds a question and looks up its nearest chunks.
///
/// Holds no state between calls; identical inputs give identical results.
pub struct Retriever<'a, E: Embedder + ?Sized, I: VectorIndex + ?Sized> {
    embedder: &'a mut E,
    index: &'a I,
}

impl<'a, E: Embedder + ?Sized, I: VectorIndex + ?Sized> Retriever<'a, E, I> {
    pub fn new(embedder: &'a mut E, index: &'a I) -> Self {
        Self { embedder, index }
    }

    /// Return up to `k` chunks ordered by descending similarity.
    pub fn retrieve(&mut self, question: &str, k: usize) -> Result<RetrievalResult> {
        let query = self.embedder.embed_query(question)?;
        let results = self.index.search(&query, k)?;
        debug!("retrieved {} chunks for {:?}", results.len(), question);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_id, Chunk};
    use crate::embed::HashEmbedder;
    use crate::index::{FlatIndex, IndexEntry};
    use crate::Error;

    fn index_of(embedder: &mut HashEmbedder, texts: &[(&str, &str)]) -> FlatIndex {
        let entries = texts
            .iter()
            .map(|(doc, text)| {
                let chunk = Chunk {
                    id: chunk_id(doc, 0),
                    document_id: (*doc).to_string(),
                    text: (*text).to_string(),
                    sequence_index: 0,
                    char_offset: 0,
                    page: 1,
                    label: None,
                };
                let embedding = embedder.embed_documents(&[*text]).unwrap().remove(0);
                IndexEntry::new(chunk, embedding)
            })
            .collect();
        FlatIndex::build(entries).unwrap()
    }

    #[test]
    fn test_retrieves_matching_chunk_first() {
        let mut embedder = HashEmbedder::default();
        let index = index_of(
            &mut embedder,
            &[
                ("weather.txt", "Rain delayed the toss at Eden Gardens."),
                ("player_a.txt", "Player A scored 100 runs in 2019."),
            ],
        );

        let results = Retriever::new(&mut embedder, &index)
            .retrieve("How many runs did Player A score in 2019?", 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, "player_a.txt");
    }

    #[test]
    fn test_identical_calls_identical_results() {
        let mut embedder = HashEmbedder::default();
        let index = index_of(&mut embedder, &[("a.txt", "Bumrah bowls yorkers"), ("b.txt", "Gill bats at three")]);

        let mut retriever = Retriever::new(&mut embedder, &index);
        let first = retriever.retrieve("who bowls yorkers", 2).unwrap();
        let second = retriever.retrieve("who bowls yorkers", 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_embedder_dimension_must_match_index() {
        let mut wide = HashEmbedder::new(64).unwrap();
        let index = index_of(&mut wide, &[("a.txt", "Jadeja fields at point")]);

        let mut narrow = HashEmbedder::new(16).unwrap();
        let result = Retriever::new(&mut narrow, &index).retrieve("point", 1);
        assert!(matches!(result, Err(Error::DimensionMismatch { expected: 64, actual: 16 })));
    }

    #[test]
    fn test_zero_k_rejected() {
        let mut embedder = HashEmbedder::default();
        let index = index_of(&mut embedder, &[("a.txt", "Pant keeps wicket")]);
        let result = Retriever::new(&mut embedder, &index).retrieve("wicket", 0);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
