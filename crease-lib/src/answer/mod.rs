//! Answer synthesis
//!
//! Turns a question plus retrieved chunks into a grounded answer. The
//! [`Synthesizer`] fits the highest-ranked chunks into a fixed context budget,
//! renders a prompt that cites each passage by number, and hands it to a
//! [`Generator`].
//!
//! # Usage
//!
//! ```ignore
//! use crease_lib::answer::{OllamaGenerator, Synthesizer};
//!
//! let mut generator = OllamaGenerator::connect("http://127.0.0.1:11434", "llama3.2")?;
//! let synthesizer = Synthesizer::new(6000, 512, 0.1);
//! let answer = synthesizer.answer(&mut generator, "Who captains Mumbai Indians?", &results)?;
//! println!("{}\n\nsources: {:?}", answer.text, answer.sources);
//! ```

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::index::ScoredChunk;
use crate::Result;

mod ollama;

pub use ollama::*;

/// Returned instead of an empty generation.
pub const NO_ANSWER: &str = "I could not find an answer to that question in the player documents.";

const SYSTEM_PROMPT: &str = "You are Crease, an assistant that answers questions about cricketers \
and IPL players. Use only the numbered passages supplied with the question and cite them as [n]. \
If the passages do not contain the answer, say that you do not know.";

const NO_CONTEXT: &str = "No relevant passages were found in the player documents.";

/// One generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Trait for text generation backends
pub trait Generator: Send {
    /// Generate a completion for the request
    fn generate(&mut self, request: &GenerationRequest) -> Result<String>;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String> {
        (**self).generate(request)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// A generated answer with the passages it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Distinct document ids of the injected passages, in first-use order
    pub sources: Vec<String>,
    /// The passages injected into the prompt
    pub passages: Vec<ScoredChunk>,
}

/// Builds prompts within a context budget and asks a [`Generator`].
#[derive(Debug, Clone)]
pub struct Synthesizer {
    context_chars: usize,
    max_tokens: usize,
    temperature: f32,
}

impl Synthesizer {
    #[must_use]
    pub fn new(context_chars: usize, max_tokens: usize, temperature: f32) -> Self {
        Self {
            context_chars,
            max_tokens,
            temperature,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.context_chars, config.max_tokens, config.temperature)
    }

    /// Answer `question` from `results`, which must be in similarity order.
    pub fn answer<G: Generator + ?Sized>(
        &self,
        generator: &mut G,
        question: &str,
        results: &[ScoredChunk],
    ) -> Result<Answer> {
        let (context, passages) = self.fit_context(results);
        if passages.len() < results.len() {
            debug!(
                "context budget of {} chars holds {} of {} passages",
                self.context_chars,
                passages.len(),
                results.len()
            );
        }

        let request = GenerationRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: render_prompt(question, &context),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let generated = generator.generate(&request)?;

        let text = match generated.trim() {
            "" => {
                warn!("{} returned an empty answer", generator.model_name());
                NO_ANSWER.to_string()
            }
            trimmed => trimmed.to_string(),
        };

        let mut sources: Vec<String> = Vec::new();
        for passage in &passages {
            if !sources.contains(&passage.chunk.document_id) {
                sources.push(passage.chunk.document_id.clone());
            }
        }

        Ok(Answer {
            text,
            sources,
            passages,
        })
    }

    /// Longest prefix of rendered passages that fits the budget.
    ///
    /// A first passage larger than the whole budget is truncated rather than
    /// dropped, so a non-empty result always yields some context.
    fn fit_context(&self, results: &[ScoredChunk]) -> (String, Vec<ScoredChunk>) {
        let mut context = String::new();
        let mut used = 0;
        let mut passages = Vec::new();

        for (i, result) in results.iter().enumerate() {
            let block = render_passage(i + 1, result);
            let len = block.chars().count();

            if used + len <= self.context_chars {
                context.push_str(&block);
                used += len;
                passages.push(result.clone());
            } else {
                if i == 0 {
                    context.extend(block.chars().take(self.context_chars));
                    passages.push(result.clone());
                }
                break;
            }
        }
        (context, passages)
    }
}

fn render_passage(number: usize, result: &ScoredChunk) -> String {
    let chunk = &result.chunk;
    let header = match &chunk.label {
        Some(label) => format!("[{number}] source: {} (page {}) - {label}", chunk.document_id, chunk.page),
        None => format!("[{number}] source: {} (page {})", chunk.document_id, chunk.page),
    };
    format!("{header}\n{}\n\n", chunk.text.trim())
}

fn render_prompt(question: &str, context: &str) -> String {
    let context = if context.is_empty() { NO_CONTEXT } else { context.trim_end() };
    format!(
        "Passages:\n{context}\n\nQuestion:\n{}\n\nAnswer in a few sentences, citing passages as [n].",
        question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_id, Chunk};
    use crate::Error;

    /// Records every request and replies with a fixed text.
    struct RecordingGenerator {
        reply: String,
        requests: Vec<GenerationRequest>,
    }

    impl RecordingGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                requests: Vec::new(),
            }
        }
    }

    impl Generator for RecordingGenerator {
        fn generate(&mut self, request: &GenerationRequest) -> Result<String> {
            self.requests.push(request.clone());
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    struct FailingGenerator;

    impl Generator for FailingGenerator {
        fn generate(&mut self, _request: &GenerationRequest) -> Result<String> {
            Err(Error::Generation("connection reset".to_string()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn scored(document_id: &str, sequence_index: usize, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: chunk_id(document_id, sequence_index),
                document_id: document_id.to_string(),
                text: text.to_string(),
                sequence_index,
                char_offset: 0,
                page: 1,
                label: None,
            },
            score,
        }
    }

    #[test]
    fn test_prompt_cites_passages_in_order() {
        let results = vec![
            scored("Virat_Kohli.pdf", 0, "Kohli plays for Bengaluru.", 0.9),
            scored("MS_Dhoni.pdf", 2, "Dhoni plays for Chennai.", 0.5),
        ];
        let mut generator = RecordingGenerator::replying("Bengaluru [1].");

        let answer = Synthesizer::new(6000, 128, 0.1)
            .answer(&mut generator, "Which team does Kohli play for?", &results)
            .unwrap();

        let request = &generator.requests[0];
        let first = request.prompt.find("[1] source: Virat_Kohli.pdf (page 1)").unwrap();
        let second = request.prompt.find("[2] source: MS_Dhoni.pdf (page 1)").unwrap();
        assert!(first < second);
        assert!(request.prompt.contains("Which team does Kohli play for?"));
        assert_eq!(request.max_tokens, 128);
        assert_eq!(answer.text, "Bengaluru [1].");
        assert_eq!(answer.sources, vec!["Virat_Kohli.pdf", "MS_Dhoni.pdf"]);
        assert_eq!(answer.passages.len(), 2);
    }

    #[test]
    fn test_player_label_in_passage_header() {
        let mut labelled = scored("Virat_Kohli.pdf", 0, "Scored 973 runs in 2016.", 0.9);
        labelled.chunk.label = Some("Virat Kohli (Batter, Royal Challengers Bengaluru)".to_string());
        let mut generator = RecordingGenerator::replying("ok");

        Synthesizer::new(6000, 64, 0.0)
            .answer(&mut generator, "Which team?", &[labelled])
            .unwrap();
        assert!(generator.requests[0].prompt.contains(
            "[1] source: Virat_Kohli.pdf (page 1) - Virat Kohli (Batter, Royal Challengers Bengaluru)\nScored 973 runs"
        ));
    }

    #[test]
    fn test_budget_drops_lowest_ranked_first() {
        let results = vec![
            scored("a.pdf", 0, &"a".repeat(50), 0.9),
            scored("b.pdf", 0, &"b".repeat(50), 0.8),
            scored("c.pdf", 0, &"c".repeat(50), 0.7),
        ];
        let block = render_passage(1, &results[0]).chars().count();
        let synthesizer = Synthesizer::new(block * 2, 64, 0.0);
        let mut generator = RecordingGenerator::replying("ok");

        let answer = synthesizer.answer(&mut generator, "q", &results).unwrap();
        assert_eq!(answer.sources, vec!["a.pdf", "b.pdf"]);
        assert!(!generator.requests[0].prompt.contains("ccc"));
    }

    #[test]
    fn test_oversized_first_passage_is_truncated() {
        let results = vec![scored("long.pdf", 0, &"x".repeat(500), 0.9)];
        let mut generator = RecordingGenerator::replying("ok");

        let answer = Synthesizer::new(100, 64, 0.0)
            .answer(&mut generator, "q", &results)
            .unwrap();
        assert_eq!(answer.sources, vec!["long.pdf"]);
        let xs = generator.requests[0].prompt.matches('x').count();
        assert!(xs > 0 && xs < 100);
    }

    #[test]
    fn test_sources_deduplicated_in_first_use_order() {
        let results = vec![
            scored("b.pdf", 0, "one", 0.9),
            scored("a.pdf", 0, "two", 0.8),
            scored("b.pdf", 1, "three", 0.7),
        ];
        let answer = Synthesizer::new(6000, 64, 0.0)
            .answer(&mut RecordingGenerator::replying("ok"), "q", &results)
            .unwrap();
        assert_eq!(answer.sources, vec!["b.pdf", "a.pdf"]);
        assert_eq!(answer.passages.len(), 3);
    }

    #[test]
    fn test_no_results_still_generates() {
        let mut generator = RecordingGenerator::replying("I do not know.");
        let answer = Synthesizer::new(6000, 64, 0.0)
            .answer(&mut generator, "Who won in 1983?", &[])
            .unwrap();

        assert_eq!(generator.requests.len(), 1);
        assert!(generator.requests[0].prompt.contains(NO_CONTEXT));
        assert!(answer.sources.is_empty());
        assert_eq!(answer.text, "I do not know.");
    }

    #[test]
    fn test_empty_generation_becomes_no_answer() {
        let results = vec![scored("a.pdf", 0, "text", 0.9)];
        let answer = Synthesizer::new(6000, 64, 0.0)
            .answer(&mut RecordingGenerator::replying("  \n"), "q", &results)
            .unwrap();
        assert_eq!(answer.text, NO_ANSWER);
    }

    #[test]
    fn test_generation_error_propagates() {
        let result = Synthesizer::new(6000, 64, 0.0).answer(&mut FailingGenerator, "q", &[]);
        assert!(matches!(result, Err(Error::Generation(_))));
    }
}
