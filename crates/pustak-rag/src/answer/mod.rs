//! Grounded answer composition: prompt assembly from retrieved contexts,
//! generation through the pluggable backend, and the calculator post-pass.

pub mod calculator;

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::AnswerConfig;
use crate::llm::GenerationBackend;
use crate::types::ScoredChunk;

static CALC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[CALC:(.+?)\]\]").expect("calc directive regex is valid"));

pub struct AnswerComposer {
    generator: Arc<dyn GenerationBackend>,
    config: AnswerConfig,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn GenerationBackend>, config: AnswerConfig) -> Self {
        Self { generator, config }
    }

    /// Numbered context blocks, the verbatim question, and the instruction
    /// set: answer only from context, emit the fallback sentence when
    /// unsupported, cite context numbers, delegate arithmetic to the
    /// `[[CALC: ...]]` directive.
    pub fn build_prompt(&self, question: &str, contexts: &[ScoredChunk]) -> String {
        let mut blocks = String::new();
        for (i, scored) in contexts.iter().enumerate() {
            let chunk = &scored.chunk;
            blocks.push_str(&format!(
                "Context {} (source: {}, page: {}):\n{}\n\n",
                i + 1,
                chunk.source,
                chunk.page,
                truncate_chars(&chunk.text, self.config.max_context_chars)
            ));
        }

        format!(
            "You are a helpful study assistant. Use ONLY the context sections below to answer \
             the question. If the answer is not present in the context, reply: '{}'\n\n\
             {}\nQuestion: {}\n\
             Answer concisely; when you use a fact, cite the context number (e.g., [Context 1]). \
             If you need to perform arithmetic, emit it as [[CALC: expression]] and the \
             calculator will compute it.\n",
            self.config.fallback_sentence, blocks, question
        )
    }

    /// Produce the final answer text. Never fails: generation backend errors
    /// are converted to a user-visible error string at this boundary, so a
    /// degraded textual answer beats a crashed request. Zero contexts still
    /// go through the grounded prompt, which forces the fallback sentence
    /// instead of a fabricated answer.
    pub async fn answer(&self, question: &str, contexts: &[ScoredChunk]) -> String {
        let prompt = self.build_prompt(question, contexts);
        let raw = match self
            .generator
            .generate(&prompt, &self.config.generation)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("generation failed, degrading to error answer: {}", e);
                return format!("Generation backend unavailable: {}", e);
            }
        };
        apply_calculator(&raw)
    }
}

/// Scan generated text for the first `[[CALC: ...]]` directive and append the
/// evaluation outcome. The directive itself stays visible in the answer.
pub fn apply_calculator(answer: &str) -> String {
    let Some(captures) = CALC_PATTERN.captures(answer) else {
        return answer.to_string();
    };
    let expr = captures[1].trim();
    match calculator::evaluate(expr) {
        Ok(value) => format!(
            "{}\n\nCalculator result: {}",
            answer,
            calculator::format_value(value)
        ),
        Err(e) => format!("{}\n\nCalculator error: {}", answer, e),
    }
}

/// Direct `calc:` command, bypassing retrieval and generation entirely.
/// Returns `None` when the input is not a calculator command.
pub fn calc_command(input: &str) -> Option<String> {
    let trimmed = input.trim();
    // get() avoids panicking on a multi-byte char straddling the boundary.
    let prefix = trimmed.get(..5)?;
    if !prefix.eq_ignore_ascii_case("calc:") {
        return None;
    }
    let expr = trimmed[5..].trim();
    Some(match calculator::evaluate(expr) {
        Ok(value) => calculator::format_value(value),
        Err(e) => format!("Calculator error: {}", e),
    })
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::error::{RagError, Result};
    use crate::llm::GenerationConfig;
    use crate::types::Chunk;
    use async_trait::async_trait;

    struct CannedGenerator {
        reply: Option<String>,
    }

    #[async_trait]
    impl GenerationBackend for CannedGenerator {
        async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<String> {
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(RagError::GenerationBackend("backend down".into())),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn composer(reply: Option<&str>) -> AnswerComposer {
        AnswerComposer::new(
            Arc::new(CannedGenerator {
                reply: reply.map(str::to_string),
            }),
            RagConfig::default().answer,
        )
    }

    fn context(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: text.to_string(),
                source: "book.pdf".to_string(),
                page: 2,
                sequence_id: "book.pdf_p2_c1".to_string(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn prompt_numbers_contexts_and_carries_instructions() {
        let c = composer(Some("ok"));
        let prompt = c.build_prompt(
            "what is ownership?",
            &[context("ownership text"), context("borrowing text")],
        );
        assert!(prompt.contains("Context 1 (source: book.pdf, page: 2):"));
        assert!(prompt.contains("Context 2 (source: book.pdf, page: 2):"));
        assert!(prompt.contains("Question: what is ownership?"));
        assert!(prompt.contains("I don't know based on the provided material"));
        assert!(prompt.contains("[[CALC: expression]]"));
    }

    #[test]
    fn prompt_with_no_contexts_still_grounds() {
        let c = composer(Some("ok"));
        let prompt = c.build_prompt("anything", &[]);
        assert!(prompt.contains("Use ONLY the context sections below"));
        assert!(prompt.contains("I don't know based on the provided material"));
    }

    #[test]
    fn calc_directive_is_evaluated_and_kept_visible() {
        let out = apply_calculator("The total is [[CALC: 2+2*3]] rupees.");
        assert!(out.contains("[[CALC: 2+2*3]]"));
        assert!(out.ends_with("Calculator result: 8"));
    }

    #[test]
    fn calc_directive_errors_are_inline_not_fatal() {
        let out = apply_calculator("Dividing gives [[CALC: 10/0]].");
        assert!(out.contains("Calculator error: division by zero"));
    }

    #[test]
    fn only_first_directive_is_evaluated() {
        let out = apply_calculator("[[CALC: 1+1]] and [[CALC: 2+2]]");
        assert!(out.ends_with("Calculator result: 2"));
    }

    #[test]
    fn text_without_directive_passes_through() {
        assert_eq!(apply_calculator("plain answer"), "plain answer");
    }

    #[test]
    fn calc_command_short_circuits() {
        assert_eq!(calc_command("calc: 3**2").as_deref(), Some("9"));
        assert_eq!(calc_command("  CALC: 1+1 ").as_deref(), Some("2"));
        assert!(calc_command("what is calc?").is_none());
        let err = calc_command("calc: 1/0").unwrap();
        assert!(err.starts_with("Calculator error:"));
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_error_string() {
        let c = composer(None);
        let answer = c.answer("question", &[context("ctx")]).await;
        assert!(answer.starts_with("Generation backend unavailable:"));
    }

    #[tokio::test]
    async fn successful_generation_gets_calculator_pass() {
        let c = composer(Some("Sum is [[CALC: 40+2]]"));
        let answer = c.answer("question", &[context("ctx")]).await;
        assert!(answer.ends_with("Calculator result: 42"));
    }
}
