//! AI pipeline orchestration
//!
//! Turns raw document text into a summary and a five-question multiple-choice
//! quiz via two sequential LLM calls. The second call demands raw JSON and is
//! parsed strictly; a malformed quiz is a failure, never retried, because the
//! call is billable and a schema violation is deterministic.
//!
//! `process` returns a tagged result. Every internal error is caught and
//! mapped to `PipelineResult::Failed`; nothing escapes to the caller.

use crate::chunker::select_context;
use crate::errors::ProcessError;
use std::sync::Arc;
use studymill_common::config::PipelineSettings;
use studymill_common::db::NewQuestion;
use studymill_common::llm::TextGenerator;
use tracing::{info, instrument};

/// Questions per quiz
pub const QUESTION_COUNT: usize = 5;

/// Options per question
pub const OPTION_COUNT: usize = 4;

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub enum PipelineResult {
    Completed {
        title: String,
        summary: String,
        quiz: Vec<NewQuestion>,
    },
    Failed {
        error: ProcessError,
    },
}

/// Quiz question as emitted by the model. Field names are the wire contract
/// shared with the front end and stay in the publisher's language.
#[derive(Debug, serde::Deserialize)]
struct QuizQuestion {
    pergunta: String,
    opcoes: Vec<String>,
    resposta_correta: String,
}

#[derive(Debug, serde::Deserialize)]
struct QuizOutput {
    questoes: Vec<QuizQuestion>,
}

/// Document-to-study-material pipeline
pub struct StudyPipeline {
    generator: Arc<dyn TextGenerator>,
    settings: PipelineSettings,
}

impl StudyPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: PipelineSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// Process document text into a summary and quiz.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn process(&self, text: &str, title: &str) -> PipelineResult {
        match self.run(text).await {
            Ok((summary, quiz)) => PipelineResult::Completed {
                title: title.to_string(),
                summary,
                quiz,
            },
            Err(error) => PipelineResult::Failed { error },
        }
    }

    async fn run(&self, text: &str) -> Result<(String, Vec<NewQuestion>), ProcessError> {
        let context = select_context(text, &self.settings);

        info!(context_len = context.len(), "Generating summary");
        let summary = self
            .generator
            .generate(&summary_prompt(&context))
            .await?;

        // The quiz is grounded on the summary rather than the original
        // context: a shorter, more focused call.
        info!("Generating quiz");
        let quiz_raw = self.generator.generate(&quiz_prompt(&summary)).await?;

        let quiz = parse_quiz(&quiz_raw)?;

        Ok((summary, quiz))
    }
}

fn summary_prompt(context: &str) -> String {
    format!(
        "You are a senior exam-prep instructor who distills complex material \
         for high-performing students. Turn the raw text below into a \
         strategic study guide. Do not merely summarize; teach.\n\n\
         REQUIRED OUTPUT STRUCTURE:\n\n\
         ## Central Thesis\n\
         (One dense paragraph: what problem does the text address, and what \
         is the author's position?)\n\n\
         ## Concept Map\n\
         (The 3-5 pillars of the text. For each, explain its internal logic; \
         use '->' arrows for cause and effect.)\n\n\
         ## Key Terms\n\
         (Technical terms and definitions. Format: **Term**: short, direct \
         definition.)\n\n\
         ## Exam Radar\n\
         (Bullet points: common traps, exceptions to rules, critical dates, \
         counter-arguments cited in the text.)\n\n\
         QUALITY RULES:\n\
         - Cut filler words; be dense and direct.\n\
         - Use analogies only for genuinely abstract concepts.\n\
         - Base everything EXCLUSIVELY on the text below.\n\n\
         SOURCE TEXT:\n{}",
        context
    )
}

fn quiz_prompt(grounding: &str) -> String {
    format!(
        "Act as a rigorous examination board. Create an INTERMEDIATE/HARD \
         multiple-choice exam from the text below.\n\n\
         RULES:\n\
         1. Test interpretation, not keyword lookup.\n\
         2. Wrong options must be plausible to an inattentive student, never \
         absurd.\n\
         3. No 'all of the above' or 'none of the above'.\n\
         4. Generate EXACTLY {} questions, each with EXACTLY {} options.\n\
         5. Output: RAW JSON ONLY, no prose, matching this schema:\n\
         {{\"questoes\": [{{\"pergunta\": \"...\", \"opcoes\": [\"...\", \
         \"...\", \"...\", \"...\"], \"resposta_correta\": \"...\"}}]}}\n\
         The resposta_correta value must be identical to one of the opcoes.\n\n\
         SOURCE TEXT:\n{}",
        QUESTION_COUNT, OPTION_COUNT, grounding
    )
}

/// Strictly parse and validate the model's quiz JSON.
fn parse_quiz(raw: &str) -> Result<Vec<NewQuestion>, ProcessError> {
    let body = strip_code_fence(raw);

    let output: QuizOutput =
        serde_json::from_str(body).map_err(|e| ProcessError::AiResponseMalformed {
            detail: format!("Quiz JSON did not parse: {}", e),
        })?;

    if output.questoes.len() != QUESTION_COUNT {
        return Err(ProcessError::AiResponseMalformed {
            detail: format!(
                "Expected {} questions, got {}",
                QUESTION_COUNT,
                output.questoes.len()
            ),
        });
    }

    let mut quiz = Vec::with_capacity(QUESTION_COUNT);
    for (i, q) in output.questoes.into_iter().enumerate() {
        if q.opcoes.len() != OPTION_COUNT {
            return Err(ProcessError::AiResponseMalformed {
                detail: format!(
                    "Question {} has {} options, expected {}",
                    i + 1,
                    q.opcoes.len(),
                    OPTION_COUNT
                ),
            });
        }

        if !q.opcoes.contains(&q.resposta_correta) {
            return Err(ProcessError::AiResponseMalformed {
                detail: format!("Question {} declares a correct answer not among its options", i + 1),
            });
        }

        quiz.push(NewQuestion {
            prompt: q.pergunta,
            options: q.opcoes,
            correct_answer: q.resposta_correta,
        });
    }

    Ok(quiz)
}

/// Models often wrap JSON in a Markdown code fence despite instructions.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
