//! LLM-backed normalizer on top of the rule normalizer.
//!
//! Rules run first. The model is only asked when the rules cannot settle an
//! answer: fuzzy yes/no, an option described in other words, or a date the
//! rules cannot resolve. Its reply is checked against the same rules, so a
//! model can never produce a value outside the question's allowed set.

use async_trait::async_trait;
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use tracing::{debug, warn};

use crate::answers::AnswerValue;
use crate::catalog::{AnswerKind, Question};
use crate::error::NormalizationFailure;
use crate::normalizer::{
    Normalizer, RuleNormalizer, normalize_choice, normalize_yes_no, resolve_relative_date,
};

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const NORMALIZER_PROMPT: &str = r#"You convert free-form answers from an insurance claim form into exact values.
You are given a question, the allowed answers when there are any, and what the user typed.
Reply with the value only. No explanation, no punctuation around it.
If the answer cannot be mapped, reply with UNCLEAR."#;

const CHAT_PROMPT: &str = r#"You are a friendly insurance assistant for a claims portal.
Answer general insurance questions in at most three short sentences.
Never invent policy details. If the user describes an accident or loss, suggest filing a claim."#;

/// Replies this short are treated as no reply
const MIN_REPLY_LEN: usize = 10;

pub fn get_llm_agent(
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Agent<openrouter::CompletionModel> {
    let client = openrouter::Client::new(api_key);
    client.agent(model).preamble(prompt).build()
}

pub struct LlmNormalizer {
    rules: RuleNormalizer,
    normalizer: Agent<openrouter::CompletionModel>,
    chat: Agent<openrouter::CompletionModel>,
}

impl LlmNormalizer {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            rules: RuleNormalizer::new(),
            normalizer: get_llm_agent(api_key, model, NORMALIZER_PROMPT),
            chat: get_llm_agent(api_key, model, CHAT_PROMPT),
        }
    }

    async fn ask(&self, prompt: String) -> Result<String, NormalizationFailure> {
        let reply = self
            .normalizer
            .prompt(prompt.as_str())
            .await
            .map_err(|e| NormalizationFailure::Upstream(e.to_string()))?;
        debug!(reply = %reply, "normalizer model replied");
        Ok(reply.trim().trim_matches('"').to_string())
    }

    async fn yes_no(
        &self,
        raw: &str,
        question: &Question,
    ) -> Result<AnswerValue, NormalizationFailure> {
        let reply = self
            .ask(format!(
                "Question: {}\nAllowed answers: Yes, No\nUser answer: {raw}",
                question.prompt()
            ))
            .await?;
        normalize_yes_no(&reply).map(AnswerValue::YesNo)
    }

    async fn choice(
        &self,
        raw: &str,
        question: &Question,
        options: &[String],
    ) -> Result<AnswerValue, NormalizationFailure> {
        let reply = self
            .ask(format!(
                "Question: {}\nAllowed answers: {}\nUser answer: {raw}",
                question.prompt(),
                options.join(", ")
            ))
            .await?;
        // Only an exact option name is accepted back
        options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(&reply))
            .cloned()
            .map(AnswerValue::Choice)
            .ok_or(NormalizationFailure::NotAnOption)
    }

    async fn date_time(&self, raw: &str) -> Result<AnswerValue, NormalizationFailure> {
        let now = self.rules.now();
        if let Some(resolved) = resolve_relative_date(raw, now) {
            return Ok(AnswerValue::Text(resolved));
        }

        let reply = self
            .ask(format!(
                "Today is {}. Convert the user's description of when something happened into \
                 YYYY-MM-DD HH:MM, leaving out the time if none is given.\nUser answer: {raw}",
                now.format("%Y-%m-%d %A")
            ))
            .await?;
        if reply.is_empty() || reply.eq_ignore_ascii_case("UNCLEAR") {
            return Ok(AnswerValue::Text(raw.trim().to_string()));
        }
        Ok(AnswerValue::Text(reply))
    }
}

#[async_trait]
impl Normalizer for LlmNormalizer {
    async fn normalize(
        &self,
        raw: &str,
        question: &Question,
    ) -> Result<AnswerValue, NormalizationFailure> {
        if raw.trim().is_empty() {
            return Err(NormalizationFailure::Empty);
        }

        match question.kind() {
            AnswerKind::YesNo => match normalize_yes_no(raw) {
                Ok(value) => Ok(AnswerValue::YesNo(value)),
                Err(_) => self.yes_no(raw, question).await,
            },
            AnswerKind::SingleChoice(options) => match normalize_choice(raw, options) {
                Ok(option) => Ok(AnswerValue::Choice(option)),
                Err(_) => self.choice(raw, question, options).await,
            },
            AnswerKind::FreeText if question.is_datetime() => self.date_time(raw).await,
            AnswerKind::FreeText => self.rules.normalize_sync(raw, question),
        }
    }

    async fn converse(&self, message: &str) -> Option<String> {
        match self.chat.prompt(message).await {
            Ok(reply) if reply.trim().len() > MIN_REPLY_LEN => Some(reply.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "conversational model call failed");
                None
            }
        }
    }
}
