use serde::{Deserialize, Serialize};

use crate::catalog::{AnswerKind, QuestionType};

/// Stable identity of a bot prompt. Two turns with the same id carry the
/// same text, so callers can collapse them in a running transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptId(String);

impl PromptId {
    pub fn greeting() -> Self {
        Self("greeting".to_string())
    }

    pub fn intake_intro(field: &str) -> Self {
        Self(format!("intro:{field}"))
    }

    pub fn question(field: &str) -> Self {
        Self(format!("question:{field}"))
    }

    /// A question asked again after an answer it could not use
    pub fn clarify(field: &str, reason: &str) -> Self {
        Self(format!("clarify:{field}:{reason}"))
    }

    /// A question preceded by the outcome of a policy lookup
    pub fn annotated(field: &str, note: &str) -> Self {
        Self(format!("question:{field}:{note}"))
    }

    pub fn reply(topic: &str) -> Self {
        Self(format!("reply:{topic}"))
    }

    /// Identity of text with no fixed topic, such as a model reply
    pub fn free_form(text: &str) -> Self {
        Self(format!("text:{text}"))
    }

    pub fn save_failed(field: &str) -> Self {
        Self(format!("save_failed:{field}"))
    }

    pub fn completed() -> Self {
        Self("completed".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of one conversation turn
#[derive(Debug, Clone)]
pub struct Turn {
    /// Text to show the user
    pub text: String,
    /// How the user is expected to answer next
    pub kind: AnswerKind,
    /// The claim was persisted during this turn
    pub completed: bool,
    pub prompt_id: PromptId,
    /// Same prompt identity as the previous bot turn of this session
    pub repeated: bool,
}

impl Turn {
    pub fn new(text: impl Into<String>, kind: AnswerKind, prompt_id: PromptId) -> Self {
        Self {
            text: text.into(),
            kind,
            completed: false,
            prompt_id,
            repeated: false,
        }
    }

    /// Plain text reply expecting free text back
    pub fn reply(text: impl Into<String>, prompt_id: PromptId) -> Self {
        Self::new(text, AnswerKind::FreeText, prompt_id)
    }

    pub fn completion(text: impl Into<String>) -> Self {
        Self {
            completed: true,
            ..Self::reply(text, PromptId::completed())
        }
    }

    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    pub fn options(&self) -> &[String] {
        self.kind.options()
    }
}
