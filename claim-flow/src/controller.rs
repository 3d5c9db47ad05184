//! The conversation state machine.
//!
//! ```text
//! Idle ──first message──▶ Conversational ──claim trigger──▶ Intake(i) ──last answer saved──▶ Completed
//!                              ▲                              │  ▲                               │
//!                              │                              └──┘ bad answer / next question    │
//!                              └──────────────────── "reset" (from any stage) ◀──────────────────┘
//! ```
//!
//! One call to [`FlowController::step`] consumes one user message and
//! produces one [`Turn`]. The controller only mutates the session it is
//! handed; loading and saving sessions is the caller's job (see
//! [`crate::runner::FlowRunner`]).

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::{
    answers::AnswerValue,
    catalog::{AnswerKind, Question, QuestionCatalog},
    error::{FlowError, LookupError, NormalizationFailure, Result},
    normalizer::{Intent, Normalizer, classify_intent},
    policy::PolicyLookup,
    recorder::{ClaimRecord, ClaimRecorder},
    replies::{self, canned_reply, is_opener},
    state::Stage,
    storage::{Session, UserProfile},
    turn::{PromptId, Turn},
};

/// Message that discards the current conversation
pub const RESET_COMMAND: &str = "reset";

pub fn is_reset(message: &str) -> bool {
    message.trim().eq_ignore_ascii_case(RESET_COMMAND)
}

/// Bounds on the two calls that may wait on the network
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub normalizer: Duration,
    pub policy_lookup: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            normalizer: Duration::from_secs(8),
            policy_lookup: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct FlowController {
    catalog: Arc<QuestionCatalog>,
    normalizer: Arc<dyn Normalizer>,
    policies: Arc<dyn PolicyLookup>,
    recorder: Arc<dyn ClaimRecorder>,
    timeouts: Timeouts,
}

impl FlowController {
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        normalizer: Arc<dyn Normalizer>,
        policies: Arc<dyn PolicyLookup>,
        recorder: Arc<dyn ClaimRecorder>,
    ) -> Self {
        Self {
            catalog,
            normalizer,
            policies,
            recorder,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Consume one user message and advance the session's conversation
    pub async fn step(&self, session: &mut Session, message: &str) -> Result<Turn> {
        if is_reset(message) {
            info!(session_id = %session.id, "conversation reset");
            session.state.reset();
            return Ok(session.state.emit(greeting()));
        }

        if session.state.is_completed() {
            // A finished claim is not resumed; anything but "reset" starts over.
            debug!(session_id = %session.id, "starting a new conversation after completion");
            session.state.reset();
        }

        session.state.record_user(message);

        let turn = match session.state.stage() {
            Stage::Idle => self.first_contact(session, message).await?,
            Stage::Conversational | Stage::Completed => self.converse(session, message).await?,
            Stage::Intake(index) => self.answer(session, index, message).await?,
        };

        debug!(
            session_id = %session.id,
            stage = ?session.state.stage(),
            prompt = %turn.prompt_id.as_str(),
            completed = turn.completed,
            "turn produced"
        );
        Ok(session.state.emit(turn))
    }

    async fn first_contact(&self, session: &mut Session, message: &str) -> Result<Turn> {
        session.state.set_stage(Stage::Conversational);
        if self.classify(message).await == Intent::FileClaim {
            return self.begin_intake(session);
        }
        Ok(greeting())
    }

    async fn converse(&self, session: &mut Session, message: &str) -> Result<Turn> {
        session.state.set_stage(Stage::Conversational);

        if is_opener(message) {
            return Ok(greeting());
        }
        if self.classify(message).await == Intent::FileClaim {
            return self.begin_intake(session);
        }
        if let Some((topic, text)) = canned_reply(message) {
            return Ok(Turn::reply(text, PromptId::reply(topic)));
        }

        match timeout(self.timeouts.normalizer, self.normalizer.converse(message)).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                let prompt_id = PromptId::free_form(&text);
                Ok(Turn::reply(text, prompt_id))
            }
            Ok(_) => Ok(Turn::reply(replies::DEFAULT_REPLY, PromptId::reply("default"))),
            Err(_) => {
                warn!(session_id = %session.id, "conversational reply timed out");
                Ok(Turn::reply(replies::DEFAULT_REPLY, PromptId::reply("default")))
            }
        }
    }

    async fn classify(&self, message: &str) -> Intent {
        timeout(self.timeouts.normalizer, self.normalizer.classify(message))
            .await
            .unwrap_or_else(|_| classify_intent(message))
    }

    fn begin_intake(&self, session: &mut Session) -> Result<Turn> {
        let question = self
            .catalog
            .next_applicable(session.state.answers(), 0)
            .ok_or_else(|| FlowError::InvalidState("question catalog is empty".to_string()))?;

        session.state.set_stage(Stage::Intake(question.index()));
        info!(session_id = %session.id, field = %question.field(), "claim intake started");

        Ok(Turn::new(
            format!("{}\n\n{}", replies::INTAKE_INTRO, question.prompt()),
            question.kind().clone(),
            PromptId::intake_intro(question.field()),
        ))
    }

    async fn answer(&self, session: &mut Session, index: usize, message: &str) -> Result<Turn> {
        let question = self
            .catalog
            .get(index)
            .ok_or_else(|| FlowError::InvalidState(format!("no question at index {index}")))?;

        let value = match self.normalize(message, question).await {
            Ok(value) => value,
            Err(failure) => {
                debug!(
                    session_id = %session.id,
                    field = %question.field(),
                    reason = %failure,
                    "answer not accepted"
                );
                return Ok(clarify(question, &failure));
            }
        };

        let note = if question.triggers_policy_lookup() {
            Some(self.policy_note(&session.user, &value).await)
        } else {
            None
        };

        session.state.answers_mut().insert(question.field(), value);

        match self.catalog.next_applicable(session.state.answers(), index + 1) {
            Some(next) => {
                session.state.set_stage(Stage::Intake(next.index()));
                Ok(ask(next, note))
            }
            None => self.finish(session, question).await,
        }
    }

    async fn normalize(
        &self,
        message: &str,
        question: &Question,
    ) -> std::result::Result<AnswerValue, NormalizationFailure> {
        if message.trim().is_empty() {
            return Err(NormalizationFailure::Empty);
        }
        match timeout(
            self.timeouts.normalizer,
            self.normalizer.normalize(message, question),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(field = %question.field(), "normalizer timed out");
                Err(NormalizationFailure::TimedOut)
            }
        }
    }

    /// Informational note about the named policy. Never blocks intake.
    async fn policy_note(&self, user: &UserProfile, value: &AnswerValue) -> String {
        let number = value.to_string();
        let lookup = timeout(self.timeouts.policy_lookup, self.policies.find(user, &number))
            .await
            .unwrap_or(Err(LookupError::TimedOut));

        match lookup {
            Ok(Some(policy)) => {
                format!("✓ Policy Found: {}\n{}", policy.policy_number, policy.summary())
            }
            Ok(None) => format!(
                "I couldn't find a policy matching '{number}'. \
                 We'll continue with your claim and verify the policy later."
            ),
            Err(e) => {
                warn!(error = %e, "policy lookup unavailable");
                format!(
                    "I couldn't check policy '{number}' right now. We'll continue with your claim."
                )
            }
        }
    }

    async fn finish(&self, session: &mut Session, last: &Question) -> Result<Turn> {
        let missing = self.catalog.missing_fields(session.state.answers());
        if !missing.is_empty() {
            return Err(FlowError::IncompleteClaim(missing));
        }

        let record = ClaimRecord::new(
            session.user.clone(),
            Utc::now(),
            session.state.answers().clone(),
        );

        match self.recorder.save(&record).await {
            Ok(()) => {
                session.state.set_stage(Stage::Completed);
                info!(
                    session_id = %session.id,
                    user = %session.user.email,
                    fields = record.fnol_data.len(),
                    "claim submitted"
                );
                Ok(Turn::completion(replies::COMPLETED))
            }
            Err(e) => {
                // Stay on the last question so the next answer retries the save.
                error!(session_id = %session.id, error = %e, "failed to persist claim");
                Ok(Turn::new(
                    format!("{}\n\n{}", replies::SAVE_FAILED, last.prompt()),
                    last.kind().clone(),
                    PromptId::save_failed(last.field()),
                ))
            }
        }
    }
}

fn greeting() -> Turn {
    Turn::reply(replies::GREETING, PromptId::greeting())
}

fn ask(question: &Question, note: Option<String>) -> Turn {
    match note {
        Some(note) => Turn::new(
            format!("{note}\n\n{}", question.prompt()),
            question.kind().clone(),
            PromptId::annotated(question.field(), &note),
        ),
        None => Turn::new(
            question.prompt(),
            question.kind().clone(),
            PromptId::question(question.field()),
        ),
    }
}

fn clarify(question: &Question, failure: &NormalizationFailure) -> Turn {
    let (reason, note) = match (failure, question.kind()) {
        (NormalizationFailure::Empty, _) => ("empty", "I didn't catch an answer."),
        (NormalizationFailure::NotAnOption, _)
        | (NormalizationFailure::Unintelligible, AnswerKind::SingleChoice(_)) => {
            ("option", "Please choose one of the listed options.")
        }
        (NormalizationFailure::Unintelligible, AnswerKind::YesNo) => {
            ("yesno", "Please answer Yes or No.")
        }
        (NormalizationFailure::Unintelligible, AnswerKind::FreeText) => {
            ("unclear", "I couldn't understand that answer.")
        }
        (NormalizationFailure::TimedOut | NormalizationFailure::Upstream(_), _) => {
            ("unavailable", "I couldn't process that answer just now.")
        }
    };

    Turn::new(
        format!("Please provide a valid answer. {note}\n\n{}", question.prompt()),
        question.kind().clone(),
        PromptId::clarify(question.field(), reason),
    )
}
