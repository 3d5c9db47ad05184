use serde::Serialize;

use crate::answers::Answers;
use crate::turn::{PromptId, Turn};

/// Default cap on transcript lines kept per session
pub const MAX_TRANSCRIPT_LINES: usize = 100;

/// Where a session is in the dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "stage", content = "question", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Conversational,
    /// Waiting for the answer to the question at this catalog index
    Intake(usize),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

/// Per-session dialogue state. Only the flow controller mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    stage: Stage,
    answers: Answers,
    transcript: Vec<TranscriptLine>,
    #[serde(skip)]
    last_prompt: Option<PromptId>,
    #[serde(skip)]
    max_transcript_lines: usize,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::with_max_transcript_lines(MAX_TRANSCRIPT_LINES)
    }

    pub fn with_max_transcript_lines(max: usize) -> Self {
        Self {
            stage: Stage::Idle,
            answers: Answers::new(),
            transcript: Vec::new(),
            last_prompt: None,
            max_transcript_lines: max,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    /// Catalog index of the question waiting for an answer
    pub fn pending_question(&self) -> Option<usize> {
        match self.stage {
            Stage::Intake(index) => Some(index),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.stage == Stage::Completed
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub(crate) fn answers_mut(&mut self) -> &mut Answers {
        &mut self.answers
    }

    /// Drop answers, transcript and progress; the next turn starts a new conversation
    pub(crate) fn reset(&mut self) {
        self.stage = Stage::Conversational;
        self.answers.clear();
        self.transcript.clear();
        self.last_prompt = None;
    }

    pub(crate) fn record_user(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.push_line(Speaker::User, text.to_string());
        }
    }

    /// Stamp `turn` as repeated when its prompt equals the previous bot
    /// prompt, and log it unless the transcript already ends with that text.
    pub(crate) fn emit(&mut self, mut turn: Turn) -> Turn {
        turn.repeated = self.last_prompt.as_ref() == Some(&turn.prompt_id);
        self.last_prompt = Some(turn.prompt_id.clone());

        let duplicate = self
            .transcript
            .last()
            .is_some_and(|line| line.speaker == Speaker::Bot && line.text == turn.text);
        if !duplicate {
            self.push_line(Speaker::Bot, turn.text.clone());
        }
        turn
    }

    fn push_line(&mut self, speaker: Speaker, text: String) {
        self.transcript.push(TranscriptLine { speaker, text });
        if self.transcript.len() > self.max_transcript_lines {
            let overflow = self.transcript.len() - self.max_transcript_lines;
            self.transcript.drain(..overflow);
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
