//! Turning raw user text into typed answers.
//!
//! [`Normalizer`] is the seam between the flow controller and whatever
//! understands language. [`RuleNormalizer`] is deterministic and needs no
//! network; the LLM-backed implementation (feature `rig`) builds on it.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

use crate::answers::AnswerValue;
use crate::catalog::{AnswerKind, Question};
use crate::error::NormalizationFailure;

/// Words that signal the user wants to file a claim
pub const CLAIM_KEYWORDS: &[&str] = &[
    "claim",
    "accident",
    "incident",
    "crash",
    "collision",
    "file a claim",
    "report",
    "damage",
    "loss",
];

const YES_WORDS: &[&str] = &[
    "yes", "y", "true", "1", "yeah", "yep", "yup", "sure", "ok", "okay", "correct",
];
const NO_WORDS: &[&str] = &["no", "n", "false", "0", "nope", "nah", "not", "never"];

static TIME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b\d{1,2}:\d{2}\s*(am|pm)\b",
        r"\b\d{1,2}:\d{2}\b",
        r"(?i)\b\d{1,2}\s*(am|pm)\b",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// What a conversational message is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    FileClaim,
    Chat,
}

/// Capability that interprets user text. The flow controller never calls a
/// model directly; everything goes through this trait.
#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Convert `raw` into a value for `question`, or explain why not
    async fn normalize(
        &self,
        raw: &str,
        question: &Question,
    ) -> Result<AnswerValue, NormalizationFailure>;

    /// Decide whether a conversational message asks to start a claim
    async fn classify(&self, message: &str) -> Intent {
        classify_intent(message)
    }

    /// Optional free-form reply to small talk
    async fn converse(&self, _message: &str) -> Option<String> {
        None
    }
}

/// Lowercased alphanumeric words of `text`
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `phrase` occurs as a run of whole words in `haystack`.
/// The last word may carry a plural "s" or "es".
pub fn contains_phrase(haystack: &[String], phrase: &str) -> bool {
    let needle = words(phrase);
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    let last = needle.len() - 1;
    haystack.windows(needle.len()).any(|window| {
        window
            .iter()
            .zip(&needle)
            .enumerate()
            .all(|(i, (word, want))| word == want || (i == last && is_plural_of(word, want)))
    })
}

fn is_plural_of(word: &str, singular: &str) -> bool {
    word.strip_suffix("es") == Some(singular) || word.strip_suffix('s') == Some(singular)
}

pub fn classify_intent(message: &str) -> Intent {
    let message_words = words(message);
    if CLAIM_KEYWORDS
        .iter()
        .any(|keyword| contains_phrase(&message_words, keyword))
    {
        Intent::FileClaim
    } else {
        Intent::Chat
    }
}

pub fn normalize_yes_no(raw: &str) -> Result<bool, NormalizationFailure> {
    let answer_words = words(raw);
    if answer_words.is_empty() {
        return Err(NormalizationFailure::Empty);
    }
    let has = |list: &[&str]| answer_words.iter().any(|word| list.contains(&word.as_str()));
    match (has(YES_WORDS), has(NO_WORDS)) {
        (true, false) => Ok(true),
        (false, true) => Ok(false),
        _ => Err(NormalizationFailure::Unintelligible),
    }
}

/// Match `raw` against `options`: exact, then an option named inside the
/// answer (longest wins), then the single option containing every word of
/// the answer.
pub fn normalize_choice(raw: &str, options: &[String]) -> Result<String, NormalizationFailure> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(NormalizationFailure::Empty);
    }

    if let Some(option) = options.iter().find(|option| option.eq_ignore_ascii_case(raw)) {
        return Ok(option.clone());
    }

    let answer_words = words(raw);
    if let Some(option) = options
        .iter()
        .filter(|option| contains_phrase(&answer_words, option))
        .max_by_key(|option| option.len())
    {
        return Ok(option.clone());
    }

    if !answer_words.is_empty() {
        let candidates: Vec<&String> = options
            .iter()
            .filter(|option| {
                let option_words = words(option);
                answer_words.iter().all(|word| option_words.contains(word))
            })
            .collect();
        if let [only] = candidates.as_slice() {
            return Ok((*only).clone());
        }
    }

    Err(NormalizationFailure::NotAnOption)
}

/// First time-of-day expression in `raw`, as written
pub fn extract_time(raw: &str) -> Option<String> {
    TIME_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(raw))
        .map(|found| found.as_str().to_string())
}

/// Resolve "yesterday", "today" and "tomorrow" against `now`
pub fn resolve_relative_date(raw: &str, now: NaiveDateTime) -> Option<String> {
    let answer_words = words(raw);
    let offset = if answer_words.iter().any(|w| w == "yesterday") {
        -1
    } else if answer_words.iter().any(|w| w == "today") {
        0
    } else if answer_words.iter().any(|w| w == "tomorrow") {
        1
    } else {
        return None;
    };

    let day = now + Duration::days(offset);
    let time = extract_time(raw).unwrap_or_else(|| now.format("%H:%M").to_string());
    Some(format!("{} {}", day.format("%Y-%m-%d"), time))
}

/// Keyword and pattern based normalizer. Deterministic and offline.
#[derive(Debug, Clone, Default)]
pub struct RuleNormalizer {
    fixed_now: Option<NaiveDateTime>,
}

impl RuleNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative dates against `now` instead of the local clock
    pub fn with_fixed_now(now: NaiveDateTime) -> Self {
        Self {
            fixed_now: Some(now),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.fixed_now
            .unwrap_or_else(|| Local::now().naive_local())
    }

    pub fn normalize_sync(
        &self,
        raw: &str,
        question: &Question,
    ) -> Result<AnswerValue, NormalizationFailure> {
        if raw.trim().is_empty() {
            return Err(NormalizationFailure::Empty);
        }
        match question.kind() {
            AnswerKind::YesNo => normalize_yes_no(raw).map(AnswerValue::YesNo),
            AnswerKind::SingleChoice(options) => {
                normalize_choice(raw, options).map(AnswerValue::Choice)
            }
            AnswerKind::FreeText => {
                let text = if question.is_datetime() {
                    resolve_relative_date(raw, self.now())
                        .unwrap_or_else(|| raw.trim().to_string())
                } else {
                    raw.trim().to_string()
                };
                Ok(AnswerValue::Text(text))
            }
        }
    }
}

#[async_trait]
impl Normalizer for RuleNormalizer {
    async fn normalize(
        &self,
        raw: &str,
        question: &Question,
    ) -> Result<AnswerValue, NormalizationFailure> {
        self.normalize_sync(raw, question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{QuestionCatalog, fields};
    use chrono::NaiveDate;

    fn question(field: &str) -> Question {
        QuestionCatalog::fnol()
            .iter()
            .find(|q| q.field() == field)
            .cloned()
            .unwrap()
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    #[test]
    fn test_claim_intent_whole_words() {
        assert_eq!(classify_intent("I had a car accident"), Intent::FileClaim);
        assert_eq!(classify_intent("I want to FILE A CLAIM"), Intent::FileClaim);
        assert_eq!(classify_intent("two crashes this week"), Intent::FileClaim);
        assert_eq!(classify_intent("hello there"), Intent::Chat);
        // "lossless" is not "loss"
        assert_eq!(classify_intent("lossless audio"), Intent::Chat);
    }

    #[test]
    fn test_yes_no() {
        assert_eq!(normalize_yes_no("Yes"), Ok(true));
        assert_eq!(normalize_yes_no("yeah, it was"), Ok(true));
        assert_eq!(normalize_yes_no("Nope"), Ok(false));
        assert_eq!(normalize_yes_no("no it wasn't"), Ok(false));
        assert_eq!(
            normalize_yes_no("not sure"),
            Err(NormalizationFailure::Unintelligible)
        );
        assert_eq!(
            normalize_yes_no("banana"),
            Err(NormalizationFailure::Unintelligible)
        );
        // "yesterday" is not a yes
        assert_eq!(
            normalize_yes_no("yesterday"),
            Err(NormalizationFailure::Unintelligible)
        );
    }

    #[test]
    fn test_choice_matching() {
        let injuries = question(fields::INJURIES);
        let options = injuries.kind().options();

        assert_eq!(normalize_choice("minor injuries", options).unwrap(), "Minor injuries");
        assert_eq!(normalize_choice("no", options).unwrap(), "No injuries");
        assert_eq!(
            normalize_choice("there were major injuries sadly", options).unwrap(),
            "Major injuries"
        );
        assert_eq!(
            normalize_choice("purple", options),
            Err(NormalizationFailure::NotAnOption)
        );
        // "injuries" alone fits three options
        assert_eq!(
            normalize_choice("injuries", options),
            Err(NormalizationFailure::NotAnOption)
        );
    }

    #[test]
    fn test_choice_prefers_longest_named_option() {
        let incident = question(fields::INCIDENT_TYPE);
        assert_eq!(
            normalize_choice("it was a hit and run", incident.kind().options()).unwrap(),
            "Hit and Run"
        );
    }

    #[test]
    fn test_relative_dates() {
        let now = fixed_now();
        assert_eq!(
            resolve_relative_date("yesterday at 2:30 PM", now).as_deref(),
            Some("2026-10-15 2:30 PM")
        );
        assert_eq!(
            resolve_relative_date("today", now).as_deref(),
            Some("2026-10-16 09:15")
        );
        assert_eq!(
            resolve_relative_date("tomorrow 5pm", now).as_deref(),
            Some("2026-10-17 5pm")
        );
        assert_eq!(resolve_relative_date("March 3rd", now), None);
    }

    #[tokio::test]
    async fn test_rule_normalizer_by_kind() {
        let normalizer = RuleNormalizer::with_fixed_now(fixed_now());

        let value = normalizer
            .normalize("  yesterday 14:00 ", &question(fields::INCIDENT_DATE_TIME))
            .await
            .unwrap();
        assert_eq!(value, AnswerValue::Text("2026-10-15 14:00".into()));

        let value = normalizer
            .normalize("  555-0100 ", &question(fields::CONTACT_NUMBER))
            .await
            .unwrap();
        assert_eq!(value, AnswerValue::Text("555-0100".into()));

        let err = normalizer
            .normalize("   ", &question(fields::POLICE_REPORT))
            .await
            .unwrap_err();
        assert_eq!(err, NormalizationFailure::Empty);
    }
}
