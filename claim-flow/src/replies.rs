use crate::normalizer::{contains_phrase, words};

pub const GREETING: &str =
    "Hello! I'm here to help you with your insurance needs. How can I assist you today?";

pub const INTAKE_INTRO: &str =
    "I'll help you file a claim. Let's get started with some information.";

pub const COMPLETED: &str =
    "Thank you! Your claim has been submitted successfully. We will process your claim shortly.";

pub const SAVE_FAILED: &str = "Sorry, we couldn't submit your claim just now. Your answers are safe. \
     Please send your last answer again to retry.";

pub const DEFAULT_REPLY: &str = "I understand. I'm here to help with your insurance needs. \
     Would you like to file a claim, or do you have other questions?";

/// Messages that just open the conversation
const OPENERS: &[&str] = &["start", "begin"];

struct CannedReply {
    topic: &'static str,
    phrases: &'static [&'static str],
    text: &'static str,
}

// Checked in order; the first topic with a matching phrase wins.
const CANNED: &[CannedReply] = &[
    CannedReply {
        topic: "greeting",
        phrases: &["hi", "hello", "hey", "good morning", "good afternoon", "good evening"],
        text: GREETING,
    },
    CannedReply {
        topic: "help",
        phrases: &["help", "what can you do", "what do you do"],
        text: "I can help you with various insurance services including filing claims, checking \
               policy information, and answering questions about coverage. What would you like to \
               know?",
    },
    CannedReply {
        topic: "insurance",
        phrases: &["what is insurance", "explain insurance", "insurance meaning"],
        text: "Insurance is a financial product that provides protection against financial loss. \
               It helps cover costs for unexpected events like accidents, theft, or damage. Would \
               you like to know more about your policies, or do you need to file a claim?",
    },
    CannedReply {
        topic: "policy",
        phrases: &["policy", "policies"],
        text: "You can view all your policies on the dashboard. I can help you file a claim for \
               any of your policies. Would you like to file a claim?",
    },
    CannedReply {
        topic: "coverage",
        phrases: &["coverage", "what is covered", "cover"],
        text: "Coverage details vary by policy type. You can see your coverage information in the \
               policy details on the dashboard. For specific coverage questions, please \
               contact our customer service team. Would you like to file a claim instead?",
    },
    CannedReply {
        topic: "billing",
        phrases: &["premium", "payment", "pay", "bill", "cost"],
        text: "You can see your premium information for each policy on the dashboard. For \
               payment-related questions, please contact our customer service team. Is there \
               anything else I can help with, or would you like to file a claim?",
    },
    CannedReply {
        topic: "question",
        phrases: &["question", "ask", "inquire", "want to know"],
        text: "I'm here to help! I can assist you with filing a claim, or you can ask me general \
               questions about insurance. What would you like to know?",
    },
];

/// Empty messages and bare openers get the greeting
pub fn is_opener(message: &str) -> bool {
    let message = message.trim();
    message.is_empty() || OPENERS.iter().any(|opener| message.eq_ignore_ascii_case(opener))
}

/// Canned reply for a small-talk message, with its topic
pub fn canned_reply(message: &str) -> Option<(&'static str, &'static str)> {
    let message_words = words(message);
    CANNED
        .iter()
        .find(|reply| {
            reply
                .phrases
                .iter()
                .any(|phrase| contains_phrase(&message_words, phrase))
        })
        .map(|reply| (reply.topic, reply.text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_topics() {
        assert_eq!(canned_reply("Hey!").map(|r| r.0), Some("greeting"));
        assert_eq!(canned_reply("what is insurance?").map(|r| r.0), Some("insurance"));
        assert_eq!(canned_reply("how much is my premium").map(|r| r.0), Some("billing"));
        // "this" must not read as "hi"
        assert_eq!(canned_reply("this and that"), None);
    }

    #[test]
    fn test_openers() {
        assert!(is_opener("   "));
        assert!(is_opener("Start"));
        assert!(!is_opener("start a claim"));
    }
}
