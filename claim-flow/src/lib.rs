pub mod answers;
pub mod catalog;
pub mod controller;
pub mod error;
#[cfg(feature = "rig")]
pub mod llm;
pub mod normalizer;
pub mod policy;
pub mod recorder;
pub mod recorder_postgres;
pub mod replies;
pub mod runner;
pub mod state;
pub mod storage;
pub mod turn;

// Re-export commonly used types
pub use answers::{AnswerValue, Answers};
pub use catalog::{AnswerKind, Question, QuestionCatalog, QuestionType, fields};
pub use controller::{FlowController, RESET_COMMAND, Timeouts};
pub use error::{FlowError, LookupError, NormalizationFailure, RecordError, Result};
#[cfg(feature = "rig")]
pub use llm::LlmNormalizer;
pub use normalizer::{Intent, Normalizer, RuleNormalizer};
pub use policy::{InMemoryPolicyDirectory, Policy, PolicyLookup};
pub use recorder::{ClaimRecord, ClaimRecorder, InMemoryClaimRecorder, JsonLinesClaimRecorder};
pub use recorder_postgres::PostgresClaimRecorder;
pub use runner::FlowRunner;
pub use state::{ConversationState, Stage};
pub use storage::{InMemorySessionStore, Session, SessionStore, UserProfile};
pub use turn::{PromptId, Turn};
