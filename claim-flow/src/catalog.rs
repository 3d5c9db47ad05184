use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::answers::Answers;

/// Type alias for skip predicates. A question is asked only when its
/// predicate returns true for the answers collected so far.
pub type AskCondition = Arc<dyn Fn(&Answers) -> bool + Send + Sync>;

/// Field names of the standard FNOL catalog
pub mod fields {
    pub const POLICY_NUMBER: &str = "policyNumber";
    pub const CONTACT_NUMBER: &str = "contactNumber";
    pub const INCIDENT_DATE_TIME: &str = "incidentDateTime";
    pub const INCIDENT_TYPE: &str = "incidentType";
    pub const LOCATION: &str = "location";
    pub const WEATHER: &str = "weather";
    pub const POLICE_REPORT: &str = "policeReport";
    pub const POLICE_REPORT_NUMBER: &str = "policeReportNumber";
    pub const VEHICLE_DAMAGE: &str = "vehicleDamage";
    pub const DRIVEABLE: &str = "driveable";
    pub const TOWING_REQUIRED: &str = "towingRequired";
    pub const PHOTOS_TAKEN: &str = "photosTaken";
    pub const INJURIES: &str = "injuries";
    pub const DRIVER_NAME: &str = "driverName";
    pub const DRIVER_RELATION: &str = "driverRelation";
    pub const DRIVER_LICENSE_NUMBER: &str = "driverLicenseNumber";
    pub const DRIVING_EXPERIENCE: &str = "drivingExperience";
    pub const DRIVER_CONDITION: &str = "driverCondition";
    pub const CONSENT: &str = "consent";
}

/// How the caller should collect an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKind {
    FreeText,
    YesNo,
    SingleChoice(Vec<String>),
}

/// Wire name of an [`AnswerKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Yesno,
    Options,
}

impl AnswerKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            AnswerKind::FreeText => QuestionType::Text,
            AnswerKind::YesNo => QuestionType::Yesno,
            AnswerKind::SingleChoice(_) => QuestionType::Options,
        }
    }

    pub fn options(&self) -> &[String] {
        match self {
            AnswerKind::SingleChoice(options) => options,
            _ => &[],
        }
    }
}

#[derive(Clone)]
pub struct Question {
    id: String,
    ordinal: usize,
    field: String,
    prompt: String,
    kind: AnswerKind,
    condition: Option<AskCondition>,
    policy_lookup: bool,
    expects_datetime: bool,
}

impl Question {
    fn new(field: impl Into<String>, prompt: impl Into<String>, kind: AnswerKind) -> Self {
        Self {
            id: String::new(),
            ordinal: 0,
            field: field.into(),
            prompt: prompt.into(),
            kind,
            condition: None,
            policy_lookup: false,
            expects_datetime: false,
        }
    }

    pub fn text(field: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(field, prompt, AnswerKind::FreeText)
    }

    pub fn yes_no(field: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(field, prompt, AnswerKind::YesNo)
    }

    pub fn choice<I, S>(field: impl Into<String>, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.into_iter().map(Into::into).collect();
        Self::new(field, prompt, AnswerKind::SingleChoice(options))
    }

    /// Ask this question only when `condition` holds
    pub fn ask_when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Answers) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Ask this question only when `field` was answered Yes
    pub fn only_if_yes(self, field: &str) -> Self {
        let field = field.to_string();
        self.ask_when(move |answers| answers.is_yes(&field))
    }

    /// The answer is a policy number to look up
    pub fn with_policy_lookup(mut self) -> Self {
        self.policy_lookup = true;
        self
    }

    /// The free-text answer names a date and time
    pub fn expects_datetime(mut self) -> Self {
        self.expects_datetime = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 1-based position in the catalog
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn index(&self) -> usize {
        self.ordinal.saturating_sub(1)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn kind(&self) -> &AnswerKind {
        &self.kind
    }

    pub fn triggers_policy_lookup(&self) -> bool {
        self.policy_lookup
    }

    pub fn is_datetime(&self) -> bool {
        self.expects_datetime
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Whether this question is asked given the answers so far
    pub fn applies(&self, answers: &Answers) -> bool {
        self.condition.as_ref().is_none_or(|condition| condition(answers))
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("id", &self.id)
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("conditional", &self.is_conditional())
            .finish()
    }
}

/// Ordered, immutable list of intake questions. Shared across sessions.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// The 19-question motor FNOL form
    pub fn fnol() -> Self {
        use fields::*;

        Self::builder()
            .question(
                Question::text(POLICY_NUMBER, "Please provide your policy number.")
                    .with_policy_lookup(),
            )
            .question(Question::text(CONTACT_NUMBER, "What is your contact number?"))
            .question(
                Question::text(
                    INCIDENT_DATE_TIME,
                    "When did the incident occur? (Please provide date and time)",
                )
                .expects_datetime(),
            )
            .question(Question::choice(
                INCIDENT_TYPE,
                "What type of incident occurred?",
                [
                    "Collision",
                    "Single Vehicle Accident",
                    "Hit and Run",
                    "Theft",
                    "Vandalism",
                    "Other",
                ],
            ))
            .question(Question::text(
                LOCATION,
                "Where did the incident occur? (Please provide the location)",
            ))
            .question(Question::choice(
                WEATHER,
                "What was the weather condition at the time of incident?",
                ["Clear", "Rainy", "Snowy", "Foggy", "Windy", "Other"],
            ))
            .question(Question::yes_no(POLICE_REPORT, "Was a police report filed?"))
            .question(
                Question::text(POLICE_REPORT_NUMBER, "Please provide the police report number.")
                    .only_if_yes(POLICE_REPORT),
            )
            .question(Question::text(VEHICLE_DAMAGE, "Please describe the vehicle damage."))
            .question(Question::yes_no(DRIVEABLE, "Is the vehicle driveable?"))
            .question(Question::yes_no(TOWING_REQUIRED, "Is towing required?"))
            .question(Question::yes_no(PHOTOS_TAKEN, "Were photos taken of the incident?"))
            .question(Question::choice(
                INJURIES,
                "Were there any injuries?",
                ["No injuries", "Minor injuries", "Major injuries", "Fatalities"],
            ))
            .question(Question::text(DRIVER_NAME, "What is the driver's name?"))
            .question(Question::choice(
                DRIVER_RELATION,
                "What is the driver's relation to the policyholder?",
                ["Self", "Spouse", "Family Member", "Friend", "Other"],
            ))
            .question(Question::text(
                DRIVER_LICENSE_NUMBER,
                "What is the driver's license number?",
            ))
            .question(Question::choice(
                DRIVING_EXPERIENCE,
                "What is the driver's driving experience?",
                ["Less than 1 year", "1-3 years", "3-5 years", "5-10 years", "More than 10 years"],
            ))
            .question(Question::yes_no(
                DRIVER_CONDITION,
                "Was the driver in good physical and mental condition at the time of the incident?",
            ))
            .question(Question::yes_no(
                CONSENT,
                "Do you consent to the processing of this claim and authorize us to investigate?",
            ))
            .build()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// First question at or after `from_index` that applies to `answers`
    pub fn next_applicable(&self, answers: &Answers, from_index: usize) -> Option<&Question> {
        self.questions
            .iter()
            .skip(from_index)
            .find(|question| question.applies(answers))
    }

    /// Fields that are asked given `answers`, in catalog order
    pub fn applicable_fields<'a>(&'a self, answers: &'a Answers) -> impl Iterator<Item = &'a str> {
        self.questions
            .iter()
            .filter(move |question| question.applies(answers))
            .map(Question::field)
    }

    /// Applicable fields with no answer yet
    pub fn missing_fields(&self, answers: &Answers) -> Vec<String> {
        self.applicable_fields(answers)
            .filter(|field| !answers.contains(field))
            .map(str::to_string)
            .collect()
    }

    pub fn is_complete(&self, answers: &Answers) -> bool {
        self.missing_fields(answers).is_empty()
    }
}

/// Builder for creating catalogs. Assigns ordinals in insertion order.
#[derive(Default)]
pub struct CatalogBuilder {
    questions: Vec<Question>,
}

impl CatalogBuilder {
    pub fn question(mut self, mut question: Question) -> Self {
        question.ordinal = self.questions.len() + 1;
        question.id = format!("q{}", question.ordinal);
        self.questions.push(question);
        self
    }

    pub fn build(self) -> QuestionCatalog {
        QuestionCatalog {
            questions: self.questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fields::*;
    use super::*;
    use crate::answers::AnswerValue;

    #[test]
    fn test_fnol_catalog_shape() {
        let catalog = QuestionCatalog::fnol();
        assert_eq!(catalog.len(), 19);

        let first = catalog.get(0).unwrap();
        assert_eq!(first.field(), POLICY_NUMBER);
        assert_eq!(first.ordinal(), 1);
        assert_eq!(first.id(), "q1");
        assert!(first.triggers_policy_lookup());

        let last = catalog.get(18).unwrap();
        assert_eq!(last.field(), CONSENT);
        assert_eq!(last.kind().question_type(), QuestionType::Yesno);

        let conditional: Vec<&str> = catalog
            .iter()
            .filter(|q| q.is_conditional())
            .map(Question::field)
            .collect();
        assert_eq!(conditional, vec![POLICE_REPORT_NUMBER]);
    }

    #[test]
    fn test_police_report_number_skipped_on_no() {
        let catalog = QuestionCatalog::fnol();
        let mut answers = Answers::new();
        answers.insert(POLICE_REPORT, AnswerValue::YesNo(false));

        let next = catalog.next_applicable(&answers, 7).unwrap();
        assert_eq!(next.field(), VEHICLE_DAMAGE);

        answers.insert(POLICE_REPORT, AnswerValue::YesNo(true));
        let next = catalog.next_applicable(&answers, 7).unwrap();
        assert_eq!(next.field(), POLICE_REPORT_NUMBER);
    }

    #[test]
    fn test_next_applicable_exhausted() {
        let catalog = QuestionCatalog::fnol();
        assert!(catalog.next_applicable(&Answers::new(), 19).is_none());
    }

    #[test]
    fn test_missing_fields_respects_conditions() {
        let catalog = QuestionCatalog::builder()
            .question(Question::yes_no("a", "A?"))
            .question(Question::text("b", "B?").only_if_yes("a"))
            .build();

        let mut answers = Answers::new();
        answers.insert("a", AnswerValue::YesNo(false));
        assert!(catalog.is_complete(&answers));

        answers.insert("a", AnswerValue::YesNo(true));
        assert_eq!(catalog.missing_fields(&answers), vec!["b".to_string()]);
    }

    #[test]
    fn test_wire_question_types() {
        assert_eq!(serde_json::to_string(&QuestionType::Text).unwrap(), "\"text\"");
        assert_eq!(serde_json::to_string(&QuestionType::Yesno).unwrap(), "\"yesno\"");
        assert_eq!(serde_json::to_string(&QuestionType::Options).unwrap(), "\"options\"");
    }
}
