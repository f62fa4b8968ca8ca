//! Data models for the form builder
//!
//! This module defines the survey entities (forms, questions, options and
//! responses) together with the request payloads accepted by the HTTP API.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

/// Rating scale used when a question does not declare a usable `maxRating`
pub const DEFAULT_MAX_RATING: u32 = 5;

/// Largest accepted rating scale; larger values are capped
pub const MAX_RATING: u32 = 10;

/// Title given to a blank form
pub const UNTITLED_FORM: &str = "未命名表单";

/// Generates an identifier made of `prefix` followed by `len` random alphanumeric characters
///
/// Forms use `f_` + 10, questions `q_` + 8, options `o_` + 6 and responses `r_` + 12.
pub fn generate_id(prefix: &str, len: usize) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn new_form_id() -> String {
    generate_id("f_", 10)
}

pub fn new_question_id() -> String {
    generate_id("q_", 8)
}

pub fn new_option_id() -> String {
    generate_id("o_", 6)
}

/// The four supported kinds of survey question
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Single choice
    Radio,
    /// Multiple choice
    Checkbox,
    /// Free text
    Text,
    /// Numeric score from 1 to `maxRating`
    Rating,
}

impl QuestionType {
    /// Maps a loosely spelled type name onto a question type
    ///
    /// Accepts the canonical names plus the synonyms `single`, `multiple`,
    /// `input` and `score`, case-insensitively. Anything else is `Text`.
    pub fn from_loose(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "radio" | "single" => QuestionType::Radio,
            "checkbox" | "multiple" => QuestionType::Checkbox,
            "rating" | "score" => QuestionType::Rating,
            _ => QuestionType::Text,
        }
    }

    /// Whether questions of this type carry a list of options
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::Radio | QuestionType::Checkbox)
    }

    fn default_title(self) -> &'static str {
        match self {
            QuestionType::Radio => "单选题",
            QuestionType::Checkbox => "多选题",
            QuestionType::Text => "文本题",
            QuestionType::Rating => "评分题",
        }
    }
}

/// One selectable choice of a radio or checkbox question
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
}

impl QuestionOption {
    /// Creates an option with a freshly generated id
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: new_option_id(),
            label: label.into(),
        }
    }
}

/// A single survey item
///
/// Only the fields relevant to `kind` are populated: `options` for choice
/// questions, `placeholder` for text and `max_rating` for rating questions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: QuestionType,

    pub title: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuestionOption>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(rename = "maxRating", default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<u32>,
}

impl Question {
    /// Builds the question the editor inserts for a given type
    ///
    /// Choice questions get two placeholder options, text questions a
    /// placeholder and rating questions a five point scale.
    pub fn default_for(kind: QuestionType) -> Self {
        let mut question = Self {
            id: new_question_id(),
            kind,
            title: kind.default_title().to_string(),
            required: false,
            options: None,
            placeholder: None,
            max_rating: None,
        };
        question.fill_type_defaults("请输入您的回答...", ["选项 1", "选项 2"]);
        question
    }

    /// Effective rating scale, falling back to [`DEFAULT_MAX_RATING`] and
    /// capped at [`MAX_RATING`]
    pub fn max_rating(&self) -> u32 {
        self.max_rating
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_MAX_RATING)
            .min(MAX_RATING)
    }

    /// Gives a fresh id to every option that repeats an earlier option's id
    pub fn dedupe_option_ids(&mut self) {
        if let Some(options) = self.options.as_mut() {
            let mut seen = HashSet::new();
            for option in options.iter_mut() {
                while !seen.insert(option.id.clone()) {
                    option.id = new_option_id();
                }
            }
        }
    }

    /// Declared options, empty for non-choice questions
    pub fn options(&self) -> &[QuestionOption] {
        self.options.as_deref().unwrap_or_default()
    }

    pub fn option_label(&self, option_id: &str) -> Option<&str> {
        self.options()
            .iter()
            .find(|option| option.id == option_id)
            .map(|option| option.label.as_str())
    }

    /// Checks the per-type shape invariants
    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            QuestionType::Radio | QuestionType::Checkbox => self.options().len() >= 2,
            QuestionType::Text => self.placeholder.is_some(),
            QuestionType::Rating => self.max_rating.is_some_and(|max| max > 0),
        }
    }

    /// Changes the question type, dropping fields the new type does not use
    /// and filling in the defaults it needs
    pub fn retype(&mut self, kind: QuestionType) {
        if self.kind == kind {
            return;
        }
        self.kind = kind;
        if !kind.is_choice() {
            self.options = None;
        }
        if kind != QuestionType::Text {
            self.placeholder = None;
        }
        if kind != QuestionType::Rating {
            self.max_rating = None;
        }
        self.fill_type_defaults("请输入您的回答...", ["选项 1", "选项 2"]);
    }

    /// Fills in whatever the current type requires but is missing
    pub(crate) fn fill_type_defaults(&mut self, placeholder: &str, option_labels: [&str; 2]) {
        match self.kind {
            QuestionType::Radio | QuestionType::Checkbox => {
                if self.options().len() < 2 {
                    self.options = Some(option_labels.map(QuestionOption::new).to_vec());
                }
            }
            QuestionType::Text => {
                if self.placeholder.is_none() {
                    self.placeholder = Some(placeholder.to_string());
                }
            }
            QuestionType::Rating => {
                self.max_rating = Some(self.max_rating());
            }
        }
    }
}

/// Lifecycle state of a form
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Draft,
    Published,
    Closed,
}

/// Visual theme identifier; rendering is up to the client
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeId {
    #[default]
    #[serde(rename = "theme_default")]
    Default,
    #[serde(rename = "theme_night")]
    Night,
    #[serde(rename = "theme_warm")]
    Warm,
    #[serde(rename = "theme_fresh")]
    Fresh,
}

impl ThemeId {
    /// Resolves a theme name, treating unknown names as the default theme
    pub fn from_loose(name: &str) -> Self {
        match name {
            "theme_night" => ThemeId::Night,
            "theme_warm" => ThemeId::Warm,
            "theme_fresh" => ThemeId::Fresh,
            _ => ThemeId::Default,
        }
    }
}

/// Identity, display settings, lifecycle state and counters of a form
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormMeta {
    /// Globally unique id, fixed at creation
    pub uuid: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub theme_id: ThemeId,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub status: FormStatus,

    /// Short token of the public link, assigned on first publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_token: Option<String>,

    /// Public link derived from `publish_token`, never reassigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,

    /// Number of public views while published
    #[serde(default)]
    pub stat_pv: u64,

    /// Number of stored responses
    #[serde(default)]
    pub stat_responses: u64,
}

/// A survey definition: metadata plus questions in display order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Form {
    pub form_meta: FormMeta,

    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Form {
    /// Creates an empty draft with a freshly generated uuid
    pub fn new_draft() -> Self {
        Self {
            form_meta: FormMeta {
                uuid: new_form_id(),
                title: UNTITLED_FORM.to_string(),
                description: String::new(),
                theme_id: ThemeId::Default,
                created_at: Utc::now(),
                status: FormStatus::Draft,
                publish_token: None,
                publish_url: None,
                stat_pv: 0,
                stat_responses: 0,
            },
            questions: Vec::new(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.form_meta.uuid
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == id)
    }

    pub(crate) fn question_mut(&mut self, id: &str) -> Option<&mut Question> {
        self.questions.iter_mut().find(|question| question.id == id)
    }

    /// Gives fresh ids to repeated question ids and to repeated option ids
    /// within each question, so every id addresses exactly one element
    pub fn dedupe_ids(&mut self) {
        let mut seen = HashSet::new();
        for question in &mut self.questions {
            while !seen.insert(question.id.clone()) {
                question.id = new_question_id();
            }
            question.dedupe_option_ids();
        }
    }

    /// Whether `id` is either the uuid or the publish token of this form
    pub fn answers_to(&self, id: &str) -> bool {
        self.form_meta.uuid == id || self.form_meta.publish_token.as_deref() == Some(id)
    }
}

/// The value of one answer, shaped by the type of the question it answers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Free text answer
    Text(String),
    /// Id of the chosen option of a radio question
    Choice(String),
    /// Ids of the chosen options of a checkbox question
    MultiChoice(Vec<String>),
    /// Score in `1..=maxRating`
    Rating(u32),
}

/// One question's value within a response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Answer {
    pub question_id: String,
    pub value: AnswerValue,
}

/// One respondent's submission, immutable once stored
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormResponse {
    pub id: String,
    pub form_id: String,
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
}

impl FormResponse {
    pub fn answer_for(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers
            .iter()
            .find(|answer| answer.question_id == question_id)
            .map(|answer| &answer.value)
    }
}

/// Direction for reordering a question
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Partial update of the display fields of the editing form
///
/// Lifecycle fields and counters are owned by the store and cannot be patched.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct MetaPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub theme_id: Option<ThemeId>,
}

/// Partial update of a question
#[derive(Deserialize, Debug, Default, Clone)]
pub struct QuestionPatch {
    #[serde(rename = "type")]
    pub kind: Option<QuestionType>,
    pub title: Option<String>,
    pub required: Option<bool>,
    pub options: Option<Vec<QuestionOption>>,
    pub placeholder: Option<String>,
    #[serde(rename = "maxRating")]
    pub max_rating: Option<u32>,
}

/// Request payload for generating a form from a natural language prompt
///
/// # Example
/// ```json
/// { "prompt": "做一个咖啡口味调研" }
/// ```
#[derive(Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// Request payload for renaming a saved form
#[derive(Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

/// Request payload for appending a question to the editing form
#[derive(Deserialize)]
pub struct AddQuestionRequest {
    #[serde(rename = "type")]
    pub kind: QuestionType,
}

/// Request payload for moving a question
#[derive(Deserialize)]
pub struct MoveRequest {
    pub direction: Direction,
}

/// Request payload for relabelling an option
#[derive(Deserialize)]
pub struct OptionLabelRequest {
    pub label: String,
}

/// An answer as submitted by a respondent, before it is checked against the form
///
/// `value` is a string for text and radio questions, a list of option ids
/// for checkbox questions and a number for rating questions.
#[derive(Deserialize, Debug, Clone)]
pub struct RawAnswer {
    pub question_id: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Request payload for submitting a response to a published form
///
/// # Example
/// ```json
/// {
///   "answers": [
///     { "question_id": "q_01", "value": "o_2" },
///     { "question_id": "q_02", "value": ["o_1", "o_3"] },
///     { "question_id": "q_03", "value": 4 }
///   ]
/// }
/// ```
#[derive(Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub answers: Vec<RawAnswer>,
}

/// Query parameters for listing responses
///
/// Query string: `?limit=10` returns the ten most recent submissions
#[derive(Deserialize)]
pub struct ResponsesParams {
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_questions_satisfy_type_invariants() {
        for kind in [
            QuestionType::Radio,
            QuestionType::Checkbox,
            QuestionType::Text,
            QuestionType::Rating,
        ] {
            let question = Question::default_for(kind);
            assert!(question.is_well_formed(), "{:?}", kind);
            assert!(!question.required);
        }

        let rating = Question::default_for(QuestionType::Rating);
        assert_eq!(rating.max_rating, Some(5));
        let radio = Question::default_for(QuestionType::Radio);
        assert_eq!(radio.options().len(), 2);
        assert_eq!(radio.options()[0].label, "选项 1");
    }

    #[test]
    fn loose_type_names_map_to_question_types() {
        assert_eq!(QuestionType::from_loose("single"), QuestionType::Radio);
        assert_eq!(QuestionType::from_loose("MULTIPLE"), QuestionType::Checkbox);
        assert_eq!(QuestionType::from_loose("Input"), QuestionType::Text);
        assert_eq!(QuestionType::from_loose("score"), QuestionType::Rating);
        assert_eq!(QuestionType::from_loose("dropdown"), QuestionType::Text);
    }

    #[test]
    fn retype_keeps_question_well_formed() {
        let mut question = Question::default_for(QuestionType::Text);
        question.retype(QuestionType::Checkbox);
        assert!(question.is_well_formed());
        assert!(question.placeholder.is_none());

        question.retype(QuestionType::Rating);
        assert!(question.options.is_none());
        assert_eq!(question.max_rating(), 5);
    }

    #[test]
    fn answer_value_is_tagged_on_the_wire() {
        let answer = Answer {
            question_id: "q_1".to_string(),
            value: AnswerValue::MultiChoice(vec!["o_a".to_string()]),
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["value"]["kind"], "multi_choice");
        assert_eq!(json["value"]["value"][0], "o_a");
    }

    #[test]
    fn rating_scale_is_capped() {
        let mut question = Question::default_for(QuestionType::Rating);
        question.max_rating = Some(u32::MAX);
        assert_eq!(question.max_rating(), MAX_RATING);
        question.fill_type_defaults("", ["", ""]);
        assert_eq!(question.max_rating, Some(MAX_RATING));
    }

    #[test]
    fn repeated_ids_are_replaced() {
        let mut form = Form::new_draft();
        let mut first = Question::default_for(QuestionType::Radio);
        first.id = "q_same".to_string();
        for option in first.options.as_mut().unwrap() {
            option.id = "o_same".to_string();
        }
        let mut second = first.clone();
        second.title = "第二题".to_string();
        form.questions = vec![first, second];

        form.dedupe_ids();

        assert_eq!(form.questions[0].id, "q_same");
        assert_ne!(form.questions[1].id, "q_same");
        for question in &form.questions {
            assert_eq!(question.options()[0].id, "o_same");
            assert_ne!(question.options()[1].id, "o_same");
        }
    }

    #[test]
    fn new_draft_has_prefixed_uuid() {
        let form = Form::new_draft();
        assert!(form.uuid().starts_with("f_"));
        assert_eq!(form.uuid().len(), 12);
        assert_eq!(form.form_meta.status, FormStatus::Draft);
        assert!(form.questions.is_empty());
    }
}
