//! Normalization of generated form descriptions
//!
//! The generation workflow answers with an envelope whose payload may sit at
//! several places, sometimes as a JSON document embedded in a string. This
//! module locates the payload with an ordered list of extraction strategies
//! and turns whatever it finds into a well formed draft [`Form`].

use chrono::Utc;
use serde_json::Value;

use crate::error::AppError;
use crate::model::{
    new_form_id, new_option_id, new_question_id, Form, FormMeta, FormStatus, Question,
    QuestionOption, QuestionType, ThemeId,
};

const DEFAULT_TITLE: &str = "调研问卷";
const DEFAULT_DESCRIPTION: &str = "感谢您的参与，本问卷仅需1分钟完成。";
const DEFAULT_QUESTION_TITLE: &str = "请回答此问题";
const DEFAULT_PLACEHOLDER: &str = "请输入...";
const DEFAULT_OPTION_LABEL: &str = "选项";
const FALLBACK_OPTIONS: [&str; 2] = ["选项 A", "选项 B"];

static MISSING: Value = Value::Null;

/// What an extraction strategy found in the envelope
#[derive(Debug, PartialEq)]
pub enum Extracted<'a> {
    /// The payload is already structured JSON
    Json(&'a Value),
    /// The payload is a JSON document carried inside a string
    Embedded(&'a str),
}

/// A pure probe that looks for the payload at one known location
pub type Strategy = fn(&Value) -> Option<Extracted<'_>>;

/// Extraction strategies in priority order; the first match wins
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("data.outputs", data_outputs_embedded),
    ("data.outputs.result", data_outputs_result),
    ("data.outputs.text", data_outputs_text),
    ("data.outputs{}", data_outputs_json),
    ("data", proxy_data),
    ("outputs", outputs_embedded),
    ("outputs{}", outputs_json),
    ("raw", raw_envelope),
];

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

fn present(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(other),
    }
}

fn data_outputs_embedded(envelope: &Value) -> Option<Extracted<'_>> {
    envelope
        .pointer("/data/outputs")
        .and_then(non_empty_str)
        .map(Extracted::Embedded)
}

fn data_outputs_result(envelope: &Value) -> Option<Extracted<'_>> {
    envelope
        .pointer("/data/outputs/result")
        .and_then(non_empty_str)
        .map(Extracted::Embedded)
}

fn data_outputs_text(envelope: &Value) -> Option<Extracted<'_>> {
    envelope
        .pointer("/data/outputs/text")
        .and_then(non_empty_str)
        .map(Extracted::Embedded)
}

fn data_outputs_json(envelope: &Value) -> Option<Extracted<'_>> {
    envelope
        .pointer("/data/outputs")
        .and_then(present)
        .map(Extracted::Json)
}

/// The envelope produced by our own generation proxy: `{ "data": { form_meta, questions } }`
fn proxy_data(envelope: &Value) -> Option<Extracted<'_>> {
    envelope
        .get("data")
        .filter(|data| data.get("questions").is_some() || data.get("form_meta").is_some())
        .map(Extracted::Json)
}

fn outputs_embedded(envelope: &Value) -> Option<Extracted<'_>> {
    envelope
        .get("outputs")
        .and_then(non_empty_str)
        .map(Extracted::Embedded)
}

fn outputs_json(envelope: &Value) -> Option<Extracted<'_>> {
    envelope
        .get("outputs")
        .and_then(present)
        .map(Extracted::Json)
}

fn raw_envelope(envelope: &Value) -> Option<Extracted<'_>> {
    Some(Extracted::Json(envelope))
}

/// Locates the form payload inside an envelope
///
/// Strategies are tried in [`STRATEGIES`] order. The first one that matches
/// decides the outcome: structured JSON is returned as is, an embedded string
/// is parsed and a parse failure is reported as
/// [`AppError::MalformedResponse`] rather than falling through.
pub fn extract_payload(envelope: &Value) -> Result<Value, AppError> {
    for (name, strategy) in STRATEGIES {
        let Some(found) = strategy(envelope) else {
            continue;
        };
        tracing::debug!(strategy = name, "located generation payload");
        return match found {
            Extracted::Json(value) => Ok(value.clone()),
            Extracted::Embedded(text) => serde_json::from_str(text).map_err(|e| {
                AppError::MalformedResponse(format!("embedded payload at {}: {}", name, e))
            }),
        };
    }
    // `raw_envelope` always matches
    Ok(envelope.clone())
}

/// Turns the raw text of a generation reply into a draft form
///
/// # Errors
///
/// * [`AppError::MalformedResponse`] - `raw` is not JSON, or the payload it
///   points at is an embedded string that is not JSON
///
/// Missing or mistyped fields inside a parseable payload are always defaulted.
pub fn normalize(raw: &str) -> Result<Form, AppError> {
    let envelope: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::MalformedResponse(format!("reply is not JSON: {}", e)))?;
    let payload = extract_payload(&envelope)?;
    Ok(normalize_value(&payload))
}

/// Builds a draft form from an already extracted payload; total over any JSON value
pub fn normalize_value(payload: &Value) -> Form {
    let meta = payload.get("form_meta").unwrap_or(&MISSING);
    let questions = payload
        .get("questions")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_question).collect())
        .unwrap_or_default();

    let mut form = Form {
        form_meta: FormMeta {
            uuid: text_field(meta, "uuid")
                .map(str::to_string)
                .unwrap_or_else(new_form_id),
            title: text_or(meta, "title", DEFAULT_TITLE),
            description: text_or(meta, "description", DEFAULT_DESCRIPTION),
            theme_id: text_field(meta, "theme_id")
                .map(ThemeId::from_loose)
                .unwrap_or_default(),
            created_at: Utc::now(),
            // A generated form always starts life as an unpublished draft
            status: FormStatus::Draft,
            publish_token: None,
            publish_url: None,
            stat_pv: 0,
            stat_responses: 0,
        },
        questions,
    };
    // Generated ids are not trusted to be unique
    form.dedupe_ids();
    form
}

fn text_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(non_empty_str)
}

fn text_or(value: &Value, key: &str, default: &str) -> String {
    text_field(value, key).unwrap_or(default).to_string()
}

fn normalize_question(raw: &Value) -> Question {
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .map(QuestionType::from_loose)
        .unwrap_or(QuestionType::Text);

    let mut question = Question {
        id: text_field(raw, "id")
            .map(str::to_string)
            .unwrap_or_else(new_question_id),
        kind,
        title: text_or(raw, "title", DEFAULT_QUESTION_TITLE),
        required: raw.get("required").and_then(Value::as_bool) != Some(false),
        options: None,
        placeholder: None,
        max_rating: None,
    };

    match kind {
        QuestionType::Radio | QuestionType::Checkbox => {
            let options: Vec<QuestionOption> = raw
                .get("options")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(normalize_option).collect())
                .unwrap_or_default();
            question.options = Some(options);
        }
        QuestionType::Text => {
            question.placeholder = text_field(raw, "placeholder").map(str::to_string);
        }
        QuestionType::Rating => {
            question.max_rating = raw.get("maxRating").and_then(positive_integer);
        }
    }

    question.fill_type_defaults(DEFAULT_PLACEHOLDER, FALLBACK_OPTIONS);
    question
}

/// Accepts a bare label or an `{ id?, label }` object; anything else is skipped
fn normalize_option(raw: &Value) -> Option<QuestionOption> {
    match raw {
        Value::String(label) => Some(QuestionOption::new(label.as_str())),
        Value::Object(_) => Some(QuestionOption {
            id: text_field(raw, "id")
                .map(str::to_string)
                .unwrap_or_else(new_option_id),
            label: text_or(raw, "label", DEFAULT_OPTION_LABEL),
        }),
        _ => None,
    }
}

fn positive_integer(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(number).ok().filter(|n| *n > 0)
}
