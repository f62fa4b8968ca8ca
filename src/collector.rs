//! Response collection
//!
//! Respondents submit loosely typed values. Each one is checked against the
//! question it answers and turned into the matching [`AnswerValue`] before the
//! response is handed to the store.

use serde_json::Value;

use crate::error::AppError;
use crate::model::{Answer, AnswerValue, Form, FormResponse, Question, QuestionType, RawAnswer};
use crate::store::{FormStore, PublicAccess};

/// Converts a submitted value into the answer shape of `question`
///
/// Returns `Ok(None)` for values that count as unanswered (null, blank text,
/// an empty selection) and an error message for values of the wrong shape,
/// unknown option ids or out-of-range ratings.
pub fn answer_value(question: &Question, raw: &Value) -> Result<Option<AnswerValue>, String> {
    if raw.is_null() {
        return Ok(None);
    }
    match question.kind {
        QuestionType::Text => match raw {
            Value::String(text) if text.trim().is_empty() => Ok(None),
            Value::String(text) => Ok(Some(AnswerValue::Text(text.clone()))),
            _ => Err(format!("question {} expects text", question.id)),
        },
        QuestionType::Radio => match raw {
            Value::String(id) if id.is_empty() => Ok(None),
            Value::String(id) => {
                known_option(question, id)?;
                Ok(Some(AnswerValue::Choice(id.clone())))
            }
            _ => Err(format!("question {} expects one option id", question.id)),
        },
        QuestionType::Checkbox => {
            let Value::Array(items) = raw else {
                return Err(format!("question {} expects a list of option ids", question.id));
            };
            let mut ids: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let id = item
                    .as_str()
                    .ok_or_else(|| format!("question {} expects option ids", question.id))?;
                known_option(question, id)?;
                if !ids.iter().any(|seen| seen == id) {
                    ids.push(id.to_string());
                }
            }
            Ok((!ids.is_empty()).then_some(AnswerValue::MultiChoice(ids)))
        }
        QuestionType::Rating => {
            let max = question.max_rating();
            raw.as_u64()
                .and_then(|score| u32::try_from(score).ok())
                .filter(|score| (1..=max).contains(score))
                .map(|score| Some(AnswerValue::Rating(score)))
                .ok_or_else(|| {
                    format!("question {} expects a score from 1 to {}", question.id, max)
                })
        }
    }
}

fn known_option(question: &Question, id: &str) -> Result<(), String> {
    match question.option_label(id) {
        Some(_) => Ok(()),
        None => Err(format!("question {} has no option {}", question.id, id)),
    }
}

/// Validates a submission against the form and builds its answers
///
/// Answers to unknown questions are dropped. Required questions must be
/// answered. The answers come back in the form's question order.
pub fn collect_answers(form: &Form, raw: &[RawAnswer]) -> Result<Vec<Answer>, AppError> {
    let mut answers = Vec::new();
    for question in &form.questions {
        let submitted = raw
            .iter()
            .rev()
            .find(|answer| answer.question_id == question.id);
        let value = match submitted {
            Some(answer) => answer_value(question, &answer.value).map_err(AppError::InvalidSubmission)?,
            None => None,
        };
        match value {
            Some(value) => answers.push(Answer {
                question_id: question.id.clone(),
                value,
            }),
            None if question.required => {
                return Err(AppError::InvalidSubmission(format!(
                    "question {} is required",
                    question.id
                )))
            }
            None => {}
        }
    }
    Ok(answers)
}

/// Records a submission made through a public link (uuid or publish token)
///
/// # Errors
///
/// * [`AppError::NotFound`] - no form answers to `public_id`
/// * [`AppError::NotPublished`] / [`AppError::FormClosed`] - the form is not accepting responses
/// * [`AppError::InvalidSubmission`] - an answer does not fit its question
pub fn submit(
    store: &mut FormStore,
    public_id: &str,
    raw: &[RawAnswer],
) -> Result<FormResponse, AppError> {
    let form = match store.resolve_public(public_id) {
        PublicAccess::Ready(form) => form,
        PublicAccess::NotFound => return Err(AppError::NotFound(format!("form {}", public_id))),
        PublicAccess::NotPublished => return Err(AppError::NotPublished),
        PublicAccess::Closed => return Err(AppError::FormClosed),
    };
    let answers = collect_answers(&form, raw)?;
    store
        .add_response(form.uuid(), answers)?
        .ok_or_else(|| AppError::NotFound(format!("form {}", public_id)))
}
