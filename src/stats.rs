//! Statistics and export of collected responses
//!
//! Answers whose question no longer exists, or whose shape no longer fits a
//! question that changed type, are ignored everywhere in this module.

use std::borrow::Borrow;
use std::fmt::Display;

use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::model::{AnswerValue, Form, FormResponse, Question, QuestionType};

/// Number of text answers sampled per text question
pub const RECENT_TEXT_ANSWERS: usize = 3;

/// First column of every export
pub const SUBMITTED_AT_HEADER: &str = "提交时间";

const EXPORT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One bar of a chart: an option label or a rating step and how often it was chosen
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionSummary {
    /// Radio and checkbox questions, one bucket per option in option order
    Choice { buckets: Vec<Bucket> },
    /// Rating questions, one bucket per score from 1 to `maxRating`
    Rating { buckets: Vec<Bucket> },
    /// Text questions: the last few answers and how many there are
    Text { recent: Vec<String>, total: usize },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuestionStats {
    pub question_id: String,
    pub title: String,
    #[serde(flatten)]
    pub summary: QuestionSummary,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FormStats {
    pub pv: u64,
    pub response_count: usize,
    /// Responses per view in percent with one decimal, `"0"` while there are no views
    pub conversion_rate: String,
    pub questions: Vec<QuestionStats>,
}

/// Responses per page view as a percentage string, e.g. `"6.0"`
pub fn conversion_rate(pv: u64, responses: usize) -> String {
    if pv == 0 {
        return "0".to_string();
    }
    format!("{:.1}", responses as f64 / pv as f64 * 100.0)
}

/// Summarizes the responses of a form, question by question
pub fn aggregate<R: Borrow<FormResponse>>(form: &Form, responses: &[R]) -> FormStats {
    let questions = form
        .questions
        .iter()
        .map(|question| QuestionStats {
            question_id: question.id.clone(),
            title: question.title.clone(),
            summary: summarize(question, responses),
        })
        .collect();

    FormStats {
        pv: form.form_meta.stat_pv,
        response_count: responses.len(),
        conversion_rate: conversion_rate(form.form_meta.stat_pv, responses.len()),
        questions,
    }
}

/// Whether an answer has the shape the question's current type expects
fn fits(question: &Question, value: &AnswerValue) -> bool {
    match value {
        AnswerValue::Text(_) => question.kind == QuestionType::Text,
        AnswerValue::Choice(_) | AnswerValue::MultiChoice(_) => question.kind.is_choice(),
        AnswerValue::Rating(_) => question.kind == QuestionType::Rating,
    }
}

fn answers_to<'a, R: Borrow<FormResponse>>(
    question: &'a Question,
    responses: &'a [R],
) -> impl Iterator<Item = &'a AnswerValue> + 'a {
    responses
        .iter()
        .filter_map(move |response| {
            let response: &FormResponse = response.borrow();
            response.answer_for(&question.id)
        })
}

fn summarize<R: Borrow<FormResponse>>(question: &Question, responses: &[R]) -> QuestionSummary {
    match question.kind {
        QuestionType::Radio | QuestionType::Checkbox => {
            let options = question.options();
            let mut counts = vec![0usize; options.len()];
            let mut tally = |id: &str| {
                if let Some(index) = options.iter().position(|option| option.id == id) {
                    counts[index] += 1;
                }
            };
            for value in answers_to(question, responses) {
                match value {
                    AnswerValue::Choice(id) => tally(id.as_str()),
                    AnswerValue::MultiChoice(ids) => ids.iter().for_each(|id| tally(id.as_str())),
                    AnswerValue::Text(_) | AnswerValue::Rating(_) => {}
                }
            }
            QuestionSummary::Choice {
                buckets: options
                    .iter()
                    .zip(counts)
                    .map(|(option, count)| Bucket {
                        label: option.label.clone(),
                        count,
                    })
                    .collect(),
            }
        }
        QuestionType::Rating => {
            let max = question.max_rating();
            let mut counts = vec![0usize; max as usize];
            for value in answers_to(question, responses) {
                if let AnswerValue::Rating(score) = value {
                    if (1..=max).contains(score) {
                        counts[(*score - 1) as usize] += 1;
                    }
                }
            }
            QuestionSummary::Rating {
                buckets: counts
                    .into_iter()
                    .enumerate()
                    .map(|(index, count)| Bucket {
                        label: format!("{}分", index + 1),
                        count,
                    })
                    .collect(),
            }
        }
        QuestionType::Text => {
            let texts: Vec<&str> = answers_to(question, responses)
                .filter_map(|value| match value {
                    AnswerValue::Text(text) if !text.is_empty() => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            let skip = texts.len().saturating_sub(RECENT_TEXT_ANSWERS);
            QuestionSummary::Text {
                recent: texts[skip..].iter().map(|text| text.to_string()).collect(),
                total: texts.len(),
            }
        }
    }
}

/// Renders one answer the way it appears in exports: option labels instead of ids
pub fn render_answer(question: &Question, value: &AnswerValue) -> String {
    let label = |id: &str| question.option_label(id).unwrap_or(id).to_string();
    match value {
        AnswerValue::Text(text) => text.clone(),
        AnswerValue::Choice(id) => label(id.as_str()),
        AnswerValue::MultiChoice(ids) => ids
            .iter()
            .map(|id| label(id.as_str()))
            .collect::<Vec<_>>()
            .join(", "),
        AnswerValue::Rating(score) => score.to_string(),
    }
}

/// Header row of an export: submission time followed by question titles
pub fn export_header(form: &Form) -> Vec<String> {
    std::iter::once(SUBMITTED_AT_HEADER.to_string())
        .chain(form.questions.iter().map(|question| question.title.clone()))
        .collect()
}

/// One row per response with timestamps rendered in `tz`
///
/// Unanswered questions are empty cells.
pub fn export_rows_in<Tz, R>(form: &Form, responses: &[R], tz: &Tz) -> Vec<Vec<String>>
where
    Tz: TimeZone,
    Tz::Offset: Display,
    R: Borrow<FormResponse>,
{
    responses
        .iter()
        .map(|response| {
            let response: &FormResponse = response.borrow();
            let submitted_at = response
                .submitted_at
                .with_timezone(tz)
                .format(EXPORT_TIME_FORMAT)
                .to_string();
            std::iter::once(submitted_at)
                .chain(form.questions.iter().map(|question| {
                    response
                        .answer_for(&question.id)
                        .filter(|value| fits(question, value))
                        .map(|value| render_answer(question, value))
                        .unwrap_or_default()
                }))
                .collect()
        })
        .collect()
}

/// [`export_rows_in`] using the server's local time zone
pub fn export_rows<R: Borrow<FormResponse>>(form: &Form, responses: &[R]) -> Vec<Vec<String>> {
    export_rows_in(form, responses, &Local)
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Writes header and rows as CSV, prefixed with a UTF-8 byte order mark so
/// spreadsheet applications pick the right encoding
pub fn to_csv(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::from('\u{feff}');
    for row in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Download name of a form's export
pub fn export_file_name(form: &Form) -> String {
    format!("{}_数据导出.csv", form.form_meta.title)
}
