//! HTTP request handlers for the form builder API
//!
//! This module maps HTTP requests onto store operations:
//! - Generating, creating, listing, saving and deleting forms
//! - Editing the form currently open in the editor
//! - Publishing, closing and reopening forms
//! - Serving published forms to respondents and collecting their answers
//! - Reporting statistics and exporting responses

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::adapter;
use crate::collector;
use crate::error::AppError;
use crate::model::{
    new_form_id, AddQuestionRequest, Form, GenerateRequest, MetaPatch, MoveRequest,
    OptionLabelRequest, QuestionPatch, RenameRequest, ResponsesParams, SubmitRequest,
};
use crate::state::AppState;
use crate::stats;
use crate::store::{PublicAccess, Transition};

fn form_not_found(uuid: &str) -> AppError {
    AppError::NotFound(format!("form {}", uuid))
}

// ----- forms -----------------------------------------------------------------

/// Generates a form from a natural language prompt
///
/// The prompt goes to the generation workflow; its reply is normalized into a
/// draft, saved, and opened in the editor. A failed generation leaves the
/// store untouched.
///
/// # Request Body
///
/// ```json
/// { "prompt": "帮我做一个咖啡口味调研" }
/// ```
///
/// # Response
///
/// - **201 Created** - The generated draft form
/// - **400 Bad Request** - Empty prompt
/// - **502 Bad Gateway** - Workflow unreachable, failed, or replied with garbage
pub async fn generate_form(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::BadRequest("prompt is required".to_string()));
    }

    // The store is not locked while waiting on the workflow
    let raw = state.generator.generate(prompt).await?;
    let mut form = adapter::normalize(&raw)?;

    let mut store = state.store.lock().await;
    if store.id_taken(form.uuid()) {
        // Never let a generated form overwrite an existing one
        form.form_meta.uuid = new_form_id();
    }
    store.save(form.clone())?;
    store.set_editing(form.clone());
    tracing::info!(
        form = %form.form_meta.uuid,
        questions = form.questions.len(),
        "form generated"
    );

    Ok((StatusCode::CREATED, Json(form)))
}

/// Creates a blank draft, saves it and opens it in the editor
pub async fn create_form(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut store = state.store.lock().await;
    let form = store.create();
    store.save(form.clone())?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// Lists all saved forms in the order they were first saved
pub async fn list_forms(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    let forms = store.forms();
    Json(json!({
        "total": forms.len(),
        "data": forms,
    }))
}

/// Opens a saved form in the editor and returns it
///
/// # Response
///
/// - **200 OK** - The form
/// - **404 Not Found** - No such form; the editor is left as it was
pub async fn load_form(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Form>, AppError> {
    let mut store = state.store.lock().await;
    store.load(&uuid).map(Json).ok_or_else(|| form_not_found(&uuid))
}

/// Saves a whole form under the uuid in the path
///
/// Status, publish link and counters are owned by the store: an existing
/// form keeps its own, a new form starts as a fresh draft. The editor is
/// refreshed when it shows this form.
///
/// # Response
///
/// - **200 OK** - The saved form
/// - **400 Bad Request** - The uuid is another form's publish token
pub async fn save_form(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    Json(mut form): Json<Form>,
) -> Result<Json<Form>, AppError> {
    form.form_meta.uuid = uuid.clone();
    let mut store = state.store.lock().await;
    store.save(form)?;
    store
        .form(&uuid)
        .cloned()
        .map(Json)
        .ok_or_else(|| form_not_found(&uuid))
}

/// Deletes a form and every response collected for it
///
/// # Response
///
/// - **200 OK** - Form deleted
/// - **404 Not Found** - Form does not exist
pub async fn delete_form(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut store = state.store.lock().await;
    if !store.delete(&uuid)? {
        return Err(form_not_found(&uuid));
    }
    Ok(Json(json!({
        "message": "Form deleted successfully",
        "deleted_id": uuid,
    })))
}

/// Changes the title of a saved form
pub async fn rename_form(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<RenameRequest>,
) -> Result<Json<Form>, AppError> {
    let mut store = state.store.lock().await;
    if !store.rename(&uuid, &payload.title)? {
        return Err(form_not_found(&uuid));
    }
    store
        .form(&uuid)
        .cloned()
        .map(Json)
        .ok_or_else(|| form_not_found(&uuid))
}

// ----- lifecycle -------------------------------------------------------------

fn transition_response(
    uuid: &str,
    action: &'static str,
    transition: Transition,
) -> Result<Response, AppError> {
    match transition {
        Transition::Applied(meta) | Transition::Unchanged(meta) => Ok(Json(meta).into_response()),
        Transition::Rejected(from) => Err(AppError::InvalidTransition { action, from }),
        Transition::NotFound => Err(form_not_found(uuid)),
    }
}

/// Publishes a draft and returns its metadata, including `publish_url`
///
/// Publishing an already published form returns the same URL again.
///
/// # Response
///
/// - **200 OK** - Form metadata
/// - **404 Not Found** - Form does not exist
/// - **409 Conflict** - Form is closed; reopen it instead
pub async fn publish_form(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let transition = state.store.lock().await.publish(&uuid)?;
    transition_response(&uuid, "publish", transition)
}

/// Stops accepting responses for a published form
pub async fn close_form(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let transition = state.store.lock().await.close(&uuid)?;
    transition_response(&uuid, "close", transition)
}

/// Accepts responses again for a closed form; the publish URL is unchanged
pub async fn reopen_form(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let transition = state.store.lock().await.reopen(&uuid)?;
    transition_response(&uuid, "reopen", transition)
}

// ----- statistics ------------------------------------------------------------

/// Per question summaries plus page views, responses and conversion rate
pub async fn form_stats(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<stats::FormStats>, AppError> {
    let store = state.store.lock().await;
    let form = store.form(&uuid).ok_or_else(|| form_not_found(&uuid))?;
    Ok(Json(stats::aggregate(form, &store.responses_for(&uuid))))
}

/// Lists responses in submission order
///
/// # Query Parameters
///
/// - `limit` (optional) - Only the most recent `limit` responses
pub async fn list_responses(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<ResponsesParams>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.lock().await;
    if store.form(&uuid).is_none() {
        return Err(form_not_found(&uuid));
    }
    let responses = match params.limit {
        Some(limit) => store.recent_responses(&uuid, limit),
        None => store.responses_for(&uuid),
    };
    Ok(Json(json!({
        "total_fetched": responses.len(),
        "data": responses,
    })))
}

/// Percent-encodes a file name for the `filename*` parameter (RFC 5987)
fn encode_file_name(name: &str) -> String {
    name.bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (byte as char).to_string()
            }
            _ => format!("%{:02X}", byte),
        })
        .collect()
}

/// Downloads all responses as a CSV spreadsheet
///
/// One header row (`提交时间` followed by question titles) and one row per
/// response. Choice answers are written as option labels.
pub async fn export_responses(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.lock().await;
    let form = store.form(&uuid).ok_or_else(|| form_not_found(&uuid))?;
    let responses = store.responses_for(&uuid);

    let csv = stats::to_csv(
        &stats::export_header(form),
        &stats::export_rows(form, &responses),
    );
    let disposition = format!(
        "attachment; filename=\"export.csv\"; filename*=UTF-8''{}",
        encode_file_name(&stats::export_file_name(form))
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

// ----- editor ----------------------------------------------------------------

/// Returns the form currently open in the editor
pub async fn editing_form(State(state): State<AppState>) -> Json<Form> {
    Json(state.store.lock().await.editing().clone())
}

/// Saves the form currently open in the editor
pub async fn save_editing(State(state): State<AppState>) -> Result<Json<Form>, AppError> {
    let form = state.store.lock().await.save_editing()?;
    Ok(Json(form))
}

/// Updates title, description or theme of the editing form
pub async fn update_meta(
    State(state): State<AppState>,
    Json(patch): Json<MetaPatch>,
) -> Json<Form> {
    let mut store = state.store.lock().await;
    store.update_meta(patch);
    Json(store.editing().clone())
}

/// Appends a question of the requested type with default content
pub async fn add_question(
    State(state): State<AppState>,
    Json(payload): Json<AddQuestionRequest>,
) -> impl IntoResponse {
    let mut store = state.store.lock().await;
    store.add_question(payload.kind);
    (StatusCode::CREATED, Json(store.editing().clone()))
}

// The remaining editor handlers are forgiving: an unknown question or option
// id leaves the form unchanged and the current form is returned either way.

pub async fn update_question(
    Path(question_id): Path<String>,
    State(state): State<AppState>,
    Json(patch): Json<QuestionPatch>,
) -> Json<Form> {
    let mut store = state.store.lock().await;
    store.update_question(&question_id, patch);
    Json(store.editing().clone())
}

pub async fn delete_question(
    Path(question_id): Path<String>,
    State(state): State<AppState>,
) -> Json<Form> {
    let mut store = state.store.lock().await;
    store.delete_question(&question_id);
    Json(store.editing().clone())
}

pub async fn move_question(
    Path(question_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<MoveRequest>,
) -> Json<Form> {
    let mut store = state.store.lock().await;
    store.move_question(&question_id, payload.direction);
    Json(store.editing().clone())
}

pub async fn add_option(
    Path(question_id): Path<String>,
    State(state): State<AppState>,
) -> Json<Form> {
    let mut store = state.store.lock().await;
    store.add_option(&question_id);
    Json(store.editing().clone())
}

pub async fn update_option(
    Path((question_id, option_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(payload): Json<OptionLabelRequest>,
) -> Json<Form> {
    let mut store = state.store.lock().await;
    store.update_option(&question_id, &option_id, &payload.label);
    Json(store.editing().clone())
}

pub async fn delete_option(
    Path((question_id, option_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Json<Form> {
    let mut store = state.store.lock().await;
    store.delete_option(&question_id, &option_id);
    Json(store.editing().clone())
}

// ----- public ----------------------------------------------------------------

/// Serves a form to a respondent by uuid or publish token
///
/// Only published forms are served, and only those views are counted.
///
/// # Response
///
/// - **200 OK** - The form
/// - **403 Forbidden** - The form is still a draft
/// - **404 Not Found** - No form answers to this id
/// - **410 Gone** - The form has been closed
pub async fn view_form(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Form>, AppError> {
    match state.store.lock().await.view_public(&id)? {
        PublicAccess::Ready(form) => Ok(Json(form)),
        PublicAccess::NotPublished => Err(AppError::NotPublished),
        PublicAccess::Closed => Err(AppError::FormClosed),
        PublicAccess::NotFound => Err(form_not_found(&id)),
    }
}

/// Records a respondent's answers
///
/// # Request Body
///
/// ```json
/// { "answers": [ { "question_id": "q_01", "value": "o_2" } ] }
/// ```
///
/// # Response
///
/// - **201 Created** - The stored response
/// - **403 / 404 / 410** - As for viewing the form
/// - **422 Unprocessable Entity** - Missing required answer or invalid value
pub async fn submit_response(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut store = state.store.lock().await;
    let response = collector::submit(&mut store, &id, &payload.answers)?;
    Ok((StatusCode::CREATED, Json(response)))
}
