//! Route definitions for the form builder API
//!
//! This module configures all HTTP routes and maps them to their respective handlers.

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;

use crate::handler::{
    add_option, add_question, close_form, create_form, delete_form, delete_option,
    delete_question, editing_form, export_responses, form_stats, generate_form, list_forms,
    list_responses, load_form, move_question, publish_form, rename_form, reopen_form,
    save_editing, save_form, submit_response, update_meta, update_option, update_question,
    view_form,
};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// Public (no authorization):
/// - `GET /f/{id}` - Serves a published form by uuid or publish token
/// - `POST /f/{id}/responses` - Submits answers to a published form
///
/// Editor API under `/api` (shared secret when configured):
/// - `GET|POST /api/forms` - List forms / create a blank draft
/// - `POST /api/forms/generate` - Generate a draft from a prompt
/// - `GET|PUT|DELETE /api/forms/{uuid}` - Load / save / delete a form
/// - `PATCH /api/forms/{uuid}/title` - Rename a form
/// - `POST /api/forms/{uuid}/publish|close|reopen` - Lifecycle transitions
/// - `GET /api/forms/{uuid}/stats|responses|export` - Results
/// - `/api/editor/...` - Structural edits of the form open in the editor
///
/// # Example Usage
///
/// ```no_run
/// # use std::sync::Arc;
/// # use formgen::config::AppConfig;
/// # use formgen::database::MemoryStorage;
/// # use formgen::state::AppState;
/// # use formgen::store::FormStore;
/// # use formgen::upstream::WorkflowClient;
/// # use formgen::route::create_app;
/// let config = AppConfig::default();
/// let store = FormStore::open(Arc::new(MemoryStorage::new()), &config.public_base_url).unwrap();
/// let generator = Arc::new(WorkflowClient::new(&config.workflow_api_url, None));
/// let app = create_app(AppState::new(store, generator, config));
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let editor_routes = Router::new()
        .route("/", get(editing_form))
        .route("/save", post(save_editing))
        .route("/meta", patch(update_meta))
        .route("/questions", post(add_question))
        .route(
            "/questions/{question_id}",
            patch(update_question).delete(delete_question),
        )
        .route("/questions/{question_id}/move", post(move_question))
        .route("/questions/{question_id}/options", post(add_option))
        .route(
            "/questions/{question_id}/options/{option_id}",
            patch(update_option).delete(delete_option),
        );

    let api_routes = Router::new()
        .route("/forms", get(list_forms).post(create_form))
        .route("/forms/generate", post(generate_form))
        .route(
            "/forms/{uuid}",
            get(load_form).put(save_form).delete(delete_form),
        )
        .route("/forms/{uuid}/title", patch(rename_form))
        .route("/forms/{uuid}/publish", post(publish_form))
        .route("/forms/{uuid}/close", post(close_form))
        .route("/forms/{uuid}/reopen", post(reopen_form))
        .route("/forms/{uuid}/stats", get(form_stats))
        .route("/forms/{uuid}/responses", get(list_responses))
        .route("/forms/{uuid}/export", get(export_responses))
        .nest("/editor", editor_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        // Public endpoints used by respondents
        .route("/f/{id}", get(view_form))
        .route("/f/{id}/responses", post(submit_response))
        .nest("/api", api_routes)
        .with_state(state)
}
