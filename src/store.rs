//! The form store
//!
//! Owns the saved forms, every collected response and the form currently open
//! in the editor. Operations on unknown ids are no-ops rather than errors;
//! the only failures are persistence failures. Every change to the saved
//! collections is followed by a snapshot write through the storage port.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::database::SnapshotStorage;
use crate::error::AppError;
use crate::model::{
    generate_id, Answer, Direction, Form, FormMeta, FormResponse, FormStatus, MetaPatch,
    Question, QuestionOption, QuestionPatch, QuestionType, MAX_RATING,
};

const PUBLISH_TOKEN_LEN: usize = 8;

/// Persisted layout: every saved form and every response, in insertion order
#[derive(Deserialize, Default)]
struct Snapshot {
    #[serde(default)]
    forms: Vec<Form>,
    #[serde(default)]
    responses: Vec<FormResponse>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    forms: &'a [Form],
    responses: &'a [FormResponse],
}

/// Outcome of a lifecycle operation (publish, close, reopen)
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The status changed; carries the updated metadata
    Applied(FormMeta),
    /// The form was already in the target state
    Unchanged(FormMeta),
    /// The operation is not allowed from the current state
    Rejected(FormStatus),
    NotFound,
}

/// What a public viewer gets when opening a form link
#[derive(Debug, Clone, PartialEq)]
pub enum PublicAccess {
    NotFound,
    NotPublished,
    Closed,
    Ready(Form),
}

pub struct FormStore {
    editing: Form,
    forms: Vec<Form>,
    responses: Vec<FormResponse>,
    storage: Arc<dyn SnapshotStorage>,
    public_base_url: String,
}

impl FormStore {
    /// Opens the store, restoring the last snapshot from `storage` if there is one
    ///
    /// # Arguments
    ///
    /// * `storage` - Where snapshots are read from and written to
    /// * `public_base_url` - Prefix of issued publish URLs (e.g., "https://forms.example.com")
    pub fn open(
        storage: Arc<dyn SnapshotStorage>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, AppError> {
        let snapshot = match storage.read()? {
            Some(blob) => serde_json::from_str::<Snapshot>(&blob)?,
            None => Snapshot::default(),
        };
        tracing::info!(
            forms = snapshot.forms.len(),
            responses = snapshot.responses.len(),
            "form store opened"
        );

        let public_base_url: String = public_base_url.into();
        Ok(Self {
            editing: Form::new_draft(),
            forms: snapshot.forms,
            responses: snapshot.responses,
            storage,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn persist(&self) -> Result<(), AppError> {
        self.write_snapshot(&self.forms, &self.responses)
    }

    fn write_snapshot(&self, forms: &[Form], responses: &[FormResponse]) -> Result<(), AppError> {
        let blob = serde_json::to_string(&SnapshotRef { forms, responses })?;
        self.storage.write(&blob)
    }

    /// Puts `form` at `index` (or appends it) and persists
    ///
    /// If the snapshot write fails the previous state is restored, so a
    /// failed operation never shows up later.
    fn commit_form(&mut self, index: Option<usize>, form: Form) -> Result<(), AppError> {
        let previous = match index {
            Some(index) => Some((index, std::mem::replace(&mut self.forms[index], form))),
            None => {
                self.forms.push(form);
                None
            }
        };
        if let Err(err) = self.persist() {
            match previous {
                Some((index, previous)) => self.forms[index] = previous,
                None => {
                    self.forms.pop();
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn position(&self, uuid: &str) -> Option<usize> {
        self.forms.iter().position(|form| form.form_meta.uuid == uuid)
    }

    /// Copies store-owned fields of a saved form onto the editing copy
    fn sync_editing(&mut self, uuid: &str) {
        if self.editing.form_meta.uuid != uuid {
            return;
        }
        if let Some(saved) = self.forms.iter().find(|form| form.form_meta.uuid == uuid) {
            let meta = &mut self.editing.form_meta;
            meta.status = saved.form_meta.status;
            meta.publish_token = saved.form_meta.publish_token.clone();
            meta.publish_url = saved.form_meta.publish_url.clone();
            meta.stat_pv = saved.form_meta.stat_pv;
            meta.stat_responses = saved.form_meta.stat_responses;
        }
    }

    // ----- saved forms -------------------------------------------------------

    /// All saved forms in save order
    pub fn forms(&self) -> &[Form] {
        &self.forms
    }

    pub fn form(&self, uuid: &str) -> Option<&Form> {
        self.forms.iter().find(|form| form.form_meta.uuid == uuid)
    }

    /// Starts a fresh draft in the editor and returns it
    pub fn create(&mut self) -> Form {
        self.editing = Form::new_draft();
        self.editing.clone()
    }

    /// Whether `id` already names a saved form, by uuid or publish token
    pub fn id_taken(&self, id: &str) -> bool {
        self.forms.iter().any(|form| form.answers_to(id))
    }

    /// Inserts or replaces a saved form by uuid
    ///
    /// Status, publish link and counters belong to the store: a replaced
    /// form keeps those of the stored copy, a new form starts as an
    /// unpublished draft without views or responses. A new form may not take
    /// a uuid that is already another form's publish token.
    ///
    /// When the form is open in the editor, the editor gets the saved copy.
    pub fn save(&mut self, mut form: Form) -> Result<(), AppError> {
        form.dedupe_ids();
        let index = self.position(form.uuid());
        let meta = &mut form.form_meta;
        match index {
            Some(index) => {
                let stored = &self.forms[index].form_meta;
                meta.created_at = stored.created_at;
                meta.status = stored.status;
                meta.publish_token = stored.publish_token.clone();
                meta.publish_url = stored.publish_url.clone();
                meta.stat_pv = stored.stat_pv;
                meta.stat_responses = stored.stat_responses;
            }
            None => {
                if self.id_taken(&meta.uuid) {
                    return Err(AppError::BadRequest(format!(
                        "{} is already used by a publish link",
                        meta.uuid
                    )));
                }
                meta.status = FormStatus::Draft;
                meta.publish_token = None;
                meta.publish_url = None;
                meta.stat_pv = 0;
                meta.stat_responses = 0;
            }
        }

        let opened = self.editing.form_meta.uuid == form.form_meta.uuid;
        self.commit_form(index, form.clone())?;
        if opened {
            self.editing = form;
        }
        Ok(())
    }

    /// Saves the editing form and returns the saved copy
    pub fn save_editing(&mut self) -> Result<Form, AppError> {
        self.save(self.editing.clone())?;
        Ok(self.editing.clone())
    }

    /// Opens a saved form in the editor
    ///
    /// Returns `None` and leaves the editor untouched when `uuid` is unknown.
    pub fn load(&mut self, uuid: &str) -> Option<Form> {
        let form = self.form(uuid)?.clone();
        self.editing = form.clone();
        Some(form)
    }

    /// Removes a saved form together with all of its responses
    ///
    /// An editor showing the form is reset to a blank draft, so the deleted
    /// form cannot be saved back. Returns whether a form was removed.
    pub fn delete(&mut self, uuid: &str) -> Result<bool, AppError> {
        let Some(index) = self.position(uuid) else {
            return Ok(false);
        };
        let mut forms = self.forms.clone();
        forms.remove(index);
        let responses: Vec<FormResponse> = self
            .responses
            .iter()
            .filter(|response| response.form_id != uuid)
            .cloned()
            .collect();
        self.write_snapshot(&forms, &responses)?;

        tracing::info!(
            form = uuid,
            responses = self.responses.len() - responses.len(),
            "form deleted"
        );
        self.forms = forms;
        self.responses = responses;
        if self.editing.form_meta.uuid == uuid {
            self.editing = Form::new_draft();
        }
        Ok(true)
    }

    /// Changes the title of a saved form; returns whether the form exists
    pub fn rename(&mut self, uuid: &str, title: &str) -> Result<bool, AppError> {
        let Some(index) = self.position(uuid) else {
            return Ok(false);
        };
        let mut form = self.forms[index].clone();
        form.form_meta.title = title.to_string();
        self.commit_form(Some(index), form)?;
        if self.editing.form_meta.uuid == uuid {
            self.editing.form_meta.title = title.to_string();
        }
        Ok(true)
    }

    // ----- editing form ------------------------------------------------------

    pub fn editing(&self) -> &Form {
        &self.editing
    }

    /// Replaces the editing form, e.g. with a freshly generated one
    pub fn set_editing(&mut self, form: Form) {
        self.editing = form;
    }

    pub fn update_meta(&mut self, patch: MetaPatch) {
        let meta = &mut self.editing.form_meta;
        if let Some(title) = patch.title {
            meta.title = title;
        }
        if let Some(description) = patch.description {
            meta.description = description;
        }
        if let Some(theme_id) = patch.theme_id {
            meta.theme_id = theme_id;
        }
    }

    /// Appends a default question of the given type and returns it
    pub fn add_question(&mut self, kind: QuestionType) -> Question {
        let question = Question::default_for(kind);
        self.editing.questions.push(question.clone());
        question
    }

    /// Applies a partial update to a question; returns whether it exists
    pub fn update_question(&mut self, id: &str, patch: QuestionPatch) -> bool {
        let Some(question) = self.editing.question_mut(id) else {
            return false;
        };
        if let Some(kind) = patch.kind {
            question.retype(kind);
        }
        if let Some(title) = patch.title {
            question.title = title;
        }
        if let Some(required) = patch.required {
            question.required = required;
        }
        if question.kind.is_choice() {
            if let Some(options) = patch.options.filter(|options| options.len() >= 2) {
                question.options = Some(options);
                question.dedupe_option_ids();
            }
        }
        if question.kind == QuestionType::Text {
            if let Some(placeholder) = patch.placeholder {
                question.placeholder = Some(placeholder);
            }
        }
        if question.kind == QuestionType::Rating {
            if let Some(max) = patch.max_rating.filter(|max| *max > 0) {
                question.max_rating = Some(max.min(MAX_RATING));
            }
        }
        true
    }

    pub fn delete_question(&mut self, id: &str) -> bool {
        let before = self.editing.questions.len();
        self.editing.questions.retain(|question| question.id != id);
        self.editing.questions.len() != before
    }

    /// Swaps a question with its neighbour; moves past either end are no-ops
    pub fn move_question(&mut self, id: &str, direction: Direction) -> bool {
        let questions = &mut self.editing.questions;
        let Some(index) = questions.iter().position(|question| question.id == id) else {
            return false;
        };
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|next| *next < questions.len()),
        };
        match target {
            Some(target) => {
                questions.swap(index, target);
                true
            }
            None => false,
        }
    }

    /// Appends an option labelled `选项 <n>` to a choice question
    pub fn add_option(&mut self, question_id: &str) -> Option<QuestionOption> {
        let question = self.editing.question_mut(question_id)?;
        let options = question.options.as_mut()?;
        let option = QuestionOption::new(format!("选项 {}", options.len() + 1));
        options.push(option.clone());
        Some(option)
    }

    pub fn update_option(&mut self, question_id: &str, option_id: &str, label: &str) -> bool {
        let Some(option) = self
            .editing
            .question_mut(question_id)
            .and_then(|question| question.options.as_mut())
            .and_then(|options| options.iter_mut().find(|option| option.id == option_id))
        else {
            return false;
        };
        option.label = label.to_string();
        true
    }

    pub fn delete_option(&mut self, question_id: &str, option_id: &str) -> bool {
        let Some(options) = self
            .editing
            .question_mut(question_id)
            .and_then(|question| question.options.as_mut())
        else {
            return false;
        };
        let before = options.len();
        options.retain(|option| option.id != option_id);
        options.len() != before
    }

    // ----- lifecycle ---------------------------------------------------------

    fn unique_publish_token(&self) -> String {
        loop {
            let token = generate_id("", PUBLISH_TOKEN_LEN);
            if !self.forms.iter().any(|form| form.answers_to(&token)) {
                return token;
            }
        }
    }

    /// Publishes a draft, or re-shows the link of an already published form
    ///
    /// The publish token and URL are issued on the first publish only.
    /// Closed forms must be reopened instead.
    pub fn publish(&mut self, uuid: &str) -> Result<Transition, AppError> {
        let Some(index) = self.position(uuid) else {
            return Ok(Transition::NotFound);
        };
        match self.forms[index].form_meta.status {
            FormStatus::Published => {
                return Ok(Transition::Unchanged(self.forms[index].form_meta.clone()))
            }
            FormStatus::Closed => return Ok(Transition::Rejected(FormStatus::Closed)),
            FormStatus::Draft => {}
        }

        let mut form = self.forms[index].clone();
        if form.form_meta.publish_token.is_none() {
            let token = self.unique_publish_token();
            form.form_meta.publish_url = Some(format!("{}/f/{}", self.public_base_url, token));
            form.form_meta.publish_token = Some(token);
        }
        form.form_meta.status = FormStatus::Published;
        let meta = form.form_meta.clone();
        self.commit_form(Some(index), form)?;
        tracing::info!(form = uuid, url = ?meta.publish_url, "form published");

        self.sync_editing(uuid);
        Ok(Transition::Applied(meta))
    }

    /// Stops collecting responses for a published form
    pub fn close(&mut self, uuid: &str) -> Result<Transition, AppError> {
        self.change_status(uuid, FormStatus::Published, FormStatus::Closed)
    }

    /// Resumes collecting responses for a closed form, keeping its URL
    pub fn reopen(&mut self, uuid: &str) -> Result<Transition, AppError> {
        self.change_status(uuid, FormStatus::Closed, FormStatus::Published)
    }

    fn change_status(
        &mut self,
        uuid: &str,
        from: FormStatus,
        to: FormStatus,
    ) -> Result<Transition, AppError> {
        let Some(index) = self.position(uuid) else {
            return Ok(Transition::NotFound);
        };
        let current = self.forms[index].form_meta.status;
        if current == to {
            return Ok(Transition::Unchanged(self.forms[index].form_meta.clone()));
        }
        if current != from {
            return Ok(Transition::Rejected(current));
        }

        let mut form = self.forms[index].clone();
        form.form_meta.status = to;
        let meta = form.form_meta.clone();
        self.commit_form(Some(index), form)?;
        tracing::info!(form = uuid, ?from, ?to, "form status changed");

        self.sync_editing(uuid);
        Ok(Transition::Applied(meta))
    }

    // ----- public access -----------------------------------------------------

    /// Looks a form up by uuid or publish token and classifies it for viewers
    pub fn resolve_public(&self, id: &str) -> PublicAccess {
        match self.forms.iter().find(|form| form.answers_to(id)) {
            None => PublicAccess::NotFound,
            Some(form) => match form.form_meta.status {
                FormStatus::Draft => PublicAccess::NotPublished,
                FormStatus::Closed => PublicAccess::Closed,
                FormStatus::Published => PublicAccess::Ready(form.clone()),
            },
        }
    }

    /// Counts one page view; only published forms are counted
    pub fn increment_pv(&mut self, uuid: &str) -> Result<bool, AppError> {
        let Some(index) = self.position(uuid) else {
            return Ok(false);
        };
        if self.forms[index].form_meta.status != FormStatus::Published {
            return Ok(false);
        }
        let mut form = self.forms[index].clone();
        form.form_meta.stat_pv += 1;
        self.commit_form(Some(index), form)?;
        self.sync_editing(uuid);
        Ok(true)
    }

    /// Resolves a public link and, when the form is ready, counts the view
    pub fn view_public(&mut self, id: &str) -> Result<PublicAccess, AppError> {
        let uuid = match self.resolve_public(id) {
            PublicAccess::Ready(form) => form.form_meta.uuid,
            other => return Ok(other),
        };
        self.increment_pv(&uuid)?;
        Ok(self
            .form(&uuid)
            .cloned()
            .map_or(PublicAccess::NotFound, PublicAccess::Ready))
    }

    // ----- responses ---------------------------------------------------------

    /// Stores a submission and bumps the form's response counter
    ///
    /// Returns `None` when `form_id` names no saved form.
    pub fn add_response(
        &mut self,
        form_id: &str,
        answers: Vec<Answer>,
    ) -> Result<Option<FormResponse>, AppError> {
        let Some(index) = self.position(form_id) else {
            return Ok(None);
        };
        let response = FormResponse {
            id: generate_id("r_", 12),
            form_id: form_id.to_string(),
            submitted_at: Utc::now(),
            answers,
        };
        self.responses.push(response.clone());
        self.forms[index].form_meta.stat_responses += 1;
        if let Err(err) = self.persist() {
            self.responses.pop();
            self.forms[index].form_meta.stat_responses -= 1;
            return Err(err);
        }
        tracing::debug!(form = form_id, response = %response.id, "response recorded");

        self.sync_editing(form_id);
        Ok(Some(response))
    }

    /// Responses of a form in submission order
    pub fn responses_for(&self, form_id: &str) -> Vec<&FormResponse> {
        self.responses
            .iter()
            .filter(|response| response.form_id == form_id)
            .collect()
    }

    /// The last `n` responses of a form, oldest first
    pub fn recent_responses(&self, form_id: &str, n: usize) -> Vec<&FormResponse> {
        let mut responses = self.responses_for(form_id);
        let skip = responses.len().saturating_sub(n);
        responses.drain(..skip);
        responses
    }
}
