//! Integration tests for the form builder API
//!
//! These tests verify the entire application stack including:
//! - HTTP routing
//! - Generation through a stubbed workflow
//! - Editing, lifecycle and public collection
//! - Statistics, export and persistence

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

// Import from the main crate
use formgen::config::AppConfig;
use formgen::database::{init_db, RedbStorage};
use formgen::error::AppError;
use formgen::route::create_app;
use formgen::state::AppState;
use formgen::store::FormStore;
use formgen::upstream::{FormGenerator, WorkflowClient};

const BASE_URL: &str = "http://forms.test";

/// Generator that replays a canned workflow reply, or fails like an unreachable service
struct StubGenerator {
    reply: Option<String>,
}

#[async_trait]
impl FormGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
        self.reply.clone().ok_or(AppError::UpstreamUnavailable {
            status: 500,
            body: "workflow failed".to_string(),
        })
    }
}

fn coffee_survey_reply() -> String {
    let payload = json!({
        "form_meta": {
            "title": "咖啡口味调研",
            "description": "了解大家的咖啡偏好",
            "theme_id": "theme_warm"
        },
        "questions": [
            {
                "id": "q_01",
                "type": "radio",
                "title": "你最常喝哪种咖啡？",
                "options": [
                    { "id": "o_1", "label": "美式" },
                    { "id": "o_2", "label": "拿铁" }
                ]
            },
            {
                "id": "q_02",
                "type": "checkbox",
                "title": "你喜欢哪些配料？",
                "required": false,
                "options": [
                    { "id": "o_1", "label": "燕麦奶" },
                    { "id": "o_2", "label": "焦糖" },
                    { "id": "o_3", "label": "肉桂" }
                ]
            },
            { "id": "q_03", "type": "rating", "title": "满意度", "maxRating": 5 },
            { "id": "q_04", "type": "text", "title": "其他建议", "required": false }
        ]
    });
    json!({ "data": { "outputs": { "result": payload.to_string() } } }).to_string()
}

/// Helper function to create a test application with a temporary database
fn setup_test_app(reply: Option<String>) -> (axum::Router, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap();

    let db = init_db(db_path).expect("Failed to initialize test database");
    let storage = Arc::new(RedbStorage::new(Arc::new(db)));
    let store = FormStore::open(storage, BASE_URL).expect("Failed to open store");
    let config = AppConfig {
        public_base_url: BASE_URL.to_string(),
        ..AppConfig::default()
    };

    let app = create_app(AppState::new(store, Arc::new(StubGenerator { reply }), config));
    (app, temp_db)
}

/// Sends a request and returns the status plus the JSON body (Null when empty)
async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(payload) => {
            builder = builder.header("content-type", "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse JSON")
    };
    (status, json)
}

async fn generate(app: &axum::Router) -> Value {
    let (status, form) = send(
        app,
        "POST",
        "/api/forms/generate",
        Some(json!({ "prompt": "帮我做一个咖啡口味调研" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    form
}

async fn publish(app: &axum::Router, uuid: &str) -> Value {
    let (status, meta) = send(app, "POST", &format!("/api/forms/{}/publish", uuid), None).await;
    assert_eq!(status, StatusCode::OK);
    meta
}

#[tokio::test]
async fn test_generate_form_normalizes_and_saves_draft() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));

    let form = generate(&app).await;
    assert_eq!(form["form_meta"]["title"], "咖啡口味调研");
    assert_eq!(form["form_meta"]["theme_id"], "theme_warm");
    assert_eq!(form["form_meta"]["status"], "draft");
    assert_eq!(form["questions"].as_array().unwrap().len(), 4);
    assert_eq!(form["questions"][0]["required"], true);
    assert_eq!(form["questions"][1]["required"], false);
    assert_eq!(form["questions"][3]["placeholder"], "请输入...");

    // Saved and opened in the editor
    let (_, list) = send(&app, "GET", "/api/forms", None).await;
    assert_eq!(list["total"], 1);
    let (_, editing) = send(&app, "GET", "/api/editor", None).await;
    assert_eq!(editing["form_meta"]["uuid"], form["form_meta"]["uuid"]);
}

#[tokio::test]
async fn test_generate_form_rejects_empty_prompt() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));

    let (status, body) = send(&app, "POST", "/api/forms/generate", Some(json!({ "prompt": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_generate_form_failures_leave_store_untouched() {
    let (app, _temp_db) = setup_test_app(Some("definitely not json".to_string()));
    let (status, body) = send(&app, "POST", "/api/forms/generate", Some(json!({ "prompt": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "malformed_response");
    let (_, list) = send(&app, "GET", "/api/forms", None).await;
    assert_eq!(list["total"], 0);

    let (app, _temp_db) = setup_test_app(None);
    let (status, body) = send(&app, "POST", "/api/forms/generate", Some(json!({ "prompt": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "upstream_unavailable");
    let (_, list) = send(&app, "GET", "/api/forms", None).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_create_save_load_and_rename_form() {
    let (app, _temp_db) = setup_test_app(None);

    let (status, form) = send(&app, "POST", "/api/forms", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(form["form_meta"]["title"], "未命名表单");
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();

    let mut edited = form.clone();
    edited["form_meta"]["description"] = json!("新的描述");
    let (status, saved) = send(&app, "PUT", &format!("/api/forms/{}", uuid), Some(edited)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["form_meta"]["description"], "新的描述");

    let (status, renamed) = send(
        &app,
        "PATCH",
        &format!("/api/forms/{}/title", uuid),
        Some(json!({ "title": "周末活动报名" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["form_meta"]["title"], "周末活动报名");

    let (status, loaded) = send(&app, "GET", &format!("/api/forms/{}", uuid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["form_meta"]["title"], "周末活动报名");
    assert_eq!(loaded["form_meta"]["description"], "新的描述");

    let (status, body) = send(&app, "GET", "/api/forms/f_missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_editor_structural_edits() {
    let (app, _temp_db) = setup_test_app(None);
    send(&app, "POST", "/api/forms", None).await;

    let (status, form) = send(&app, "POST", "/api/editor/questions", Some(json!({ "type": "radio" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let radio = form["questions"][0].clone();
    assert_eq!(radio["options"].as_array().unwrap().len(), 2);
    let radio_id = radio["id"].as_str().unwrap().to_string();

    let (_, form) = send(&app, "POST", "/api/editor/questions", Some(json!({ "type": "rating" }))).await;
    assert_eq!(form["questions"][1]["maxRating"], 5);
    let rating_id = form["questions"][1]["id"].as_str().unwrap().to_string();

    // Moving the first question up is a no-op
    let (_, form) = send(
        &app,
        "POST",
        &format!("/api/editor/questions/{}/move", radio_id),
        Some(json!({ "direction": "up" })),
    )
    .await;
    assert_eq!(form["questions"][0]["id"], radio_id.as_str());

    let (_, form) = send(
        &app,
        "POST",
        &format!("/api/editor/questions/{}/move", rating_id),
        Some(json!({ "direction": "up" })),
    )
    .await;
    assert_eq!(form["questions"][0]["id"], rating_id.as_str());

    let (_, form) = send(&app, "POST", &format!("/api/editor/questions/{}/options", radio_id), None).await;
    let options = form["questions"][1]["options"].as_array().unwrap().clone();
    assert_eq!(options.len(), 3);
    assert_eq!(options[2]["label"], "选项 3");
    let option_id = options[2]["id"].as_str().unwrap().to_string();

    let (_, form) = send(
        &app,
        "PATCH",
        &format!("/api/editor/questions/{}/options/{}", radio_id, option_id),
        Some(json!({ "label": "都喜欢" })),
    )
    .await;
    assert_eq!(form["questions"][1]["options"][2]["label"], "都喜欢");

    let (_, form) = send(
        &app,
        "DELETE",
        &format!("/api/editor/questions/{}/options/{}", radio_id, option_id),
        None,
    )
    .await;
    assert_eq!(form["questions"][1]["options"].as_array().unwrap().len(), 2);

    let (_, form) = send(
        &app,
        "PATCH",
        &format!("/api/editor/questions/{}", rating_id),
        Some(json!({ "title": "打个分吧", "required": false })),
    )
    .await;
    assert_eq!(form["questions"][0]["title"], "打个分吧");
    assert_eq!(form["questions"][0]["required"], false);

    let (_, form) = send(&app, "PATCH", "/api/editor/meta", Some(json!({ "title": "编辑后的表单" }))).await;
    assert_eq!(form["form_meta"]["title"], "编辑后的表单");

    let (_, form) = send(&app, "DELETE", &format!("/api/editor/questions/{}", rating_id), None).await;
    assert_eq!(form["questions"].as_array().unwrap().len(), 1);

    // Unknown ids leave the form as it is
    let (status, unchanged) = send(&app, "DELETE", "/api/editor/questions/q_missing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unchanged, form);

    let (status, saved) = send(&app, "POST", "/api/editor/save", None).await;
    assert_eq!(status, StatusCode::OK);
    let uuid = saved["form_meta"]["uuid"].as_str().unwrap();
    let (_, loaded) = send(&app, "GET", &format!("/api/forms/{}", uuid), None).await;
    assert_eq!(loaded["form_meta"]["title"], "编辑后的表单");
    assert_eq!(loaded["questions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_publish_close_reopen_lifecycle() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));
    let form = generate(&app).await;
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();

    // Drafts are not served
    let (status, body) = send(&app, "GET", &format!("/f/{}", uuid), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_published");

    let meta = publish(&app, &uuid).await;
    assert_eq!(meta["status"], "published");
    let url = meta["publish_url"].as_str().unwrap().to_string();
    let token = meta["publish_token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 8);
    assert_eq!(url, format!("{}/f/{}", BASE_URL, token));

    // Publishing again hands out the same link
    let again = publish(&app, &uuid).await;
    assert_eq!(again["publish_url"], url.as_str());

    let (status, served) = send(&app, "GET", &format!("/f/{}", token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served["form_meta"]["uuid"], uuid.as_str());

    let (status, meta) = send(&app, "POST", &format!("/api/forms/{}/close", uuid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["status"], "closed");

    let (status, body) = send(&app, "GET", &format!("/f/{}", token), None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "closed");

    let (status, body) = send(&app, "POST", &format!("/api/forms/{}/publish", uuid), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (status, meta) = send(&app, "POST", &format!("/api/forms/{}/reopen", uuid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["status"], "published");
    assert_eq!(meta["publish_url"], url.as_str());

    let (status, _) = send(&app, "GET", "/f/unknown1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_response_validation() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));
    let form = generate(&app).await;
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();

    let answers = json!({ "answers": [
        { "question_id": "q_01", "value": "o_2" },
        { "question_id": "q_03", "value": 4 }
    ]});

    let (status, _) = send(&app, "POST", &format!("/f/{}/responses", uuid), Some(answers.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let meta = publish(&app, &uuid).await;
    let token = meta["publish_token"].as_str().unwrap();

    let (status, response) = send(&app, "POST", &format!("/f/{}/responses", token), Some(answers)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["form_id"], uuid.as_str());
    assert_eq!(response["answers"].as_array().unwrap().len(), 2);

    // Missing required rating
    let (status, body) = send(
        &app,
        "POST",
        &format!("/f/{}/responses", token),
        Some(json!({ "answers": [{ "question_id": "q_01", "value": "o_1" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_submission");

    // Out of range rating
    let (status, _) = send(
        &app,
        "POST",
        &format!("/f/{}/responses", token),
        Some(json!({ "answers": [
            { "question_id": "q_01", "value": "o_1" },
            { "question_id": "q_03", "value": 9 }
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, list) = send(&app, "GET", &format!("/api/forms/{}/responses", uuid), None).await;
    assert_eq!(list["total_fetched"], 1);
}

#[tokio::test]
async fn test_stats_and_recent_responses() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));
    let form = generate(&app).await;
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();
    publish(&app, &uuid).await;

    for _ in 0..4 {
        send(&app, "GET", &format!("/f/{}", uuid), None).await;
    }
    for (choice, score) in [("o_1", 5), ("o_2", 4), ("o_2", 5)] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/f/{}/responses", uuid),
            Some(json!({ "answers": [
                { "question_id": "q_01", "value": choice },
                { "question_id": "q_02", "value": ["o_1", "o_3"] },
                { "question_id": "q_03", "value": score },
                { "question_id": "q_04", "value": "多一些低糖选择" }
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, stats) = send(&app, "GET", &format!("/api/forms/{}/stats", uuid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["pv"], 4);
    assert_eq!(stats["response_count"], 3);
    assert_eq!(stats["conversion_rate"], "75.0");

    let radio = &stats["questions"][0];
    assert_eq!(radio["kind"], "choice");
    assert_eq!(radio["buckets"][0], json!({ "label": "美式", "count": 1 }));
    assert_eq!(radio["buckets"][1], json!({ "label": "拿铁", "count": 2 }));

    let checkbox = &stats["questions"][1];
    assert_eq!(checkbox["buckets"][0]["count"], 3);
    assert_eq!(checkbox["buckets"][1]["count"], 0);

    let rating = &stats["questions"][2];
    assert_eq!(rating["kind"], "rating");
    assert_eq!(rating["buckets"].as_array().unwrap().len(), 5);
    assert_eq!(rating["buckets"][4]["count"], 2);

    let text = &stats["questions"][3];
    assert_eq!(text["kind"], "text");
    assert_eq!(text["total"], 3);

    let (_, recent) = send(&app, "GET", &format!("/api/forms/{}/responses?limit=2", uuid), None).await;
    assert_eq!(recent["total_fetched"], 2);
}

#[tokio::test]
async fn test_export_responses_as_csv() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));
    let form = generate(&app).await;
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();
    publish(&app, &uuid).await;

    send(
        &app,
        "POST",
        &format!("/f/{}/responses", uuid),
        Some(json!({ "answers": [
            { "question_id": "q_01", "value": "o_2" },
            { "question_id": "q_02", "value": ["o_1", "o_2"] },
            { "question_id": "q_03", "value": 3 }
        ]})),
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/forms/{}/export", uuid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("filename*=UTF-8''"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = csv.trim_start_matches('\u{feff}').lines();
    assert_eq!(
        lines.next().unwrap(),
        "提交时间,你最常喝哪种咖啡？,你喜欢哪些配料？,满意度,其他建议"
    );
    let row = lines.next().unwrap();
    assert!(row.ends_with(",拿铁,\"燕麦奶, 焦糖\",3,"));
    assert!(lines.next().is_none());
}

#[tokio::test]
async fn test_delete_form_cascades_to_responses() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));
    let form = generate(&app).await;
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();
    publish(&app, &uuid).await;
    send(
        &app,
        "POST",
        &format!("/f/{}/responses", uuid),
        Some(json!({ "answers": [
            { "question_id": "q_01", "value": "o_1" },
            { "question_id": "q_03", "value": 2 }
        ]})),
    )
    .await;

    let (status, body) = send(&app, "DELETE", &format!("/api/forms/{}", uuid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_id"], uuid.as_str());

    let (status, _) = send(&app, "GET", &format!("/api/forms/{}/responses", uuid), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &format!("/f/{}", uuid), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/api/forms/{}", uuid), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forms_survive_restart() {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap().to_string();

    let uuid = {
        let db = init_db(&db_path).unwrap();
        let mut store = FormStore::open(Arc::new(RedbStorage::new(Arc::new(db))), BASE_URL).unwrap();
        let form = store.create();
        store.save(form.clone()).unwrap();
        store.publish(form.uuid()).unwrap();
        form.uuid().to_string()
    };

    let db = init_db(&db_path).unwrap();
    let store = FormStore::open(Arc::new(RedbStorage::new(Arc::new(db))), BASE_URL).unwrap();
    let app = create_app(AppState::new(
        store,
        Arc::new(StubGenerator { reply: None }),
        AppConfig::default(),
    ));

    let (status, form) = send(&app, "GET", &format!("/f/{}", uuid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["form_meta"]["status"], "published");
}

#[tokio::test]
async fn test_put_cannot_forge_lifecycle_or_counters() {
    let (app, _temp_db) = setup_test_app(None);

    let (_, mut form) = send(&app, "POST", "/api/forms", None).await;
    let uuid = "f_forgedform".to_string();
    form["form_meta"]["uuid"] = json!(uuid);
    form["form_meta"]["status"] = json!("closed");
    form["form_meta"]["stat_responses"] = json!(7);
    form["form_meta"]["stat_pv"] = json!(30);

    let (status, saved) = send(&app, "PUT", &format!("/api/forms/{}", uuid), Some(form)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["form_meta"]["status"], "draft");
    assert_eq!(saved["form_meta"]["stat_responses"], 0);
    assert_eq!(saved["form_meta"]["stat_pv"], 0);
    assert!(saved["form_meta"].get("publish_url").is_none());

    let (status, _) = send(&app, "POST", &format!("/api/forms/{}/reopen", uuid), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_put_refreshes_the_editor() {
    let (app, _temp_db) = setup_test_app(None);
    let (_, mut form) = send(&app, "POST", "/api/forms", None).await;
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();

    form["form_meta"]["description"] = json!("来自另一个窗口");
    send(&app, "PUT", &format!("/api/forms/{}", uuid), Some(form)).await;

    let (_, editing) = send(&app, "GET", "/api/editor", None).await;
    assert_eq!(editing["form_meta"]["description"], "来自另一个窗口");
}

#[tokio::test]
async fn test_deleted_form_stays_deleted_after_editor_save() {
    let (app, _temp_db) = setup_test_app(Some(coffee_survey_reply()));
    let form = generate(&app).await;
    let uuid = form["form_meta"]["uuid"].as_str().unwrap().to_string();
    publish(&app, &uuid).await;

    send(&app, "DELETE", &format!("/api/forms/{}", uuid), None).await;
    let (status, saved) = send(&app, "POST", "/api/editor/save", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(saved["form_meta"]["uuid"], uuid.as_str());

    let (status, _) = send(&app, "GET", &format!("/api/forms/{}", uuid), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generation_without_api_key_is_upstream_unavailable() {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).unwrap();
    let store = FormStore::open(Arc::new(RedbStorage::new(Arc::new(db))), BASE_URL).unwrap();
    let config = AppConfig::default();
    let generator = Arc::new(WorkflowClient::new(&config.workflow_api_url, None));
    let app = create_app(AppState::new(store, generator, config));

    let (status, body) = send(&app, "POST", "/api/forms/generate", Some(json!({ "prompt": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "upstream_unavailable");
    let (_, list) = send(&app, "GET", "/api/forms", None).await;
    assert_eq!(list["total"], 0);
}
