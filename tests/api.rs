//! HTTP API tests against the full router, backed by the in-memory store
//! and stub providers.

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use formsmith::auth::TokenKeys;
use formsmith::config::Config;
use formsmith::images::{ImageHost, UploadedImage};
use formsmith::server::{build_router, AppState};
use formsmith_core::embedding::Embedder;
use formsmith_core::generation::SchemaGenerator;
use formsmith_core::store::memory::InMemoryStore;

const SECRET: &str = "test-secret";

const SCHEMA: &str = r#"{
  "title": "Contact Us",
  "description": "Get in touch",
  "fields": [
    { "id": "name", "label": "Name", "type": "text", "required": true },
    { "id": "email", "label": "Email", "type": "email", "required": true },
    { "id": "age", "label": "Age", "type": "number", "validation": { "min": 18 } }
  ]
}"#;

/// Embeds text as letter counts for a handful of letters.
struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(['a', 'e', 'o', 't']
            .iter()
            .map(|c| lower.matches(*c).count() as f32 + 0.1)
            .collect())
    }
}

struct StubGenerator {
    answer: Option<String>,
    instructions: Mutex<Vec<String>>,
}

#[async_trait]
impl SchemaGenerator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub"
    }
    async fn complete(&self, instruction: &str) -> Result<String> {
        self.instructions
            .lock()
            .unwrap()
            .push(instruction.to_string());
        match &self.answer {
            Some(a) => Ok(a.clone()),
            None => bail!("model unavailable"),
        }
    }
}

#[derive(Default)]
struct StubImages {
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageHost for StubImages {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, _: &str) -> Result<UploadedImage> {
        Ok(UploadedImage {
            url: format!("https://img.test/{}", file_name),
            public_id: format!("uploads/{}", bytes.len()),
            width: 1,
            height: 1,
        })
    }
    async fn delete(&self, public_id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

struct Harness {
    app: Router,
    store: Arc<InMemoryStore>,
    generator: Arc<StubGenerator>,
    images: Arc<StubImages>,
}

fn harness_with(answer: Option<&str>) -> Harness {
    let mut config = Config::minimal("unused.sqlite");
    config.auth.bcrypt_cost = 4;

    let store = Arc::new(InMemoryStore::new());
    let generator = Arc::new(StubGenerator {
        answer: answer.map(str::to_string),
        instructions: Mutex::new(Vec::new()),
    });
    let images = Arc::new(StubImages::default());

    let state = AppState {
        config: Arc::new(config),
        store: store.clone(),
        embedder: Arc::new(LetterEmbedder),
        generator: generator.clone(),
        images: images.clone(),
        tokens: Arc::new(TokenKeys::new(SECRET, 168)),
    };

    Harness {
        app: build_router(state).unwrap(),
        store,
        generator,
        images,
    }
}

fn harness() -> Harness {
    harness_with(Some(SCHEMA))
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn register(app: &Router, email: &str) -> String {
    let (status, json) = call(
        app,
        json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": email, "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    json["data"]["token"].as_str().unwrap().to_string()
}

async fn generate(app: &Router, token: &str, prompt: &str) -> Value {
    let (status, json) = call(
        app,
        json_request(
            Method::POST,
            "/api/forms/generate",
            Some(token),
            json!({ "prompt": prompt }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    json["form"].clone()
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let (status, json) = call(&h.app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_register_and_login() {
    let h = harness();
    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": " Ada@Example.com ", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["user"]["email"], "ada@example.com");

    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Login successful");
    assert!(json["data"]["token"].as_str().unwrap().len() > 20);
}

#[tokio::test]
async fn test_register_rejections() {
    let h = harness();
    register(&h.app, "ada@example.com").await;

    let cases = [
        (json!({ "email": "ada@example.com", "password": "secret123" }), "User with this email already exists"),
        (json!({ "email": "not-an-email", "password": "secret123" }), "Please provide a valid email"),
        (json!({ "email": "bob@example.com", "password": "12345" }), "Password must be at least 6 characters long"),
    ];
    for (body, message) in cases {
        let (status, json) = call(
            &h.app,
            json_request(Method::POST, "/api/auth/register", None, body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], message);
    }
}

#[tokio::test]
async fn test_login_wrong_password() {
    let h = harness();
    register(&h.app, "ada@example.com").await;

    for email in ["ada@example.com", "nobody@example.com"] {
        let (status, json) = call(
            &h.app,
            json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": email, "password": "wrong-password" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["message"], "Invalid email or password");
    }
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let h = harness();

    let (status, json) = call(&h.app, get("/api/forms", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "No token provided. Please log in.");

    let (status, json) = call(&h.app, get("/api/forms", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "Invalid token. Please log in again.");

    let now = chrono::Utc::now().timestamp();
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({ "userId": "u1", "iat": now - 7200, "exp": now - 3600 }),
        &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    let (status, json) = call(&h.app, get("/api/forms", Some(&expired))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "Token expired. Please log in again.");
}

#[tokio::test]
async fn test_generate_and_list_forms() {
    let h = harness();
    let token = register(&h.app, "ada@example.com").await;

    let form = generate(&h.app, &token, "a contact form for my bakery").await;
    assert_eq!(form["title"], "Contact Us");
    assert_eq!(form["metadata"]["description"], "Get in touch");
    assert_eq!(form["shareableId"].as_str().unwrap().len(), 10);
    assert!(form.get("embedding").is_none());

    let second = generate(&h.app, &token, "another contact form").await;

    // The second generation saw the first form as context.
    let instructions = h.generator.instructions.lock().unwrap().clone();
    assert_eq!(instructions.len(), 2);
    assert!(instructions[0].contains("Relevant form history:\n[]"));
    assert!(instructions[1].contains(form["id"].as_str().unwrap()));

    let (status, json) = call(&h.app, get("/api/forms/forms", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let forms = json["data"]["forms"].as_array().unwrap();
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0]["id"], second["id"]);

    // Forms are private to their owner.
    let other = register(&h.app, "bob@example.com").await;
    let (_, json) = call(&h.app, get("/api/forms", Some(&other))).await;
    assert!(json["data"]["forms"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_rejects_only_empty_prompt() {
    let h = harness();
    let token = register(&h.app, "ada@example.com").await;
    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            "/api/forms/generate",
            Some(&token),
            json!({ "prompt": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Prompt is required");
    assert_eq!(h.store.form_count(), 0);

    // Whitespace is handed to the model unchanged.
    let form = generate(&h.app, &token, "   ").await;
    assert_eq!(form["prompt"], "   ");
    let seen = h.generator.instructions.lock().unwrap();
    assert!(seen.last().unwrap().contains("   "));
}

#[tokio::test]
async fn test_generation_failure_is_generic_500() {
    let h = harness_with(None);
    let token = register(&h.app, "ada@example.com").await;
    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            "/api/forms/generate",
            Some(&token),
            json!({ "prompt": "a survey" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["message"], "Internal Server Error");
    assert_eq!(h.store.form_count(), 0);
}

#[tokio::test]
async fn test_public_view_and_submit() {
    let h = harness();
    let token = register(&h.app, "ada@example.com").await;
    let form = generate(&h.app, &token, "contact form").await;
    let share = form["shareableId"].as_str().unwrap();

    let (status, json) = call(&h.app, get(&format!("/api/public/form/{}", share), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["form"]["description"], "Get in touch");
    assert_eq!(json["data"]["form"]["schema"]["fields"][0]["id"], "name");

    let (status, _) = call(&h.app, get("/api/public/form/missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let submit_uri = format!("/api/public/form/{}/submit", share);

    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            &submit_uri,
            None,
            json!({ "responses": { "email": "nope", "age": 12 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_failed");
    let details: Vec<&str> = json["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap())
        .collect();
    assert_eq!(
        details,
        vec![
            "Field \"Name\" is required",
            "Field \"Email\" must be a valid email",
            "Field \"Age\" must be at least 18",
        ]
    );

    let (status, json) = call(
        &h.app,
        json_request(Method::POST, &submit_uri, None, json!({ "responses": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Responses must be an object");
    assert_eq!(h.store.submission_count(), 0);

    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            &submit_uri,
            None,
            json!({
                "responses": { "name": "Ada", "email": "ada@example.com", "age": "36" },
                "imageUrls": ["https://img.test/a.png", 7]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["data"]["submissionId"].is_string());
    assert_eq!(h.store.submission_count(), 1);
}

#[tokio::test]
async fn test_submit_to_loosely_shaped_form() {
    let h = harness_with(Some(
        r#"{"title":null,"fields":[{"id":"rating","label":"Rating","type":"select","options":[1,2,3,4,5],"required":true},{"id":"qty","label":"Qty","type":"number","validation":{"min":"0"}}]}"#,
    ));
    let token = register(&h.app, "ada@example.com").await;
    let form = generate(&h.app, &token, "rate us").await;
    let submit_uri = format!("/api/public/form/{}/submit", form["shareableId"].as_str().unwrap());

    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            &submit_uri,
            None,
            json!({ "responses": { "rating": 7, "qty": -2 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", json);
    assert_eq!(json["error"]["details"].as_array().unwrap().len(), 2);

    let (status, json) = call(
        &h.app,
        json_request(
            Method::POST,
            &submit_uri,
            None,
            json!({ "responses": { "rating": 5, "qty": "3" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    assert_eq!(h.store.submission_count(), 1);
}

#[tokio::test]
async fn test_submissions_export_and_delete() {
    let h = harness();
    let token = register(&h.app, "ada@example.com").await;
    let form = generate(&h.app, &token, "contact form").await;
    let form_id = form["id"].as_str().unwrap();
    let share = form["shareableId"].as_str().unwrap();

    call(
        &h.app,
        json_request(
            Method::POST,
            &format!("/api/public/form/{}/submit", share),
            None,
            json!({ "responses": { "name": "Ada, Countess", "email": "ada@example.com" } }),
        ),
    )
    .await;

    let (status, json) = call(
        &h.app,
        get(&format!("/api/submissions/form/{}", form_id), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["count"], 1);
    assert_eq!(json["data"]["form"]["title"], "Contact Us");
    assert_eq!(
        json["data"]["submissions"][0]["responses"]["name"],
        "Ada, Countess"
    );

    let (status, json) = call(&h.app, get("/api/submissions/user", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["submissions"][0]["form"]["title"], "Contact Us");

    let other = register(&h.app, "bob@example.com").await;
    let (status, _) = call(
        &h.app,
        get(&format!("/api/submissions/form/{}", form_id), Some(&other)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = h
        .app
        .clone()
        .oneshot(get(
            &format!("/api/submissions/form/{}/export", form_id),
            Some(&token),
        ))
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
        .contains("Contact Us_submissions.csv"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("Submitted At,"));
    assert!(csv.contains("\"Ada, Countess\""));

    let delete = |token: &str| {
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/forms/{}", form_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = call(&h.app, delete(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, json) = call(&h.app, delete(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(h.store.form_count(), 0);
    assert_eq!(h.store.submission_count(), 0);

    let (status, _) = call(&h.app, get(&format!("/api/public/form/{}", share), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn multipart_request(token: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let boundary = "formsmith-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"pic.png\"\r\nContent-Type: {ct}\r\n\r\n",
            b = boundary,
            f = field,
            ct = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload/image")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_image_upload_and_delete() {
    let h = harness();
    let token = register(&h.app, "ada@example.com").await;

    let (status, json) = call(
        &h.app,
        multipart_request(&token, "image", "image/png", b"\x89PNG fake"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["data"]["url"], "https://img.test/pic.png");
    assert_eq!(json["data"]["publicId"], "uploads/9");

    let (status, json) = call(
        &h.app,
        multipart_request(&token, "image", "text/plain", b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"]["message"],
        "Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed."
    );

    let (status, json) = call(
        &h.app,
        multipart_request(&token, "attachment", "image/png", b"x"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "No image file provided");

    let (status, _) = call(
        &h.app,
        json_request(Method::DELETE, "/api/upload/image", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h.app,
        json_request(
            Method::DELETE,
            "/api/upload/image",
            Some(&token),
            json!({ "publicId": "uploads/9" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(*h.images.deleted.lock().unwrap(), vec!["uploads/9"]);
}
