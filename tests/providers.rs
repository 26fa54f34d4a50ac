//! Provider clients against a local mock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use formsmith::config::{EmbeddingConfig, GenerationConfig, ImagesConfig, Secrets};
use formsmith::embedding::create_embedder;
use formsmith::generation::create_generator;
use formsmith::images::create_image_host;
use formsmith_core::generation::generate_schema;

fn secrets() -> Secrets {
    Secrets::from_lookup(|key| match key {
        "GEMINI_API_KEY" => Some("gemini-key".to_string()),
        "OPENAI_API_KEY" => Some("openai-key".to_string()),
        "CLOUDINARY_CLOUD_NAME" => Some("demo".to_string()),
        "CLOUDINARY_API_KEY" => Some("123456".to_string()),
        "CLOUDINARY_API_SECRET" => Some("shh".to_string()),
        _ => None,
    })
}

fn embedding_config(provider: &str, model: &str, url: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: provider.to_string(),
        model: Some(model.to_string()),
        url: Some(url.to_string()),
        ..EmbeddingConfig::default()
    }
}

fn generation_config(provider: &str, model: &str, url: &str) -> GenerationConfig {
    GenerationConfig {
        provider: provider.to_string(),
        model: Some(model.to_string()),
        url: Some(url.to_string()),
        ..GenerationConfig::default()
    }
}

#[tokio::test]
async fn test_gemini_embedder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-embedding-004:embedContent"))
        .and(header("x-goog-api-key", "gemini-key"))
        .and(body_partial_json(json!({
            "content": { "parts": [{ "text": "wedding rsvp" }] }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = embedding_config("gemini", "text-embedding-004", &server.uri());
    config.dims = Some(3);
    let embedder = create_embedder(&config, &secrets()).unwrap();

    let vec = embedder.embed("wedding rsvp").await.unwrap();
    assert_eq!(vec.len(), 3);
    assert_eq!(embedder.model_name(), "text-embedding-004");
}

#[tokio::test]
async fn test_embedder_rejects_wrong_dims() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "embedding": [1.0, 2.0] }] })),
        )
        .mount(&server)
        .await;

    let mut config = embedding_config("openai", "text-embedding-3-small", &server.uri());
    config.dims = Some(1536);
    let embedder = create_embedder(&config, &secrets()).unwrap();

    let err = embedder.embed("x").await.unwrap_err();
    assert!(err.to_string().contains("expected 1536"));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer openai-key"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = embedding_config("openai", "text-embedding-3-small", &server.uri());
    config.max_retries = 3;
    let embedder = create_embedder(&config, &secrets()).unwrap();

    let err = embedder.embed("x").await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })),
        )
        .mount(&server)
        .await;

    let mut config = embedding_config("ollama", "nomic-embed-text", &server.uri());
    config.max_retries = 1;
    let embedder = create_embedder(&config, &secrets()).unwrap();

    assert_eq!(embedder.embed("x").await.unwrap(), vec![0.5, 0.5]);
}

#[tokio::test]
async fn test_no_retry_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = embedding_config("ollama", "nomic-embed-text", &server.uri());
    let embedder = create_embedder(&config, &secrets()).unwrap();
    assert!(embedder.embed("x").await.is_err());
}

#[tokio::test]
async fn test_gemini_generator_requests_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "```json\n{\"title\":\"RSVP\",\"fields\":[]}\n```" }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = generation_config("gemini", "gemini-1.5-flash", &server.uri());
    let generator = create_generator(&config, &secrets()).unwrap();

    let schema = generate_schema(generator.as_ref(), "an rsvp form", &[])
        .await
        .unwrap();
    assert_eq!(schema["title"], "RSVP");
}

#[tokio::test]
async fn test_openai_generator() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"title\":\"Survey\"}" } }]
        })))
        .mount(&server)
        .await;

    let config = generation_config("openai", "gpt-4o-mini", &server.uri());
    let generator = create_generator(&config, &secrets()).unwrap();

    let text = generator.complete("make a survey").await.unwrap();
    assert_eq!(text, "{\"title\":\"Survey\"}");
}

#[tokio::test]
async fn test_generator_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let config = generation_config("openai", "gpt-4o-mini", &server.uri());
    let generator = create_generator(&config, &secrets()).unwrap();

    let err = generate_schema(generator.as_ref(), "x", &[]).await.unwrap_err();
    assert!(format!("{:#}", err).contains("429"));
}

fn images_config(url: &str) -> ImagesConfig {
    ImagesConfig {
        provider: "cloudinary".to_string(),
        url: Some(url.to_string()),
        ..ImagesConfig::default()
    }
}

#[tokio::test]
async fn test_cloudinary_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "public_id": "form-uploads/abc",
            "secure_url": "https://res.cloudinary.com/demo/image/upload/abc.png",
            "width": 320,
            "height": 200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let host = create_image_host(&images_config(&server.uri()), &secrets()).unwrap();
    let image = host
        .upload(b"\x89PNG".to_vec(), "abc.png", "image/png")
        .await
        .unwrap();
    assert_eq!(image.public_id, "form-uploads/abc");
    assert_eq!(image.width, 320);

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body).to_string();
    assert!(body.contains("name=\"signature\""));
    assert!(body.contains("name=\"api_key\""));
    assert!(body.contains("form-uploads"));
}

#[tokio::test]
async fn test_cloudinary_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/destroy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/destroy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "not found" })))
        .mount(&server)
        .await;

    let host = create_image_host(&images_config(&server.uri()), &secrets()).unwrap();
    host.delete("form-uploads/abc").await.unwrap();

    let err = host.delete("form-uploads/abc").await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_cloudinary_requires_credentials() {
    let result = create_image_host(
        &images_config("http://localhost:1"),
        &Secrets::from_lookup(|_| None),
    );
    assert!(result.is_err());
}
