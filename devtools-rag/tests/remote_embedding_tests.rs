//! Remote embedding against a mock OpenAI-compatible server.

use std::sync::Arc;

use devtools_rag::{
    ContextConfig, ContextEngine, ContextRecord, DocumentStore, EmbeddingConfig,
    EmbeddingProvider, EmbeddingProviderKind, FallbackEmbedder, HashEmbedder,
    InMemoryDocumentStore, OpenAIEmbeddingProvider, ServiceState,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIMENSIONS: usize = 384;

fn remote_vector(seed: f32) -> Vec<f32> {
    (0..DIMENSIONS).map(|i| if i == 0 { seed } else { 0.0 }).collect()
}

fn provider(server: &MockServer) -> OpenAIEmbeddingProvider {
    OpenAIEmbeddingProvider::new("sk-test", DIMENSIONS).unwrap().with_base_url(server.uri())
}

async fn mount_embeddings(server: &MockServer, vectors: Vec<Vec<f32>>) {
    let data: Vec<_> = vectors.into_iter().map(|v| json!({ "embedding": v })).collect();
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "dimensions": DIMENSIONS })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn remote_vectors_are_used_verbatim() {
    let server = MockServer::start().await;
    mount_embeddings(&server, vec![remote_vector(1.0)]).await;

    let embedder = FallbackEmbedder::with_primary(
        Arc::new(provider(&server)),
        HashEmbedder::new(DIMENSIONS),
    );
    assert_eq!(embedder.embed("TypeError: x is undefined").await, remote_vector(1.0));
}

#[tokio::test]
async fn server_errors_fall_back_to_local_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": { "message": "upstream overloaded" } })),
        )
        .mount(&server)
        .await;

    let remote = provider(&server);
    let err = remote.embed("hello").await.unwrap_err();
    assert!(err.to_string().contains("upstream overloaded"));

    let local = HashEmbedder::new(DIMENSIONS);
    let embedder = FallbackEmbedder::with_primary(Arc::new(remote), local.clone());
    assert_eq!(embedder.embed("hello world").await, local.embed_text("hello world"));
    assert_eq!(
        embedder.embed_batch(&["a b", "c d"]).await,
        vec![local.embed_text("a b"), local.embed_text("c d")]
    );
}

#[tokio::test]
async fn wrong_dimensionality_is_replaced_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] })),
        )
        .mount(&server)
        .await;

    let local = HashEmbedder::new(DIMENSIONS);
    let embedder = FallbackEmbedder::with_primary(Arc::new(provider(&server)), local.clone());
    assert_eq!(embedder.embed("network timeout").await, local.embed_text("network timeout"));
}

#[tokio::test]
async fn status_reflects_the_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    let status = provider(&server).status().await;
    assert_eq!(status.state, ServiceState::Ok);
    assert_eq!(status.message, "OpenAI Connected");

    let unauthorized = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&unauthorized)
        .await;
    let status = provider(&unauthorized).status().await;
    assert_eq!(status.state, ServiceState::Error);
    assert_eq!(status.message, "OpenAI Connection Failed: Invalid API Key");
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let remote = OpenAIEmbeddingProvider::new("sk-test", DIMENSIONS)
        .unwrap()
        .with_base_url("http://127.0.0.1:1");
    let status = remote.status().await;
    assert_eq!(status.state, ServiceState::Error);
    assert_eq!(status.message, "OpenAI Connection Failed: Network Error");
}

#[tokio::test]
async fn configured_engine_stores_remote_vectors() {
    let server = MockServer::start().await;
    mount_embeddings(&server, vec![remote_vector(0.5)]).await;

    let config = ContextConfig::builder()
        .embedding(EmbeddingConfig {
            provider: EmbeddingProviderKind::OpenAI,
            api_key: Some("sk-test".into()),
            base_url: Some(server.uri()),
            ..EmbeddingConfig::default()
        })
        .build()
        .unwrap();
    let store = Arc::new(InMemoryDocumentStore::new());
    let engine = ContextEngine::builder().config(config).store(store.clone()).build().unwrap();
    engine.open().await.unwrap();

    let ids = engine.add_document(ContextRecord::new("CONSOLE", "short entry")).await.unwrap();
    assert_eq!(ids.len(), 1);

    let contents = store.load_all().await.unwrap();
    assert_eq!(contents.embeddings[&ids[0]], remote_vector(0.5));
    assert_eq!(engine.embedding_status().await.state, ServiceState::Error);
}
