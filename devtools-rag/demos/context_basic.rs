//! # Context Basic Example
//!
//! Captures a few page-context records, searches them and prints the prompt
//! summary an assistant would receive.
//!
//! Uses the SQLite store in a temporary directory and the local hash
//! embedding, so it runs with **zero API keys**. Set `OPENAI_API_KEY` and
//! `DEVTOOLS_RAG_PROVIDER=openai` to try the remote embedder.
//!
//! Run: `cargo run -p devtools-rag --example context_basic`

use std::sync::Arc;

use devtools_rag::telemetry::init_tracing;
use devtools_rag::{
    ContextConfig, ContextEngine, ContextRecord, EmbeddingConfig, SearchOptions,
    SqliteDocumentStore, SqliteStoreConfig, SummaryOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("devtools_rag=info");

    // -- 1. Open an engine over a throwaway database ----------------------
    let dir = tempfile::tempdir()?;
    let store = SqliteDocumentStore::new(
        SqliteStoreConfig::new(dir.path().join("context.db")).with_quota(8 * 1024 * 1024),
    );
    let config = ContextConfig::builder().embedding(EmbeddingConfig::from_env()).build()?;
    let engine = ContextEngine::builder().config(config).store(Arc::new(store)).build()?;
    engine.open().await?;
    println!("Embedding service: {}", engine.embedding_status().await.message);

    // -- 2. Capture page context ------------------------------------------
    let page = "https://shop.example/cart";
    let records = vec![
        ContextRecord::new(
            "CONSOLE",
            "Uncaught TypeError: items is undefined at renderCart (cart.js:42)",
        )
        .with_url(page)
        .with_relevance(0.9),
        ContextRecord::new("network_request", "POST /api/cart/checkout 500 Internal Server Error")
            .with_url(page)
            .with_relevance(0.8),
        ContextRecord::new(
            "HTML",
            "<div id=\"cart\"><ul class=\"items\"></ul><button>Checkout</button></div>",
        )
        .with_url(page),
        ContextRecord::new("PERFORMANCE", "Largest Contentful Paint 4.2s on hero image")
            .with_url(page)
            .with_relevance(0.6),
    ];
    for record in records {
        let ids = engine.add_document(record).await?;
        println!("Stored {} chunk(s)", ids.len());
    }

    // -- 3. Search ---------------------------------------------------------
    let query = "cart items undefined";
    println!("\nPlain search for {query:?}:");
    for result in engine.search(query, 3).await {
        let document = &result.document;
        println!("  {:.3}  [{}] {}", result.similarity, document.category, document.content);
    }

    let options = SearchOptions::default().with_categories(["CONSOLE", "NETWORK"]).max_results(2);
    println!("\nCategory search for {query:?}:");
    for result in engine.search_with_categories(query, &options).await {
        let document = &result.document;
        println!("  {:.3}  [{}] {}", result.score, document.category, document.content);
    }

    // -- 4. Prompt summary and diagnostics --------------------------------
    println!("\nSummary:\n{}", engine.context_summary(query, &SummaryOptions::default()).await);

    let stats = engine.statistics().await;
    println!("\n{} documents, by category: {:?}", stats.total_documents, stats.by_category);

    let health = engine.check_health().await;
    println!("Store healthy: {} ({:?} documents)", health.ok, health.document_count);

    engine.close().await;
    Ok(())
}
