//! End-to-end ingestion against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use docchat_rag::{
    Chunk, Document, EmbeddingProvider, HashEmbeddingProvider, InMemoryVectorStore,
    IngestOutcome, IngestionPipeline, Page, RagConfig, RagError, Result, SearchResult,
    VectorStore,
};
use serde_json::json;

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "failing".into(), message: "quota exceeded".into() })
    }

    fn dimensions(&self) -> usize {
        384
    }
}

/// Delegates to an in-memory store but refuses every write.
struct ReadOnlyStore(Arc<InMemoryVectorStore>);

#[async_trait]
impl VectorStore for ReadOnlyStore {
    fn name(&self) -> &str {
        "read-only"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.0.create_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.0.delete_collection(name).await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.0.collection_exists(name).await
    }

    async fn upsert(&self, _collection: &str, _chunks: &[Chunk]) -> Result<()> {
        Err(RagError::VectorStoreError { backend: "read-only".into(), message: "disk full".into() })
    }

    async fn search(&self, collection: &str, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.0.search(collection, embedding, top_k).await
    }
}

fn pipeline(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> IngestionPipeline {
    IngestionPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(embedder)
        .vector_store(store)
        .build()
        .unwrap()
}

fn placeholder(len: usize, word: &str) -> String {
    let mut text = String::new();
    while text.len() < len {
        text.push_str(word);
        text.push(' ');
    }
    text.truncate(len);
    text
}

fn three_page_document() -> Document {
    Document::new(
        "primmod.pdf",
        vec![
            Page { number: 1, text: placeholder(1400, "primitives") },
            Page { number: 2, text: placeholder(1400, "modeling") },
            Page { number: 3, text: placeholder(700, "workshop") },
        ],
    )
}

#[tokio::test]
async fn three_pages_of_placeholder_text_write_five_chunks() {
    let store = Arc::new(InMemoryVectorStore::new());
    let ingestion = pipeline(Arc::new(HashEmbeddingProvider::new()), store.clone());

    let outcome: IngestOutcome =
        ingestion.ingest_documents(&[three_page_document()], "primmod_paper").await.into();

    assert_eq!(serde_json::to_value(&outcome).unwrap(), json!({"status": "success", "chunks": 5}));
    assert_eq!(store.chunk_count("primmod_paper").await, Some(5));
}

#[tokio::test]
async fn ingesting_a_text_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("primmod.txt");
    std::fs::write(&path, placeholder(3500, "primitive")).unwrap();

    let store = Arc::new(InMemoryVectorStore::new());
    let outcome = pipeline(Arc::new(HashEmbeddingProvider::new()), store.clone())
        .ingest(&path, "primmod_paper")
        .await;

    assert_eq!(outcome, IngestOutcome::success(5));
    let hits = store.search("primmod_paper", &vec![0.0; 384], 20).await.unwrap();
    assert!(hits.iter().all(|h| h.chunk.source() == Some(path.display().to_string().as_str())));
}

#[tokio::test]
async fn reingesting_replaces_instead_of_duplicating() {
    let store = Arc::new(InMemoryVectorStore::new());
    let ingestion = pipeline(Arc::new(HashEmbeddingProvider::new()), store.clone());
    let document = three_page_document();

    for _ in 0..2 {
        let outcome: IngestOutcome = ingestion.ingest_documents(&[document.clone()], "c").await.into();
        assert_eq!(outcome.chunks(), Some(5));
    }
    assert_eq!(store.chunk_count("c").await, Some(5));

    // A smaller document fully replaces the bigger one.
    let small = Document::from_text("small.txt", "just one chunk");
    ingestion.ingest_documents(&[small], "c").await.unwrap();
    assert_eq!(store.chunk_count("c").await, Some(1));
}

#[tokio::test]
async fn missing_path_is_reported_as_not_found() {
    let store = Arc::new(InMemoryVectorStore::new());
    let outcome = pipeline(Arc::new(HashEmbeddingProvider::new()), store)
        .ingest("does/not/exist.pdf", "c")
        .await;

    assert_eq!(outcome.error(), Some("Document not found: does/not/exist.pdf"));
    assert_eq!(outcome.chunks(), None);
}

#[tokio::test]
async fn embedding_failure_leaves_previous_collection_untouched() {
    let store = Arc::new(InMemoryVectorStore::new());
    pipeline(Arc::new(HashEmbeddingProvider::new()), store.clone())
        .ingest_documents(&[three_page_document()], "c")
        .await
        .unwrap();

    let outcome: IngestOutcome = pipeline(Arc::new(FailingEmbedder), store.clone())
        .ingest_documents(&[Document::from_text("new.txt", "replacement text")], "c")
        .await
        .into();

    assert!(outcome.error().unwrap().contains("quota exceeded"));
    assert_eq!(store.chunk_count("c").await, Some(5));
}

#[tokio::test]
async fn write_failure_after_delete_says_the_collection_was_cleared() {
    let inner = Arc::new(InMemoryVectorStore::new());
    pipeline(Arc::new(HashEmbeddingProvider::new()), inner.clone())
        .ingest_documents(&[three_page_document()], "c")
        .await
        .unwrap();

    let err = pipeline(Arc::new(HashEmbeddingProvider::new()), Arc::new(ReadOnlyStore(inner.clone())))
        .ingest_documents(&[three_page_document()], "c")
        .await
        .unwrap_err();

    assert!(matches!(err, RagError::VectorStoreError { .. }));
    assert!(err.to_string().contains("collection 'c' was cleared before the failure"), "got {err}");
    assert_eq!(inner.chunk_count("c").await, Some(0));
}

#[tokio::test]
async fn documents_without_text_do_not_touch_the_collection() {
    let store = Arc::new(InMemoryVectorStore::new());
    let ingestion = pipeline(Arc::new(HashEmbeddingProvider::new()), store.clone());
    ingestion.ingest_documents(&[three_page_document()], "c").await.unwrap();

    let blank = Document::new("scan.pdf", vec![Page { number: 1, text: "   ".into() }]);
    let err = ingestion.ingest_documents(&[blank], "c").await.unwrap_err();

    assert!(matches!(err, RagError::PipelineError(_)));
    assert_eq!(store.chunk_count("c").await, Some(5));
}
