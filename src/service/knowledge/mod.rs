pub mod qdrant;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{KnowledgeEntry, Res};

// Traits.

/// Generic knowledge base trait that clients must implement.
///
/// The knowledge base holds FAQ, product and pricing documents that are retrieved by
/// semantic similarity and handed to the assistant as grounding.
#[async_trait]
pub trait GenericKnowledgeClient: Send + Sync + 'static {
    /// The `top_k` entries closest to `query`.
    async fn search(&self, query: &str, top_k: usize) -> Res<Vec<KnowledgeEntry>>;

    /// Stores an entry and returns its point id.
    async fn ingest(&self, entry: &KnowledgeEntry) -> Res<u64>;
}

// Structs.

/// Knowledge client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct KnowledgeClient {
    inner: Arc<dyn GenericKnowledgeClient>,
}

impl Deref for KnowledgeClient {
    type Target = dyn GenericKnowledgeClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl KnowledgeClient {
    pub fn new(inner: Arc<dyn GenericKnowledgeClient>) -> Self {
        Self { inner }
    }
}
