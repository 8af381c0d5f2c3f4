//! Qdrant-backed knowledge base over its REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{KnowledgeEntry, Res},
    },
    service::llm::LlmClient,
};

use super::{GenericKnowledgeClient, KnowledgeClient};

// Extra methods on `KnowledgeClient` applied by the qdrant implementation.

impl KnowledgeClient {
    pub fn qdrant(config: &Config, llm: LlmClient) -> Res<Self> {
        let client = QdrantKnowledgeClient::new(config, llm)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Wire types.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Debug, Deserialize)]
struct PointPayload {
    #[serde(default)]
    category: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    content: String,
}

// Specific implementations.

/// Qdrant knowledge client implementation.
#[derive(Clone)]
pub struct QdrantKnowledgeClient {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    llm: LlmClient,
}

impl QdrantKnowledgeClient {
    #[instrument(name = "QdrantKnowledgeClient::new", skip_all)]
    pub fn new(config: &Config, llm: LlmClient) -> Res<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            http,
            base_url: config.qdrant_url.trim_end_matches('/').to_string(),
            collection: config.qdrant_collection.clone(),
            llm,
        })
    }

    fn points_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}/points{suffix}", self.base_url, self.collection)
    }
}

#[async_trait]
impl GenericKnowledgeClient for QdrantKnowledgeClient {
    #[instrument(name = "QdrantKnowledgeClient::search", skip(self))]
    async fn search(&self, query: &str, top_k: usize) -> Res<Vec<KnowledgeEntry>> {
        let vector = self.llm.embed(query).await?;

        let body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
        });

        let response: SearchResponse = self.http.post(self.points_url("/search")).json(&body).send().await?.error_for_status()?.json().await?;

        let entries = response
            .result
            .into_iter()
            .filter_map(|point| point.payload)
            .map(|payload| KnowledgeEntry {
                category: payload.category,
                topic: payload.topic,
                content: payload.content,
            })
            .collect::<Vec<_>>();

        info!("Knowledge search returned {} entries.", entries.len());

        Ok(entries)
    }

    #[instrument(name = "QdrantKnowledgeClient::ingest", skip_all)]
    async fn ingest(&self, entry: &KnowledgeEntry) -> Res<u64> {
        let vector = self.llm.embed(&entry.content).await?;

        let now = Utc::now();
        let id = now.timestamp_millis().unsigned_abs() * 1000 + u64::from(now.timestamp_subsec_micros() % 1000);

        let body = json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": {
                    "category": entry.category,
                    "topic": entry.topic,
                    "content": entry.content,
                    "created_at": now.to_rfc3339(),
                    "source": "admin_ingest",
                }
            }]
        });

        self.http.put(self.points_url("?wait=true")).json(&body).send().await?.error_for_status()?;

        info!("Knowledge ingested: [{}] {} (ID: {id})", entry.category, entry.topic);

        Ok(id)
    }
}
