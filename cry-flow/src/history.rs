use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::analysis::Analysis;

/// Append-only log of completed analyses, most recent first
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, analysis: Analysis);
    async fn list(&self) -> Vec<Analysis>;

    async fn len(&self) -> usize {
        self.list().await.len()
    }

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-memory implementation of HistoryStore, lives as long as the flow session
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryStore {
    entries: Arc<RwLock<VecDeque<Analysis>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, analysis: Analysis) {
        self.entries.write().await.push_front(analysis);
    }

    async fn list(&self) -> Vec<Analysis> {
        self.entries.read().await.iter().cloned().collect()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
