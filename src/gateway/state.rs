use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::pipeline::Orchestrator;
use crate::vectordb::VectorStore;

const FEEDBACK_CAPACITY: usize = 1_000;

/// One recorded feedback item. Analytics only; never feeds back into
/// ranking.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FeedbackRecord {
    pub query_id: String,
    pub helpful: bool,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded in-memory feedback ring.
#[derive(Default)]
pub struct FeedbackLog {
    records: Mutex<VecDeque<FeedbackRecord>>,
}

impl FeedbackLog {
    pub fn record(&self, record: FeedbackRecord) {
        let mut records = self.records.lock();
        records.push_back(record);
        while records.len() > FEEDBACK_CAPACITY {
            records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub vector_store: Arc<dyn VectorStore>,
    pub feedback: Arc<FeedbackLog>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            orchestrator,
            vector_store,
            feedback: Arc::new(FeedbackLog::default()),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("feedback_records", &self.feedback.len())
            .finish()
    }
}
