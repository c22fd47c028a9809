use std::{collections::VecDeque, sync::Arc};

use shared::{
    domain::EventId,
    protocol::{AnalyticsEnvelope, IngestedEvent},
};
use tokio::sync::RwLock;

/// Bounded in-memory log of ingested analytics events. Oldest entries are
/// dropped once `capacity` is reached; ids keep increasing.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
}

struct Inner {
    next_id: i64,
    events: VecDeque<IngestedEvent>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                next_id: 1,
                events: VecDeque::new(),
            })),
            capacity: capacity.max(1),
        }
    }

    pub async fn append(&self, envelopes: Vec<AnalyticsEnvelope>) -> Vec<EventId> {
        let mut inner = self.inner.write().await;
        let mut ids = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let id = EventId(inner.next_id);
            inner.next_id += 1;
            if inner.events.len() == self.capacity {
                inner.events.pop_front();
            }
            inner.events.push_back(IngestedEvent {
                id,
                event_type: envelope.event_type,
                timestamp: envelope.timestamp,
                metadata: envelope.metadata,
            });
            ids.push(id);
        }
        ids
    }

    /// `page` is 1-based.
    pub async fn page(&self, page: usize, per_page: usize) -> Vec<IngestedEvent> {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.inner
            .read()
            .await
            .events
            .iter()
            .skip(offset)
            .take(per_page)
            .cloned()
            .collect()
    }

    pub async fn stored_count(&self) -> usize {
        self.inner.read().await.events.len()
    }
}
