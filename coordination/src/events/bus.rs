//! Event bus for trial sessions
//!
//! Provides pub/sub messaging using Tokio broadcast channels, plus a
//! bounded in-memory journal so late subscribers and summaries can
//! replay what already happened.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use super::types::{SequencedEvent, TrialEvent};

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Subscriber lagged behind and missed {skipped} event(s)")]
    Lagged { skipped: u64 },

    #[error("Channel closed")]
    ChannelClosed,
}

impl From<broadcast::error::RecvError> for EventBusError {
    fn from(e: broadcast::error::RecvError) -> Self {
        match e {
            broadcast::error::RecvError::Lagged(skipped) => EventBusError::Lagged { skipped },
            broadcast::error::RecvError::Closed => EventBusError::ChannelClosed,
        }
    }
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

struct Journal {
    next_id: u64,
    entries: VecDeque<SequencedEvent>,
}

/// Event bus with broadcast channels and a bounded journal
pub struct EventBus {
    /// Broadcast sender for publishing events
    sender: broadcast::Sender<SequencedEvent>,

    /// Recent events, oldest first
    journal: Mutex<Journal>,

    /// Maximum journal length
    journal_capacity: usize,
}

impl EventBus {
    /// Create a new event bus keeping up to `journal_capacity` events
    pub fn new(journal_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            journal: Mutex::new(Journal {
                next_id: 1,
                entries: VecDeque::new(),
            }),
            journal_capacity,
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers. Returns the assigned event id.
    ///
    /// Having no subscribers is not an error; the journal still records it.
    pub fn publish(&self, event: TrialEvent) -> u64 {
        let event_type = event.event_type();
        let sequenced = {
            let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
            let sequenced = SequencedEvent {
                id: journal.next_id,
                event,
            };
            journal.next_id += 1;
            if self.journal_capacity > 0 {
                if journal.entries.len() >= self.journal_capacity {
                    journal.entries.pop_front();
                }
                journal.entries.push_back(sequenced.clone());
            }
            sequenced
        };
        let id = sequenced.id;

        match self.sender.send(sequenced) {
            Ok(count) => debug!(event_type, event_id = id, receivers = count, "Event published"),
            Err(_) => debug!(event_type, event_id = id, "Event published (no receivers)"),
        }
        id
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<SequencedEvent> {
        self.sender.subscribe()
    }

    /// Journaled events, oldest first
    pub fn journal(&self) -> Vec<SequencedEvent> {
        let journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        journal.entries.iter().cloned().collect()
    }

    /// Journaled events with an id greater than `after`
    pub fn journal_since(&self, after: u64) -> Vec<SequencedEvent> {
        let journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        journal
            .entries
            .iter()
            .filter(|e| e.id > after)
            .cloned()
            .collect()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if the bus has any subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by session ID
    pub session_id: Option<String>,
    /// Filter by event types
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by session ID
    pub fn session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Filter by event types
    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &TrialEvent) -> bool {
        if let Some(ref sid) = self.session_id {
            if event.session_id() != sid {
                return false;
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        true
    }
}

/// Filtered event receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<SequencedEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    /// Create a new filtered receiver
    pub fn new(receiver: broadcast::Receiver<SequencedEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> EventBusResult<SequencedEvent> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event.event) {
                return Ok(event);
            }
        }
    }
}

/// Extension trait for subscribing with filters
pub trait EventBusExt {
    /// Subscribe with a filter
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}
