//! Per-table change feeds.
//!
//! Every committed write is published as a [`ChangeEvent`] to all current
//! subscribers of that table. Subscribers reconcile their own caches by
//! primary key; a subscriber that falls behind gets [`FeedError::Lagged`]
//! and must reload from the repository before applying further events.

use thiserror::Error;
use tokio::sync::broadcast;

use workflow_core::domain::job::Job;
use workflow_core::domain::payment::PaymentRequest;
use workflow_core::domain::resource::Resource;
use workflow_core::live::ChangeEvent;

pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("subscriber fell behind and missed {0} events")]
    Lagged(u64),
    #[error("change feed closed")]
    Closed,
}

pub struct ChangeFeed<T> {
    table: &'static str,
    tx: broadcast::Sender<ChangeEvent<T>>,
}

impl<T: Clone + Send + 'static> ChangeFeed<T> {
    pub fn new(table: &'static str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { table, tx }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: ChangeEvent<T>) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!(table = self.table, "change published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> FeedSubscription<T> {
        FeedSubscription { table: self.table, rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T> Clone for ChangeFeed<T> {
    fn clone(&self) -> Self {
        Self { table: self.table, tx: self.tx.clone() }
    }
}

/// Receiving half of a [`ChangeFeed`]. Dropping it detaches.
pub struct FeedSubscription<T> {
    table: &'static str,
    rx: broadcast::Receiver<ChangeEvent<T>>,
}

impl<T: Clone> FeedSubscription<T> {
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub async fn recv(&mut self) -> Result<ChangeEvent<T>, FeedError> {
        self.rx.recv().await.map_err(|error| match error {
            broadcast::error::RecvError::Lagged(missed) => FeedError::Lagged(missed),
            broadcast::error::RecvError::Closed => FeedError::Closed,
        })
    }

    /// `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<ChangeEvent<T>>, FeedError> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => Err(FeedError::Lagged(missed)),
            Err(broadcast::error::TryRecvError::Closed) => Err(FeedError::Closed),
        }
    }

    pub fn unsubscribe(self) {}
}

/// One feed per table, shared by every writer in the process.
#[derive(Clone)]
pub struct ChangeHub {
    pub payments: ChangeFeed<PaymentRequest>,
    pub jobs: ChangeFeed<Job>,
    pub resources: ChangeFeed<Resource>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeHub {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            payments: ChangeFeed::new("payment_request", capacity),
            jobs: ChangeFeed::new("job", capacity),
            resources: ChangeFeed::new("resource", capacity),
        }
    }
}
