//! The server's own payment board, kept live from the payment change feed.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use workflow_core::domain::payment::PaymentRequest;
use workflow_core::live::{PaymentBoard, PaymentBoardSnapshot};
use workflow_db::repositories::PaymentRepository;
use workflow_db::{ChangeFeed, FeedError, FeedSubscription};

#[derive(Clone, Default)]
pub struct DashboardHandle {
    board: Arc<RwLock<PaymentBoard>>,
}

impl DashboardHandle {
    pub async fn snapshot(&self) -> PaymentBoardSnapshot {
        self.board.read().await.snapshot()
    }

    async fn reload(&self, payments: &dyn PaymentRepository) -> bool {
        match payments.list(None).await {
            Ok(requests) => {
                self.board.write().await.load(requests);
                true
            }
            Err(error) => {
                error!(
                    event_name = "dashboard.payments.reload_failed",
                    correlation_id = "dashboard",
                    error = %error,
                    "could not reload payment board"
                );
                false
            }
        }
    }
}

/// Subscribes before the initial load so no write between the two is lost.
pub async fn spawn(
    payments: Arc<dyn PaymentRepository>,
    feed: &ChangeFeed<PaymentRequest>,
) -> (DashboardHandle, JoinHandle<()>) {
    let handle = DashboardHandle::default();
    let subscription = feed.subscribe();
    handle.reload(payments.as_ref()).await;

    let task = tokio::spawn(follow(handle.clone(), payments, subscription));
    (handle, task)
}

async fn follow(
    handle: DashboardHandle,
    payments: Arc<dyn PaymentRepository>,
    mut subscription: FeedSubscription<PaymentRequest>,
) {
    loop {
        match subscription.recv().await {
            Ok(event) => handle.board.write().await.apply(event),
            Err(FeedError::Lagged(missed)) => {
                warn!(
                    event_name = "dashboard.payments.lagged",
                    correlation_id = "dashboard",
                    missed,
                    "payment board fell behind, reloading"
                );
                handle.reload(payments.as_ref()).await;
            }
            Err(FeedError::Closed) => {
                info!(
                    event_name = "dashboard.payments.closed",
                    correlation_id = "dashboard",
                    "payment feed closed"
                );
                break;
            }
        }
    }
}
