//! Client-side caches kept current by table change events.
//!
//! A view loads the full table once, then folds every [`ChangeEvent`] into its
//! cache by primary key. Updates replace whole records. The payment board keeps
//! its status counters in step with the cache inside a single `&mut` call, so
//! any reader holding the board sees either the old state or the new one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId, JobStatus};
use crate::domain::payment::{PaymentRequest, PaymentRequestId, PaymentStatus};
use crate::domain::resource::{Resource, ResourceId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum ChangeEvent<T> {
    Inserted(T),
    Updated(T),
    Deleted(T),
}

impl<T> ChangeEvent<T> {
    pub fn record(&self) -> &T {
        match self {
            Self::Inserted(record) | Self::Updated(record) | Self::Deleted(record) => record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inserted(_) => "inserted",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
        }
    }
}

pub trait Record: Clone {
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;
}

impl Record for PaymentRequest {
    type Key = PaymentRequestId;

    fn key(&self) -> Self::Key {
        self.id.clone()
    }
}

impl Record for Job {
    type Key = JobId;

    fn key(&self) -> Self::Key {
        self.id.clone()
    }
}

impl Record for Resource {
    type Key = ResourceId;

    fn key(&self) -> Self::Key {
        self.id.clone()
    }
}

#[derive(Clone, Debug)]
pub struct LiveTable<T: Record> {
    rows: BTreeMap<T::Key, T>,
}

impl<T: Record> Default for LiveTable<T> {
    fn default() -> Self {
        Self { rows: BTreeMap::new() }
    }
}

impl<T: Record> LiveTable<T> {
    pub fn load(&mut self, rows: impl IntoIterator<Item = T>) {
        self.rows = rows.into_iter().map(|row| (row.key(), row)).collect();
    }

    /// Returns the record the event displaced, if any.
    pub fn apply(&mut self, event: ChangeEvent<T>) -> Option<T> {
        match event {
            ChangeEvent::Inserted(row) | ChangeEvent::Updated(row) => {
                self.rows.insert(row.key(), row)
            }
            ChangeEvent::Deleted(row) => self.rows.remove(&row.key()),
        }
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusCounts {
    pub pending: usize,
    pub flagged: usize,
    pub completed: usize,
    pub failed: usize,
}

impl PaymentStatusCounts {
    pub fn tally<'a>(requests: impl IntoIterator<Item = &'a PaymentRequest>) -> Self {
        let mut counts = Self::default();
        for request in requests {
            *counts.slot(request.status) += 1;
        }
        counts
    }

    fn slot(&mut self, status: PaymentStatus) -> &mut usize {
        match status {
            PaymentStatus::Pending => &mut self.pending,
            PaymentStatus::Flagged => &mut self.flagged,
            PaymentStatus::Completed => &mut self.completed,
            PaymentStatus::Failed => &mut self.failed,
        }
    }

    pub fn get(&self, status: PaymentStatus) -> usize {
        match status {
            PaymentStatus::Pending => self.pending,
            PaymentStatus::Flagged => self.flagged,
            PaymentStatus::Completed => self.completed,
            PaymentStatus::Failed => self.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.flagged + self.completed + self.failed
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBoardSnapshot {
    pub counts: PaymentStatusCounts,
    pub requests: Vec<PaymentRequest>,
}

#[derive(Clone, Debug, Default)]
pub struct PaymentBoard {
    table: LiveTable<PaymentRequest>,
    counts: PaymentStatusCounts,
}

impl PaymentBoard {
    pub fn load(&mut self, requests: impl IntoIterator<Item = PaymentRequest>) {
        self.table.load(requests);
        self.counts = PaymentStatusCounts::tally(self.table.rows());
    }

    pub fn apply(&mut self, event: ChangeEvent<PaymentRequest>) {
        let incoming = match &event {
            ChangeEvent::Deleted(_) => None,
            ChangeEvent::Inserted(row) | ChangeEvent::Updated(row) => Some(row.status),
        };

        if let Some(previous) = self.table.apply(event) {
            let slot = self.counts.slot(previous.status);
            *slot = slot.saturating_sub(1);
        }
        if let Some(status) = incoming {
            *self.counts.slot(status) += 1;
        }
    }

    pub fn counts(&self) -> PaymentStatusCounts {
        self.counts
    }

    pub fn get(&self, id: &PaymentRequestId) -> Option<&PaymentRequest> {
        self.table.get(id)
    }

    /// Newest first, optionally narrowed to one status.
    pub fn requests(&self, status: Option<PaymentStatus>) -> Vec<PaymentRequest> {
        let mut requests: Vec<PaymentRequest> = self
            .table
            .rows()
            .filter(|request| status.map_or(true, |status| request.status == status))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        requests
    }

    pub fn snapshot(&self) -> PaymentBoardSnapshot {
        PaymentBoardSnapshot { counts: self.counts, requests: self.requests(None) }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl JobStatusCounts {
    pub fn tally<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            *counts.slot(job.status) += 1;
        }
        counts
    }

    fn slot(&mut self, status: JobStatus) -> &mut usize {
        match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::InProgress => &mut self.in_progress,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Cancelled => &mut self.cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{ChangeEvent, LiveTable, PaymentBoard, PaymentStatusCounts};
    use crate::domain::payment::{CostBreakdown, PaymentRequest, PaymentRequestId, PaymentStatus};
    use crate::identity::ActorId;

    fn request(id: &str, status: PaymentStatus, minutes_ago: i64) -> PaymentRequest {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        PaymentRequest {
            id: PaymentRequestId(id.to_string()),
            title: format!("Request {id}"),
            job_id: None,
            amount: Decimal::new(10, 0),
            costs: CostBreakdown::default(),
            status,
            notes: String::new(),
            created_by: ActorId("2".to_string()),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn update_events_replace_whole_records() {
        let mut table = LiveTable::default();
        table.load(vec![request("PAY-1", PaymentStatus::Pending, 5)]);

        let mut updated = request("PAY-1", PaymentStatus::Completed, 5);
        updated.notes = "Approval note: ok".to_string();
        let previous = table.apply(ChangeEvent::Updated(updated.clone()));

        assert_eq!(previous.map(|row| row.status), Some(PaymentStatus::Pending));
        assert_eq!(table.get(&PaymentRequestId("PAY-1".to_string())), Some(&updated));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn approval_moves_one_count_between_buckets() {
        let mut board = PaymentBoard::default();
        board.load(vec![
            request("PAY-1", PaymentStatus::Flagged, 3),
            request("PAY-2", PaymentStatus::Pending, 2),
        ]);
        let before = board.counts();

        let mut approved = request("PAY-1", PaymentStatus::Completed, 3);
        approved.version = 2;
        board.apply(ChangeEvent::Updated(approved));

        let after = board.counts();
        assert_eq!(after.flagged, before.flagged - 1);
        assert_eq!(after.completed, before.completed + 1);
        assert_eq!(after.pending, before.pending);
        assert_eq!(after, PaymentStatusCounts::tally(board.requests(None).iter()));
    }

    #[test]
    fn inserts_and_deletes_keep_counts_consistent() {
        let mut board = PaymentBoard::default();
        board.apply(ChangeEvent::Inserted(request("PAY-1", PaymentStatus::Pending, 1)));
        board.apply(ChangeEvent::Inserted(request("PAY-2", PaymentStatus::Flagged, 0)));
        board.apply(ChangeEvent::Deleted(request("PAY-1", PaymentStatus::Pending, 1)));
        board.apply(ChangeEvent::Deleted(request("PAY-9", PaymentStatus::Pending, 1)));

        assert_eq!(board.counts().pending, 0);
        assert_eq!(board.counts().flagged, 1);
        assert_eq!(board.counts().total(), 1);
    }

    #[test]
    fn requests_are_listed_newest_first_and_filterable() {
        let mut board = PaymentBoard::default();
        board.load(vec![
            request("PAY-old", PaymentStatus::Pending, 30),
            request("PAY-new", PaymentStatus::Pending, 1),
            request("PAY-mid", PaymentStatus::Flagged, 10),
        ]);

        let ids: Vec<String> = board.requests(None).into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec!["PAY-new", "PAY-mid", "PAY-old"]);
        assert_eq!(board.requests(Some(PaymentStatus::Flagged)).len(), 1);
        assert_eq!(board.snapshot().counts.get(PaymentStatus::Pending), 2);
    }
}
