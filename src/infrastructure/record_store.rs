use crate::domain::models::Activity;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

pub const ACTIVITIES_TABLE: &str = "activities";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: String,
    pub activity_id: String,
    pub events: Vec<ChangeKind>,
}

impl ChangeFilter {
    /// `UPDATE` and `DELETE` on one activity row.
    pub fn activity(activity_id: impl Into<String>) -> Self {
        Self {
            table: ACTIVITIES_TABLE.to_string(),
            activity_id: activity_id.into(),
            events: vec![ChangeKind::Update, ChangeKind::Delete],
        }
    }

    pub fn matches(&self, table: &str, change: &RecordChange) -> bool {
        self.table == table
            && self.events.contains(&change.kind)
            && change.activity_id() == Some(self.activity_id.as_str())
    }
}

/// Payload of one change notification. Deletes only carry the old row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub kind: ChangeKind,
    pub new_record: Option<Activity>,
    pub old_record: Option<Activity>,
}

impl RecordChange {
    pub fn updated(record: Activity) -> Self {
        Self {
            kind: ChangeKind::Update,
            new_record: Some(record),
            old_record: None,
        }
    }

    pub fn deleted(record: Activity) -> Self {
        Self {
            kind: ChangeKind::Delete,
            new_record: None,
            old_record: Some(record),
        }
    }

    pub fn activity_id(&self) -> Option<&str> {
        self.new_record
            .as_ref()
            .or(self.old_record.as_ref())
            .map(|record| record.id.as_str())
    }
}

#[derive(Debug)]
pub struct ChangeSubscription {
    pub id: String,
    pub receiver: mpsc::UnboundedReceiver<RecordChange>,
}

#[async_trait]
pub trait ActivityRecordStore: Send + Sync {
    async fn fetch_by_id(&self, activity_id: &str) -> Result<Option<Activity>, InfraError>;

    async fn save(&self, activity: &Activity) -> Result<(), InfraError>;
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeSubscription, InfraError>;

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), InfraError>;
}

type Subscriber = (ChangeFilter, mpsc::UnboundedSender<RecordChange>);

/// Record store and change feed over one in-process map. Every `save` and
/// `remove` is broadcast to matching subscribers.
#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    records: Mutex<HashMap<String, Activity>>,
    subscribers: Mutex<HashMap<String, Subscriber>>,
    next_subscription: AtomicU64,
}

impl InMemoryActivityStore {
    pub fn with_records(records: impl IntoIterator<Item = Activity>) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.records.lock() {
            guard.extend(
                records
                    .into_iter()
                    .map(|record| (record.id.clone(), record)),
            );
        }
        store
    }

    pub fn remove(&self, activity_id: &str) -> Result<Option<Activity>, InfraError> {
        let removed = self.lock_records()?.remove(activity_id);
        if let Some(record) = removed.clone() {
            self.broadcast(RecordChange::deleted(record))?;
        }
        Ok(removed)
    }

    pub fn list_all(&self) -> Result<Vec<Activity>, InfraError> {
        let mut records = self.lock_records()?.values().cloned().collect::<Vec<_>>();
        records.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(records)
    }

    pub fn subscriber_count(&self) -> Result<usize, InfraError> {
        Ok(self.lock_subscribers()?.len())
    }

    fn broadcast(&self, change: RecordChange) -> Result<(), InfraError> {
        let mut subscribers = self.lock_subscribers()?;
        subscribers.retain(|_, (filter, sender)| {
            if !filter.matches(ACTIVITIES_TABLE, &change) {
                return true;
            }
            sender.send(change.clone()).is_ok()
        });
        Ok(())
    }

    fn lock_records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Activity>>, InfraError> {
        self.records
            .lock()
            .map_err(|error| InfraError::lock_poisoned("activity records", error))
    }

    fn lock_subscribers(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Subscriber>>, InfraError> {
        self.subscribers
            .lock()
            .map_err(|error| InfraError::lock_poisoned("activity subscribers", error))
    }
}

#[async_trait]
impl ActivityRecordStore for InMemoryActivityStore {
    async fn fetch_by_id(&self, activity_id: &str) -> Result<Option<Activity>, InfraError> {
        Ok(self.lock_records()?.get(activity_id).cloned())
    }

    async fn save(&self, activity: &Activity) -> Result<(), InfraError> {
        activity.validate().map_err(InfraError::InvalidInput)?;
        self.lock_records()?
            .insert(activity.id.clone(), activity.clone());
        self.broadcast(RecordChange::updated(activity.clone()))
    }
}

#[async_trait]
impl ChangeFeed for InMemoryActivityStore {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeSubscription, InfraError> {
        if filter.activity_id.trim().is_empty() {
            return Err(InfraError::ChangeFeed(
                "subscription filter requires an activity id".to_string(),
            ));
        }
        let sequence = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let id = format!("sub-{}-{sequence}", filter.activity_id);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock_subscribers()?
            .insert(id.clone(), (filter, sender));
        Ok(ChangeSubscription { id, receiver })
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), InfraError> {
        self.lock_subscribers()?.remove(subscription_id);
        Ok(())
    }
}
