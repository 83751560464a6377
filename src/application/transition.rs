use crate::domain::models::{
    Activity, Notification, NotificationAction, ProcessingStatus, Severity, WatchIntent,
};
use crate::infrastructure::error::InfraError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

const SUCCESS_MESSAGE: &str = "Your activity is ready";
const SUCCESS_ACTION_LABEL: &str = "View";
const FAILURE_MESSAGE: &str = "We couldn't process that link";
const REMOVED_MESSAGE: &str = "This activity was removed before processing finished";

/// Status as seen by a watch. `Deleted` is synthesized when the record vanishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedStatus {
    Processing,
    Complete,
    Failed,
    Deleted,
}

impl ObservedStatus {
    pub fn is_settled(self) -> bool {
        self != Self::Processing
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }
}

impl From<ProcessingStatus> for ObservedStatus {
    fn from(value: ProcessingStatus) -> Self {
        match value {
            ProcessingStatus::Processing => Self::Processing,
            ProcessingStatus::Complete => Self::Complete,
            ProcessingStatus::Failed => Self::Failed,
        }
    }
}

/// What either channel delivered, normalized before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUpdate {
    Record(Activity),
    Removed { activity_id: String },
}

impl ChannelUpdate {
    pub fn activity_id(&self) -> &str {
        match self {
            Self::Record(activity) => &activity.id,
            Self::Removed { activity_id } => activity_id,
        }
    }

    pub fn observed_status(&self) -> ObservedStatus {
        match self {
            Self::Record(activity) => activity.status().into(),
            Self::Removed { .. } => ObservedStatus::Deleted,
        }
    }
}

const DEFAULT_LEDGER_CAPACITY: usize = 512;

#[derive(Debug)]
struct LedgerState {
    last: HashMap<String, ObservedStatus>,
    order: VecDeque<String>,
    capacity: usize,
}

impl LedgerState {
    fn insert(&mut self, activity_id: &str, status: ObservedStatus) -> Option<ObservedStatus> {
        let previous = self.last.insert(activity_id.to_string(), status);
        if previous.is_none() {
            self.order.push_back(activity_id.to_string());
            self.evict();
        }
        previous
    }

    fn remove(&mut self, activity_id: &str) {
        if self.last.remove(activity_id).is_some() {
            self.order.retain(|tracked| tracked != activity_id);
        }
    }

    /// Drops the oldest settled ids beyond capacity. Ids still processing
    /// belong to live watches and are never evicted.
    fn evict(&mut self) {
        while self.last.len() > self.capacity {
            let oldest_settled = self.order.iter().position(|tracked| {
                self.last
                    .get(tracked)
                    .is_some_and(|status| status.is_settled())
            });
            let Some(position) = oldest_settled else {
                break;
            };
            if let Some(evicted) = self.order.remove(position) {
                self.last.remove(&evicted);
            }
        }
    }
}

/// Last status acted upon, per activity id. Shared by every watch a
/// reconciler starts so the two channels of one watch, and later watches of
/// the same id, agree on what has already been announced.
///
/// Settled ids are kept so a late snapshot stays silent, up to a fixed
/// capacity; ids whose watch ended before settling are dropped on release.
#[derive(Debug, Clone)]
pub struct TransitionLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl Default for TransitionLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl TransitionLedger {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                last: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// A watch only starts from a record observed as processing, so any
    /// earlier settled status for the id no longer applies.
    pub fn begin_watch(&self, activity_id: &str) -> Result<(), InfraError> {
        self.lock()?.insert(activity_id, ObservedStatus::Processing);
        Ok(())
    }

    pub fn last_status(&self, activity_id: &str) -> Result<Option<ObservedStatus>, InfraError> {
        Ok(self.lock()?.last.get(activity_id).copied())
    }

    /// Records `status` and reports whether it differs from the previous one.
    /// Compare and write happen under one lock, so exactly one caller wins.
    pub fn record(&self, activity_id: &str, status: ObservedStatus) -> Result<bool, InfraError> {
        let previous = self.lock()?.insert(activity_id, status);
        Ok(previous != Some(status))
    }

    /// Drops the id if it never settled. Returns whether anything was removed.
    pub fn forget_unsettled(&self, activity_id: &str) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        if state.last.get(activity_id) != Some(&ObservedStatus::Processing) {
            return Ok(false);
        }
        state.remove(activity_id);
        Ok(true)
    }

    pub fn tracked(&self) -> Result<usize, InfraError> {
        Ok(self.lock()?.last.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::lock_poisoned("transition ledger", error))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRoutes {
    prefix: String,
}

impl ActivityRoutes {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim().trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() {
                "/activity".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }

    pub fn created_href(&self, activity_id: &str) -> String {
        format!("{}/{}?created=1", self.prefix, activity_id)
    }
}

impl Default for ActivityRoutes {
    fn default() -> Self {
        Self::new("/activity")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    pub immediate: Vec<WatchIntent>,
    pub navigate_to: Option<String>,
}

impl TransitionPlan {
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.navigate_to.is_none()
    }
}

/// Side effects for a settled update. Callers gate this behind
/// [`TransitionLedger::record`]; the plan itself has no memory.
pub fn plan_transition(
    update: &ChannelUpdate,
    on_import_surface: bool,
    routes: &ActivityRoutes,
) -> TransitionPlan {
    match (update, update.observed_status()) {
        (_, ObservedStatus::Processing) => TransitionPlan::default(),
        (ChannelUpdate::Record(activity), ObservedStatus::Complete) => {
            let href = routes.created_href(&activity.id);
            TransitionPlan {
                immediate: vec![
                    WatchIntent::UpdateCachedRecord {
                        activity: activity.clone(),
                    },
                    WatchIntent::Notify {
                        notification: Notification {
                            message: SUCCESS_MESSAGE.to_string(),
                            severity: Severity::Success,
                            action: Some(NotificationAction {
                                label: SUCCESS_ACTION_LABEL.to_string(),
                                href: href.clone(),
                            }),
                        },
                    },
                ],
                navigate_to: on_import_surface.then_some(href),
            }
        }
        (ChannelUpdate::Record(activity), _) => {
            let message = activity
                .processing_error
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(FAILURE_MESSAGE);
            let mut immediate = vec![WatchIntent::UpdateCachedRecord {
                activity: activity.clone(),
            }];
            push_failure(&mut immediate, &activity.id, message, on_import_surface);
            TransitionPlan {
                immediate,
                navigate_to: None,
            }
        }
        (ChannelUpdate::Removed { activity_id }, _) => {
            let mut immediate = Vec::new();
            push_failure(&mut immediate, activity_id, REMOVED_MESSAGE, on_import_surface);
            TransitionPlan {
                immediate,
                navigate_to: None,
            }
        }
    }
}

fn push_failure(
    intents: &mut Vec<WatchIntent>,
    activity_id: &str,
    message: &str,
    on_import_surface: bool,
) {
    // The import surface renders the failure inline.
    if !on_import_surface {
        intents.push(WatchIntent::Notify {
            notification: Notification {
                message: message.to_string(),
                severity: Severity::Error,
                action: None,
            },
        });
    }
    intents.push(WatchIntent::ClearWatchedActivity {
        activity_id: activity_id.to_string(),
    });
}
