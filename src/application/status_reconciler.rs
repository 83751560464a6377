use crate::application::transition::{
    ActivityRoutes, ChannelUpdate, ObservedStatus, TransitionLedger, plan_transition,
};
use crate::domain::models::{Activity, WatchIntent};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::record_store::{
    ActivityRecordStore, ChangeFeed, ChangeFilter, ChangeKind, RecordChange,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

type Fetch<'a> = Pin<Box<dyn Future<Output = Result<Option<Activity>, InfraError>> + Send + 'a>>;

/// Receives the side effects a watch decides on.
pub trait IntentSink: Send + Sync {
    fn emit(&self, intent: WatchIntent);
}

impl IntentSink for mpsc::UnboundedSender<WatchIntent> {
    fn emit(&self, intent: WatchIntent) {
        if self.send(intent).is_err() {
            debug!("watch intent dropped; receiver closed");
        }
    }
}

/// Whether the user is looking at the transient import surface right now.
pub trait SurfaceProbe: Send + Sync {
    fn is_on_import_surface(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct ImportSurfaceState {
    on_surface: Arc<AtomicBool>,
}

impl ImportSurfaceState {
    pub fn set(&self, on_surface: bool) {
        self.on_surface.store(on_surface, Ordering::SeqCst);
    }
}

impl SurfaceProbe for ImportSurfaceState {
    fn is_on_import_surface(&self) -> bool {
        self.on_surface.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub navigation_delay: Duration,
    pub routes: ActivityRoutes,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for WatchSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            navigation_delay: config.navigation_delay,
            routes: ActivityRoutes::new(config.activity_route_prefix.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Subscription,
    Poll,
    Snapshot,
}

impl Channel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Poll => "poll",
            Self::Snapshot => "snapshot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Settled,
}

enum Wake {
    Cancelled,
    Change(Option<RecordChange>),
    Fetched(Result<Option<Activity>, InfraError>),
    Tick,
}

#[derive(Debug)]
struct LiveWatch {
    generation: u64,
    cancel: Arc<watch::Sender<bool>>,
    released: watch::Receiver<bool>,
}

/// Live watches by activity id. An id has at most one entry; a newer watch
/// waits for the older one to release before taking the id.
#[derive(Debug, Clone, Default)]
struct WatchRegistry {
    live: Arc<std::sync::Mutex<HashMap<String, LiveWatch>>>,
    next_generation: Arc<AtomicU64>,
}

struct Claim {
    cancel: Arc<watch::Sender<bool>>,
    cancelled: watch::Receiver<bool>,
    lease: WatchLease,
}

impl WatchRegistry {
    async fn claim(&self, activity_id: &str) -> Result<Claim, InfraError> {
        loop {
            let (cancel, mut released) = {
                let mut live = self.lock()?;
                match live.get(activity_id) {
                    Some(existing) => (Arc::clone(&existing.cancel), existing.released.clone()),
                    None => {
                        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
                        let (cancel, cancelled) = watch::channel(false);
                        let cancel = Arc::new(cancel);
                        let (released, released_rx) = watch::channel(false);
                        live.insert(
                            activity_id.to_string(),
                            LiveWatch {
                                generation,
                                cancel: Arc::clone(&cancel),
                                released: released_rx,
                            },
                        );
                        return Ok(Claim {
                            cancel,
                            cancelled,
                            lease: WatchLease {
                                registry: self.clone(),
                                activity_id: activity_id.to_string(),
                                generation,
                                released,
                            },
                        });
                    }
                }
            };

            debug!(activity_id, "stopping earlier watch of the same activity");
            cancel.send_replace(true);
            // Err means the lease is gone, which releases the id as well.
            let _ = released.wait_for(|released| *released).await;
        }
    }

    fn contains(&self, activity_id: &str) -> bool {
        self.lock()
            .map(|live| live.contains_key(activity_id))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, LiveWatch>>, InfraError> {
        self.live
            .lock()
            .map_err(|error| InfraError::lock_poisoned("watch registry", error))
    }
}

/// Held by a watch task for as long as it runs. Dropping it frees the id,
/// also when the task panics or is aborted.
struct WatchLease {
    registry: WatchRegistry,
    activity_id: String,
    generation: u64,
    released: watch::Sender<bool>,
}

impl Drop for WatchLease {
    fn drop(&mut self) {
        if let Ok(mut live) = self.registry.lock() {
            let ours = live
                .get(&self.activity_id)
                .is_some_and(|entry| entry.generation == self.generation);
            if ours {
                live.remove(&self.activity_id);
            }
        }
        self.released.send_replace(true);
    }
}

/// Owned handle for one live watch. Dropping it cancels the watch; `stop`
/// additionally waits until the subscription is released.
#[derive(Debug)]
pub struct WatchHandle {
    activity_id: String,
    subscription_id: Option<String>,
    cancel: Arc<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    ledger: TransitionLedger,
}

impl WatchHandle {
    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn last_known_status(&self) -> Option<ObservedStatus> {
        self.ledger.last_status(&self.activity_id).ok().flatten()
    }

    /// Idempotent.
    pub async fn stop(&mut self) {
        self.cancel.send_replace(true);
        self.wait().await;
    }

    /// Waits for the watch to settle on its own.
    pub async fn join(&mut self) {
        self.wait().await;
    }

    async fn wait(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(error) = task.await {
            warn!(activity_id = %self.activity_id, error = %error, "watch task ended abnormally");
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

struct WatchContext<S, F> {
    activity_id: String,
    records: Arc<S>,
    feed: Arc<F>,
    sink: Arc<dyn IntentSink>,
    surface: Arc<dyn SurfaceProbe>,
    ledger: TransitionLedger,
    settings: WatchSettings,
}

impl<S, F> WatchContext<S, F>
where
    S: ActivityRecordStore,
    F: ChangeFeed,
{
    async fn run(
        self,
        mut cancel: watch::Receiver<bool>,
        mut changes: Option<mpsc::UnboundedReceiver<RecordChange>>,
        subscription_id: Option<String>,
        lease: WatchLease,
    ) {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // At most one fetch in flight, raced against the other wakeups.
        let mut fetch: Option<Fetch<'_>> = None;

        loop {
            let wake = tokio::select! {
                biased;
                _ = cancel.changed() => Wake::Cancelled,
                change = next_change(&mut changes) => Wake::Change(change),
                result = finish_fetch(&mut fetch) => Wake::Fetched(result),
                _ = ticker.tick() => Wake::Tick,
            };

            let (update, channel) = match wake {
                Wake::Cancelled => break,
                Wake::Change(None) => {
                    debug!(activity_id = %self.activity_id, "change subscription closed; polling only");
                    changes = None;
                    continue;
                }
                Wake::Change(Some(change)) => match self.update_from_change(change) {
                    Some(update) => (update, Channel::Subscription),
                    None => continue,
                },
                Wake::Fetched(result) => match self.poll_outcome(result) {
                    Some(update) => (update, Channel::Poll),
                    None => continue,
                },
                Wake::Tick => {
                    if fetch.is_some() {
                        debug!(activity_id = %self.activity_id, "status poll still in flight; tick skipped");
                    } else {
                        fetch = Some(self.records.fetch_by_id(&self.activity_id));
                    }
                    continue;
                }
            };

            if self.reconcile(update, channel, &mut cancel).await == Step::Settled {
                break;
            }
        }

        drop(fetch);
        self.release(subscription_id).await;
        drop(lease);
    }

    fn poll_outcome(&self, result: Result<Option<Activity>, InfraError>) -> Option<ChannelUpdate> {
        match result {
            Ok(Some(activity)) => Some(ChannelUpdate::Record(activity)),
            Ok(None) => Some(self.removed()),
            Err(error) if error.is_not_found() => Some(self.removed()),
            Err(error) => {
                warn!(activity_id = %self.activity_id, error = %error, "status poll failed; retrying on next tick");
                None
            }
        }
    }

    /// The subscription is filtered to the watched id, so a delete without
    /// a record payload still refers to it.
    fn update_from_change(&self, change: RecordChange) -> Option<ChannelUpdate> {
        match change.kind {
            ChangeKind::Update => change.new_record.map(ChannelUpdate::Record),
            ChangeKind::Delete => Some(ChannelUpdate::Removed {
                activity_id: change
                    .activity_id()
                    .unwrap_or(&self.activity_id)
                    .to_string(),
            }),
        }
    }

    fn removed(&self) -> ChannelUpdate {
        ChannelUpdate::Removed {
            activity_id: self.activity_id.clone(),
        }
    }

    async fn reconcile(
        &self,
        update: ChannelUpdate,
        channel: Channel,
        cancel: &mut watch::Receiver<bool>,
    ) -> Step {
        if update.activity_id() != self.activity_id {
            debug!(
                activity_id = %self.activity_id,
                delivered_id = %update.activity_id(),
                channel = channel.as_str(),
                "update for another activity ignored"
            );
            return Step::Continue;
        }

        let status = update.observed_status();
        if !status.is_settled() {
            return Step::Continue;
        }

        match self.ledger.record(&self.activity_id, status) {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    activity_id = %self.activity_id,
                    status = status.as_str(),
                    channel = channel.as_str(),
                    "duplicate status delivery"
                );
                return Step::Settled;
            }
            Err(error) => {
                warn!(activity_id = %self.activity_id, error = %error, "transition ledger unavailable");
                return Step::Continue;
            }
        }

        info!(
            activity_id = %self.activity_id,
            status = status.as_str(),
            channel = channel.as_str(),
            "activity left processing"
        );
        let plan = plan_transition(
            &update,
            self.surface.is_on_import_surface(),
            &self.settings.routes,
        );
        for intent in plan.immediate {
            self.sink.emit(intent);
        }

        if let Some(route) = plan.navigate_to {
            tokio::select! {
                biased;
                _ = cancel.changed() => {
                    debug!(activity_id = %self.activity_id, "watch stopped before navigation");
                }
                _ = sleep(self.settings.navigation_delay) => {
                    self.sink.emit(WatchIntent::Navigate { route });
                }
            }
        }
        Step::Settled
    }

    async fn release(&self, subscription_id: Option<String>) {
        if let Some(subscription_id) = subscription_id {
            if let Err(error) = self.feed.unsubscribe(&subscription_id).await {
                warn!(activity_id = %self.activity_id, error = %error, "unsubscribe failed");
            }
        }
        // Settled ids stay so a late snapshot is not announced twice.
        match self.ledger.forget_unsettled(&self.activity_id) {
            Ok(forgotten) => {
                debug!(activity_id = %self.activity_id, forgotten, "watch released");
            }
            Err(error) => {
                warn!(activity_id = %self.activity_id, error = %error, "transition ledger unavailable");
            }
        }
    }
}

async fn next_change(
    changes: &mut Option<mpsc::UnboundedReceiver<RecordChange>>,
) -> Option<RecordChange> {
    match changes {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn finish_fetch(fetch: &mut Option<Fetch<'_>>) -> Result<Option<Activity>, InfraError> {
    let Some(in_flight) = fetch.as_mut() else {
        return std::future::pending().await;
    };
    let result = in_flight.await;
    *fetch = None;
    result
}

/// Watches activities until they leave `processing`, merging a change
/// subscription and a poll loop into one reconciliation path. Every watch
/// started here shares one transition ledger, and each activity id has at
/// most one live watch.
pub struct StatusReconciler<S, F>
where
    S: ActivityRecordStore + 'static,
    F: ChangeFeed + 'static,
{
    records: Arc<S>,
    feed: Arc<F>,
    sink: Arc<dyn IntentSink>,
    surface: Arc<dyn SurfaceProbe>,
    ledger: TransitionLedger,
    registry: WatchRegistry,
    settings: WatchSettings,
}

impl<S, F> StatusReconciler<S, F>
where
    S: ActivityRecordStore + 'static,
    F: ChangeFeed + 'static,
{
    pub fn new(
        records: Arc<S>,
        feed: Arc<F>,
        sink: Arc<dyn IntentSink>,
        surface: Arc<dyn SurfaceProbe>,
    ) -> Self {
        Self {
            records,
            feed,
            sink,
            surface,
            ledger: TransitionLedger::default(),
            registry: WatchRegistry::default(),
            settings: WatchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: WatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn ledger(&self) -> &TransitionLedger {
        &self.ledger
    }

    pub fn is_watching(&self, activity_id: &str) -> bool {
        self.registry.contains(activity_id)
    }

    /// Starts a watch for a processing activity. Any other status is settled
    /// already: its transition is announced once and no channels are opened.
    ///
    /// A live watch of the same id is stopped and released before the new
    /// one subscribes.
    pub async fn start_watching(&self, activity: &Activity) -> Option<WatchHandle> {
        let context = self.context(&activity.id);
        if !activity.is_processing() {
            let (_cancel, mut cancelled) = watch::channel(false);
            context
                .reconcile(
                    ChannelUpdate::Record(activity.clone()),
                    Channel::Snapshot,
                    &mut cancelled,
                )
                .await;
            return None;
        }

        let Claim {
            cancel,
            cancelled,
            lease,
        } = match self.registry.claim(&activity.id).await {
            Ok(claim) => claim,
            Err(error) => {
                warn!(activity_id = %activity.id, error = %error, "watch registry unavailable");
                return None;
            }
        };

        if let Err(error) = self.ledger.begin_watch(&activity.id) {
            warn!(activity_id = %activity.id, error = %error, "transition ledger unavailable");
        }

        let (subscription_id, changes) =
            match self.feed.subscribe(ChangeFilter::activity(activity.id.clone())).await {
                Ok(subscription) => (Some(subscription.id), Some(subscription.receiver)),
                Err(error) => {
                    warn!(activity_id = %activity.id, error = %error, "change subscription failed; polling only");
                    (None, None)
                }
            };

        let task = tokio::spawn(context.run(cancelled, changes, subscription_id.clone(), lease));
        info!(activity_id = %activity.id, "watching activity");

        Some(WatchHandle {
            activity_id: activity.id.clone(),
            subscription_id,
            cancel,
            task: Some(task),
            ledger: self.ledger.clone(),
        })
    }

    pub async fn stop_watching(&self, mut handle: WatchHandle) {
        handle.stop().await;
    }

    fn context(&self, activity_id: &str) -> WatchContext<S, F> {
        WatchContext {
            activity_id: activity_id.to_string(),
            records: Arc::clone(&self.records),
            feed: Arc::clone(&self.feed),
            sink: Arc::clone(&self.sink),
            surface: Arc::clone(&self.surface),
            ledger: self.ledger.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// At most one live watch, for a UI surface that follows a single import.
pub struct WatchSlot<S, F>
where
    S: ActivityRecordStore + 'static,
    F: ChangeFeed + 'static,
{
    reconciler: Arc<StatusReconciler<S, F>>,
    current: Mutex<Option<WatchHandle>>,
}

impl<S, F> WatchSlot<S, F>
where
    S: ActivityRecordStore + 'static,
    F: ChangeFeed + 'static,
{
    pub fn new(reconciler: Arc<StatusReconciler<S, F>>) -> Self {
        Self {
            reconciler,
            current: Mutex::new(None),
        }
    }

    /// Replaces the current watch. The previous one is fully stopped before
    /// the new one subscribes. Returns whether a live watch is running.
    pub async fn watch(&self, activity: &Activity) -> bool {
        let mut current = self.current.lock().await;
        if let Some(existing) = current.as_ref() {
            if existing.activity_id() == activity.id && existing.is_active() {
                return true;
            }
        }
        if let Some(mut previous) = current.take() {
            previous.stop().await;
        }
        *current = self.reconciler.start_watching(activity).await;
        current.is_some()
    }

    pub async fn clear(&self) {
        if let Some(mut previous) = self.current.lock().await.take() {
            previous.stop().await;
        }
    }

    pub async fn watched_activity_id(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|handle| handle.is_active())
            .map(|handle| handle.activity_id().to_string())
    }
}
